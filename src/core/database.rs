use crate::core::storage::{StatisticsStore, StorageResult};
use crate::models::statistics::StatisticsRecord;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use std::path::Path;
use std::sync::Arc;

/// Key under which the statistics record is stored
pub const STATISTICS_KEY: &str = "statistics";

const DATABASE_FILE: &str = "posture.db";

#[derive(Debug, Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database under `data_path` and run migrations
    pub async fn init(data_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let db_path = data_path.join(DATABASE_FILE);
        let db_url = format!("sqlite://{}", db_path.display());

        std::fs::create_dir_all(data_path)?;

        if !Sqlite::database_exists(&db_url).await? {
            Sqlite::create_database(&db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), Box<dyn std::error::Error>> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

// ==============================================================================
// Key-value store
// ==============================================================================

impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM key_value_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert or replace the value stored under `key`
    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        let updated_at = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO key_value_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Statistics record persisted as JSON in the key-value table
#[derive(Debug, Clone)]
pub struct SqliteStatisticsStore {
    db: Arc<Database>,
}

impl SqliteStatisticsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StatisticsStore for SqliteStatisticsStore {
    async fn load(&self) -> StorageResult<Option<StatisticsRecord>> {
        match self.db.get_value(STATISTICS_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &StatisticsRecord) -> StorageResult<()> {
        let json = serde_json::to_string(record)?;
        self.db.set_value(STATISTICS_KEY, &json).await?;
        Ok(())
    }
}
