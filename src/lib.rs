pub mod core;
pub mod models;

use crate::core::config::Config;
use crate::core::database::{Database, SqliteStatisticsStore};
use crate::core::engine::{PostureSignal, SessionError};
use crate::core::session_manager::{SessionHandle, SessionManager};
use crate::core::storage::{self, MemoryStatisticsStore, StatisticsStore};
use crate::models::pose::{LandmarkFrame, PoseReading};
use crate::models::statistics::StatisticsRecord;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Application state
pub struct AppState {
    pub config: Mutex<Config>,
    pub store: Arc<dyn StatisticsStore>,
    session: RwLock<Option<SessionHandle>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn StatisticsStore>) -> Self {
        Self {
            config: Mutex::new(config),
            store,
            session: RwLock::new(None),
        }
    }

    async fn current_session(&self) -> Result<SessionHandle, SessionError> {
        self.session
            .read()
            .await
            .clone()
            .filter(|handle| handle.is_running())
            .ok_or(SessionError::NotRunning)
    }
}

/// Install the tracing subscriber. Log level comes from `RUST_LOG`, default
/// `info`; output goes to stderr. Calling it again is harmless.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
}

// Configuration management commands
pub fn get_config(state: &AppState) -> Result<Config, String> {
    let config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;

    Ok(config.clone())
}

pub fn update_config(config: Config, state: &AppState) -> Result<(), String> {
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    let mut current_config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;

    *current_config = config.clone();

    config
        .save()
        .map_err(|e| format!("Failed to save config: {}", e))?;

    Ok(())
}

pub fn reset_config(state: &AppState) -> Result<Config, String> {
    let default_config = Config::reset().map_err(|e| format!("Failed to reset config: {}", e))?;

    let mut current_config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;

    *current_config = default_config.clone();

    Ok(default_config)
}

// Session commands

/// Start a posture session. Signals for the UI arrive on the returned receiver.
pub async fn start_session(state: &AppState) -> Result<mpsc::Receiver<PostureSignal>, String> {
    let mut session = state.session.write().await;
    if session.as_ref().is_some_and(|handle| handle.is_running()) {
        return Err("Posture session already running".to_string());
    }

    let config = get_config(state)?;
    let (handle, signals) = SessionManager::start(config, state.store.clone())
        .await
        .map_err(|e| format!("Failed to start session: {}", e))?;

    *session = Some(handle);
    Ok(signals)
}

pub async fn process_frame(frame: LandmarkFrame, state: &AppState) -> Result<(), String> {
    state
        .current_session()
        .await
        .map_err(|e| format!("Failed to process frame: {}", e))?
        .process_frame(frame)
        .await
        .map_err(|e| format!("Failed to process frame: {}", e))
}

pub async fn save_good_posture(state: &AppState) -> Result<PoseReading, String> {
    state
        .current_session()
        .await
        .map_err(|e| format!("Failed to save good posture: {}", e))?
        .save_good_posture()
        .await
        .map_err(|e| format!("Failed to save good posture: {}", e))
}

pub async fn set_activity(activity: String, state: &AppState) -> Result<(), String> {
    state
        .current_session()
        .await
        .map_err(|e| format!("Failed to set activity: {}", e))?
        .set_activity(&activity)
        .await
        .map_err(|e| format!("Failed to set activity: {}", e))
}

pub async fn set_warning_method(method: String, state: &AppState) -> Result<(), String> {
    state
        .current_session()
        .await
        .map_err(|e| format!("Failed to set warning method: {}", e))?
        .set_warning_method(&method)
        .await
        .map_err(|e| format!("Failed to set warning method: {}", e))
}

/// Live record while a session runs, otherwise the stored one
pub async fn get_statistics(state: &AppState) -> Result<StatisticsRecord, String> {
    match state.current_session().await {
        Ok(handle) => handle.statistics().await,
        Err(_) => storage::load_or_default(state.store.as_ref())
            .await
            .map_err(SessionError::from),
    }
    .map_err(|e| format!("Failed to get statistics: {}", e))
}

pub async fn reset_statistics(state: &AppState) -> Result<StatisticsRecord, String> {
    match state.current_session().await {
        Ok(handle) => handle.reset_statistics().await,
        Err(_) => storage::reset_statistics(state.store.as_ref())
            .await
            .map_err(SessionError::from),
    }
    .map_err(|e| format!("Failed to reset statistics: {}", e))
}

/// End the session, flushing and persisting its statistics
pub async fn power_off(state: &AppState) -> Result<StatisticsRecord, String> {
    let handle = state
        .session
        .write()
        .await
        .take()
        .ok_or_else(|| format!("Failed to power off: {}", SessionError::NotRunning))?;

    handle
        .power_off()
        .await
        .map_err(|e| format!("Failed to power off: {}", e))
}

// ==============================================================================
// Headless runner
// ==============================================================================

/// One JSON line on stdin
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum HeadlessCommand {
    Frame(LandmarkFrame),
    SaveGoodPosture,
    SetActivity { activity: String },
    SetWarningMethod { method: String },
    GetStatistics,
    ResetStatistics,
    PowerOff,
}

/// Statistics snapshot written to stdout
#[derive(Debug, Serialize)]
struct StatisticsReply<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    record: &'a StatisticsRecord,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "Failed to encode output line"),
    }
}

fn print_statistics(record: &StatisticsRecord) {
    print_json(&StatisticsReply {
        kind: "statistics",
        record,
    });
}

async fn open_store(config: &Config) -> Arc<dyn StatisticsStore> {
    match Database::init(&config.data_path).await {
        Ok(db) => Arc::new(SqliteStatisticsStore::new(Arc::new(db))),
        Err(e) => {
            warn!(error = %e, "Statistics database unavailable, keeping statistics in memory");
            Arc::new(MemoryStatisticsStore::new())
        }
    }
}

async fn dispatch(command: HeadlessCommand, state: &AppState) -> Result<bool, String> {
    match command {
        HeadlessCommand::Frame(frame) => process_frame(frame, state).await?,
        HeadlessCommand::SaveGoodPosture => {
            save_good_posture(state).await?;
        }
        HeadlessCommand::SetActivity { activity } => set_activity(activity, state).await?,
        HeadlessCommand::SetWarningMethod { method } => set_warning_method(method, state).await?,
        HeadlessCommand::GetStatistics => {
            print_statistics(&get_statistics(state).await?);
        }
        HeadlessCommand::ResetStatistics => {
            print_statistics(&reset_statistics(state).await?);
        }
        HeadlessCommand::PowerOff => return Ok(false),
    }
    Ok(true)
}

async fn run_headless(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config).await;
    let state = AppState::new(config, store);

    let mut signals = start_session(&state).await?;
    let printer = tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            print_json(&signal);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match serde_json::from_str::<HeadlessCommand>(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed command");
                continue;
            }
        };

        match dispatch(command, &state).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("{}", e),
        }
    }

    print_statistics(&power_off(&state).await?);

    if let Err(e) = printer.await {
        warn!(error = %e, "Signal printer stopped abnormally");
    }
    Ok(())
}

/// Headless entry point: JSON-lines commands on stdin, signals on stdout
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        }
    };
    info!(data_path = %config.data_path.display(), "Starting posture sentinel");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_headless(config))
}
