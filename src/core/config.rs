use crate::models::activity::WarningMethod;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the statistics database
    pub data_path: PathBuf,
    /// Warning method used until the user picks one: "notification", "blur" or "none"
    pub default_warning_method: String,
    /// Frame interval while warning by notification (ms)
    pub notification_frame_interval_ms: u64,
    /// Frame interval while warning by screen blur (ms)
    pub blur_frame_interval_ms: u64,
    /// Frame interval with warnings disabled (ms)
    pub idle_frame_interval_ms: u64,
    /// How often statistics are flushed and saved (seconds)
    pub checkpoint_interval_seconds: u64,
    /// Days kept in the rolling history
    pub history_days: usize,
    /// Capacity of the command and signal channels
    pub signal_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let mut data_path = PathBuf::from(home);
        data_path.push(".posture_data");
        data_path.push("database");

        Self {
            data_path,
            default_warning_method: "notification".to_string(),
            notification_frame_interval_ms: 2500,
            blur_frame_interval_ms: 500,
            idle_frame_interval_ms: 2500,
            checkpoint_interval_seconds: 60,
            history_days: 30,
            signal_buffer: 100,
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if WarningMethod::from_string(&self.default_warning_method).is_none() {
            return Err(format!(
                "Invalid warning method: {}. Must be one of: notification, blur, none",
                self.default_warning_method
            )
            .into());
        }

        let intervals = [
            ("notification", self.notification_frame_interval_ms),
            ("blur", self.blur_frame_interval_ms),
            ("idle", self.idle_frame_interval_ms),
        ];
        for (name, interval) in intervals {
            if !(100..=10_000).contains(&interval) {
                return Err(format!(
                    "Invalid {} frame interval: {}. Must be between 100 and 10000 ms",
                    name, interval
                )
                .into());
            }
        }

        if !(5..=3600).contains(&self.checkpoint_interval_seconds) {
            return Err(format!(
                "Invalid checkpoint interval: {}. Must be between 5 and 3600 seconds",
                self.checkpoint_interval_seconds
            )
            .into());
        }

        if !(1..=365).contains(&self.history_days) {
            return Err(format!(
                "Invalid history days: {}. Must be between 1 and 365",
                self.history_days
            )
            .into());
        }

        if self.signal_buffer == 0 {
            return Err("Signal buffer cannot be zero".into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Warning method to start sessions with; validated on load
    pub fn warning_method(&self) -> WarningMethod {
        WarningMethod::from_string(&self.default_warning_method).unwrap_or(WarningMethod::Notification)
    }

    /// Frame pacing for the active warning method
    pub fn frame_interval_ms(&self, method: WarningMethod) -> u64 {
        match method {
            WarningMethod::Notification => self.notification_frame_interval_ms,
            WarningMethod::Blur => self.blur_frame_interval_ms,
            WarningMethod::None => self.idle_frame_interval_ms,
        }
    }

    /// Get the configuration file path
    fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".posture_data");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
