pub mod config;
pub mod database;
pub mod storage;
pub mod session_manager;

// Posture analysis
pub mod pose_estimator;
pub mod calibration;
pub mod posture_monitor;
pub mod engine;

// Statistics aggregation
pub mod statistics;
pub mod time_window;
