// Data models for landmarks, pose readings, activities and posture statistics

pub mod activity;
pub mod pose;
pub mod statistics;
