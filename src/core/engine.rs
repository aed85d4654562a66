// Session state owner: runs one frame at a time through estimation,
// calibration, classification and statistics.

use crate::core::calibration::Calibration;
use crate::core::config::Config;
use crate::core::pose_estimator::PoseEstimator;
use crate::core::posture_monitor::{Observation, PostureEvent, PostureMonitor, WarningKind};
use crate::core::statistics::StatisticsAggregator;
use crate::core::storage::StorageError;
use crate::models::activity::{Activity, WarningMethod};
use crate::models::pose::{FrameGeometry, LandmarkFrame, PoseError, PoseReading, PoseResult};
use crate::models::statistics::StatisticsRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No posture session is running")]
    NotRunning,

    #[error("Session channel closed")]
    ChannelClosed,

    #[error("No pose reading available to calibrate from")]
    NoPoseReading,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Outbound fire-and-forget signals for the UI and notification layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostureSignal {
    #[serde(rename_all = "camelCase")]
    WarningRequested { kind: WarningKind },
    BlurClearRequested,
    /// Emitted for every processed frame. Pitch is relative to the baseline
    /// and absent before calibration; both are absent when the frame had no
    /// usable pose.
    #[serde(rename_all = "camelCase")]
    PoseResult {
        pitch: Option<f64>,
        distance: Option<f64>,
        bad_duration_seconds: f64,
    },
    #[serde(rename_all = "camelCase")]
    FrameIntervalChanged { interval_ms: u64 },
    #[serde(rename_all = "camelCase")]
    CalibrationSaved { pitch: f64, distance: f64 },
    #[serde(rename_all = "camelCase")]
    PersistenceFailed { message: String },
}

pub struct PostureEngine {
    config: Config,
    estimator: PoseEstimator,
    calibration: Calibration,
    monitor: PostureMonitor,
    statistics: StatisticsAggregator,
    geometry: Option<FrameGeometry>,
    last_reading: Option<PoseReading>,
}

impl PostureEngine {
    pub fn new(record: StatisticsRecord, config: Config) -> Self {
        let monitor = PostureMonitor::new(config.warning_method());
        let statistics = StatisticsAggregator::new(record, config.history_days);

        Self {
            config,
            estimator: PoseEstimator::new(),
            calibration: Calibration::new(),
            monitor,
            statistics,
            geometry: None,
            last_reading: None,
        }
    }

    pub fn statistics(&self) -> &StatisticsAggregator {
        &self.statistics
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn warning_method(&self) -> WarningMethod {
        self.monitor.warning_method()
    }

    /// Delay before the next frame should be delivered
    pub fn frame_interval_ms(&self) -> u64 {
        self.config.frame_interval_ms(self.monitor.warning_method())
    }

    /// Process one landmark frame
    pub fn process_frame(
        &mut self,
        frame: &LandmarkFrame,
        now: DateTime<Utc>,
    ) -> Vec<PostureSignal> {
        let reading = match self.measure(frame) {
            Ok(reading) => {
                self.last_reading = Some(reading);
                Some(reading)
            }
            Err(e) => {
                debug!(error = %e, "No pose measurement this frame");
                None
            }
        };

        let mut signals = Vec::new();

        // Classification waits for a baseline
        if !self.calibration.is_set() {
            signals.push(PostureSignal::PoseResult {
                pitch: None,
                distance: reading.map(|r| r.distance_cm),
                bad_duration_seconds: 0.0,
            });
            return signals;
        }

        let observation = reading.and_then(|r| {
            Some(Observation {
                adjusted_pitch: self.calibration.adjust(&r)?,
                distance_cm: r.distance_cm,
                reference_distance_cm: self.calibration.reference_distance()?,
            })
        });

        let update = self.monitor.update(observation, now);
        for event in update.events {
            self.apply_event(event, &mut signals);
        }

        signals.push(PostureSignal::PoseResult {
            pitch: observation.map(|o| o.adjusted_pitch),
            distance: observation.map(|o| o.distance_cm),
            bad_duration_seconds: update.bad_duration_seconds,
        });
        signals
    }

    /// Capture the latest reading as the good-posture baseline. The first
    /// capture of a session starts statistics tracking.
    pub fn save_good_posture(&mut self, now: DateTime<Utc>) -> SessionResult<PoseReading> {
        let reading = self.last_reading.ok_or(SessionError::NoPoseReading)?;
        self.calibration.capture(reading);
        info!(
            pitch = reading.pitch_degrees,
            distance_cm = reading.distance_cm,
            "Good posture saved"
        );

        if !self.statistics.is_tracking() {
            self.statistics.start_tracking(now);
        }

        Ok(reading)
    }

    /// Returns false when the name is not a known activity
    pub fn set_activity(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        match Activity::from_string(name) {
            Some(activity) => {
                self.statistics.on_activity_change(activity, now);
                info!(activity = activity.to_string(), "Activity changed");
                true
            }
            None => {
                warn!(activity = name, "Ignoring unknown activity");
                false
            }
        }
    }

    /// Returns None when the name is not a known warning method
    pub fn set_warning_method(&mut self, name: &str) -> Option<Vec<PostureSignal>> {
        let Some(method) = WarningMethod::from_string(name) else {
            warn!(method = name, "Ignoring unknown warning method");
            return None;
        };

        let mut signals = Vec::new();
        // An active blur would otherwise outlive the method that raised it
        if method != WarningMethod::Blur && self.blur_is_active() {
            signals.push(PostureSignal::BlurClearRequested);
        }

        self.monitor.set_warning_method(method);
        info!(method = method.to_string(), "Warning method changed");

        signals.push(PostureSignal::FrameIntervalChanged {
            interval_ms: self.frame_interval_ms(),
        });
        Some(signals)
    }

    /// Delay before the window timer should next fire
    pub fn until_next_window(&self, now: DateTime<Utc>) -> std::time::Duration {
        self.statistics.until_next_window(now)
    }

    pub fn on_time_window_tick(&mut self, now: DateTime<Utc>) {
        self.statistics.on_time_window_tick(now);
    }

    /// Flush open accounting and return the record to persist
    pub fn checkpoint(&mut self, now: DateTime<Utc>) -> StatisticsRecord {
        self.statistics.checkpoint(now)
    }

    pub fn reset_statistics(&mut self, now: DateTime<Utc>) -> StatisticsRecord {
        self.statistics.reset(now);
        self.statistics.record().clone()
    }

    /// End the session: close any open episode, flush every scope and drop
    /// calibration and frame state. Returns the final record to persist and
    /// the signals that undo warnings still on screen.
    pub fn power_off(&mut self, now: DateTime<Utc>) -> (StatisticsRecord, Vec<PostureSignal>) {
        let mut signals = Vec::new();
        if self.blur_is_active() {
            signals.push(PostureSignal::BlurClearRequested);
        }

        if let Some(PostureEvent::EpisodeEnded {
            started_at,
            duration_seconds,
        }) = self.monitor.close_episode(now)
        {
            self.statistics.on_bad_posture_episode(started_at, duration_seconds);
        }

        let record = self.statistics.finish(now);
        self.calibration.clear();
        self.geometry = None;
        self.last_reading = None;

        info!(
            daily_total_ms = record.daily_total_ms,
            daily_bad_ms = record.daily_bad_ms,
            "Posture session powered off"
        );
        (record, signals)
    }

    fn blur_is_active(&self) -> bool {
        self.monitor.warning_method() == WarningMethod::Blur && self.monitor.state().warned
    }

    fn measure(&mut self, frame: &LandmarkFrame) -> PoseResult<PoseReading> {
        let actual = frame.geometry();
        match self.geometry {
            Some(expected) if expected != actual => {
                return Err(PoseError::GeometryChanged { expected, actual });
            }
            Some(_) => {}
            None if actual.is_valid() => {
                info!(width = actual.width, height = actual.height, "Frame geometry fixed");
                self.geometry = Some(actual);
            }
            None => {}
        }

        self.estimator.estimate(&frame.landmarks, actual)
    }

    fn apply_event(&mut self, event: PostureEvent, signals: &mut Vec<PostureSignal>) {
        match event {
            PostureEvent::EpisodeStarted { at } => {
                self.statistics.on_bad_posture_started(at);
            }
            PostureEvent::Warn(kind) => {
                info!(kind = ?kind, "Bad posture warning");
                signals.push(PostureSignal::WarningRequested { kind });
            }
            PostureEvent::ClearBlur => {
                signals.push(PostureSignal::BlurClearRequested);
            }
            PostureEvent::EpisodeEnded {
                started_at,
                duration_seconds,
            } => {
                self.statistics.on_bad_posture_episode(started_at, duration_seconds);
            }
        }
    }
}
