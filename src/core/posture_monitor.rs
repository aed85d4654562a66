// Posture state machine: debounced bad-posture duration and one-shot warnings

use crate::models::activity::WarningMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Head tilted further down than this (relative to baseline) is bad posture
pub const PITCH_THRESHOLD_DEGREES: f64 = -10.0;
/// Leaning closer than this to the camera (relative to baseline) is bad posture
pub const DISTANCE_THRESHOLD_CM: f64 = 10.0;
/// Continuous bad posture needed before the user is warned
pub const WARNING_DELAY_SECONDS: f64 = 5.0;

/// Posture is bad when the head drops past the pitch threshold or the user
/// slumps towards the camera past the distance threshold.
pub fn sitting_posture_is_bad(
    adjusted_pitch: f64,
    distance_cm: f64,
    reference_distance_cm: f64,
) -> bool {
    adjusted_pitch < PITCH_THRESHOLD_DEGREES
        || (reference_distance_cm - distance_cm) > DISTANCE_THRESHOLD_CM
}

/// Seconds from `start` to `end`, never negative
pub(crate) fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds().max(0)) as f64 / 1000.0
}

/// Side effect requested when a warning fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Notification,
    Blur,
}

impl WarningKind {
    pub fn for_method(method: WarningMethod) -> Option<Self> {
        match method {
            WarningMethod::Notification => Some(WarningKind::Notification),
            WarningMethod::Blur => Some(WarningKind::Blur),
            WarningMethod::None => None,
        }
    }
}

/// Calibrated measurement for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub adjusted_pitch: f64,
    pub distance_cm: f64,
    pub reference_distance_cm: f64,
}

impl Observation {
    pub fn is_bad(&self) -> bool {
        sitting_posture_is_bad(self.adjusted_pitch, self.distance_cm, self.reference_distance_cm)
    }
}

/// Transitions reported by `PostureMonitor::update`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostureEvent {
    EpisodeStarted { at: DateTime<Utc> },
    Warn(WarningKind),
    ClearBlur,
    EpisodeEnded {
        started_at: DateTime<Utc>,
        duration_seconds: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostureUpdate {
    pub is_bad: bool,
    pub bad_duration_seconds: f64,
    pub events: Vec<PostureEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostureState {
    pub is_bad: bool,
    pub bad_since: Option<DateTime<Utc>>,
    pub bad_duration_seconds: f64,
    pub warned: bool,
}

/// Two-state {Good, Bad} machine with a running episode timer and a warning
/// latch that fires at most once per episode.
#[derive(Debug, Clone)]
pub struct PostureMonitor {
    state: PostureState,
    warning_method: WarningMethod,
}

impl PostureMonitor {
    pub fn new(warning_method: WarningMethod) -> Self {
        Self {
            state: PostureState::default(),
            warning_method,
        }
    }

    pub fn state(&self) -> &PostureState {
        &self.state
    }

    pub fn warning_method(&self) -> WarningMethod {
        self.warning_method
    }

    pub fn set_warning_method(&mut self, method: WarningMethod) {
        self.warning_method = method;
    }

    /// Advance the machine. `None` means no measurement this frame and leaves
    /// the timer and warning latch untouched.
    pub fn update(
        &mut self,
        observation: Option<Observation>,
        now: DateTime<Utc>,
    ) -> PostureUpdate {
        let mut events = Vec::new();

        match observation.map(|o| o.is_bad()) {
            None => {}
            Some(true) => match self.state.bad_since {
                None => {
                    self.state = PostureState {
                        is_bad: true,
                        bad_since: Some(now),
                        bad_duration_seconds: 0.0,
                        warned: false,
                    };
                    events.push(PostureEvent::EpisodeStarted { at: now });
                }
                Some(start) => {
                    self.state.bad_duration_seconds = elapsed_seconds(start, now);
                    if let Some(kind) = self.due_warning() {
                        self.state.warned = true;
                        events.push(PostureEvent::Warn(kind));
                    }
                }
            },
            Some(false) => {
                if let Some(started_at) = self.state.bad_since {
                    events.push(PostureEvent::EpisodeEnded {
                        started_at,
                        duration_seconds: elapsed_seconds(started_at, now),
                    });
                    if self.warning_method == WarningMethod::Blur {
                        events.push(PostureEvent::ClearBlur);
                    }
                }
                self.state = PostureState::default();
            }
        }

        PostureUpdate {
            is_bad: self.state.is_bad,
            bad_duration_seconds: self.state.bad_duration_seconds,
            events,
        }
    }

    fn due_warning(&self) -> Option<WarningKind> {
        if self.state.warned || self.state.bad_duration_seconds < WARNING_DELAY_SECONDS {
            return None;
        }
        WarningKind::for_method(self.warning_method)
    }

    /// End any open episode at `now` (session shutdown) and return to Good
    pub fn close_episode(&mut self, now: DateTime<Utc>) -> Option<PostureEvent> {
        let started_at = self.state.bad_since?;
        self.state = PostureState::default();
        Some(PostureEvent::EpisodeEnded {
            started_at,
            duration_seconds: elapsed_seconds(started_at, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    fn obs(adjusted_pitch: f64, distance_cm: f64) -> Option<Observation> {
        Some(Observation {
            adjusted_pitch,
            distance_cm,
            reference_distance_cm: 50.0,
        })
    }

    fn warnings(update: &PostureUpdate) -> usize {
        update
            .events
            .iter()
            .filter(|e| matches!(e, PostureEvent::Warn(_)))
            .count()
    }

    #[test]
    fn test_classification_rule() {
        assert!(sitting_posture_is_bad(-15.0, 50.0, 50.0));
        assert!(sitting_posture_is_bad(0.0, 35.0, 50.0));
        assert!(!sitting_posture_is_bad(-5.0, 45.0, 50.0));
        // Exactly on the thresholds is still good
        assert!(!sitting_posture_is_bad(-10.0, 40.0, 50.0));
        // Leaning back is never bad
        assert!(!sitting_posture_is_bad(0.0, 80.0, 50.0));
    }

    #[test]
    fn test_single_warning_per_episode() {
        let mut monitor = PostureMonitor::new(WarningMethod::Notification);

        let mut total = 0;
        for s in 0..=10 {
            total += warnings(&monitor.update(obs(-20.0, 50.0), at(s)));
        }
        assert_eq!(total, 1);
        assert!(monitor.state().warned);
        assert_eq!(monitor.state().bad_duration_seconds, 10.0);
    }

    #[test]
    fn test_warning_fires_at_five_seconds() {
        let mut monitor = PostureMonitor::new(WarningMethod::Blur);
        monitor.update(obs(-20.0, 50.0), at(0));

        let early = monitor.update(obs(-20.0, 50.0), at(4));
        assert_eq!(warnings(&early), 0);

        let due = monitor.update(obs(-20.0, 50.0), at(5));
        assert_eq!(due.events, vec![PostureEvent::Warn(WarningKind::Blur)]);
    }

    #[test]
    fn test_good_reading_rearms_warning() {
        let mut monitor = PostureMonitor::new(WarningMethod::Notification);
        monitor.update(obs(-20.0, 50.0), at(0));
        assert_eq!(warnings(&monitor.update(obs(-20.0, 50.0), at(6))), 1);

        let recovered = monitor.update(obs(0.0, 50.0), at(7));
        assert!(!recovered.is_bad);
        assert_eq!(recovered.bad_duration_seconds, 0.0);
        assert_eq!(
            recovered.events,
            vec![PostureEvent::EpisodeEnded {
                started_at: at(0),
                duration_seconds: 7.0
            }]
        );
        assert!(!monitor.state().warned);

        monitor.update(obs(-20.0, 50.0), at(10));
        assert_eq!(warnings(&monitor.update(obs(-20.0, 50.0), at(16))), 1);
    }

    #[test]
    fn test_missing_frames_do_not_reset_episode() {
        let mut monitor = PostureMonitor::new(WarningMethod::Notification);
        monitor.update(obs(-20.0, 50.0), at(0));
        assert_eq!(warnings(&monitor.update(obs(-20.0, 50.0), at(5))), 1);

        let gap = monitor.update(None, at(6));
        assert!(gap.is_bad);
        assert!(gap.events.is_empty());
        assert_eq!(gap.bad_duration_seconds, 5.0);

        let resumed = monitor.update(obs(-20.0, 50.0), at(8));
        assert_eq!(resumed.bad_duration_seconds, 8.0);
        assert_eq!(warnings(&resumed), 0);
        assert_eq!(monitor.state().bad_since, Some(at(0)));
    }

    #[test]
    fn test_blur_cleared_on_recovery() {
        let mut monitor = PostureMonitor::new(WarningMethod::Blur);
        monitor.update(obs(0.0, 30.0), at(0));
        let recovered = monitor.update(obs(0.0, 50.0), at(2));
        assert!(recovered.events.contains(&PostureEvent::ClearBlur));

        // Notification warnings are one-shot and never cleared
        let mut monitor = PostureMonitor::new(WarningMethod::Notification);
        monitor.update(obs(0.0, 30.0), at(0));
        let recovered = monitor.update(obs(0.0, 50.0), at(2));
        assert!(!recovered.events.contains(&PostureEvent::ClearBlur));
    }

    #[test]
    fn test_no_warning_without_method() {
        let mut monitor = PostureMonitor::new(WarningMethod::None);
        for s in 0..20 {
            assert_eq!(warnings(&monitor.update(obs(-30.0, 50.0), at(s))), 0);
        }
        assert!(!monitor.state().warned);
    }

    #[test]
    fn test_close_episode() {
        let mut monitor = PostureMonitor::new(WarningMethod::None);
        assert_eq!(monitor.close_episode(at(0)), None);

        monitor.update(obs(-30.0, 50.0), at(0));
        assert_eq!(
            monitor.close_episode(at(3)),
            Some(PostureEvent::EpisodeEnded {
                started_at: at(0),
                duration_seconds: 3.0
            })
        );
        assert!(!monitor.state().is_bad);
    }
}
