// Good-posture baseline captured on demand by the user

use crate::models::pose::PoseReading;

/// Reference pitch and distance the session's readings are judged against
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    reference: Option<PoseReading>,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` as the baseline, replacing any previous one
    pub fn capture(&mut self, reading: PoseReading) {
        self.reference = Some(reading);
    }

    pub fn is_set(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<PoseReading> {
        self.reference
    }

    pub fn reference_distance(&self) -> Option<f64> {
        self.reference().map(|r| r.distance_cm)
    }

    /// Pitch relative to the baseline; None until a baseline exists
    pub fn adjust(&self, reading: &PoseReading) -> Option<f64> {
        self.reference
            .map(|reference| reading.pitch_degrees - reference.pitch_degrees)
    }

    pub fn clear(&mut self) {
        self.reference = None;
    }
}
