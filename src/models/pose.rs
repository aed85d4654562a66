// Data models for facial landmarks, frame geometry and head pose readings

use serde::{Deserialize, Serialize};

// ==============================================================================
// Landmarks
// ==============================================================================

/// A single face landmark, normalized to the frame ([0, 1] on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert to pixel coordinates for a frame of the given size
    pub fn to_pixels(&self, geometry: FrameGeometry) -> (f64, f64) {
        (self.x * geometry.width as f64, self.y * geometry.height as f64)
    }

    fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && !(self.x == 0.0 && self.y == 0.0)
    }
}

/// Ordered landmark set produced by the face detector for one frame.
/// Identity is the positional index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up a landmark, rejecting missing, non-finite and all-zero points
    pub fn get(&self, index: FaceLandmark) -> PoseResult<Landmark> {
        let idx = index as usize;
        self.points
            .get(idx)
            .copied()
            .filter(Landmark::is_usable)
            .ok_or(PoseError::MissingLandmark(idx))
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// Face mesh landmark indices consumed by the estimator (478-point refined mesh)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FaceLandmark {
    NoseTip = 1,
    LeftEyeOuter = 33,
    LeftMouthCorner = 61,
    Chin = 199,
    RightEyeOuter = 263,
    RightMouthCorner = 291,
    RightPupil = 468,
    LeftPupil = 473,
}

impl FaceLandmark {
    /// Landmarks paired with the canonical face model, in model order
    pub const POSE_POINTS: [FaceLandmark; 6] = [
        FaceLandmark::LeftEyeOuter,
        FaceLandmark::RightEyeOuter,
        FaceLandmark::NoseTip,
        FaceLandmark::LeftMouthCorner,
        FaceLandmark::RightMouthCorner,
        FaceLandmark::Chin,
    ];
}

// ==============================================================================
// Frame
// ==============================================================================

/// Video stream dimensions in pixels, fixed for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Per-frame input delivered by the landmark source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub landmarks: LandmarkSet,
    #[serde(rename = "frameWidth", alias = "width")]
    pub width: u32,
    #[serde(rename = "frameHeight", alias = "height")]
    pub height: u32,
}

impl LandmarkFrame {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}

// ==============================================================================
// Pose Reading
// ==============================================================================

/// Head pitch and camera distance recovered from one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseReading {
    /// Signed pitch in degrees, folded around the frontal orientation
    pub pitch_degrees: f64,
    /// Estimated head-to-camera distance in centimeters, always positive
    pub distance_cm: f64,
}

impl PoseReading {
    pub fn new(pitch_degrees: f64, distance_cm: f64) -> Self {
        Self {
            pitch_degrees,
            distance_cm,
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoseError {
    #[error("No face detected")]
    NoFace,

    #[error("Landmark {0} missing or empty")]
    MissingLandmark(usize),

    #[error("Invalid frame size {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("Frame size changed mid-session: expected {expected:?}, got {actual:?}")]
    GeometryChanged {
        expected: FrameGeometry,
        actual: FrameGeometry,
    },

    #[error("Pupil landmarks coincide")]
    DegeneratePupils,

    #[error("Pose solve failed: {0}")]
    SolveFailed(String),
}

pub type PoseResult<T> = Result<T, PoseError>;
