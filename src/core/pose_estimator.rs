// Head pose and camera distance estimation from face landmarks
//
// Pitch comes from a perspective-n-point solve of six landmarks against a
// canonical 3D face model; distance comes from the apparent pupil separation.

use crate::models::pose::{
    FaceLandmark, FrameGeometry, LandmarkSet, PoseError, PoseReading, PoseResult,
};
use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, Vector3};

/// Average adult interpupillary distance in centimeters
pub const AVERAGE_PUPILLARY_DISTANCE_CM: f64 = 6.3;

/// Canonical face model in millimeters, nose tip at the origin. Same order as
/// `FaceLandmark::POSE_POINTS`: eye outer corners (left, right), nose tip,
/// mouth corners (left, right), chin.
pub const FACE_MODEL_MM: [[f64; 3]; 6] = [
    [-165.0, 170.0, -135.0],
    [165.0, 170.0, -135.0],
    [0.0, 0.0, 0.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
    [0.0, -330.0, -65.0],
];

const GIMBAL_LOCK_THRESHOLD: f64 = 1e-6;
const MIN_DEPTH: f64 = 1e-9;
const MAX_ITERATIONS: usize = 100;

// ==============================================================================
// Camera Model
// ==============================================================================

/// Pinhole intrinsics, zero lens distortion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_length: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Uncalibrated approximation: focal length equals the frame width and the
    /// principal point is (height / 2, width / 2). The swapped axes are kept so
    /// readings stay comparable with existing calibrations.
    pub fn approximate(geometry: FrameGeometry) -> Self {
        Self {
            focal_length: geometry.width as f64,
            cx: geometry.height as f64 / 2.0,
            cy: geometry.width as f64 / 2.0,
        }
    }

    /// Project a camera-space point to pixels; None when behind the camera
    pub fn project(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        if point.z <= MIN_DEPTH {
            return None;
        }
        Some((
            self.focal_length * point.x / point.z + self.cx,
            self.focal_length * point.y / point.z + self.cy,
        ))
    }

    fn normalize(&self, pixel: (f64, f64)) -> (f64, f64) {
        (
            (pixel.0 - self.cx) / self.focal_length,
            (pixel.1 - self.cy) / self.focal_length,
        )
    }
}

// ==============================================================================
// Perspective-n-Point
// ==============================================================================

/// Rigid transform from model space to camera space
#[derive(Debug, Clone, Copy)]
pub struct PoseSolution {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels
    pub rms_error: f64,
}

/// Recover the model-to-camera transform from 3D-2D correspondences.
///
/// Initial guesses come from a direct linear transform and from a frontal
/// prior; each is refined with Levenberg-Marquardt on the reprojection error
/// and the best converged candidate wins.
pub fn solve_pnp(
    object_points: &[Vector3<f64>],
    image_points: &[(f64, f64)],
    camera: &CameraIntrinsics,
) -> PoseResult<PoseSolution> {
    if object_points.len() != image_points.len() || object_points.len() < 6 {
        return Err(PoseError::SolveFailed(format!(
            "need at least 6 matching points, got {} object / {} image",
            object_points.len(),
            image_points.len()
        )));
    }

    let candidates = [
        direct_linear_transform(object_points, image_points, camera),
        frontal_prior(image_points, camera),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|initial| refine(initial, object_points, image_points, camera))
        .filter(|solution| solution.rms_error.is_finite())
        .min_by(|a, b| a.rms_error.total_cmp(&b.rms_error))
        .ok_or_else(|| PoseError::SolveFailed("no initial guess converged".to_string()))
}

/// Parameter vector layout: rotation vector (3) then translation (3)
type Params = [f64; 6];

fn to_params(rotation: &Rotation3<f64>, translation: &Vector3<f64>) -> Params {
    let r = rotation.scaled_axis();
    [r.x, r.y, r.z, translation.x, translation.y, translation.z]
}

fn residuals(
    params: &Params,
    object_points: &[Vector3<f64>],
    image_points: &[(f64, f64)],
    camera: &CameraIntrinsics,
) -> Option<DVector<f64>> {
    let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);

    let mut out = DVector::zeros(object_points.len() * 2);
    for (i, (object, observed)) in object_points.iter().zip(image_points).enumerate() {
        let (u, v) = camera.project(&(rotation * object + translation))?;
        out[2 * i] = u - observed.0;
        out[2 * i + 1] = v - observed.1;
    }
    Some(out)
}

fn refine(
    initial: Params,
    object_points: &[Vector3<f64>],
    image_points: &[(f64, f64)],
    camera: &CameraIntrinsics,
) -> Option<PoseSolution> {
    let mut params = initial;
    let mut current = residuals(&params, object_points, image_points, camera)?;
    let mut cost = current.norm_squared();
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let jacobian = numeric_jacobian(&params, object_points, image_points, camera)?;
        let jtj = jacobian.transpose() * &jacobian;
        let rhs = -(jacobian.transpose() * &current);

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = jtj.clone();
            for d in 0..6 {
                damped[(d, d)] += lambda * jtj[(d, d)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&rhs) else {
                lambda *= 10.0;
                continue;
            };

            let mut candidate = params;
            for (p, s) in candidate.iter_mut().zip(step.iter()) {
                *p += s;
            }

            match residuals(&candidate, object_points, image_points, camera) {
                Some(next) if next.norm_squared() < cost => {
                    let next_cost = next.norm_squared();
                    let converged =
                        cost - next_cost <= 1e-12 * cost.max(1.0) || step.norm() < 1e-12;
                    params = candidate;
                    current = next;
                    cost = next_cost;
                    lambda = (lambda / 10.0).max(1e-12);
                    improved = !converged;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        if !improved {
            break;
        }
    }

    let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);
    if !translation.iter().all(|t| t.is_finite()) {
        return None;
    }

    Some(PoseSolution {
        rotation,
        translation,
        rms_error: (cost / object_points.len() as f64).sqrt(),
    })
}

fn numeric_jacobian(
    params: &Params,
    object_points: &[Vector3<f64>],
    image_points: &[(f64, f64)],
    camera: &CameraIntrinsics,
) -> Option<DMatrix<f64>> {
    let mut jacobian = DMatrix::zeros(object_points.len() * 2, 6);
    for j in 0..6 {
        let h = 1e-6 * params[j].abs().max(1.0);
        let mut forward = *params;
        let mut backward = *params;
        forward[j] += h;
        backward[j] -= h;

        let f = residuals(&forward, object_points, image_points, camera)?;
        let b = residuals(&backward, object_points, image_points, camera)?;
        jacobian.set_column(j, &((f - b) / (2.0 * h)));
    }
    Some(jacobian)
}

/// Linear estimate of [R|t] from normalized image coordinates.
/// Object points are centered and scaled first for conditioning.
fn direct_linear_transform(
    object_points: &[Vector3<f64>],
    image_points: &[(f64, f64)],
    camera: &CameraIntrinsics,
) -> Option<Params> {
    let n = object_points.len();
    let centroid = object_points.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n as f64;
    let scale = object_points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n as f64;
    if scale <= f64::EPSILON {
        return None;
    }

    let mut a = DMatrix::zeros(2 * n, 12);
    for (i, (object, pixel)) in object_points.iter().zip(image_points).enumerate() {
        let p = (object - centroid) / scale;
        let (xn, yn) = camera.normalize(*pixel);
        let homog = [p.x, p.y, p.z, 1.0];
        for k in 0..4 {
            a[(2 * i, k)] = homog[k];
            a[(2 * i, 8 + k)] = -xn * homog[k];
            a[(2 * i + 1, 4 + k)] = homog[k];
            a[(2 * i + 1, 8 + k)] = -yn * homog[k];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let p = v_t.row(smallest);

    // Undo the object normalization: M = M' / s, t = t' - M' c / s
    #[rustfmt::skip]
    let m_prime = Matrix3::new(
        p[0], p[1], p[2],
        p[4], p[5], p[6],
        p[8], p[9], p[10],
    );
    let t_prime = Vector3::new(p[3], p[7], p[11]);
    let m = m_prime / scale;
    let t = t_prime - m * centroid;

    let det = m.determinant();
    let magnitude = m.norm();
    if !det.is_finite() || det.abs() < 1e-9 * magnitude.powi(3) {
        return None;
    }

    // M = lambda * R; the cube root keeps the sign that makes det(R) positive
    let lambda = det.cbrt();
    let approx = m / lambda;
    let translation = t / lambda;
    if translation.z <= MIN_DEPTH {
        return None;
    }

    let svd = approx.svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    if (u * v_t).determinant() < 0.0 {
        let flipped = -u.column(2);
        u.set_column(2, &flipped);
    }
    let rotation = Rotation3::from_matrix_unchecked(u * v_t);

    Some(to_params(&rotation, &translation))
}

/// Face looking straight into the camera: model flipped about x, depth from
/// the apparent eye-corner span.
fn frontal_prior(image_points: &[(f64, f64)], camera: &CameraIntrinsics) -> Option<Params> {
    let (left_eye, right_eye, nose) = (image_points[0], image_points[1], image_points[2]);
    let span_px = ((right_eye.0 - left_eye.0).powi(2) + (right_eye.1 - left_eye.1).powi(2)).sqrt();
    if span_px <= f64::EPSILON {
        return None;
    }

    let model_span = FACE_MODEL_MM[1][0] - FACE_MODEL_MM[0][0];
    let depth = camera.focal_length * model_span / span_px;
    let (xn, yn) = camera.normalize(nose);

    Some([
        std::f64::consts::PI,
        0.0,
        0.0,
        xn * depth,
        yn * depth,
        depth,
    ])
}

// ==============================================================================
// Angles
// ==============================================================================

/// Euler pitch (rotation about x) in degrees from a rotation matrix
pub fn pitch_from_rotation(r: &Matrix3<f64>) -> f64 {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();
    let pitch = if sy < GIMBAL_LOCK_THRESHOLD {
        (-r[(1, 2)]).atan2(r[(1, 1)])
    } else {
        r[(2, 1)].atan2(r[(2, 2)])
    };
    pitch.to_degrees()
}

/// Fold the raw pitch (near +/-180 for a face toward the camera) onto a
/// continuous scale around 0
pub fn fold_pitch(raw_degrees: f64) -> f64 {
    if raw_degrees > 0.0 {
        180.0 - raw_degrees
    } else {
        -180.0 - raw_degrees
    }
}

// ==============================================================================
// Estimator
// ==============================================================================

/// Stateless per-frame pose estimator
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    model: Vec<Vector3<f64>>,
    pupillary_distance_cm: f64,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self {
            model: FACE_MODEL_MM
                .iter()
                .map(|p| Vector3::new(p[0], p[1], p[2]))
                .collect(),
            pupillary_distance_cm: AVERAGE_PUPILLARY_DISTANCE_CM,
        }
    }
}

impl PoseEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate pitch and distance for one frame
    pub fn estimate(
        &self,
        landmarks: &LandmarkSet,
        geometry: FrameGeometry,
    ) -> PoseResult<PoseReading> {
        if !geometry.is_valid() {
            return Err(PoseError::InvalidFrame {
                width: geometry.width,
                height: geometry.height,
            });
        }
        if landmarks.is_empty() {
            return Err(PoseError::NoFace);
        }

        let distance_cm = self.estimate_distance(landmarks, geometry)?;
        let pitch_degrees = self.estimate_pitch(landmarks, geometry)?;

        Ok(PoseReading::new(pitch_degrees, distance_cm))
    }

    /// Folded head pitch in degrees
    pub fn estimate_pitch(
        &self,
        landmarks: &LandmarkSet,
        geometry: FrameGeometry,
    ) -> PoseResult<f64> {
        let image_points = FaceLandmark::POSE_POINTS
            .iter()
            .map(|&index| {
                landmarks.get(index).map(|l| {
                    // Whole-pixel coordinates, as the detector overlay reports them
                    let (x, y) = l.to_pixels(geometry);
                    (x.floor(), y.floor())
                })
            })
            .collect::<PoseResult<Vec<_>>>()?;

        let camera = CameraIntrinsics::approximate(geometry);
        let solution = solve_pnp(&self.model, &image_points, &camera)?;

        let raw = pitch_from_rotation(solution.rotation.matrix());
        if !raw.is_finite() {
            return Err(PoseError::SolveFailed("non-finite pitch".to_string()));
        }
        Ok(fold_pitch(raw))
    }

    /// Head-to-camera distance from the pupil separation, in centimeters
    pub fn estimate_distance(
        &self,
        landmarks: &LandmarkSet,
        geometry: FrameGeometry,
    ) -> PoseResult<f64> {
        let (lx, ly) = landmarks.get(FaceLandmark::LeftPupil)?.to_pixels(geometry);
        let (rx, ry) = landmarks.get(FaceLandmark::RightPupil)?.to_pixels(geometry);

        let separation = ((rx - lx).powi(2) + (ry - ly).powi(2)).sqrt();
        if !separation.is_finite() || separation <= f64::EPSILON {
            return Err(PoseError::DegeneratePupils);
        }

        Ok(distance_from_separation(
            geometry.width as f64,
            separation,
            self.pupillary_distance_cm,
        ))
    }
}

/// Similar-triangles distance estimate; strictly decreasing in `separation_px`
pub fn distance_from_separation(focal_length: f64, separation_px: f64, real_cm: f64) -> f64 {
    (focal_length / separation_px) * real_cm
}
