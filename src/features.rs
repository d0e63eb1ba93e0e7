// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Body-centric feature normalization.
//!
//! Converts a [`Skeleton`] into the fixed-width vector the pose classifier was
//! trained on. Every keypoint is translated so the hip midpoint is the origin
//! and divided by the torso length (shoulder midpoint to hip midpoint), which
//! makes the vector independent of where the subject stands in the frame and
//! how far they are from the camera.
//!
//! The layout is `[x', y', z', visibility]` per landmark, in landmark index
//! order, for a total of [`FEATURE_DIM`] values. Changing anything here
//! silently invalidates trained classifiers.

use ndarray::Array1;
use serde::Serialize;

use crate::skeleton::{BodyLandmark, NUM_KEYPOINTS, Skeleton};

/// Values emitted per keypoint: normalized x, y, z and raw visibility.
pub const FEATURES_PER_KEYPOINT: usize = 4;

/// Width of every feature vector.
pub const FEATURE_DIM: usize = NUM_KEYPOINTS * FEATURES_PER_KEYPOINT;

/// Smallest torso length used as a divisor.
pub const MIN_TORSO_SCALE: f32 = 1e-6;

/// Normalized numeric encoding of one skeleton.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    data: Vec<f32>,
    scale: f32,
    degenerate: bool,
}

impl FeatureVector {
    /// Feature values in classifier input order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of features (always [`FEATURE_DIM`]).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Torso length that was used as the divisor.
    #[must_use]
    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// Whether the torso length collapsed and the epsilon floor was used.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Copy into an owned `ndarray` vector.
    #[must_use]
    pub fn to_array(&self) -> Array1<f32> {
        Array1::from_vec(self.data.clone())
    }
}

/// Reference frame derived from a skeleton: origin and divisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    /// Hip midpoint `(x, y, z)`.
    pub origin: (f32, f32, f32),
    /// Distance between shoulder and hip midpoints in the image plane.
    pub torso_length: f32,
}

impl ReferenceFrame {
    /// Compute the reference frame of a skeleton.
    #[must_use]
    pub fn of(skeleton: &Skeleton) -> Self {
        let origin = skeleton.midpoint(BodyLandmark::LeftHip, BodyLandmark::RightHip);
        let shoulders =
            skeleton.midpoint(BodyLandmark::LeftShoulder, BodyLandmark::RightShoulder);
        let dx = shoulders.0 - origin.0;
        let dy = shoulders.1 - origin.1;
        Self {
            origin,
            torso_length: dx.hypot(dy),
        }
    }

    /// Divisor actually used for normalization.
    #[must_use]
    pub fn scale(&self) -> f32 {
        if self.torso_length.is_finite() && self.torso_length >= MIN_TORSO_SCALE {
            self.torso_length
        } else {
            MIN_TORSO_SCALE
        }
    }
}

/// Normalize a skeleton into a classifier-ready feature vector.
///
/// Pure and deterministic: the same skeleton always yields a bit-identical
/// vector. A collapsed torso (all shoulder and hip points coincide) is not an
/// error; the divisor falls back to [`MIN_TORSO_SCALE`] and the result is
/// flagged with [`FeatureVector::is_degenerate`].
#[must_use]
pub fn normalize(skeleton: &Skeleton) -> FeatureVector {
    let frame = ReferenceFrame::of(skeleton);
    let scale = frame.scale();
    let (ox, oy, oz) = frame.origin;

    let mut data = Vec::with_capacity(FEATURE_DIM);
    for kp in skeleton.keypoints() {
        data.push((kp.x - ox) / scale);
        data.push((kp.y - oy) / scale);
        data.push((kp.z - oz) / scale);
        data.push(kp.visibility);
    }

    #[allow(clippy::float_cmp)]
    let degenerate = scale == MIN_TORSO_SCALE;

    FeatureVector {
        data,
        scale,
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Keypoint;

    /// Standing figure with arms raised, roughly centered in the frame.
    fn standing() -> Skeleton {
        let mut kps = vec![Keypoint::new(0.5, 0.2, 0.0, 0.9); NUM_KEYPOINTS];
        let mut set = |lm: BodyLandmark, x: f32, y: f32, z: f32| {
            kps[lm.index()] = Keypoint::new(x, y, z, 0.95);
        };
        set(BodyLandmark::LeftShoulder, 0.55, 0.3, -0.1);
        set(BodyLandmark::RightShoulder, 0.45, 0.3, -0.1);
        set(BodyLandmark::LeftHip, 0.54, 0.55, 0.0);
        set(BodyLandmark::RightHip, 0.46, 0.55, 0.0);
        set(BodyLandmark::LeftWrist, 0.56, 0.05, -0.2);
        set(BodyLandmark::RightWrist, 0.44, 0.05, -0.2);
        set(BodyLandmark::LeftAnkle, 0.53, 0.95, 0.05);
        set(BodyLandmark::RightAnkle, 0.47, 0.95, 0.05);
        Skeleton::from_keypoints(kps).unwrap()
    }

    fn assert_close(a: &FeatureVector, b: &FeatureVector) {
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-4, "{x} != {y}");
        }
    }

    #[test]
    fn test_dimension() {
        let features = normalize(&standing());
        assert_eq!(features.len(), FEATURE_DIM);
        assert_eq!(FEATURE_DIM, 132);
        assert!(!features.is_degenerate());
    }

    #[test]
    fn test_deterministic_bitwise() {
        let skeleton = standing();
        let a = normalize(&skeleton);
        let b = normalize(&skeleton);
        let bits = |v: &FeatureVector| v.as_slice().iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_hip_midpoint_is_origin_and_torso_is_unit() {
        let features = normalize(&standing());
        let s = features.as_slice();
        let lh = BodyLandmark::LeftHip.index() * FEATURES_PER_KEYPOINT;
        let rh = BodyLandmark::RightHip.index() * FEATURES_PER_KEYPOINT;
        assert!((s[lh] + s[rh]).abs() < 1e-5);
        assert!((s[lh + 1] + s[rh + 1]).abs() < 1e-5);

        let ls = BodyLandmark::LeftShoulder.index() * FEATURES_PER_KEYPOINT;
        assert!((s[ls + 1] + 1.0).abs() < 1e-5);
        assert!((features.scale() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_translation_invariance() {
        let base = standing();
        let moved = base.map(|k| Keypoint::new(k.x - 0.2, k.y + 0.13, k.z + 0.4, k.visibility));
        assert_close(&normalize(&base), &normalize(&moved));
    }

    #[test]
    fn test_scale_invariance() {
        let base = standing();
        let frame = ReferenceFrame::of(&base);
        let (ox, oy, oz) = frame.origin;
        let factor = 0.37;
        let scaled = base.map(|k| {
            Keypoint::new(
                ox + (k.x - ox) * factor,
                oy + (k.y - oy) * factor,
                oz + (k.z - oz) * factor,
                k.visibility,
            )
        });
        assert_close(&normalize(&base), &normalize(&scaled));
    }

    #[test]
    fn test_visibility_passes_through() {
        let features = normalize(&standing());
        let nose = BodyLandmark::Nose.index() * FEATURES_PER_KEYPOINT;
        assert!((features.as_slice()[nose + 3] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_uses_epsilon() {
        let collapsed = Skeleton::from_keypoints(vec![
            Keypoint::new(0.5, 0.5, 0.0, 0.1);
            NUM_KEYPOINTS
        ])
        .unwrap();
        let features = normalize(&collapsed);
        assert!(features.is_degenerate());
        assert!((features.scale() - MIN_TORSO_SCALE).abs() < f32::EPSILON);
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }
}
