// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Body keypoints and the fixed-length skeleton they form.
//!
//! A [`Skeleton`] always holds exactly [`NUM_KEYPOINTS`] keypoints in
//! [`BodyLandmark`] index order. Occluded or low-confidence landmarks are kept
//! with a low visibility value, never dropped, so index `i` denotes the same
//! anatomical point on every call.

use serde::Serialize;

use crate::error::{PoseError, Result};
use crate::visualizer::skeleton::POSE_CONNECTIONS;

/// Number of landmarks produced by the body landmark model.
pub const NUM_KEYPOINTS: usize = 33;

/// A detected anatomical landmark.
///
/// `x` and `y` are normalized to the image (0..1 across width and height),
/// `z` is relative depth on roughly the same scale as `x`, and `visibility`
/// is the detector's confidence that the point is visible, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Keypoint {
    /// Normalized horizontal position.
    pub x: f32,
    /// Normalized vertical position (grows downward).
    pub y: f32,
    /// Relative depth.
    pub z: f32,
    /// Visibility confidence.
    pub visibility: f32,
}

impl Keypoint {
    /// Create a keypoint, clamping visibility into `[0, 1]`.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        let visibility = if visibility.is_nan() {
            0.0
        } else {
            visibility.clamp(0.0, 1.0)
        };
        Self { x, y, z, visibility }
    }

    /// Check whether the keypoint is at least as visible as `floor`.
    #[must_use]
    pub fn is_visible(&self, floor: f32) -> bool {
        self.visibility >= floor
    }

    /// Pixel position of this keypoint in an image of the given size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// MediaPipe Pose landmark indices (33 total).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    /// Index of this landmark within a [`Skeleton`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Snake-case landmark name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

/// Fixed-length ordered set of keypoints for one detected body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    keypoints: Vec<Keypoint>,
}

impl Skeleton {
    /// Build a skeleton from exactly [`NUM_KEYPOINTS`] keypoints.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::DimensionMismatch`] if the count is wrong.
    pub fn from_keypoints(keypoints: Vec<Keypoint>) -> Result<Self> {
        if keypoints.len() != NUM_KEYPOINTS {
            return Err(PoseError::DimensionMismatch {
                expected: NUM_KEYPOINTS,
                actual: keypoints.len(),
            });
        }
        Ok(Self { keypoints })
    }

    /// Build a skeleton from a flat `[x, y, z, visibility, ...]` buffer.
    ///
    /// `stride` is the number of values per landmark (at least 4); values past
    /// the fourth are ignored. Only the first [`NUM_KEYPOINTS`] landmarks are
    /// read, so models emitting auxiliary landmarks are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::DimensionMismatch`] if the buffer is too short.
    pub fn from_flat(data: &[f32], stride: usize) -> Result<Self> {
        let stride = stride.max(4);
        let needed = NUM_KEYPOINTS * stride;
        if data.len() < needed {
            return Err(PoseError::DimensionMismatch {
                expected: needed,
                actual: data.len(),
            });
        }
        let keypoints = data
            .chunks_exact(stride)
            .take(NUM_KEYPOINTS)
            .map(|c| Keypoint::new(c[0], c[1], c[2], c[3]))
            .collect();
        Ok(Self { keypoints })
    }

    /// All keypoints in landmark index order.
    #[must_use]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Keypoint for a named landmark.
    #[must_use]
    pub fn get(&self, landmark: BodyLandmark) -> &Keypoint {
        &self.keypoints[landmark.index()]
    }

    /// Anatomically valid connection pairs used for rendering.
    #[must_use]
    pub const fn connections() -> &'static [[usize; 2]] {
        &POSE_CONNECTIONS
    }

    /// Midpoint `(x, y, z)` between two landmarks.
    #[must_use]
    pub fn midpoint(&self, a: BodyLandmark, b: BodyLandmark) -> (f32, f32, f32) {
        let (a, b) = (self.get(a), self.get(b));
        ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
    }

    /// Mean visibility over all keypoints.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_visibility(&self) -> f32 {
        self.keypoints.iter().map(|k| k.visibility).sum::<f32>() / NUM_KEYPOINTS as f32
    }

    /// Produce a new skeleton by applying `f` to every keypoint.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: FnMut(&Keypoint) -> Keypoint,
    {
        Self {
            keypoints: self.keypoints.iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_skeleton() -> Vec<f32> {
        (0..NUM_KEYPOINTS)
            .flat_map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let v = i as f32 / 100.0;
                [v, v + 0.5, 0.0, 0.9, 0.99]
            })
            .collect()
    }

    #[test]
    fn test_from_flat_with_extra_channels() {
        let skeleton = Skeleton::from_flat(&flat_skeleton(), 5).unwrap();
        assert_eq!(skeleton.keypoints().len(), NUM_KEYPOINTS);
        let wrist = skeleton.get(BodyLandmark::LeftWrist);
        assert!((wrist.x - 0.15).abs() < 1e-6);
        assert!((wrist.y - 0.65).abs() < 1e-6);
        assert!((wrist.visibility - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_from_flat_too_short() {
        let err = Skeleton::from_flat(&[0.0; 40], 4).unwrap_err();
        assert!(matches!(
            err,
            PoseError::DimensionMismatch {
                expected: 132,
                actual: 40
            }
        ));
    }

    #[test]
    fn test_from_keypoints_rejects_wrong_length() {
        let result = Skeleton::from_keypoints(vec![Keypoint::default(); 17]);
        assert!(result.is_err());
    }

    #[test]
    fn test_keypoint_visibility_clamped() {
        assert!((Keypoint::new(0.0, 0.0, 0.0, 1.7).visibility - 1.0).abs() < f32::EPSILON);
        assert!(Keypoint::new(0.0, 0.0, 0.0, f32::NAN).visibility.abs() < f32::EPSILON);
    }

    #[test]
    fn test_landmark_indices_are_stable() {
        assert_eq!(BodyLandmark::Nose.index(), 0);
        assert_eq!(BodyLandmark::LeftHip.index(), 23);
        assert_eq!(BodyLandmark::RightFootIndex.index(), NUM_KEYPOINTS - 1);
        assert_eq!(BodyLandmark::RightShoulder.name(), "right_shoulder");
    }

    #[test]
    fn test_midpoint_and_pixels() {
        let skeleton = Skeleton::from_flat(&flat_skeleton(), 5).unwrap();
        let (x, y, _) = skeleton.midpoint(BodyLandmark::LeftHip, BodyLandmark::RightHip);
        assert!((x - 0.235).abs() < 1e-6);
        assert!((y - 0.735).abs() < 1e-6);

        let (px, py) = Keypoint::new(0.5, 0.25, 0.0, 1.0).to_pixel(640, 480);
        assert!((px - 320.0).abs() < 1e-4);
        assert!((py - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_connections_reference_valid_indices() {
        for [a, b] in Skeleton::connections() {
            assert!(*a < NUM_KEYPOINTS && *b < NUM_KEYPOINTS);
        }
    }
}
