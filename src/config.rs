// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pipeline configuration.
//!
//! This module defines the [`PipelineConfig`] struct, which controls the tunable
//! parameters of the pose pipeline: landmark detector input size and presence
//! threshold, rendering emphasis, runtime threading and the presentation-only
//! confidence threshold.

use crate::error::{PoseError, Result};

/// Upper bound for skeleton line thickness and marker radius, in pixels.
pub const MAX_DRAWING_SIZE: u32 = 32;

/// Configuration for the pose pipeline.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use yoga_pose_inference::PipelineConfig;
///
/// let config = PipelineConfig::new()
///     .with_confidence(0.6)
///     .with_visibility_floor(0.4)
///     .with_landmark_imgsz(256, 256);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Confidence below which a prediction is presented as uncertain (0.0 to 1.0).
    /// Predictions are never rejected because of it.
    pub confidence_threshold: f32,
    /// Keypoints with visibility below this value are drawn with reduced emphasis.
    pub visibility_floor: f32,
    /// Minimum pose presence score for the landmark detector to report a body.
    pub presence_threshold: f32,
    /// Landmark model input size (height, width).
    pub landmark_imgsz: (usize, usize),
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose the optimal number.
    pub num_threads: usize,
    /// Skeleton line thickness in pixels.
    pub line_thickness: u32,
    /// Keypoint marker radius in pixels.
    pub marker_radius: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            visibility_floor: 0.5,
            presence_threshold: 0.5,
            landmark_imgsz: (256, 256),
            num_threads: 0,
            line_thickness: 2,
            marker_radius: 4,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the presentation confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the visibility floor used for rendering emphasis.
    #[must_use]
    pub const fn with_visibility_floor(mut self, floor: f32) -> Self {
        self.visibility_floor = floor;
        self
    }

    /// Set the pose presence threshold for the landmark detector.
    #[must_use]
    pub const fn with_presence_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }

    /// Set the landmark model input size.
    ///
    /// # Arguments
    ///
    /// * `height` - The target image height.
    /// * `width` - The target image width.
    #[must_use]
    pub const fn with_landmark_imgsz(mut self, height: usize, width: usize) -> Self {
        self.landmark_imgsz = (height, width);
        self
    }

    /// Set the number of threads for ONNX Runtime sessions.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set skeleton line thickness and marker radius.
    #[must_use]
    pub const fn with_drawing(mut self, line_thickness: u32, marker_radius: i32) -> Self {
        self.line_thickness = line_thickness;
        self.marker_radius = marker_radius;
        self
    }

    /// Check that every threshold is within `[0, 1]`, sizes are non-zero and
    /// drawing sizes stay within [`MAX_DRAWING_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("confidence_threshold", self.confidence_threshold),
            ("visibility_floor", self.visibility_floor),
            ("presence_threshold", self.presence_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(PoseError::ConfigError(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.landmark_imgsz.0 == 0 || self.landmark_imgsz.1 == 0 {
            return Err(PoseError::ConfigError(
                "landmark_imgsz must be non-zero".to_string(),
            ));
        }
        if self.marker_radius < 1 {
            return Err(PoseError::ConfigError(
                "marker_radius must be at least 1".to_string(),
            ));
        }
        if self.line_thickness == 0 || self.line_thickness > MAX_DRAWING_SIZE {
            return Err(PoseError::ConfigError(format!(
                "line_thickness must be within [1, {MAX_DRAWING_SIZE}], got {}",
                self.line_thickness
            )));
        }
        if self.marker_radius.unsigned_abs() > MAX_DRAWING_SIZE {
            return Err(PoseError::ConfigError(format!(
                "marker_radius must be at most {MAX_DRAWING_SIZE}, got {}",
                self.marker_radius
            )));
        }
        Ok(())
    }
}
