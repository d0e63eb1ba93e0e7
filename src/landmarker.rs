// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX body landmark detector (BlazePose GHUM landmark topology).
//!
//! The model sees the whole letterboxed image and returns, for 33 or more
//! landmarks, `(x, y, z, visibility_logit, presence_logit)` in input pixel
//! units, plus a single pose presence score. The landmark tensor is the first
//! output holding between 33 and 39 whole landmark rows, so segmentation and
//! heatmap outputs are never mistaken for it. The first single-value output is
//! read as the presence score.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::TensorRef;

use crate::config::PipelineConfig;
use crate::error::{PoseError, Result};
use crate::landmarks::LandmarkDetector;
use crate::network::build_session;
use crate::preprocessing::{Letterbox, TensorLayout, preprocess_image};
use crate::skeleton::{Keypoint, NUM_KEYPOINTS, Skeleton};

/// Values per landmark in the model output.
const LANDMARK_STRIDE: usize = 5;

/// Body landmarks plus the auxiliary alignment landmarks of GHUM exports.
const MAX_LANDMARKS: usize = 39;

fn is_landmark_tensor(output: &[f32]) -> bool {
    let len = output.len();
    len % LANDMARK_STRIDE == 0
        && (NUM_KEYPOINTS * LANDMARK_STRIDE..=MAX_LANDMARKS * LANDMARK_STRIDE).contains(&len)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Landmark detector backed by an ONNX model.
pub struct OnnxLandmarkDetector {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
    imgsz: (usize, usize),
    layout: TensorLayout,
    presence_threshold: f32,
}

impl OnnxLandmarkDetector {
    /// Load a landmark model.
    ///
    /// The input size and layout come from the model's declared input shape
    /// when it is static, otherwise from `config.landmark_imgsz`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the file is missing or invalid.
    pub fn load<P: AsRef<Path>>(path: P, config: &PipelineConfig) -> Result<Self> {
        let session = build_session(path.as_ref(), config.num_threads)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PoseError::ModelLoadError("Model declares no inputs".to_string()))?;
        let input_name = input.name.clone();
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        let layout = TensorLayout::from_shape(&dims);
        let (h_axis, w_axis) = match layout {
            TensorLayout::Nhwc => (1, 2),
            TensorLayout::Nchw => (2, 3),
        };
        let declared = |axis: usize| {
            dims.get(axis)
                .and_then(|&d| usize::try_from(d).ok())
                .filter(|&d| d > 0)
        };
        let imgsz = match (declared(h_axis), declared(w_axis)) {
            (Some(h), Some(w)) => (h, w),
            _ => config.landmark_imgsz,
        };

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
            imgsz,
            layout,
            presence_threshold: config.presence_threshold,
        })
    }

    /// Model input size (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }

    /// Run the model and collect every f32 output.
    fn run(&self, image: &DynamicImage) -> Result<(Vec<Vec<f32>>, Letterbox)> {
        let prep = preprocess_image(image, self.imgsz, self.layout)?;
        let input = prep.tensor.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| PoseError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PoseError::InferenceError("Session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PoseError::InferenceError(format!("Inference failed: {e}")))?;

        let mut tensors = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let Some(output) = outputs.get(name.as_str()) else {
                continue;
            };
            if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
                tensors.push(data.to_vec());
            }
        }

        Ok((tensors, prep.letterbox))
    }
}

/// Decode raw landmark outputs into a skeleton, or `None` if no body is present.
///
/// The presence score is used as-is when it already lies in `[0, 1]` and is
/// passed through a sigmoid otherwise. Depth is divided by the letterboxed
/// content width, the same extent x is normalized against.
///
/// # Errors
///
/// Returns [`PoseError::InferenceError`] if no output holds landmarks.
pub fn decode_landmarks(
    outputs: &[Vec<f32>],
    letterbox: &Letterbox,
    presence_threshold: f32,
) -> Result<Option<Skeleton>> {
    let landmarks = outputs
        .iter()
        .find(|o| is_landmark_tensor(o))
        .ok_or_else(|| PoseError::InferenceError("Model produced no landmark tensor".to_string()))?;

    if let Some(presence) = outputs.iter().find(|o| o.len() == 1) {
        let score = presence[0];
        let score = if (0.0..=1.0).contains(&score) {
            score
        } else {
            sigmoid(score)
        };
        if score < presence_threshold {
            return Ok(None);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let depth_scale = letterbox.new_shape.1.max(1) as f32;
    let keypoints = landmarks
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_KEYPOINTS)
        .map(|v| {
            let (x, y) = letterbox.to_normalized(v[0], v[1]);
            Keypoint::new(x, y, v[2] / depth_scale, sigmoid(v[3]))
        })
        .collect();

    Skeleton::from_keypoints(keypoints).map(Some)
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Option<Skeleton>> {
        let (outputs, letterbox) = self.run(image)?;
        decode_landmarks(&outputs, &letterbox, self.presence_threshold)
    }
}

impl std::fmt::Debug for OnnxLandmarkDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxLandmarkDetector")
            .field("input", &self.input_name)
            .field("imgsz", &self.imgsz)
            .field("layout", &self.layout)
            .field("presence_threshold", &self.presence_threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = OnnxLandmarkDetector::load("nonexistent.onnx", &PipelineConfig::default());
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }

    fn raw_landmarks(x: f32, y: f32) -> Vec<f32> {
        (0..MAX_LANDMARKS).flat_map(|_| [x, y, 25.6, 4.0, 4.0]).collect()
    }

    #[test]
    fn test_decode_depth_matches_x_scale_in_portrait() {
        // 720x1280 into 256x256: content is 144x256 with 56 columns of padding on the left.
        let letterbox = Letterbox::new(720, 1280, (256, 256));
        let mut raw = raw_landmarks(128.0, 128.0);
        raw[2] = 0.0;
        raw[LANDMARK_STRIDE] += 25.6;
        raw[LANDMARK_STRIDE + 2] = 25.6;
        let skeleton = decode_landmarks(&[raw, vec![0.9]], &letterbox, 0.5)
            .unwrap()
            .unwrap();

        let (a, b) = (skeleton.keypoints()[0], skeleton.keypoints()[1]);
        let dx = b.x - a.x;
        let dz = b.z - a.z;
        assert!((dx - 25.6 / 144.0).abs() < 1e-4);
        assert!((dz / dx - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_skips_segmentation_and_heatmap_outputs() {
        let letterbox = Letterbox::new(256, 256, (256, 256));
        let segmentation = vec![0.0; 256 * 256];
        let heatmap = vec![0.0; 64 * 64 * 39];
        let outputs = vec![segmentation, heatmap, raw_landmarks(64.0, 192.0), vec![0.9]];
        let skeleton = decode_landmarks(&outputs, &letterbox, 0.5)
            .unwrap()
            .unwrap();

        let kp = skeleton.keypoints()[0];
        assert!((kp.x - 0.25).abs() < 1e-4);
        assert!((kp.y - 0.75).abs() < 1e-4);
        assert!(is_landmark_tensor(&[0.0; NUM_KEYPOINTS * LANDMARK_STRIDE]));
        assert!(!is_landmark_tensor(&[0.0; NUM_KEYPOINTS * LANDMARK_STRIDE + 1]));
    }

    #[test]
    fn test_decode_maps_back_through_letterbox() {
        // 1280x720 into 256x256: content is 256x144 with 56 rows of padding on top.
        let letterbox = Letterbox::new(1280, 720, (256, 256));
        let outputs = vec![raw_landmarks(128.0, 128.0), vec![0.9]];
        let skeleton = decode_landmarks(&outputs, &letterbox, 0.5)
            .unwrap()
            .unwrap();

        let kp = skeleton.keypoints()[0];
        assert!((kp.x - 0.5).abs() < 1e-4);
        assert!((kp.y - 0.5).abs() < 1e-4);
        assert!((kp.z - 0.1).abs() < 1e-6);
        assert!(kp.visibility > 0.98);
        assert_eq!(skeleton.keypoints().len(), NUM_KEYPOINTS);
    }

    #[test]
    fn test_decode_low_presence_is_no_body() {
        let letterbox = Letterbox::new(256, 256, (256, 256));
        let outputs = vec![vec![0.1], raw_landmarks(10.0, 10.0)];
        assert!(decode_landmarks(&outputs, &letterbox, 0.5).unwrap().is_none());

        // Raw logits are squashed first.
        let outputs = vec![raw_landmarks(10.0, 10.0), vec![-6.0]];
        assert!(decode_landmarks(&outputs, &letterbox, 0.5).unwrap().is_none());
    }

    #[test]
    fn test_decode_without_landmarks_fails() {
        let letterbox = Letterbox::new(256, 256, (256, 256));
        let result = decode_landmarks(&[vec![0.9], vec![0.0; 10]], &letterbox, 0.5);
        assert!(matches!(result, Err(PoseError::InferenceError(_))));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
