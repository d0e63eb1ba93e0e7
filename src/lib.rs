// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Yoga Pose Inference Library
//!
//! Classifies the yoga pose a person is holding in a still image and returns
//! the label, its confidence and the image with the detected skeleton drawn
//! on it.
//!
//! ## Pipeline
//!
//! 1. **Landmarks** - a body landmark model finds 33 keypoints
//!    ([`landmarks`], [`landmarker`]).
//! 2. **Features** - keypoints are centered on the hips and scaled by torso
//!    length into a 132-value vector ([`features`]).
//! 3. **Classification** - a network maps the vector to a probability
//!    distribution over the label vocabulary ([`classifier`], [`network`]).
//! 4. **Decision** - no body means `Rejected`, otherwise the most probable
//!    label is `Detected` ([`decision`]).
//! 5. **Rendering** - the same skeleton is drawn onto a copy of the input
//!    ([`annotate`]).
//!
//! [`PosePipeline`] drives all five stages over a shared, read-only
//! [`PoseContext`].
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use std::path::Path;
//! use yoga_pose_inference::{PipelineConfig, PoseContext, PosePipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = PoseContext::load(
//!         Path::new("pose_landmark_full.onnx"),
//!         Path::new("yoga_classifier.onnx"),
//!         Some(Path::new("labels.txt")),
//!         PipelineConfig::default(),
//!     )?;
//!     let pipeline = PosePipeline::from(context);
//!
//!     let inference = pipeline.infer_path("warrior.jpg")?;
//!     match inference.result() {
//!         Some(result) => println!("{} {:.2}", result.display_name, result.confidence),
//!         None => println!("No pose detected"),
//!     }
//!     if let Some(annotated) = &inference.annotated {
//!         annotated.save("warrior_annotated.jpg")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Classify one image
//! yoga-pose predict --source warrior.jpg
//!
//! # A directory, with an explicit classifier and vocabulary, saving annotated images
//! yoga-pose predict -s poses/ -c classifier.onnx -l labels.txt --save
//!
//! # JSON lines with guidance text in Kannada
//! yoga-pose predict -s "poses/*.jpg" --json --guidance kn
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust
//! use yoga_pose_inference::PipelineConfig;
//!
//! let config = PipelineConfig::new()
//!     .with_confidence(0.6)        // Flag results below this as uncertain
//!     .with_visibility_floor(0.4)  // Fade keypoints below this visibility
//!     .with_threads(4);            // ONNX Runtime intra-op threads
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Label captions on annotated images (default) |
//! | `visualize` | Window display of annotated results |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `tensorrt` | NVIDIA `TensorRT` optimization |
//! | `coreml` | Apple `CoreML` (macOS/iOS) |
//! | `openvino` | Intel `OpenVINO` |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod annotate;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod features;
pub mod guidance;
pub mod landmarker;
pub mod landmarks;
pub mod network;
pub mod pipeline;
pub mod preprocessing;
pub mod results;
pub mod skeleton;
pub mod source;
pub mod visualizer;
pub mod vocabulary;

// Re-export main types for convenience
pub use classifier::PoseClassifier;
pub use config::PipelineConfig;
pub use decision::{Decision, DecisionPolicy, DecisionState, RejectReason};
pub use error::{PoseError, Result};
pub use features::{FeatureVector, normalize};
pub use guidance::{FallbackGuidance, Guidance, GuidanceProvider, Language, WithFallback};
pub use landmarker::OnnxLandmarkDetector;
pub use landmarks::{Extraction, LandmarkDetector, LandmarkExtractor};
pub use network::{DenseNetwork, OnnxNetwork, PoseNetwork};
pub use pipeline::{Inference, PoseContext, PosePipeline};
pub use results::{ClassificationResult, Probs, Speed};
pub use skeleton::{BodyLandmark, Keypoint, Skeleton};
pub use source::Source;
pub use vocabulary::LabelVocabulary;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
