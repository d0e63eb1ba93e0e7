// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end pose inference.
//!
//! [`PoseContext`] holds everything loaded at startup: the landmark
//! detector, the classifier with its vocabulary, and the configuration. It is
//! immutable and shared behind an [`Arc`], so any number of threads can run
//! [`PosePipeline::infer`] at once.
//!
//! Each call extracts the skeleton exactly once. The same skeleton feeds both
//! the decision (normalize, classify, decide) and the rendering, so the
//! annotated image always shows the skeleton that was classified.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::annotate::render;
use crate::classifier::PoseClassifier;
use crate::config::PipelineConfig;
use crate::decision::{Decision, DecisionPolicy, RejectReason};
use crate::error::Result;
use crate::features::normalize;
use crate::landmarker::OnnxLandmarkDetector;
use crate::landmarks::{Extraction, LandmarkDetector, LandmarkExtractor};
use crate::results::{ClassificationResult, Speed};
use crate::skeleton::Skeleton;
use crate::verbose;

#[cfg(feature = "annotate")]
use crate::annotate::{CaptionFont, draw_caption};

/// Process-scoped, read-only inference context.
pub struct PoseContext {
    extractor: LandmarkExtractor,
    classifier: PoseClassifier,
    config: PipelineConfig,
    #[cfg(feature = "annotate")]
    caption_font: Option<CaptionFont>,
}

impl PoseContext {
    /// Assemble a context from already loaded parts.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ConfigError`](crate::PoseError::ConfigError) if the
    /// configuration is invalid.
    pub fn new(
        detector: Arc<dyn LandmarkDetector>,
        classifier: PoseClassifier,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: LandmarkExtractor::new(detector),
            classifier,
            config,
            #[cfg(feature = "annotate")]
            caption_font: None,
        })
    }

    /// Load every artifact from disk.
    ///
    /// All loading happens here; any missing or mismatched artifact is a
    /// fatal error and no context is produced.
    ///
    /// # Arguments
    ///
    /// * `landmarker` - ONNX landmark model.
    /// * `classifier` - Classifier network (`.onnx` or dense `.json`).
    /// * `labels` - Label vocabulary; optional for ONNX models carrying `names`.
    /// * `config` - Pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`](crate::PoseError::ModelLoadError)
    /// or [`PoseError::ConfigError`](crate::PoseError::ConfigError).
    pub fn load(
        landmarker: &Path,
        classifier: &Path,
        labels: Option<&Path>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let detector = OnnxLandmarkDetector::load(landmarker, &config)?;
        verbose!("Loaded landmark model {} ({detector:?})", landmarker.display());
        let classifier = PoseClassifier::load(classifier, labels, config.num_threads)?;
        verbose!("Loaded classifier with {} classes", classifier.num_classes());
        Self::new(Arc::new(detector), classifier, config)
    }

    /// Attach a font used to caption annotated images.
    #[cfg(feature = "annotate")]
    #[must_use]
    pub fn with_caption_font(mut self, font: CaptionFont) -> Self {
        self.caption_font = Some(font);
        self
    }

    /// The classifier.
    #[must_use]
    pub const fn classifier(&self) -> &PoseClassifier {
        &self.classifier
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl std::fmt::Debug for PoseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseContext")
            .field("classifier", &self.classifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Output of one pipeline call.
#[derive(Debug, Clone, Serialize)]
pub struct Inference {
    /// Final verdict.
    pub decision: Decision,
    /// Input image with the skeleton drawn on it; present when detected.
    #[serde(skip)]
    pub annotated: Option<DynamicImage>,
    /// The skeleton that was classified and drawn.
    pub skeleton: Option<Skeleton>,
    /// Per-stage timing.
    pub speed: Speed,
}

impl Inference {
    fn rejected(reason: RejectReason, speed: Speed) -> Self {
        Self {
            decision: Decision::rejected(reason),
            annotated: None,
            skeleton: None,
            speed,
        }
    }

    /// The classification, if the pose was detected.
    #[must_use]
    pub const fn result(&self) -> Option<&ClassificationResult> {
        self.decision.result()
    }

    /// Canonical label, if detected.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.result().map(|r| r.label.as_str())
    }

    /// Confidence of the label, if detected.
    #[must_use]
    pub fn confidence(&self) -> Option<f32> {
        self.result().map(|r| r.confidence)
    }

    /// Rejection reason, if rejected.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        self.decision.reject_reason()
    }
}

/// Cheaply cloneable handle running the pipeline over a shared context.
#[derive(Debug, Clone)]
pub struct PosePipeline {
    context: Arc<PoseContext>,
}

impl From<PoseContext> for PosePipeline {
    fn from(context: PoseContext) -> Self {
        Self::new(Arc::new(context))
    }
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl PosePipeline {
    /// Create a pipeline over a shared context.
    #[must_use]
    pub const fn new(context: Arc<PoseContext>) -> Self {
        Self { context }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &PoseContext {
        &self.context
    }

    /// Classify the pose in a decoded image and render its skeleton.
    ///
    /// A missing body is a `Rejected(NoPose)` verdict, not an error. The input
    /// image is never modified.
    ///
    /// # Errors
    ///
    /// Returns an error only if the classifier fails on a detected skeleton.
    pub fn infer(&self, image: &DynamicImage) -> Result<Inference> {
        let ctx = &*self.context;

        let start = Instant::now();
        let extraction = ctx.extractor.extract(image);
        let extract_ms = elapsed_ms(start);

        let start = Instant::now();
        let mut policy = DecisionPolicy::new();
        let decision = policy.decide(&extraction, |skeleton| {
            verbose!("Skeleton found, mean visibility {:.2}", skeleton.mean_visibility());
            let features = normalize(skeleton);
            if features.is_degenerate() {
                verbose!("Torso length collapsed, normalized with epsilon scale");
            }
            ctx.classifier.predict(&features)
        })?;
        let classify_ms = elapsed_ms(start);

        let start = Instant::now();
        let annotated = match (&decision, extraction.skeleton()) {
            (Decision::Detected(result), Some(skeleton)) => {
                Some(self.annotate(image, skeleton, result))
            }
            _ => None,
        };
        let render_ms = elapsed_ms(start);

        let speed = Speed::new(extract_ms, classify_ms, render_ms);
        let skeleton = match extraction {
            Extraction::Detected(skeleton) => Some(skeleton),
            Extraction::NotDetected => None,
        };

        Ok(Inference {
            decision,
            annotated,
            skeleton,
            speed,
        })
    }

    #[cfg_attr(not(feature = "annotate"), allow(unused_variables))]
    fn annotate(
        &self,
        image: &DynamicImage,
        skeleton: &Skeleton,
        result: &ClassificationResult,
    ) -> DynamicImage {
        let rendered = render(image, skeleton, &self.context.config);
        #[cfg(feature = "annotate")]
        if let Some(font) = &self.context.caption_font {
            return draw_caption(rendered, &result.caption(), font);
        }
        rendered
    }

    /// Decode an encoded image and run [`Self::infer`].
    ///
    /// Bytes that do not decode as an image are `Rejected(InvalidInput)`.
    ///
    /// # Errors
    ///
    /// See [`Self::infer`].
    pub fn infer_bytes(&self, bytes: &[u8]) -> Result<Inference> {
        let start = Instant::now();
        match image::load_from_memory(bytes) {
            Ok(image) => self.infer(&image),
            Err(e) => {
                verbose!("Could not decode image bytes: {e}");
                let speed = Speed {
                    extract: Some(elapsed_ms(start)),
                    ..Speed::default()
                };
                Ok(Inference::rejected(RejectReason::InvalidInput, speed))
            }
        }
    }

    /// Open an image file and run [`Self::infer`].
    ///
    /// Missing or undecodable files are `Rejected(InvalidInput)`.
    ///
    /// # Errors
    ///
    /// See [`Self::infer`].
    pub fn infer_path<P: AsRef<Path>>(&self, path: P) -> Result<Inference> {
        let path = path.as_ref();
        match image::open(path) {
            Ok(image) => self.infer(&image),
            Err(e) => {
                verbose!("Could not read image {}: {e}", path.display());
                Ok(Inference::rejected(RejectReason::InvalidInput, Speed::default()))
            }
        }
    }

    /// Run [`Self::infer_path`] over many images in parallel.
    ///
    /// Results keep the input order. A failure on one image does not affect
    /// the others.
    #[must_use]
    pub fn infer_batch(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<Inference>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.infer_path(path)))
            .collect()
    }
}
