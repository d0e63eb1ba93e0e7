// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose classifier: a pre-trained network paired with its label vocabulary.
//!
//! Loading checks the artifact pair against the feature contract once, at
//! startup: the network must accept [`FEATURE_DIM`] inputs and emit exactly
//! one output per vocabulary label. A mismatch is a fatal load error rather
//! than a silent misclassification on the first request.

use std::path::Path;
use std::sync::Arc;

use crate::error::{PoseError, Result};
use crate::features::{FEATURE_DIM, FeatureVector};
use crate::network::{PoseNetwork, load_network};
use crate::results::{ClassificationResult, Probs};
use crate::vocabulary::{LabelVocabulary, display_name};

/// Immutable classifier shared by every inference call.
#[derive(Clone)]
pub struct PoseClassifier {
    network: Arc<dyn PoseNetwork>,
    vocabulary: Arc<LabelVocabulary>,
}

impl PoseClassifier {
    /// Pair a network with a vocabulary, validating widths.
    ///
    /// Widths the network does not declare are measured with one forward pass
    /// on a zero vector.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the network input width is not
    /// [`FEATURE_DIM`], its output width differs from the vocabulary size, or
    /// the measuring pass fails.
    pub fn new(network: Arc<dyn PoseNetwork>, vocabulary: LabelVocabulary) -> Result<Self> {
        if let Some(width) = network.input_width() {
            if width != FEATURE_DIM {
                return Err(PoseError::ModelLoadError(format!(
                    "Classifier expects {width} input features, feature vectors have {FEATURE_DIM}"
                )));
            }
        }
        if let Some(width) = network.output_width() {
            if width != vocabulary.len() {
                return Err(PoseError::ModelLoadError(format!(
                    "Classifier has {width} outputs but the vocabulary has {} labels",
                    vocabulary.len()
                )));
            }
        }
        if network.input_width().is_none() || network.output_width().is_none() {
            let outputs = network.forward(&[0.0; FEATURE_DIM]).map_err(|e| {
                PoseError::ModelLoadError(format!("Classifier rejected a {FEATURE_DIM}-feature input: {e}"))
            })?;
            if outputs.len() != vocabulary.len() {
                return Err(PoseError::ModelLoadError(format!(
                    "Classifier has {} outputs but the vocabulary has {} labels",
                    outputs.len(),
                    vocabulary.len()
                )));
            }
        }

        Ok(Self {
            network,
            vocabulary: Arc::new(vocabulary),
        })
    }

    /// Load the network and vocabulary artifacts.
    ///
    /// When `labels` is `None` the vocabulary is read from the model's `names`
    /// metadata, which only ONNX exports carry.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if either artifact is missing,
    /// malformed, or the pair does not match.
    pub fn load<P: AsRef<Path>>(model: P, labels: Option<&Path>, num_threads: usize) -> Result<Self> {
        let (network, names) = load_network(model.as_ref(), num_threads)?;

        let vocabulary = match (labels, names) {
            (Some(path), _) => LabelVocabulary::load(path)?,
            (None, Some(names)) => LabelVocabulary::parse(&names).map_err(|e| {
                PoseError::ModelLoadError(format!("Invalid names metadata in model: {e}"))
            })?,
            (None, None) => {
                return Err(PoseError::ModelLoadError(format!(
                    "No label file given and {} carries no class names",
                    model.as_ref().display()
                )));
            }
        };

        Self::new(Arc::from(network), vocabulary)
    }

    /// Run the network and return the winning class index and distribution.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::DimensionMismatch`] if the vector has the wrong
    /// width or the network output does not match the vocabulary, and
    /// [`PoseError::InferenceError`] if the backend fails.
    pub fn classify(&self, features: &FeatureVector) -> Result<(usize, Probs)> {
        if features.len() != FEATURE_DIM {
            return Err(PoseError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: features.len(),
            });
        }

        let outputs = self.network.forward(features.as_slice())?;
        if outputs.len() != self.vocabulary.len() {
            return Err(PoseError::DimensionMismatch {
                expected: self.vocabulary.len(),
                actual: outputs.len(),
            });
        }

        let probs = Probs::from_outputs(&outputs);
        Ok((probs.top1(), probs))
    }

    /// Decode a class index and distribution into a result.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VocabularyError`] if the index is out of range.
    pub fn decode(&self, class_index: usize, probs: Probs) -> Result<ClassificationResult> {
        let label = self.vocabulary.label(class_index).ok_or_else(|| {
            PoseError::VocabularyError(format!("No label for class index {class_index}"))
        })?;

        Ok(ClassificationResult {
            label: label.to_string(),
            display_name: display_name(label).to_string(),
            class_index,
            confidence: probs.data.get(class_index).copied().unwrap_or(0.0),
            distribution: probs,
        })
    }

    /// Classify and decode in one step.
    ///
    /// # Errors
    ///
    /// See [`Self::classify`] and [`Self::decode`].
    pub fn predict(&self, features: &FeatureVector) -> Result<ClassificationResult> {
        let (class_index, probs) = self.classify(features)?;
        self.decode(class_index, probs)
    }

    /// The label vocabulary.
    #[must_use]
    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Number of pose classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.vocabulary.len()
    }
}

impl std::fmt::Debug for PoseClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseClassifier")
            .field("input_width", &self.network.input_width())
            .field("num_classes", &self.vocabulary.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::normalize;
    use crate::network::{Activation, DenseLayer, DenseNetwork};
    use crate::skeleton::{Keypoint, NUM_KEYPOINTS, Skeleton};

    /// Linear network scoring class `i` with the `i`-th feature.
    fn selector_network(classes: usize) -> DenseNetwork {
        let weights = (0..classes)
            .map(|c| (0..FEATURE_DIM).map(|i| if i == c { 1.0 } else { 0.0 }).collect())
            .collect();
        let layer = DenseLayer::new(weights, vec![0.0; classes], Activation::Linear).unwrap();
        DenseNetwork::from_layers(vec![layer]).unwrap()
    }

    fn vocab(n: usize) -> LabelVocabulary {
        LabelVocabulary::from_labels((0..n).map(|i| format!("pose_{i}"))).unwrap()
    }

    fn features() -> FeatureVector {
        let mut kps = vec![Keypoint::new(0.5, 0.5, 0.0, 1.0); NUM_KEYPOINTS];
        kps[11] = Keypoint::new(0.45, 0.3, 0.0, 1.0);
        kps[12] = Keypoint::new(0.55, 0.3, 0.0, 1.0);
        kps[0] = Keypoint::new(2.5, 0.1, 0.0, 1.0);
        normalize(&Skeleton::from_keypoints(kps).unwrap())
    }

    #[test]
    fn test_classify_distribution_and_argmax() {
        let classifier = PoseClassifier::new(Arc::new(selector_network(3)), vocab(3)).unwrap();
        let (index, probs) = classifier.classify(&features()).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.data.sum() - 1.0).abs() < 1e-5);
        assert!(probs.data.iter().all(|&p| p >= 0.0));
        // Feature 0 is the nose x offset, the largest of the first three.
        assert_eq!(index, 0);

        let result = classifier.decode(index, probs).unwrap();
        assert_eq!(result.label, "pose_0");
        assert_eq!(result.display_name, "pose_0");
        assert!((result.confidence - result.distribution.top1conf()).abs() < f32::EPSILON);
    }

    #[test]
    fn test_startup_validation_rejects_output_mismatch() {
        let result = PoseClassifier::new(Arc::new(selector_network(3)), vocab(4));
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }

    #[test]
    fn test_startup_validation_rejects_input_mismatch() {
        let layer = DenseLayer::new(vec![vec![1.0; 99]; 2], vec![0.0; 2], Activation::Linear).unwrap();
        let network = DenseNetwork::from_layers(vec![layer]).unwrap();
        let result = PoseClassifier::new(Arc::new(network), vocab(2));
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }

    /// Backend with dynamic dims, like an ONNX export without static shapes.
    struct UndeclaredWidths {
        outputs: usize,
    }

    impl PoseNetwork for UndeclaredWidths {
        fn input_width(&self) -> Option<usize> {
            None
        }

        fn output_width(&self) -> Option<usize> {
            None
        }

        fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
            if input.len() == FEATURE_DIM {
                Ok(vec![0.0; self.outputs])
            } else {
                Err(PoseError::InferenceError(format!("bad input width {}", input.len())))
            }
        }
    }

    #[test]
    fn test_startup_validation_measures_undeclared_widths() {
        let result = PoseClassifier::new(Arc::new(UndeclaredWidths { outputs: 3 }), vocab(4));
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));

        let classifier = PoseClassifier::new(Arc::new(UndeclaredWidths { outputs: 4 }), vocab(4)).unwrap();
        let result = classifier.predict(&features()).unwrap();
        assert_eq!(result.class_index, 0);
        assert!((result.confidence - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_artifacts() {
        let result = PoseClassifier::load("missing.json", None, 0);
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }

    #[test]
    fn test_load_json_without_labels_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let row: Vec<f32> = vec![0.0; FEATURE_DIM];
        let json = serde_json::json!({
            "layers": [{"weights": [row.clone(), row], "bias": [0.0, 0.0]}]
        });
        std::fs::write(&path, json.to_string()).unwrap();

        let result = PoseClassifier::load(&path, None, 0);
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));

        let labels = dir.path().join("labels.txt");
        std::fs::write(&labels, "a\nb\n").unwrap();
        let classifier = PoseClassifier::load(&path, Some(labels.as_path()), 0).unwrap();
        assert_eq!(classifier.num_classes(), 2);

        // All-zero logits: uniform distribution, lowest index wins.
        let result = classifier.predict(&features()).unwrap();
        assert_eq!(result.class_index, 0);
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }
}
