// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Classification results and timing.
//!
//! [`Probs`] wraps the probability distribution produced by the classifier and
//! answers top-k queries; [`ClassificationResult`] is the decoded verdict
//! handed to callers. Both are created once per inference and never mutated.

use ndarray::Array1;
use serde::{Serialize, Serializer};

/// Sum tolerance within which a network output is treated as a distribution.
pub const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Timing information for one pipeline call (in milliseconds).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Speed {
    /// Time spent extracting landmarks.
    pub extract: Option<f64>,
    /// Time spent normalizing and classifying.
    pub classify: Option<f64>,
    /// Time spent rendering the skeleton.
    pub render: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(extract: f64, classify: f64, render: f64) -> Self {
        Self {
            extract: Some(extract),
            classify: Some(classify),
            render: Some(render),
        }
    }

    /// Sum of all recorded stages in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.extract.unwrap_or(0.0) + self.classify.unwrap_or(0.0) + self.render.unwrap_or(0.0)
    }
}

/// Classification probabilities.
///
/// Always a valid distribution: non-negative values summing to 1.
/// Serializes as a plain list in class index order.
#[derive(Debug, Clone, PartialEq)]
pub struct Probs {
    /// Probability per class index, shape (`num_classes`,).
    pub data: Array1<f32>,
}

impl Probs {
    /// Turn raw network outputs into a probability distribution.
    ///
    /// NaN outputs count as 0. Outputs that already form a distribution (all
    /// non-negative, summing to 1 within [`DISTRIBUTION_TOLERANCE`]) are only
    /// renormalized; anything else is treated as logits and passed through a
    /// numerically stable softmax.
    #[must_use]
    pub fn from_outputs(outputs: &[f32]) -> Self {
        let values: Vec<f32> = outputs
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    0.0
                } else {
                    v.clamp(f32::MIN, f32::MAX)
                }
            })
            .collect();

        let sum: f32 = values.iter().sum();
        let is_distribution = values.iter().all(|&v| v >= 0.0)
            && sum > 0.0
            && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE;

        let data = if is_distribution {
            values.iter().map(|&v| v / sum).collect()
        } else {
            let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp_vals: Vec<f32> = values.iter().map(|&v| (v - max_val).exp()).collect();
            let exp_sum: f32 = exp_vals.iter().sum();
            exp_vals.iter().map(|&v| v / exp_sum).collect()
        };

        Self {
            data: Array1::from_vec(data),
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the distribution is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index of the most probable class; ties go to the lowest index.
    #[must_use]
    pub fn top1(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.data.iter().enumerate() {
            if p > self.data[best] {
                best = i;
            }
        }
        best
    }

    /// Indices of the top-k classes, most probable first.
    ///
    /// The sort is stable, so equal probabilities keep index order.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.data.len()).collect();
        indices.sort_by(|&a, &b| {
            self.data[b]
                .partial_cmp(&self.data[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        indices.truncate(k);
        indices
    }

    /// Indices of the top-5 classes.
    #[must_use]
    pub fn top5(&self) -> Vec<usize> {
        self.top_k(5)
    }

    /// Probability of the top-1 class.
    #[must_use]
    pub fn top1conf(&self) -> f32 {
        self.data.get(self.top1()).copied().unwrap_or(0.0)
    }
}

impl Serialize for Probs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.data.iter())
    }
}

/// Decoded verdict for one detected pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Canonical label from the vocabulary; stable key for downstream lookups.
    pub label: String,
    /// Traditional display name for the label.
    pub display_name: String,
    /// Winning class index.
    pub class_index: usize,
    /// Probability of the winning class.
    pub confidence: f32,
    /// Full distribution over all classes, in class index order.
    pub distribution: Probs,
}

impl ClassificationResult {
    /// Whether the confidence reaches a presentation threshold.
    ///
    /// Low confidence never turns a result into a rejection; callers use this
    /// only to decide how to present it.
    #[must_use]
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// Short `label confidence` caption.
    #[must_use]
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.display_name, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_distribution(p: &Probs) {
        assert!(p.data.iter().all(|&v| v >= 0.0));
        assert!((p.data.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_speed_total() {
        let speed = Speed::new(12.0, 0.5, 3.0);
        assert!((speed.total() - 15.5).abs() < 1e-9);
        assert!(Speed::default().total().abs() < f64::EPSILON);
    }

    #[test]
    fn test_logits_get_softmax() {
        let p = Probs::from_outputs(&[2.0, 1.0, -3.0]);
        assert_distribution(&p);
        assert_eq!(p.top1(), 0);
        assert!(p.data[0] > p.data[1] && p.data[1] > p.data[2]);
    }

    #[test]
    fn test_distribution_is_renormalized_not_softmaxed() {
        let p = Probs::from_outputs(&[0.7, 0.2, 0.1005]);
        assert_distribution(&p);
        assert!((p.data[0] - 0.7 / 1.0005).abs() < 1e-6);
    }

    #[test]
    fn test_nan_and_infinity_are_tamed() {
        let p = Probs::from_outputs(&[f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 1.0]);
        assert_distribution(&p);
        assert_eq!(p.top1(), 1);
    }

    #[test]
    fn test_top1_ties_take_lowest_index() {
        let p = Probs::from_outputs(&[0.1, 0.4, 0.4, 0.1]);
        assert_eq!(p.top1(), 1);
        assert_eq!(p.top_k(2), vec![1, 2]);
        assert!((p.top1conf() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_logits() {
        let p = Probs::from_outputs(&[0.0; 4]);
        assert_distribution(&p);
        assert_eq!(p.top1(), 0);
        assert_eq!(p.top5().len(), 4);
    }

    #[test]
    fn test_is_confident_and_caption() {
        let result = ClassificationResult {
            label: "Tree_Pose_or_Vrksasana_".to_string(),
            display_name: "Vrksasana".to_string(),
            class_index: 0,
            confidence: 0.42,
            distribution: Probs::from_outputs(&[0.42, 0.58]),
        };
        assert!(!result.is_confident(0.5));
        assert!(result.is_confident(0.4));
        assert_eq!(result.caption(), "Vrksasana 0.42");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["distribution"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["class_index"], 0);
    }
}
