// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Feed-forward network backends for the pose classifier.
//!
//! A [`PoseNetwork`] maps one feature vector of width `D` to `N` raw outputs
//! (logits or probabilities). Two backends are provided:
//!
//! - [`OnnxNetwork`]: an ONNX model executed by ONNX Runtime.
//! - [`DenseNetwork`]: a stack of fully connected layers loaded from JSON and
//!   evaluated with `ndarray`, useful for small exported models and tests.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;

use crate::error::{PoseError, Result};

/// A pre-trained network evaluated with a single forward pass.
///
/// Implementations are immutable after loading and safe to share across
/// threads.
pub trait PoseNetwork: Send + Sync {
    /// Declared input width, if the artifact states one.
    fn input_width(&self) -> Option<usize>;

    /// Declared output width, if the artifact states one.
    fn output_width(&self) -> Option<usize>;

    /// Run one forward pass on a single feature vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the input width is wrong or the backend fails.
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>>;
}

/// Build an ONNX Runtime session the same way for every model in the crate.
pub(crate) fn build_session(path: &Path, num_threads: usize) -> Result<Session> {
    if !path.exists() {
        return Err(PoseError::ModelLoadError(format!(
            "Model file not found: {}",
            path.display()
        )));
    }

    #[allow(unused_mut)]
    let mut builder = Session::builder()
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to create session builder: {e}")))?;

    #[cfg(feature = "coreml")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        builder = builder
            .with_execution_providers([CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register CoreML EP: {e}")))?;
    }

    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register CUDA EP: {e}")))?;
    }

    builder
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(num_threads)
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to set intra-thread count: {e}")))?
        .commit_from_file(path)
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to load model: {e}")))
}

/// Last dimension of a declared tensor shape, when it is static.
fn static_last_dim(dims: &[i64]) -> Option<usize> {
    let d = dims.len();
    if d == 0 {
        return None;
    }
    usize::try_from(dims[d - 1]).ok().filter(|&w| w > 0)
}

/// Classifier network backed by an ONNX model.
///
/// ONNX Runtime needs exclusive access to a session while running, so the
/// session sits behind a mutex. Concurrent callers serialize on the forward
/// pass only; everything around it runs in parallel.
pub struct OnnxNetwork {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_width: Option<usize>,
    output_width: Option<usize>,
    names: Option<String>,
}

impl OnnxNetwork {
    /// Load an ONNX classifier.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the file is missing or invalid.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        let session = build_session(path.as_ref(), num_threads)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PoseError::ModelLoadError("Model declares no inputs".to_string()))?;
        let input_name = input.name.clone();
        let input_width = input
            .input_type
            .tensor_shape()
            .and_then(|dims| static_last_dim(dims));

        let output = session
            .outputs
            .first()
            .ok_or_else(|| PoseError::ModelLoadError("Model declares no outputs".to_string()))?;
        let output_name = output.name.clone();
        let output_width = output
            .output_type
            .tensor_shape()
            .and_then(|dims| static_last_dim(dims));

        let names = session
            .metadata()
            .ok()
            .and_then(|m| m.custom("names").ok().flatten());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
            output_width,
            names,
        })
    }

    /// Raw `names` custom metadata, if the exporter stored one.
    #[must_use]
    pub fn names_metadata(&self) -> Option<&str> {
        self.names.as_deref()
    }
}

impl PoseNetwork for OnnxNetwork {
    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        if let Some(expected) = self.input_width {
            if input.len() != expected {
                return Err(PoseError::DimensionMismatch {
                    expected,
                    actual: input.len(),
                });
            }
        }

        let batch = Array2::from_shape_vec((1, input.len()), input.to_vec())
            .map_err(|e| PoseError::InferenceError(format!("Failed to shape input: {e}")))?;
        let batch = batch.as_standard_layout();
        let tensor = TensorRef::from_array_view(&batch)
            .map_err(|e| PoseError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PoseError::InferenceError("Session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PoseError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PoseError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PoseError::InferenceError(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }
}

impl std::fmt::Debug for OnnxNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxNetwork")
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("input_width", &self.input_width)
            .field("output_width", &self.output_width)
            .finish_non_exhaustive()
    }
}

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity.
    #[default]
    Linear,
    /// `max(0, x)`.
    Relu,
    /// Logistic function.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// Softmax over the whole layer output.
    Softmax,
}

impl Activation {
    fn apply(self, v: &mut Array1<f32>) {
        match self {
            Self::Linear => {}
            Self::Relu => v.mapv_inplace(|x| x.max(0.0)),
            Self::Sigmoid => v.mapv_inplace(|x| 1.0 / (1.0 + (-x).exp())),
            Self::Tanh => v.mapv_inplace(f32::tanh),
            Self::Softmax => {
                let max = v.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                v.mapv_inplace(|x| (x - max).exp());
                let sum = v.sum();
                if sum > 0.0 {
                    v.mapv_inplace(|x| x / sum);
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerSpec {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct DenseSpec {
    layers: Vec<LayerSpec>,
}

/// One fully connected layer: `activation(W · x + b)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    /// Create a layer from a row-major `[out][in]` weight matrix.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if rows are ragged or the bias
    /// length does not match the number of rows.
    pub fn new(weights: Vec<Vec<f32>>, bias: Vec<f32>, activation: Activation) -> Result<Self> {
        let rows = weights.len();
        let cols = weights.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(PoseError::ModelLoadError("Dense layer has no weights".to_string()));
        }
        if weights.iter().any(|r| r.len() != cols) {
            return Err(PoseError::ModelLoadError(
                "Dense layer weight rows have different lengths".to_string(),
            ));
        }
        if bias.len() != rows {
            return Err(PoseError::ModelLoadError(format!(
                "Dense layer bias has {} entries, expected {rows}",
                bias.len()
            )));
        }

        let flat: Vec<f32> = weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| PoseError::ModelLoadError(format!("Invalid dense layer shape: {e}")))?;

        Ok(Self {
            weights,
            bias: Array1::from_vec(bias),
            activation,
        })
    }

    /// Input width.
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Output width.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        let mut y = self.weights.dot(x) + &self.bias;
        self.activation.apply(&mut y);
        y
    }
}

/// Classifier network made of dense layers, evaluated in pure Rust.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Build a network from layers, checking that adjacent widths chain.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the stack is empty or widths
    /// do not line up.
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(PoseError::ModelLoadError("Network has no layers".to_string()));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(PoseError::ModelLoadError(format!(
                    "Layer {i} outputs {} values but layer {} expects {}",
                    pair[0].outputs(),
                    i + 1,
                    pair[1].inputs()
                )));
            }
        }
        Ok(Self { layers })
    }

    /// Parse a network from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] for malformed JSON or layer shapes.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: DenseSpec = serde_json::from_str(json)?;
        let layers = spec
            .layers
            .into_iter()
            .map(|l| DenseLayer::new(l.weights, l.bias, l.activation))
            .collect::<Result<Vec<_>>>()?;
        Self::from_layers(layers)
    }

    /// Load a network from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the file is missing or malformed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PoseError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl PoseNetwork for DenseNetwork {
    fn input_width(&self) -> Option<usize> {
        self.layers.first().map(DenseLayer::inputs)
    }

    fn output_width(&self) -> Option<usize> {
        self.layers.last().map(DenseLayer::outputs)
    }

    fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        let expected = self.input_width().unwrap_or_default();
        if input.len() != expected {
            return Err(PoseError::DimensionMismatch {
                expected,
                actual: input.len(),
            });
        }
        let mut x = Array1::from_vec(input.to_vec());
        for layer in &self.layers {
            x = layer.forward(&x);
        }
        Ok(x.to_vec())
    }
}

/// Load a classifier network, choosing the backend from the file extension.
///
/// `.json` files load as [`DenseNetwork`]; anything else is treated as ONNX.
///
/// # Errors
///
/// Returns [`PoseError::ModelLoadError`] if the artifact cannot be loaded.
pub fn load_network<P: AsRef<Path>>(
    path: P,
    num_threads: usize,
) -> Result<(Box<dyn PoseNetwork>, Option<String>)> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        Ok((Box::new(DenseNetwork::from_json_file(path)?), None))
    } else {
        let network = OnnxNetwork::load(path, num_threads)?;
        let names = network.names_metadata().map(str::to_string);
        Ok((Box::new(network), names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_layer(n: usize, activation: Activation) -> DenseLayer {
        let weights = (0..n)
            .map(|r| (0..n).map(|c| if r == c { 1.0 } else { 0.0 }).collect())
            .collect();
        DenseLayer::new(weights, vec![0.0; n], activation).unwrap()
    }

    #[test]
    fn test_dense_forward_relu_then_linear() {
        let hidden = DenseLayer::new(
            vec![vec![1.0, -1.0], vec![-1.0, 1.0]],
            vec![0.0, 0.5],
            Activation::Relu,
        )
        .unwrap();
        let out = DenseLayer::new(vec![vec![2.0, 1.0]], vec![0.25], Activation::Linear).unwrap();
        let net = DenseNetwork::from_layers(vec![hidden, out]).unwrap();

        assert_eq!(net.input_width(), Some(2));
        assert_eq!(net.output_width(), Some(1));

        // hidden = relu([3 - 1, -3 + 1 + 0.5]) = [2, 0]; out = 2*2 + 0 + 0.25
        let y = net.forward(&[3.0, 1.0]).unwrap();
        assert!((y[0] - 4.25).abs() < 1e-6);
    }

    #[test]
    fn test_dense_softmax_sums_to_one() {
        let net = DenseNetwork::from_layers(vec![identity_layer(3, Activation::Softmax)]).unwrap();
        let y = net.forward(&[1000.0, 1001.0, 999.0]).unwrap();
        let sum: f32 = y.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(y[1] > y[0] && y[0] > y[2]);
    }

    #[test]
    fn test_dense_rejects_wrong_input_width() {
        let net = DenseNetwork::from_layers(vec![identity_layer(4, Activation::Linear)]).unwrap();
        let err = net.forward(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            PoseError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_dense_layers_must_chain() {
        let a = identity_layer(3, Activation::Relu);
        let b = identity_layer(4, Activation::Linear);
        assert!(DenseNetwork::from_layers(vec![a, b]).is_err());
        assert!(DenseNetwork::from_layers(Vec::new()).is_err());
    }

    #[test]
    fn test_dense_layer_shape_validation() {
        assert!(DenseLayer::new(vec![vec![1.0, 2.0], vec![1.0]], vec![0.0, 0.0], Activation::Linear).is_err());
        assert!(DenseLayer::new(vec![vec![1.0, 2.0]], vec![0.0, 0.0], Activation::Linear).is_err());
    }

    #[test]
    fn test_dense_from_json() {
        let json = r#"{"layers": [
            {"weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "tanh"},
            {"weights": [[1.0, 1.0]], "bias": [0.0]}
        ]}"#;
        let net = DenseNetwork::from_json(json).unwrap();
        let y = net.forward(&[0.0, 0.0]).unwrap();
        assert!(y[0].abs() < 1e-6);
    }

    #[test]
    fn test_dense_from_bad_json() {
        let result = DenseNetwork::from_json(r#"{"layers": [{"weights": 3}]}"#);
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }

    #[test]
    fn test_static_last_dim() {
        assert_eq!(static_last_dim(&[1, 132]), Some(132));
        assert_eq!(static_last_dim(&[-1, -1]), None);
        assert_eq!(static_last_dim(&[]), None);
    }

    #[test]
    fn test_onnx_model_not_found() {
        let result = OnnxNetwork::load("nonexistent.onnx", 0);
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }
}
