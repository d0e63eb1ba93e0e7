// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the pose classification library.
//!
//! "No body in the image" and "undecodable image" are not errors: they are
//! [`RejectReason`](crate::decision::RejectReason) outcomes. Everything here is
//! either a startup-time artifact problem or an unexpected runtime failure.

use std::fmt;

/// Result type alias for pose inference operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Main error type for the pose classification library.
#[derive(Debug)]
pub enum PoseError {
    /// Error loading a model or label artifact. Fatal at startup.
    ModelLoadError(String),
    /// Error during a network forward pass.
    InferenceError(String),
    /// Error processing images.
    ImageError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// IO error described as a message (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Error parsing or querying the label vocabulary.
    VocabularyError(String),
    /// A vector or tensor width did not match the model contract.
    DimensionMismatch {
        /// Width the model expects.
        expected: usize,
        /// Width that was provided.
        actual: usize,
    },
    /// Visualizer error.
    VisualizerError(String),
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::VocabularyError(msg) => write!(f, "Vocabulary error: {msg}"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            Self::VisualizerError(msg) => write!(f, "Visualizer error: {msg}"),
        }
    }
}

impl std::error::Error for PoseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PoseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PoseError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for PoseError {
    fn from(err: serde_json::Error) -> Self {
        Self::ModelLoadError(format!("Invalid JSON artifact: {err}"))
    }
}
