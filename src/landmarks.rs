// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark extraction.
//!
//! Body landmark estimation is an external capability behind the
//! [`LandmarkDetector`] trait, so the ONNX backend can be swapped or mocked.
//! [`LandmarkExtractor`] wraps a detector and turns every failure mode into
//! [`Extraction::NotDetected`]: a missing body is a normal outcome, never an
//! error.

use std::sync::Arc;

use image::DynamicImage;

use crate::error::Result;
use crate::skeleton::Skeleton;
use crate::warn;

/// External body landmark estimation capability.
pub trait LandmarkDetector: Send + Sync {
    /// Detect a single body in the image.
    ///
    /// Returns `Ok(None)` when no body is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability fails on this image.
    fn detect(&self, image: &DynamicImage) -> Result<Option<Skeleton>>;
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for Arc<T> {
    fn detect(&self, image: &DynamicImage) -> Result<Option<Skeleton>> {
        (**self).detect(image)
    }
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for Box<T> {
    fn detect(&self, image: &DynamicImage) -> Result<Option<Skeleton>> {
        (**self).detect(image)
    }
}

/// Outcome of landmark extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A body was found.
    Detected(Skeleton),
    /// No body was found, or the image could not be analysed.
    NotDetected,
}

impl Extraction {
    /// The skeleton, if one was detected.
    #[must_use]
    pub const fn skeleton(&self) -> Option<&Skeleton> {
        match self {
            Self::Detected(skeleton) => Some(skeleton),
            Self::NotDetected => None,
        }
    }

    /// Whether a body was found.
    #[must_use]
    pub const fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Packages detector output into the canonical skeleton shape.
#[derive(Clone)]
pub struct LandmarkExtractor {
    detector: Arc<dyn LandmarkDetector>,
}

impl LandmarkExtractor {
    /// Wrap a detector.
    pub fn new(detector: Arc<dyn LandmarkDetector>) -> Self {
        Self { detector }
    }

    /// Extract the skeleton of the single body in `image`.
    ///
    /// Never fails and never mutates the image. Empty images and detector
    /// errors are logged and reported as [`Extraction::NotDetected`].
    #[must_use]
    pub fn extract(&self, image: &DynamicImage) -> Extraction {
        if image.width() == 0 || image.height() == 0 {
            return Extraction::NotDetected;
        }

        match self.detector.detect(image) {
            Ok(Some(skeleton)) => Extraction::Detected(skeleton),
            Ok(None) => Extraction::NotDetected,
            Err(e) => {
                warn!("Landmark detection failed, treating as no pose: {e}");
                Extraction::NotDetected
            }
        }
    }
}

impl std::fmt::Debug for LandmarkExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandmarkExtractor").finish_non_exhaustive()
    }
}
