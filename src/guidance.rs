// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Instruction and feedback text for a classified pose.
//!
//! Text generation is an external capability behind [`GuidanceProvider`],
//! keyed by the canonical pose label. No network client lives in this crate.
//! [`FallbackGuidance`] is the deterministic built-in text, and
//! [`WithFallback`] substitutes it whenever an external provider fails.

use serde::Serialize;

use crate::error::Result;
use crate::vocabulary::display_name;
use crate::warn;

/// Output language for guidance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Indian English.
    #[default]
    En,
    /// Hindi.
    Hi,
    /// Kannada.
    Kn,
    /// Tamil.
    Ta,
    /// Telugu.
    Te,
    /// Marathi.
    Mr,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Self; 6] = [Self::En, Self::Hi, Self::Kn, Self::Ta, Self::Te, Self::Mr];

    /// Parse a language code; unknown codes fall back to English.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "hi" => Self::Hi,
            "kn" => Self::Kn,
            "ta" => Self::Ta,
            "te" => Self::Te,
            "mr" => Self::Mr,
            _ => Self::En,
        }
    }

    /// Two-letter language code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Kn => "kn",
            Self::Ta => "ta",
            Self::Te => "te",
            Self::Mr => "mr",
        }
    }
}

/// Short instructions plus one feedback tip for a pose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guidance {
    /// Key points, one per line, suitable for text-to-speech.
    pub instructions: Vec<String>,
    /// One alignment tip.
    pub feedback: String,
}

/// External text-generation capability.
pub trait GuidanceProvider: Send + Sync {
    /// Produce guidance for a canonical pose label.
    ///
    /// # Errors
    ///
    /// Returns an error if the external service fails.
    fn guidance(&self, label: &str, language: Language) -> Result<Guidance>;
}

/// Deterministic built-in guidance, used when no service is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGuidance;

impl FallbackGuidance {
    /// Generic key points shared by every pose.
    pub const INSTRUCTIONS: [&'static str; 5] = [
        "Arms extended overhead",
        "Legs hip-width apart",
        "Head neutral",
        "Engage core",
        "Breathe steadily",
    ];

    /// Fallback guidance for a label. Always succeeds.
    #[must_use]
    pub fn for_label(label: &str) -> Guidance {
        Guidance {
            instructions: Self::INSTRUCTIONS.iter().map(|s| (*s).to_string()).collect(),
            feedback: format!(
                "Focus on your breathing and maintain steady alignment while performing {}.",
                display_name(label)
            ),
        }
    }
}

impl GuidanceProvider for FallbackGuidance {
    fn guidance(&self, label: &str, _language: Language) -> Result<Guidance> {
        Ok(Self::for_label(label))
    }
}

/// Provider wrapper that never fails: errors are logged and replaced with
/// [`FallbackGuidance`].
#[derive(Debug, Clone)]
pub struct WithFallback<P> {
    inner: P,
}

impl<P: GuidanceProvider> WithFallback<P> {
    /// Wrap a provider.
    pub const fn new(inner: P) -> Self {
        Self { inner }
    }

    /// Guidance from the inner provider, or the fallback text.
    #[must_use]
    pub fn get(&self, label: &str, language: Language) -> Guidance {
        self.inner.guidance(label, language).unwrap_or_else(|e| {
            warn!("Guidance provider failed for '{label}', using fallback: {e}");
            FallbackGuidance::for_label(label)
        })
    }
}

impl<P: GuidanceProvider> GuidanceProvider for WithFallback<P> {
    fn guidance(&self, label: &str, language: Language) -> Result<Guidance> {
        Ok(self.get(label, language))
    }
}
