// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decision policy over extraction and classification outcomes.
//!
//! The policy is a two-step state machine. It starts in
//! [`DecisionState::AwaitingDetection`] and moves exactly once, to
//! [`DecisionState::Detected`] or [`DecisionState::Rejected`]. There is no
//! retry: one still image gets one verdict. Low confidence is never a reason
//! to reject; see [`ClassificationResult::is_confident`].

use serde::Serialize;

use crate::error::Result;
use crate::landmarks::Extraction;
use crate::results::ClassificationResult;
use crate::skeleton::Skeleton;

/// Why an image produced no classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No body was found in the image.
    NoPose,
    /// The input could not be decoded as an image.
    InvalidInput,
}

impl RejectReason {
    /// Stable wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoPose => "no_pose",
            Self::InvalidInput => "invalid_input",
        }
    }

    /// Human readable message.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoPose => "No pose detected",
            Self::InvalidInput => "Could not read image",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    /// No extraction outcome has been seen yet.
    AwaitingDetection,
    /// A body was found and classified.
    Detected,
    /// The image was rejected.
    Rejected,
}

/// Final verdict for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    /// The pose was classified.
    Detected(ClassificationResult),
    /// No classification was produced.
    Rejected {
        /// Why.
        reason: RejectReason,
    },
}

impl Decision {
    /// Rejection with the given reason.
    #[must_use]
    pub const fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// Terminal state this verdict corresponds to.
    #[must_use]
    pub const fn state(&self) -> DecisionState {
        match self {
            Self::Detected(_) => DecisionState::Detected,
            Self::Rejected { .. } => DecisionState::Rejected,
        }
    }

    /// The classification, if the pose was detected.
    #[must_use]
    pub const fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Detected(result) => Some(result),
            Self::Rejected { .. } => None,
        }
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Detected(_) => None,
            Self::Rejected { reason } => Some(*reason),
        }
    }
}

/// Single-use decision policy.
#[derive(Debug)]
pub struct DecisionPolicy {
    state: DecisionState,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionPolicy {
    /// A policy awaiting its extraction outcome.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DecisionState::AwaitingDetection,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> DecisionState {
        self.state
    }

    /// Decide on an extraction outcome.
    ///
    /// `classify` runs only when a skeleton was detected; on
    /// [`Extraction::NotDetected`] the verdict is `Rejected(NoPose)` and the
    /// classifier is never invoked. Any classification result is accepted
    /// regardless of confidence.
    ///
    /// # Errors
    ///
    /// Propagates classifier failures. The policy stays in
    /// [`DecisionState::AwaitingDetection`] in that case.
    pub fn decide<F>(&mut self, extraction: &Extraction, classify: F) -> Result<Decision>
    where
        F: FnOnce(&Skeleton) -> Result<ClassificationResult>,
    {
        let decision = match extraction {
            Extraction::NotDetected => Decision::rejected(RejectReason::NoPose),
            Extraction::Detected(skeleton) => Decision::Detected(classify(skeleton)?),
        };
        self.state = decision.state();
        Ok(decision)
    }
}
