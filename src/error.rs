//! Error taxonomy for the scoring pipeline.
//!
//! Each scoring failure maps to exactly one category. None of these are
//! retried: validation and feature errors reject the input, inference
//! errors indicate a deployment/configuration bug.

use thiserror::Error;

/// Errors surfaced to the caller of a scoring operation.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Malformed or out-of-range input, rejected before any scoring work.
    #[error("validation error: {0}")]
    Validation(String),

    /// Feature encoding failed, e.g. a categorical value unseen by the
    /// fitted encoder with no fallback schema left.
    #[error("feature error: {0}")]
    Feature(String),

    /// Tensor shape or model mismatch. Inference is stateless and
    /// deterministic, so retrying an identical input cannot succeed.
    #[error("inference error: {0}")]
    Inference(String),
}

/// Failure of the external explanation service.
///
/// Never surfaces to callers: the explanation generator absorbs every
/// variant into its deterministic fallback narrative.
#[derive(Debug, Error)]
pub enum ExplanationUnavailable {
    #[error("explanation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("explanation service returned status {0}")]
    Status(u16),

    #[error("explanation response empty or too short ({0} chars)")]
    TooShort(usize),
}
