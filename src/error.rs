//! Error taxonomy for the scoring pipeline. Every stage returns explicit
//! variants instead of catching and re-wrapping; numeric anomalies are
//! recovered locally in extraction and never surface here.

use crate::features::Modality;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request: missing user_id/data, wrong vector length.
    /// Rejected before any side effect.
    #[error("structural error: {0}")]
    Structural(String),

    /// Sample count below the modality minimum. Carries the deficit so the
    /// caller can tell the client how much more data to collect.
    #[error("insufficient {modality} data: {got} samples (minimum: {needed})")]
    InsufficientData {
        modality: Modality,
        needed: usize,
        got: usize,
    },

    /// Candidate model's train outlier rate fell outside the accepted
    /// window. The prior baseline (or absence) is left untouched.
    #[error("model validation failed: train outlier rate {train_outlier_rate:.4} outside {window:?}")]
    ValidationRejected {
        modality: Modality,
        train_outlier_rate: f64,
        window: (f64, f64),
    },

    /// Prediction requested for a user/modality with no active baseline.
    /// Distinct so the caller can route to onboarding.
    #[error("no {modality} baseline for user {user_id}")]
    ModelNotFound { user_id: String, modality: Modality },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable machine-readable kind for response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Structural(_) => "structural_error",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::ValidationRejected { .. } => "validation_rejected",
            EngineError::ModelNotFound { .. } => "model_not_found",
            EngineError::Storage(_) => "storage_error",
            EngineError::Serde(_) => "serialization_error",
        }
    }
}
