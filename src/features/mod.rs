//! Statistical feature extraction from raw behavioral telemetry.

mod extract;
mod readiness;

pub use extract::{ExtractionMode, FeatureExtractor};
pub use readiness::{
    ModalityReadiness, OverallMode, QualityTier, ReadinessAssessment, ReadinessAssessor,
    ReadinessTier,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Features per modality vector. Fixed by the model contract.
pub const FEATURE_DIM: usize = 6;

pub const SWIPE_FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "speed_mean",
    "speed_std",
    "direction_mean",
    "direction_std",
    "acceleration_mean",
    "acceleration_std",
];

pub const KEYSTROKE_FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "hold_mean",
    "hold_std",
    "flight_mean",
    "flight_std",
    "backspace_rate",
    "typing_speed",
];

/// One behavioral signal channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// Swipe kinematics ("swiping" on the wire)
    #[serde(rename = "swiping")]
    Swipe,
    /// Keystroke timing ("typing" on the wire)
    #[serde(rename = "typing")]
    Keystroke,
}

impl Modality {
    pub fn feature_names(&self) -> &'static [&'static str; FEATURE_DIM] {
        match self {
            Modality::Swipe => &SWIPE_FEATURE_NAMES,
            Modality::Keystroke => &KEYSTROKE_FEATURE_NAMES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Swipe => "swiping",
            Modality::Keystroke => "typing",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed 6-dimensional statistical summary of one session for one modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub modality: Modality,
    pub values: [f64; FEATURE_DIM],
}

impl FeatureVector {
    pub fn new(modality: Modality, values: [f64; FEATURE_DIM]) -> Self {
        Self { modality, values }
    }

    /// Postcondition check: every slot finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
