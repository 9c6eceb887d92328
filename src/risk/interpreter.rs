//! Maps raw anomaly scores to discrete risk categories and a bounded
//! confidence value. Bands are fixed constants per modality, not learned.

use crate::config::{KeystrokeConfig, SwipeConfig};
use crate::error::EngineError;
use crate::features::{Modality, FEATURE_DIM};
use crate::model::Baseline;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// |z| above this flags a feature as a high contributor.
const HIGH_CONTRIBUTION_Z: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Normal,
    LowRisk,
    MediumRisk,
    HighRisk,
    CriticalRisk,
}

impl RiskCategory {
    /// Fixed threshold bands on the anomaly score (lower = more anomalous).
    /// Swipe has five bands, keystroke four.
    pub fn from_score(modality: Modality, score: f64) -> Self {
        match modality {
            Modality::Swipe => {
                if score < -0.6 {
                    RiskCategory::CriticalRisk
                } else if score < -0.4 {
                    RiskCategory::HighRisk
                } else if score < -0.2 {
                    RiskCategory::MediumRisk
                } else if score < -0.1 {
                    RiskCategory::LowRisk
                } else {
                    RiskCategory::Normal
                }
            }
            Modality::Keystroke => {
                if score < -0.5 {
                    RiskCategory::HighRisk
                } else if score < -0.3 {
                    RiskCategory::MediumRisk
                } else if score < -0.1 {
                    RiskCategory::LowRisk
                } else {
                    RiskCategory::Normal
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Normal => "normal",
            RiskCategory::LowRisk => "low_risk",
            RiskCategory::MediumRisk => "medium_risk",
            RiskCategory::HighRisk => "high_risk",
            RiskCategory::CriticalRisk => "critical_risk",
        }
    }
}

/// Simple explainability signal, not a causal attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contribution {
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
    pub scaled_value: f64,
    pub contribution: Contribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub modality: Modality,
    pub anomaly_score: f64,
    pub decision_score: f64,
    pub is_outlier: bool,
    pub risk_category: RiskCategory,
    /// Bounded to [0, 100]
    pub confidence: f64,
    pub feature_analysis: Vec<FeatureContribution>,
}

pub struct RiskInterpreter {
    swipe: SwipeConfig,
    keystroke: KeystrokeConfig,
}

impl RiskInterpreter {
    pub fn new(swipe: SwipeConfig, keystroke: KeystrokeConfig) -> Self {
        Self { swipe, keystroke }
    }

    /// Score a session vector against a fitted baseline. Length must be
    /// exactly 6; range breaches are logged, never rejected.
    pub fn score(
        &self,
        baseline: &Baseline,
        modality: Modality,
        session_vector: &[f64],
    ) -> Result<RiskScore, EngineError> {
        if session_vector.len() != FEATURE_DIM {
            return Err(EngineError::Structural(format!(
                "expected {} features, got {}",
                FEATURE_DIM,
                session_vector.len()
            )));
        }
        self.warn_soft_ranges(modality, session_vector);

        let scaled = baseline.scaler.transform_row(session_vector);
        let anomaly_score = baseline.forest.score_row(&scaled);
        let decision_score = baseline.forest.decision_row(&scaled);
        let is_outlier = decision_score < 0.0;

        let risk_category = RiskCategory::from_score(modality, anomaly_score);
        let confidence = (decision_score.abs() * 100.0).min(100.0);

        let feature_analysis = modality
            .feature_names()
            .iter()
            .zip(session_vector.iter().zip(scaled.iter()))
            .map(|(name, (&value, &z))| FeatureContribution {
                feature: (*name).to_string(),
                value,
                scaled_value: round4(z),
                contribution: if z.abs() > HIGH_CONTRIBUTION_Z {
                    Contribution::High
                } else {
                    Contribution::Normal
                },
            })
            .collect();

        Ok(RiskScore {
            modality,
            anomaly_score: round4(anomaly_score),
            decision_score: round4(decision_score),
            is_outlier,
            risk_category,
            confidence: round2(confidence),
            feature_analysis,
        })
    }

    /// Soft plausibility checks on the unscaled vector. Breaches are
    /// reported, never rejected.
    pub fn soft_range_warnings(&self, modality: Modality, v: &[f64]) -> Vec<String> {
        let checks: Vec<(usize, &str, (f64, f64))> = match modality {
            Modality::Swipe => vec![
                (0, "speed_mean", self.swipe.speed_range),
                (2, "direction_mean", self.swipe.direction_range),
                (4, "acceleration_mean", self.swipe.acceleration_range),
            ],
            Modality::Keystroke => vec![
                (0, "hold_mean", self.keystroke.hold_range),
                (2, "flight_mean", self.keystroke.flight_range),
                (4, "backspace_rate", self.keystroke.backspace_range),
                (5, "typing_speed", self.keystroke.typing_speed_clamp),
            ],
        };
        checks
            .into_iter()
            .filter_map(|(idx, name, (lo, hi))| {
                let value = v.get(idx).copied()?;
                (value < lo || value > hi).then(|| {
                    format!("{modality} {name} {value} outside expected range [{lo}, {hi}]")
                })
            })
            .collect()
    }

    fn warn_soft_ranges(&self, modality: Modality, v: &[f64]) {
        for message in self.soft_range_warnings(modality, v) {
            warn!(modality = %modality, "{message}");
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
