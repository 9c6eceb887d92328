//! Readiness assessment: how much raw data is available and what kind of
//! training it supports. Advisory only; never blocks extraction.

use crate::config::{KeystrokeConfig, SwipeConfig};
use crate::standardize::StandardizedData;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessTier {
    Insufficient,
    Minimal,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Poor,
    Acceptable,
    Good,
    Excellent,
}

/// Recommended processing mode across modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallMode {
    Insufficient,
    MinimalOnboarding,
    Onboarding,
    FullTraining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityReadiness {
    pub available: bool,
    pub sample_count: usize,
    pub readiness: ReadinessTier,
    pub quality: QualityTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessAssessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swiping: Option<ModalityReadiness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typing: Option<ModalityReadiness>,
    /// Best tier reached by any available modality
    pub overall_tier: ReadinessTier,
    pub recommended_mode: OverallMode,
    pub recommendations: Vec<String>,
}

impl ReadinessAssessment {
    /// True when at least one modality clears its insufficient floor.
    pub fn any_ready(&self) -> bool {
        self.recommended_mode != OverallMode::Insufficient
    }
}

pub struct ReadinessAssessor {
    swipe_tiers: (usize, usize, usize),
    keystroke_tiers: (usize, usize, usize),
}

impl ReadinessAssessor {
    pub fn new(swipe: &SwipeConfig, keystroke: &KeystrokeConfig) -> Self {
        Self {
            swipe_tiers: swipe.readiness_tiers,
            keystroke_tiers: keystroke.readiness_tiers,
        }
    }

    pub fn assess(&self, data: &StandardizedData) -> ReadinessAssessment {
        let swiping = (!data.swipe.is_empty())
            .then(|| assess_modality(data.swipe.sample_count(), self.swipe_tiers));
        let typing = (!data.keystroke.is_empty())
            .then(|| assess_modality(data.keystroke.sample_count(), self.keystroke_tiers));

        let ready: Vec<&str> = [("swiping", &swiping), ("typing", &typing)]
            .into_iter()
            .filter_map(|(name, m)| {
                m.as_ref()
                    .filter(|m| m.readiness != ReadinessTier::Insufficient)
                    .map(|_| name)
            })
            .collect();

        let total_samples = swiping.as_ref().map_or(0, |m| m.sample_count)
            + typing.as_ref().map_or(0, |m| m.sample_count);

        let overall_tier = [&swiping, &typing]
            .into_iter()
            .flatten()
            .map(|m| m.readiness)
            .max()
            .unwrap_or(ReadinessTier::Insufficient);

        let recommended_mode = if ready.is_empty() {
            OverallMode::Insufficient
        } else if total_samples >= 50 {
            OverallMode::FullTraining
        } else if total_samples >= 15 {
            OverallMode::Onboarding
        } else {
            OverallMode::MinimalOnboarding
        };

        let mut recommendations = Vec::new();
        match ready.len() {
            0 => recommendations.push(
                "Continue data collection - insufficient samples for any behavioral models"
                    .to_string(),
            ),
            1 => recommendations.push(format!(
                "Single modality ({}) ready - consider collecting more data for multi-modal authentication",
                ready[0]
            )),
            _ => recommendations.push("Multiple modalities ready for training".to_string()),
        }
        for (name, m) in [("swiping", &swiping), ("typing", &typing)] {
            if let Some(m) = m {
                match m.readiness {
                    ReadinessTier::Insufficient => {
                        recommendations.push(format!("Need more {name} samples for training"))
                    }
                    ReadinessTier::Minimal => recommendations.push(format!(
                        "Consider collecting more {name} data for improved accuracy"
                    )),
                    _ => {}
                }
            }
        }

        ReadinessAssessment {
            swiping,
            typing,
            overall_tier,
            recommended_mode,
            recommendations,
        }
    }
}

fn assess_modality(sample_count: usize, tiers: (usize, usize, usize)) -> ModalityReadiness {
    let (minimal, good, excellent) = tiers;
    let readiness = if sample_count >= excellent {
        ReadinessTier::Excellent
    } else if sample_count >= good {
        ReadinessTier::Good
    } else if sample_count >= minimal {
        ReadinessTier::Minimal
    } else {
        ReadinessTier::Insufficient
    };
    let quality = match readiness {
        ReadinessTier::Insufficient => QualityTier::Poor,
        ReadinessTier::Minimal => QualityTier::Acceptable,
        ReadinessTier::Good => QualityTier::Good,
        ReadinessTier::Excellent => QualityTier::Excellent,
    };
    ModalityReadiness {
        available: true,
        sample_count,
        readiness,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::{KeystrokeSamples, SwipeSamples};

    fn assessor() -> ReadinessAssessor {
        ReadinessAssessor::new(&SwipeConfig::default(), &KeystrokeConfig::default())
    }

    fn with_swipe(n: usize) -> StandardizedData {
        StandardizedData {
            swipe: SwipeSamples {
                speeds: vec![1.0; n],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn swipe_tier_boundaries() {
        let a = assessor();
        let tier = |n| a.assess(&with_swipe(n)).swiping.unwrap().readiness;
        assert_eq!(tier(1), ReadinessTier::Insufficient);
        assert_eq!(tier(2), ReadinessTier::Minimal);
        assert_eq!(tier(14), ReadinessTier::Minimal);
        assert_eq!(tier(15), ReadinessTier::Good);
        assert_eq!(tier(24), ReadinessTier::Good);
        assert_eq!(tier(25), ReadinessTier::Excellent);
    }

    #[test]
    fn keystroke_tier_boundaries() {
        let a = assessor();
        let data = |n| StandardizedData {
            keystroke: KeystrokeSamples {
                hold_times: vec![150.0; n],
                ..Default::default()
            },
            ..Default::default()
        };
        let tier = |n| a.assess(&data(n)).typing.unwrap().readiness;
        assert_eq!(tier(2), ReadinessTier::Insufficient);
        assert_eq!(tier(3), ReadinessTier::Minimal);
        assert_eq!(tier(20), ReadinessTier::Good);
        assert_eq!(tier(40), ReadinessTier::Excellent);
    }

    #[test]
    fn recommended_mode_thresholds() {
        let a = assessor();
        assert_eq!(
            a.assess(&with_swipe(5)).recommended_mode,
            OverallMode::MinimalOnboarding
        );
        assert_eq!(
            a.assess(&with_swipe(20)).recommended_mode,
            OverallMode::Onboarding
        );
        assert_eq!(
            a.assess(&with_swipe(50)).recommended_mode,
            OverallMode::FullTraining
        );
        assert_eq!(
            a.assess(&with_swipe(1)).recommended_mode,
            OverallMode::Insufficient
        );
    }

    #[test]
    fn absent_modalities_not_assessed() {
        let a = assessor();
        let assessment = a.assess(&StandardizedData::default());
        assert!(assessment.swiping.is_none());
        assert!(assessment.typing.is_none());
        assert_eq!(assessment.overall_tier, ReadinessTier::Insufficient);
        assert_eq!(assessment.recommended_mode, OverallMode::Insufficient);
    }

    #[test]
    fn overall_tier_is_best_modality() {
        let a = assessor();
        let mut data = with_swipe(25);
        data.keystroke = KeystrokeSamples {
            hold_times: vec![150.0; 4],
            ..Default::default()
        };
        assert_eq!(a.assess(&data).overall_tier, ReadinessTier::Excellent);
    }
}
