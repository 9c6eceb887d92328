//! Engine orchestration: wires the standardizer, extractor, trainer, scorer,
//! pool, and store into the two public operations — train a user's baselines
//! from raw telemetry, and score a live session against them.
//!
//! State is keyed by (user, modality). Each key gets its own lock, so one
//! user's retrain never blocks another user's scoring. Baselines are swapped
//! whole: a candidate that fails validation leaves the prior baseline and
//! pool untouched.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::{
    ExtractionMode, FeatureExtractor, Modality, ReadinessAssessment, ReadinessAssessor, FEATURE_DIM,
};
use crate::model::{BaselineMetadata, BaselineTrainer, TrainKind};
use crate::pool::{PoolManager, PoolRecord, RetrainOutcome, RetrainPool};
use crate::risk::{RiskCategory, RiskInterpreter, RiskScore};
use crate::standardize::{KeystrokeSamples, Standardizer, SwipeSamples};
use crate::storage::ArtifactStore;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct TrainRequest {
    pub user_id: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub user_id: String,
    pub data: Map<String, Value>,
}

/// Per-modality training result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainOutcome {
    Trained { metadata: BaselineMetadata },
    Failed { error: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swiping: Option<TrainOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typing: Option<TrainOutcome>,
    pub readiness: ReadinessAssessment,
    pub summary: TrainSummary,
    pub warnings: Vec<String>,
}

/// One scored modality plus the pool-feedback outcome that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct ModalityPrediction {
    pub score: RiskScore,
    pub retrain: RetrainOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swiping: Option<ModalityPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typing: Option<ModalityPrediction>,
    /// Most severe category across scored modalities
    pub overall_risk: RiskCategory,
    /// Mean confidence across scored modalities, [0, 100]
    pub confidence: f64,
    pub warnings: Vec<String>,
}

/// In-memory state for one (user, modality): the current baseline, if any,
/// and its retrain pool.
#[derive(Default)]
struct Slot {
    baseline: Option<crate::model::Baseline>,
    pool: RetrainPool,
}

type SlotKey = (String, Modality);

pub struct RiskEngine {
    config: EngineConfig,
    store: ArtifactStore,
    standardizer: Standardizer,
    extractor: FeatureExtractor,
    assessor: ReadinessAssessor,
    trainer: BaselineTrainer,
    interpreter: RiskInterpreter,
    pool_manager: PoolManager,
    slots: RwLock<HashMap<SlotKey, Arc<RwLock<Slot>>>>,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let store = ArtifactStore::open(&config.data_dir)?;
        let extractor = FeatureExtractor::new(config.swipe.clone(), config.keystroke.clone());
        let assessor = ReadinessAssessor::new(&config.swipe, &config.keystroke);
        let trainer = BaselineTrainer::new(config.training.clone());
        let interpreter = RiskInterpreter::new(config.swipe.clone(), config.keystroke.clone());
        let pool_manager = PoolManager::new(config.retrain.clone());
        Ok(Self {
            config,
            store,
            standardizer: Standardizer::new(),
            extractor,
            assessor,
            trainer,
            interpreter,
            pool_manager,
            slots: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Train baselines for every modality present in the request data.
    /// Partial success is normal: one modality can train while the other
    /// fails, and each outcome is reported separately.
    pub fn train(&self, request: &TrainRequest) -> Result<TrainResponse, EngineError> {
        let data = self.standardizer.standardize(&request.data);
        let readiness = self.assessor.assess(&data);
        let mut warnings = data.warnings.clone();

        let swiping = (!data.swipe.is_empty()).then(|| {
            self.train_modality(
                &request.user_id,
                Modality::Swipe,
                &self.expand_swipe_rows(&data.swipe),
                data.swipe.sample_count(),
                self.config.swipe.min_training_samples,
                &mut warnings,
            )
        });
        let typing = (!data.keystroke.is_empty()).then(|| {
            self.train_modality(
                &request.user_id,
                Modality::Keystroke,
                &self.expand_keystroke_rows(&data.keystroke),
                data.keystroke.sample_count(),
                self.config.keystroke.min_training_samples,
                &mut warnings,
            )
        });

        let attempted = swiping.iter().count() + typing.iter().count();
        let succeeded = [&swiping, &typing]
            .into_iter()
            .flatten()
            .filter(|o| matches!(o, TrainOutcome::Trained { .. }))
            .count();
        let summary = TrainSummary {
            attempted,
            succeeded,
            success_rate: if attempted == 0 {
                0.0
            } else {
                succeeded as f64 / attempted as f64
            },
        };
        info!(
            user_id = %request.user_id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            "training request processed"
        );

        Ok(TrainResponse {
            user_id: request.user_id.clone(),
            swiping,
            typing,
            readiness,
            summary,
            warnings,
        })
    }

    /// Score a live session. Every modality present in the data must have a
    /// trained baseline; a missing baseline fails the whole request before
    /// any pool is touched.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, EngineError> {
        let data = self.standardizer.standardize(&request.data);
        let mut warnings = data.warnings.clone();

        let mut sessions: Vec<(Modality, [f64; FEATURE_DIM])> = Vec::new();
        if !data.swipe.is_empty() {
            let fv = self
                .extractor
                .extract_swipe(&data.swipe, ExtractionMode::SingleEvent);
            sessions.push((Modality::Swipe, fv.values));
        }
        if !data.keystroke.is_empty() {
            let fv = self
                .extractor
                .extract_keystroke(&data.keystroke, ExtractionMode::SingleEvent);
            sessions.push((Modality::Keystroke, fv.values));
        }
        if sessions.is_empty() {
            return Err(EngineError::Structural(
                "no recognized behavioral data in request".to_string(),
            ));
        }

        // Baseline presence is checked for all requested modalities before
        // any state changes, so a missing model leaves every pool intact.
        let slots: Vec<(Modality, Arc<RwLock<Slot>>, [f64; FEATURE_DIM])> = sessions
            .into_iter()
            .map(|(modality, values)| {
                let slot = self.slot(&request.user_id, modality)?;
                Ok((modality, slot, values))
            })
            .collect::<Result<_, EngineError>>()?;
        for (modality, slot, _) in &slots {
            if slot.read().baseline.is_none() {
                return Err(EngineError::ModelNotFound {
                    user_id: request.user_id.clone(),
                    modality: *modality,
                });
            }
        }

        let mut swiping = None;
        let mut typing = None;
        for (modality, slot, values) in slots {
            let prediction =
                self.score_and_record(&request.user_id, modality, &slot, &values, &mut warnings)?;
            match modality {
                Modality::Swipe => swiping = Some(prediction),
                Modality::Keystroke => typing = Some(prediction),
            }
        }

        let scored: Vec<&ModalityPrediction> =
            [&swiping, &typing].into_iter().flatten().collect();
        let overall_risk = scored
            .iter()
            .map(|p| p.score.risk_category)
            .max()
            .unwrap_or(RiskCategory::Normal);
        let confidence = scored.iter().map(|p| p.score.confidence).sum::<f64>()
            / scored.len() as f64;

        Ok(PredictResponse {
            user_id: request.user_id.clone(),
            swiping,
            typing,
            overall_risk,
            confidence: (confidence * 100.0).round() / 100.0,
            warnings,
        })
    }

    fn train_modality(
        &self,
        user_id: &str,
        modality: Modality,
        rows: &[[f64; FEATURE_DIM]],
        sample_count: usize,
        min_samples: usize,
        warnings: &mut Vec<String>,
    ) -> TrainOutcome {
        if sample_count < min_samples {
            let err = EngineError::InsufficientData {
                modality,
                needed: min_samples,
                got: sample_count,
            };
            return TrainOutcome::Failed {
                error: err.kind(),
                message: err.to_string(),
            };
        }
        for row in rows {
            warnings.extend(self.interpreter.soft_range_warnings(modality, row));
        }

        match self
            .trainer
            .train(user_id, modality, rows, TrainKind::Onboarding)
        {
            Ok(baseline) => {
                if let Err(e) = self.store.save_baseline(&baseline) {
                    return TrainOutcome::Failed {
                        error: e.kind(),
                        message: e.to_string(),
                    };
                }
                let metadata = baseline.metadata.clone();
                match self.slot(user_id, modality) {
                    Ok(slot) => slot.write().baseline = Some(baseline),
                    Err(e) => {
                        return TrainOutcome::Failed {
                            error: e.kind(),
                            message: e.to_string(),
                        }
                    }
                }
                TrainOutcome::Trained { metadata }
            }
            Err(e) => TrainOutcome::Failed {
                error: e.kind(),
                message: e.to_string(),
            },
        }
    }

    fn score_and_record(
        &self,
        user_id: &str,
        modality: Modality,
        slot: &Arc<RwLock<Slot>>,
        values: &[f64; FEATURE_DIM],
        warnings: &mut Vec<String>,
    ) -> Result<ModalityPrediction, EngineError> {
        let mut guard = slot.write();
        let baseline = guard
            .baseline
            .as_ref()
            .ok_or_else(|| EngineError::ModelNotFound {
                user_id: user_id.to_string(),
                modality,
            })?;
        let score = self.interpreter.score(baseline, modality, values)?;

        self.pool_manager.record(
            &mut guard.pool,
            PoolRecord::new(*values, score.risk_category, score.anomaly_score, score.is_outlier),
        );

        let retrain = if self
            .pool_manager
            .should_retrain(&guard.pool, guard.baseline.as_ref(), Utc::now())
        {
            match self.trainer.train(
                user_id,
                modality,
                &guard.pool.feature_rows(),
                TrainKind::Retrain,
            ) {
                Ok(fresh) => {
                    self.store.save_baseline(&fresh)?;
                    let metadata = fresh.metadata.clone();
                    guard.baseline = Some(fresh);
                    info!(user_id, modality = %modality, "baseline retrained from pool");
                    RetrainOutcome::Retrained {
                        pool_size: guard.pool.len(),
                        metadata,
                    }
                }
                Err(e) => {
                    // Prior baseline and pool stay as they were.
                    warn!(user_id, modality = %modality, error = %e, "retrain rejected");
                    warnings.push(format!("{modality} retrain rejected: {e}"));
                    RetrainOutcome::Rejected {
                        pool_size: guard.pool.len(),
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            RetrainOutcome::NotNeeded {
                pool_size: guard.pool.len(),
            }
        };

        self.store.save_pool(user_id, modality, &guard.pool)?;
        Ok(ModalityPrediction { score, retrain })
    }

    /// Each raw onboarding sample becomes one feature row, so the model
    /// trains on per-event vectors rather than one aggregate.
    fn expand_swipe_rows(&self, samples: &SwipeSamples) -> Vec<[f64; FEATURE_DIM]> {
        (0..samples.sample_count())
            .map(|i| {
                let single = SwipeSamples {
                    distances: pick(&samples.distances, i),
                    durations: pick(&samples.durations, i),
                    speeds: pick(&samples.speeds, i),
                    directions: pick(&samples.directions, i),
                    accelerations: pick(&samples.accelerations, i),
                };
                self.extractor
                    .extract_swipe(&single, ExtractionMode::Batch)
                    .values
            })
            .collect()
    }

    fn expand_keystroke_rows(&self, samples: &KeystrokeSamples) -> Vec<[f64; FEATURE_DIM]> {
        (0..samples.sample_count())
            .map(|i| {
                let single = KeystrokeSamples {
                    hold_times: pick(&samples.hold_times, i),
                    flight_times: pick(&samples.flight_times, i),
                    backspace_rates: pick(&samples.backspace_rates, i),
                    typing_speeds: pick(&samples.typing_speeds, i),
                };
                self.extractor
                    .extract_keystroke(&single, ExtractionMode::Batch)
                    .values
            })
            .collect()
    }

    /// Fetch or lazily load the state slot for one (user, modality).
    fn slot(&self, user_id: &str, modality: Modality) -> Result<Arc<RwLock<Slot>>, EngineError> {
        let key = (user_id.to_string(), modality);
        if let Some(slot) = self.slots.read().get(&key) {
            return Ok(slot.clone());
        }
        let mut map = self.slots.write();
        if let Some(slot) = map.get(&key) {
            return Ok(slot.clone());
        }
        let slot = Arc::new(RwLock::new(Slot {
            baseline: self.store.load_baseline(user_id, modality)?,
            pool: self.store.load_pool(user_id, modality)?,
        }));
        map.insert(key, slot.clone());
        Ok(slot)
    }
}

fn pick(values: &[f64], i: usize) -> Vec<f64> {
    values.get(i).copied().into_iter().collect()
}
