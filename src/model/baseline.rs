//! Baseline lifecycle: fit scaler + estimator on a training split, validate
//! the train outlier rate against the accepted window, and only then hand
//! the candidate back for the atomic swap. Rejected candidates are dropped;
//! the caller keeps whatever baseline it had.

use super::{IsolationForest, StandardScaler};
use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::features::{Modality, FEATURE_DIM};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainKind {
    Onboarding,
    Retrain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetadata {
    pub user_id: String,
    pub modality: Modality,
    pub training_date: DateTime<Utc>,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub train_outlier_rate: f64,
    pub val_outlier_rate: f64,
    pub contamination: f64,
    pub kind: TrainKind,
}

/// A fitted per-user, per-modality anomaly model. Replaced whole on
/// retraining, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
    pub metadata: BaselineMetadata,
}

impl Baseline {
    /// Full-precision age; staleness checks compare durations so fractional
    /// days count.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.metadata.training_date
    }
}

pub struct BaselineTrainer {
    config: TrainingConfig,
}

impl BaselineTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Fit and validate a candidate baseline from feature rows. Returns the
    /// candidate only when the train outlier rate lands inside the window
    /// for `kind`; otherwise `ValidationRejected` and no state changes.
    pub fn train(
        &self,
        user_id: &str,
        modality: Modality,
        rows: &[[f64; FEATURE_DIM]],
        kind: TrainKind,
    ) -> Result<Baseline, EngineError> {
        let cfg = &self.config;

        let clean: Vec<[f64; FEATURE_DIM]> = rows
            .iter()
            .filter(|r| r.iter().all(|v| v.is_finite()))
            .copied()
            .collect();
        if clean.len() < rows.len() {
            warn!(
                modality = %modality,
                dropped = rows.len() - clean.len(),
                "dropped non-finite feature rows before training"
            );
        }
        if clean.len() < 2 {
            return Err(EngineError::InsufficientData {
                modality,
                needed: 2,
                got: clean.len(),
            });
        }

        let n = clean.len();
        let (train_rows, val_rows) = if n >= cfg.split_threshold {
            // Deterministic shuffled 80/20 split
            let mut indices: Vec<usize> = (0..n).collect();
            let mut rng = StdRng::seed_from_u64(cfg.seed);
            indices.shuffle(&mut rng);
            let n_val = ((n as f64 * cfg.validation_fraction).round() as usize).max(1);
            let (val_idx, train_idx) = indices.split_at(n_val);
            (
                train_idx.iter().map(|&i| clean[i]).collect::<Vec<_>>(),
                val_idx.iter().map(|&i| clean[i]).collect::<Vec<_>>(),
            )
        } else {
            // Too few rows for a held-out split; validate on the training set
            (clean.clone(), clean.clone())
        };

        let contamination = match kind {
            TrainKind::Retrain => cfg.default_contamination,
            TrainKind::Onboarding if n < cfg.lenient_below => cfg.lenient_contamination,
            TrainKind::Onboarding => cfg.default_contamination,
        };

        let train_x = to_matrix(&train_rows);
        let val_x = to_matrix(&val_rows);

        let scaler = StandardScaler::fit(train_x.view());
        let train_scaled = scaler.transform(train_x.view());
        let val_scaled = scaler.transform(val_x.view());

        let forest =
            IsolationForest::fit(train_scaled.view(), contamination, cfg.n_estimators, cfg.seed);

        let train_outlier_rate = forest.outlier_rate(train_scaled.view());
        let val_outlier_rate = forest.outlier_rate(val_scaled.view());

        let window = match kind {
            TrainKind::Onboarding => cfg.onboarding_window,
            TrainKind::Retrain => cfg.retrain_window,
        };
        if train_outlier_rate < window.0 || train_outlier_rate > window.1 {
            warn!(
                user_id,
                modality = %modality,
                train_outlier_rate,
                "candidate baseline rejected"
            );
            return Err(EngineError::ValidationRejected {
                modality,
                train_outlier_rate,
                window,
            });
        }

        let metadata = BaselineMetadata {
            user_id: user_id.to_string(),
            modality,
            training_date: Utc::now(),
            training_samples: train_rows.len(),
            validation_samples: val_rows.len(),
            train_outlier_rate: round4(train_outlier_rate),
            val_outlier_rate: round4(val_outlier_rate),
            contamination,
            kind,
        };
        info!(
            user_id,
            modality = %modality,
            training_samples = metadata.training_samples,
            train_outlier_rate = metadata.train_outlier_rate,
            "baseline trained"
        );

        Ok(Baseline {
            scaler,
            forest,
            metadata,
        })
    }
}

fn to_matrix(rows: &[[f64; FEATURE_DIM]]) -> Array2<f64> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), FEATURE_DIM), flat)
        .unwrap_or_else(|_| Array2::zeros((0, FEATURE_DIM)))
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<[f64; FEATURE_DIM]> {
        (0..n)
            .map(|i| {
                let j = (i as f64 * 0.31).sin() * 0.05;
                [
                    0.93 + j,
                    0.03 + j.abs() * 0.1,
                    1.39 + j,
                    0.5,
                    812.0 + j * 40.0,
                    243.0 + j * 10.0,
                ]
            })
            .collect()
    }

    #[test]
    fn onboarding_training_accepts_typical_data() {
        let trainer = BaselineTrainer::new(TrainingConfig::default());
        let baseline = trainer
            .train("u1", Modality::Swipe, &rows(20), TrainKind::Onboarding)
            .unwrap();
        let m = &baseline.metadata;
        assert!(m.train_outlier_rate >= 0.02 && m.train_outlier_rate <= 0.3);
        assert_eq!(m.contamination, 0.1);
        assert_eq!(m.training_samples + m.validation_samples, 20);
        assert_eq!(m.kind, TrainKind::Onboarding);
    }

    #[test]
    fn small_sets_use_lenient_contamination_and_no_split() {
        let trainer = BaselineTrainer::new(TrainingConfig::default());
        let baseline = trainer
            .train("u1", Modality::Swipe, &rows(8), TrainKind::Onboarding)
            .unwrap();
        let m = &baseline.metadata;
        assert_eq!(m.contamination, 0.15);
        // Validated against the training set itself
        assert_eq!(m.training_samples, 8);
        assert_eq!(m.validation_samples, 8);
    }

    #[test]
    fn rejection_outside_window() {
        let config = TrainingConfig {
            onboarding_window: (0.0, 0.0001),
            ..Default::default()
        };
        let trainer = BaselineTrainer::new(config);
        let err = trainer
            .train("u1", Modality::Swipe, &rows(20), TrainKind::Onboarding)
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationRejected { .. }));
    }

    #[test]
    fn non_finite_rows_filtered() {
        let mut data = rows(15);
        data.push([f64::NAN; FEATURE_DIM]);
        let trainer = BaselineTrainer::new(TrainingConfig::default());
        let baseline = trainer
            .train("u1", Modality::Swipe, &data, TrainKind::Onboarding)
            .unwrap();
        assert_eq!(
            baseline.metadata.training_samples + baseline.metadata.validation_samples,
            15
        );
    }

    #[test]
    fn too_few_rows_is_insufficient() {
        let trainer = BaselineTrainer::new(TrainingConfig::default());
        let err = trainer
            .train("u1", Modality::Swipe, &rows(1), TrainKind::Onboarding)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }
}
