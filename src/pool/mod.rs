//! Retraining pool: accumulates every scored session per user/modality and
//! decides when the baseline should be refreshed. Anomalous sessions are
//! kept alongside genuine ones; retraining simply refits on the recent pool.

use crate::config::RetrainConfig;
use crate::features::FEATURE_DIM;
use crate::model::{Baseline, BaselineMetadata};
use crate::risk::RiskCategory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// One scored session retained for future retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: Uuid,
    pub features: [f64; FEATURE_DIM],
    pub risk_category: RiskCategory,
    pub anomaly_score: f64,
    pub is_outlier: bool,
    pub timestamp: DateTime<Utc>,
}

impl PoolRecord {
    pub fn new(
        features: [f64; FEATURE_DIM],
        risk_category: RiskCategory,
        anomaly_score: f64,
        is_outlier: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            features,
            risk_category,
            anomaly_score,
            is_outlier,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, capped sequence of scored sessions for one (user, modality).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrainPool {
    pub records: Vec<PoolRecord>,
}

impl RetrainPool {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature rows for retraining; the trainer filters non-finite rows.
    pub fn feature_rows(&self) -> Vec<[f64; FEATURE_DIM]> {
        self.records.iter().map(|r| r.features).collect()
    }
}

/// Outcome of the pool-feedback step after a scored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    /// Session recorded; retraining not due yet
    NotNeeded { pool_size: usize },
    /// Baseline refreshed and swapped
    Retrained {
        pool_size: usize,
        metadata: BaselineMetadata,
    },
    /// Candidate rejected by validation; prior baseline kept, pool intact
    Rejected { pool_size: usize, reason: String },
}

pub struct PoolManager {
    config: RetrainConfig,
}

impl PoolManager {
    pub fn new(config: RetrainConfig) -> Self {
        Self { config }
    }

    /// Append a scored session. On overflow the oldest entries by timestamp
    /// are evicted so exactly `max_pool_size` remain.
    pub fn record(&self, pool: &mut RetrainPool, record: PoolRecord) {
        pool.records.push(record);
        if pool.records.len() > self.config.max_pool_size {
            pool.records.sort_by_key(|r| r.timestamp);
            let excess = pool.records.len() - self.config.max_pool_size;
            pool.records.drain(..excess);
        }
        debug!(pool_size = pool.records.len(), "session added to retrain pool");
    }

    /// Retrain when the pool has reached the minimum AND either the current
    /// baseline is stale or the pool size is an exact multiple of the
    /// threshold. The modulo rule gives periodic refreshes even for fresh
    /// baselines.
    pub fn should_retrain(
        &self,
        pool: &RetrainPool,
        baseline: Option<&Baseline>,
        now: DateTime<Utc>,
    ) -> bool {
        if pool.len() < self.config.min_samples_retrain {
            return false;
        }
        if let Some(b) = baseline {
            if b.age(now) > Duration::days(self.config.retrain_interval_days) {
                return true;
            }
        }
        pool.len() % self.config.min_samples_retrain == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_at(ts: DateTime<Utc>) -> PoolRecord {
        PoolRecord {
            id: Uuid::new_v4(),
            features: [1.0; FEATURE_DIM],
            risk_category: RiskCategory::Normal,
            anomaly_score: -0.05,
            is_outlier: false,
            timestamp: ts,
        }
    }

    #[test]
    fn cap_eviction_keeps_most_recent() {
        let manager = PoolManager::new(RetrainConfig {
            max_pool_size: 5,
            ..Default::default()
        });
        let mut pool = RetrainPool::default();
        let base = Utc::now();
        for i in 0..6 {
            manager.record(&mut pool, record_at(base + Duration::seconds(i)));
        }
        assert_eq!(pool.len(), 5);
        let oldest = pool.records.iter().map(|r| r.timestamp).min().unwrap();
        assert_eq!(oldest, base + Duration::seconds(1));
    }

    #[test]
    fn no_retrain_below_minimum() {
        let manager = PoolManager::new(RetrainConfig::default());
        let mut pool = RetrainPool::default();
        let base = Utc::now();
        for i in 0..49 {
            manager.record(&mut pool, record_at(base + Duration::seconds(i)));
        }
        assert!(!manager.should_retrain(&pool, None, Utc::now()));
    }

    #[test]
    fn modulo_trigger_fires_at_exact_threshold() {
        let manager = PoolManager::new(RetrainConfig::default());
        let mut pool = RetrainPool::default();
        let base = Utc::now();
        for i in 0..50 {
            manager.record(&mut pool, record_at(base + Duration::seconds(i)));
        }
        // Fires at exactly 50 even with no baseline at all
        assert!(manager.should_retrain(&pool, None, Utc::now()));
        manager.record(&mut pool, record_at(base + Duration::seconds(50)));
        assert!(!manager.should_retrain(&pool, None, Utc::now()));
    }

    #[test]
    fn staleness_trigger_independent_of_modulo() {
        use crate::config::TrainingConfig;
        use crate::features::Modality;
        use crate::model::{BaselineTrainer, TrainKind};

        let rows: Vec<[f64; FEATURE_DIM]> = (0..20)
            .map(|i| {
                let j = (i as f64 * 0.31).sin() * 0.05;
                [0.9 + j, 0.03, 1.4 + j, 0.5, 800.0, 240.0]
            })
            .collect();
        let mut baseline = BaselineTrainer::new(TrainingConfig::default())
            .train("u", Modality::Swipe, &rows, TrainKind::Onboarding)
            .unwrap();

        let manager = PoolManager::new(RetrainConfig::default());
        let mut pool = RetrainPool::default();
        let base = Utc::now();
        for i in 0..53 {
            manager.record(&mut pool, record_at(base + Duration::seconds(i)));
        }

        // 53 is not a multiple of 50, but a 7.5-day-old baseline is stale:
        // fractional days past the window must count, not just whole days
        baseline.metadata.training_date = Utc::now() - Duration::hours(180);
        assert!(manager.should_retrain(&pool, Some(&baseline), Utc::now()));
        // Exactly at the window boundary is not yet stale
        baseline.metadata.training_date = Utc::now() - Duration::days(7) + Duration::minutes(1);
        assert!(!manager.should_retrain(&pool, Some(&baseline), Utc::now()));
        baseline.metadata.training_date = Utc::now();
        assert!(!manager.should_retrain(&pool, Some(&baseline), Utc::now()));
    }
}
