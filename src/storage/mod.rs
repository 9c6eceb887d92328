//! Flat-file persistence for baselines and retrain pools. One JSON artifact
//! per (user, modality); writes go to a temp file in the same directory and
//! are swapped in with a rename, so readers only ever see a complete
//! artifact.

use crate::error::EngineError;
use crate::features::Modality;
use crate::model::Baseline;
use crate::pool::RetrainPool;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the artifact directory.
    pub fn open(root: &Path) -> Result<Self, EngineError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn baseline_path(&self, user_id: &str, modality: Modality) -> PathBuf {
        self.root
            .join(format!("{}_{}_baseline.json", safe(user_id), modality.as_str()))
    }

    fn pool_path(&self, user_id: &str, modality: Modality) -> PathBuf {
        self.root
            .join(format!("{}_{}_pool.json", safe(user_id), modality.as_str()))
    }

    pub fn load_baseline(
        &self,
        user_id: &str,
        modality: Modality,
    ) -> Result<Option<Baseline>, EngineError> {
        let path = self.baseline_path(user_id, modality);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Persist a validated baseline. The prior artifact, if any, stays in
    /// place until the rename lands.
    pub fn save_baseline(&self, baseline: &Baseline) -> Result<(), EngineError> {
        let path = self.baseline_path(&baseline.metadata.user_id, baseline.metadata.modality);
        let data = serde_json::to_vec(baseline)?;
        write_atomic(&path, &data)?;
        debug!(
            user_id = %baseline.metadata.user_id,
            modality = %baseline.metadata.modality,
            path = %path.display(),
            "baseline persisted"
        );
        Ok(())
    }

    /// Missing pool artifact reads as an empty pool.
    pub fn load_pool(&self, user_id: &str, modality: Modality) -> Result<RetrainPool, EngineError> {
        let path = self.pool_path(user_id, modality);
        if !path.exists() {
            return Ok(RetrainPool::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save_pool(
        &self,
        user_id: &str,
        modality: Modality,
        pool: &RetrainPool,
    ) -> Result<(), EngineError> {
        let path = self.pool_path(user_id, modality);
        let data = serde_json::to_vec(pool)?;
        write_atomic(&path, &data)
    }

    pub fn has_baseline(&self, user_id: &str, modality: Modality) -> bool {
        self.baseline_path(user_id, modality).exists()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), EngineError> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    fs::write(&tmp, data)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

/// Keep artifact names filesystem-safe regardless of user id content.
fn safe(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::features::FEATURE_DIM;
    use crate::model::{BaselineTrainer, TrainKind};
    use crate::pool::PoolRecord;
    use crate::risk::RiskCategory;

    fn fitted_baseline(user: &str) -> Baseline {
        let rows: Vec<[f64; FEATURE_DIM]> = (0..20)
            .map(|i| {
                let j = (i as f64 * 0.31).sin() * 0.05;
                [0.9 + j, 0.03, 1.4 + j, 0.5, 800.0, 240.0]
            })
            .collect();
        BaselineTrainer::new(TrainingConfig::default())
            .train(user, Modality::Swipe, &rows, TrainKind::Onboarding)
            .unwrap()
    }

    #[test]
    fn baseline_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let baseline = fitted_baseline("alice");

        assert!(store.load_baseline("alice", Modality::Swipe).unwrap().is_none());
        store.save_baseline(&baseline).unwrap();
        let loaded = store
            .load_baseline("alice", Modality::Swipe)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.metadata.user_id, "alice");
        assert_eq!(
            loaded.metadata.train_outlier_rate,
            baseline.metadata.train_outlier_rate
        );
        // Loaded forest scores identically
        let row = baseline.scaler.transform_row(&[0.9, 0.03, 1.4, 0.5, 800.0, 240.0]);
        assert_eq!(loaded.forest.score_row(&row), baseline.forest.score_row(&row));
    }

    #[test]
    fn missing_pool_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let pool = store.load_pool("bob", Modality::Keystroke).unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn pool_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let mut pool = RetrainPool::default();
        pool.records.push(PoolRecord::new(
            [1.0; FEATURE_DIM],
            RiskCategory::Normal,
            -0.05,
            false,
        ));
        store.save_pool("bob", Modality::Keystroke, &pool).unwrap();
        let loaded = store.load_pool("bob", Modality::Keystroke).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records[0].id, pool.records[0].id);
    }

    #[test]
    fn artifacts_isolated_per_user_and_modality() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        store.save_baseline(&fitted_baseline("alice")).unwrap();
        assert!(store.has_baseline("alice", Modality::Swipe));
        assert!(!store.has_baseline("alice", Modality::Keystroke));
        assert!(!store.has_baseline("mallory", Modality::Swipe));
    }

    #[test]
    fn unsafe_user_ids_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let baseline = fitted_baseline("../../etc/passwd");
        store.save_baseline(&baseline).unwrap();
        assert!(store
            .load_baseline("../../etc/passwd", Modality::Swipe)
            .unwrap()
            .is_some());
        // Nothing escaped the artifact root
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            assert!(entry.unwrap().path().is_file());
        }
    }
}
