//! Per-user anomaly model: standardization transform, isolation forest
//! estimator, and the train/validate/swap baseline lifecycle.

mod baseline;
mod forest;
mod scaler;

pub use baseline::{Baseline, BaselineMetadata, BaselineTrainer, TrainKind};
pub use forest::IsolationForest;
pub use scaler::StandardScaler;
