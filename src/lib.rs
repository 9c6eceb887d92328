//! VeriTouch Engine — continuous behavioral-biometric risk scoring.
//!
//! Modular structure:
//! - [`standardize`] — Heterogeneous telemetry → canonical sample arrays
//! - [`features`] — Statistical feature extraction and readiness assessment
//! - [`model`] — Per-user isolation-forest baselines with scaling
//! - [`risk`] — Anomaly score interpretation into risk categories
//! - [`pool`] — Retraining pool and online retrain triggers
//! - [`storage`] — Flat JSON baseline/pool artifacts
//! - [`engine`] — Train/predict orchestration
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod pool;
pub mod risk;
pub mod standardize;
pub mod storage;

pub use config::EngineConfig;
pub use engine::{PredictRequest, PredictResponse, RiskEngine, TrainRequest, TrainResponse};
pub use error::EngineError;
pub use features::{FeatureExtractor, FeatureVector, Modality};
pub use logging::StructuredLogger;
pub use model::{Baseline, BaselineTrainer};
pub use risk::{RiskCategory, RiskInterpreter, RiskScore};
pub use standardize::Standardizer;
pub use storage::ArtifactStore;
