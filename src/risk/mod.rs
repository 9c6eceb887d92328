//! Risk interpretation of raw anomaly scores.

mod interpreter;

pub use interpreter::{Contribution, FeatureContribution, RiskCategory, RiskInterpreter, RiskScore};
