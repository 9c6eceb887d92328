//! Engine configuration. One struct per modality holds that modality's
//! defaults, fallback ratios, soft ranges, and readiness thresholds so the
//! extractor and trainer are parameterized from a single place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory (baseline + pool artifacts)
    pub data_dir: PathBuf,
    /// Swipe modality parameters
    pub swipe: SwipeConfig,
    /// Keystroke modality parameters
    pub keystroke: KeystrokeConfig,
    /// Baseline training parameters
    pub training: TrainingConfig,
    /// Retraining pool parameters
    pub retrain: RetrainConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeConfig {
    /// Per-slot defaults: [speed_mean, speed_std, direction_mean,
    /// direction_std, acceleration_mean, acceleration_std]
    pub defaults: [f64; 6],
    /// Samples required before std is computed instead of estimated
    pub min_samples_for_std: usize,
    /// std ≈ ratio × mean when below min_samples_for_std
    pub speed_std_ratio: f64,
    pub speed_std_floor: f64,
    pub acceleration_std_ratio: f64,
    pub acceleration_std_floor: f64,
    /// Fixed direction std fallback (radians)
    pub direction_std_default: f64,
    /// Soft ranges (warn, never reject)
    pub speed_range: (f64, f64),
    pub direction_range: (f64, f64),
    pub acceleration_range: (f64, f64),
    /// Minimum raw samples for training
    pub min_training_samples: usize,
    /// Readiness tier floors: minimal / good / excellent
    pub readiness_tiers: (usize, usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystrokeConfig {
    /// Per-slot defaults: [hold_mean, hold_std, flight_mean, flight_std,
    /// backspace_rate, typing_speed]
    pub defaults: [f64; 6],
    pub min_samples_for_std: usize,
    pub hold_std_ratio: f64,
    pub hold_std_floor: f64,
    pub flight_std_ratio: f64,
    pub flight_std_floor: f64,
    /// Soft ranges (warn, never reject)
    pub hold_range: (f64, f64),
    pub flight_range: (f64, f64),
    pub backspace_range: (f64, f64),
    /// Hard clamp for typing speed (WPM), applied to observed and estimated
    pub typing_speed_clamp: (f64, f64),
    /// Estimated WPM when keystroke timings sum to zero
    pub typing_speed_fallback: f64,
    /// Assumed flight time per keystroke (ms) when flights are absent
    pub estimated_flight_ms: f64,
    pub min_training_samples: usize,
    pub readiness_tiers: (usize, usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Isolation forest size
    pub n_estimators: usize,
    /// RNG seed for deterministic fits
    pub seed: u64,
    /// Below this many rows, validate on the training set itself
    pub split_threshold: usize,
    /// Held-out fraction when splitting
    pub validation_fraction: f64,
    /// Contamination below lenient_below rows
    pub lenient_contamination: f64,
    pub default_contamination: f64,
    pub lenient_below: usize,
    /// Accepted train outlier rate windows
    pub onboarding_window: (f64, f64),
    pub retrain_window: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainConfig {
    /// Pool cap; oldest entries evicted on overflow
    pub max_pool_size: usize,
    /// Pool size required before any retrain fires
    pub min_samples_retrain: usize,
    /// Baseline staleness window (days)
    pub retrain_interval_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".veritouch"),
            swipe: SwipeConfig::default(),
            keystroke: KeystrokeConfig::default(),
            training: TrainingConfig::default(),
            retrain: RetrainConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            defaults: [1.0, 0.3, 1.5708, 0.5, 500.0, 150.0],
            min_samples_for_std: 3,
            speed_std_ratio: 0.2,
            speed_std_floor: 0.1,
            acceleration_std_ratio: 0.3,
            acceleration_std_floor: 50.0,
            direction_std_default: 0.5,
            speed_range: (0.0, 10.0),
            direction_range: (0.0, std::f64::consts::TAU),
            acceleration_range: (0.0, 1000.0),
            min_training_samples: 2,
            readiness_tiers: (2, 15, 25),
        }
    }
}

impl Default for KeystrokeConfig {
    fn default() -> Self {
        Self {
            defaults: [150.0, 25.0, 200.0, 30.0, 0.1, 60.0],
            min_samples_for_std: 3,
            hold_std_ratio: 0.15,
            hold_std_floor: 10.0,
            flight_std_ratio: 0.15,
            flight_std_floor: 15.0,
            hold_range: (0.0, 1000.0),
            flight_range: (0.0, 2000.0),
            backspace_range: (0.0, 1.0),
            typing_speed_clamp: (5.0, 200.0),
            typing_speed_fallback: 30.0,
            estimated_flight_ms: 100.0,
            min_training_samples: 3,
            readiness_tiers: (3, 20, 40),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            split_threshold: 10,
            validation_fraction: 0.2,
            lenient_contamination: 0.15,
            default_contamination: 0.1,
            lenient_below: 15,
            onboarding_window: (0.02, 0.3),
            retrain_window: (0.05, 0.2),
        }
    }
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 1000,
            min_samples_retrain: 50,
            retrain_interval_days: 7,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<EngineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
