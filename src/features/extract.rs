//! Feature extraction: canonical sample arrays → fixed 6-dim vectors.
//!
//! Two modes: batch (onboarding-style arrays) and single-event (real-time,
//! most recent value per field). Standard deviation is only computed from
//! three or more samples; below that it is estimated as a fixed ratio of the
//! mean, floored per field. Every output slot is guaranteed finite.

use super::{FeatureVector, Modality, FEATURE_DIM};
use crate::config::{KeystrokeConfig, SwipeConfig};
use crate::standardize::{KeystrokeSamples, SwipeSamples};
use std::f64::consts::TAU;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Onboarding arrays: mean over all samples, std when n ≥ 3
    Batch,
    /// Real-time: most recent value per field, estimated std
    SingleEvent,
}

pub struct FeatureExtractor {
    swipe: SwipeConfig,
    keystroke: KeystrokeConfig,
}

impl FeatureExtractor {
    pub fn new(swipe: SwipeConfig, keystroke: KeystrokeConfig) -> Self {
        Self { swipe, keystroke }
    }

    /// Extract swipe features. Never fails; missing fields fall back to the
    /// configured defaults.
    pub fn extract_swipe(&self, samples: &SwipeSamples, mode: ExtractionMode) -> FeatureVector {
        let cfg = &self.swipe;
        let mut values = match mode {
            ExtractionMode::Batch => self.swipe_batch(samples),
            ExtractionMode::SingleEvent => self.swipe_single(samples),
        };
        finalize(Modality::Swipe, &mut values, &cfg.defaults);
        FeatureVector::new(Modality::Swipe, values)
    }

    /// Extract keystroke features. Never fails.
    pub fn extract_keystroke(
        &self,
        samples: &KeystrokeSamples,
        mode: ExtractionMode,
    ) -> FeatureVector {
        let cfg = &self.keystroke;
        let mut values = match mode {
            ExtractionMode::Batch => self.keystroke_batch(samples),
            ExtractionMode::SingleEvent => self.keystroke_single(samples),
        };
        finalize(Modality::Keystroke, &mut values, &cfg.defaults);
        FeatureVector::new(Modality::Keystroke, values)
    }

    fn swipe_batch(&self, samples: &SwipeSamples) -> [f64; FEATURE_DIM] {
        let cfg = &self.swipe;
        let speeds = &samples.speeds;
        let directions = normalize_directions(&samples.directions);
        let accelerations = &samples.accelerations;

        if speeds.is_empty() && directions.is_empty() && accelerations.is_empty() {
            warn!("no swipe data available, using defaults");
            return cfg.defaults;
        }

        let mut v = cfg.defaults;

        if !speeds.is_empty() {
            v[0] = mean(speeds);
            v[1] = if speeds.len() >= cfg.min_samples_for_std {
                std_dev(speeds)
            } else {
                (v[0] * cfg.speed_std_ratio).max(cfg.speed_std_floor)
            };
        }

        if !directions.is_empty() {
            v[2] = mean(&directions);
            v[3] = if directions.len() >= cfg.min_samples_for_std {
                std_dev(&directions)
            } else {
                cfg.direction_std_default
            };
        }

        if !accelerations.is_empty() {
            v[4] = mean(accelerations);
            v[5] = if accelerations.len() >= cfg.min_samples_for_std {
                std_dev(accelerations)
            } else {
                (v[4] * cfg.acceleration_std_ratio).max(cfg.acceleration_std_floor)
            };
        }

        v
    }

    fn swipe_single(&self, samples: &SwipeSamples) -> [f64; FEATURE_DIM] {
        let cfg = &self.swipe;
        let mut v = cfg.defaults;

        if let Some(&speed) = samples.speeds.last() {
            v[0] = speed;
            v[1] = (speed * cfg.speed_std_ratio).max(cfg.speed_std_floor);
        }
        if let Some(&direction) = samples.directions.last() {
            v[2] = degrees_to_radians_if_needed(direction);
            v[3] = cfg.direction_std_default;
        }
        if let Some(&acceleration) = samples.accelerations.last() {
            v[4] = acceleration;
            v[5] = (acceleration * cfg.acceleration_std_ratio).max(cfg.acceleration_std_floor);
        }

        v
    }

    fn keystroke_batch(&self, samples: &KeystrokeSamples) -> [f64; FEATURE_DIM] {
        let cfg = &self.keystroke;

        if samples.is_empty() {
            warn!("no keystroke data available, using defaults");
            return cfg.defaults;
        }

        let mut v = cfg.defaults;

        if !samples.hold_times.is_empty() {
            v[0] = mean(&samples.hold_times);
            v[1] = if samples.hold_times.len() >= cfg.min_samples_for_std {
                std_dev(&samples.hold_times)
            } else {
                (v[0] * cfg.hold_std_ratio).max(cfg.hold_std_floor)
            };
        }

        if !samples.flight_times.is_empty() {
            v[2] = mean(&samples.flight_times);
            v[3] = if samples.flight_times.len() >= cfg.min_samples_for_std {
                std_dev(&samples.flight_times)
            } else {
                (v[2] * cfg.flight_std_ratio).max(cfg.flight_std_floor)
            };
        }

        // Rates are often cumulative; the latest observation wins.
        if let Some(&rate) = samples.backspace_rates.last() {
            v[4] = rate.clamp(cfg.backspace_range.0, cfg.backspace_range.1);
        }

        v[5] = match samples.typing_speeds.last() {
            Some(&speed) => speed.clamp(cfg.typing_speed_clamp.0, cfg.typing_speed_clamp.1),
            None => self.estimate_typing_speed(&samples.hold_times, &samples.flight_times),
        };

        v
    }

    fn keystroke_single(&self, samples: &KeystrokeSamples) -> [f64; FEATURE_DIM] {
        let cfg = &self.keystroke;
        let mut v = cfg.defaults;

        if let Some(&hold) = samples.hold_times.last() {
            v[0] = hold;
            v[1] = (hold * cfg.hold_std_ratio).max(cfg.hold_std_floor);
        }
        if let Some(&flight) = samples.flight_times.last() {
            v[2] = flight;
            v[3] = (flight * cfg.flight_std_ratio).max(cfg.flight_std_floor);
        }
        if let Some(&rate) = samples.backspace_rates.last() {
            v[4] = rate;
        }
        if let Some(&speed) = samples.typing_speeds.last() {
            v[5] = speed;
        }

        v
    }

    /// Words-per-minute estimate from raw keystroke timings, used only when
    /// no explicit speed samples exist. Assumes 5 characters per word and
    /// 100ms flight per keystroke when flights are absent.
    fn estimate_typing_speed(&self, hold_times: &[f64], flight_times: &[f64]) -> f64 {
        let cfg = &self.keystroke;
        if hold_times.is_empty() {
            return cfg.defaults[5];
        }

        let keystrokes = hold_times.len() as f64;
        let total_time_ms = if flight_times.is_empty() {
            hold_times.iter().sum::<f64>() + keystrokes * cfg.estimated_flight_ms
        } else {
            hold_times.iter().sum::<f64>() + flight_times.iter().sum::<f64>()
        };

        if total_time_ms <= 0.0 {
            return cfg.typing_speed_fallback;
        }

        let chars_per_minute = (keystrokes / total_time_ms) * 60_000.0;
        let wpm = chars_per_minute / 5.0;
        wpm.clamp(cfg.typing_speed_clamp.0, cfg.typing_speed_clamp.1)
    }
}

/// Directions above 2π are taken to be degrees and converted.
fn normalize_directions(directions: &[f64]) -> Vec<f64> {
    let max = directions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !directions.is_empty() && max > TAU {
        directions.iter().map(|d| d.to_radians()).collect()
    } else {
        directions.to_vec()
    }
}

fn degrees_to_radians_if_needed(direction: f64) -> f64 {
    if direction > TAU {
        direction.to_radians()
    } else {
        direction
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0).
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Postcondition: replace any non-finite slot with the modality default.
fn finalize(modality: Modality, values: &mut [f64; FEATURE_DIM], defaults: &[f64; FEATURE_DIM]) {
    for (i, value) in values.iter_mut().enumerate() {
        if !value.is_finite() {
            warn!(
                modality = %modality,
                feature = modality.feature_names()[i],
                "non-finite feature value, using default"
            );
            *value = defaults[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeystrokeConfig, SwipeConfig};

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(SwipeConfig::default(), KeystrokeConfig::default())
    }

    #[test]
    fn batch_swipe_three_samples_computes_std() {
        let samples = SwipeSamples {
            speeds: vec![0.9, 0.98, 0.93],
            ..Default::default()
        };
        let fv = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert!((fv.values[0] - 0.9366666).abs() < 1e-4);
        // Computed population std, not the ratio fallback
        let expected = std_dev(&[0.9, 0.98, 0.93]);
        assert!((fv.values[1] - expected).abs() < 1e-12);
        // Direction and acceleration fall back to defaults
        assert_eq!(fv.values[2], 1.5708);
        assert_eq!(fv.values[3], 0.5);
        assert_eq!(fv.values[4], 500.0);
        assert_eq!(fv.values[5], 150.0);
    }

    #[test]
    fn batch_swipe_two_samples_uses_ratio_std() {
        let samples = SwipeSamples {
            speeds: vec![0.9, 1.1],
            ..Default::default()
        };
        let fv = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert!((fv.values[0] - 1.0).abs() < 1e-12);
        assert!((fv.values[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_sample_does_not_panic_and_uses_ratio_std() {
        let samples = SwipeSamples {
            speeds: vec![1.2],
            accelerations: vec![750.0],
            ..Default::default()
        };
        let fv = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert!((fv.values[0] - 1.2).abs() < 1e-12);
        assert!((fv.values[1] - 0.24).abs() < 1e-12);
        assert!((fv.values[5] - 225.0).abs() < 1e-12);
        assert!(fv.is_finite());
    }

    #[test]
    fn degrees_converted_to_radians() {
        let samples = SwipeSamples {
            directions: vec![79.3, 80.1, 79.8],
            ..Default::default()
        };
        let fv = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert!(fv.values[2] < TAU);
        assert!((fv.values[2] - (79.3f64 + 80.1 + 79.8).to_radians() / 3.0).abs() < 1e-9);
    }

    #[test]
    fn extraction_is_deterministic() {
        let samples = SwipeSamples {
            speeds: vec![0.9, 0.98, 0.93],
            directions: vec![1.1, 1.3, 1.2],
            accelerations: vec![800.0, 810.0, 790.0],
            ..Default::default()
        };
        let a = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        let b = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert_eq!(a, b);
    }

    #[test]
    fn keystroke_estimates_wpm_when_speeds_absent() {
        let samples = KeystrokeSamples {
            hold_times: vec![183.0, 218.0, 199.0],
            ..Default::default()
        };
        let fv = extractor().extract_keystroke(&samples, ExtractionMode::Batch);
        assert!((fv.values[0] - 200.0).abs() < 1e-9);
        let expected_std = std_dev(&[183.0, 218.0, 199.0]);
        assert!((fv.values[1] - expected_std).abs() < 1e-12);
        // 3 keystrokes over 600ms hold + 300ms estimated flight
        let total: f64 = 183.0 + 218.0 + 199.0 + 3.0 * 100.0;
        let expected_wpm = ((3.0 / total) * 60_000.0 / 5.0).clamp(5.0, 200.0);
        assert!((fv.values[5] - expected_wpm).abs() < 1e-9);
    }

    #[test]
    fn wpm_fallback_when_total_time_zero() {
        let samples = KeystrokeSamples {
            hold_times: vec![0.0, 0.0],
            flight_times: vec![0.0, 0.0],
            ..Default::default()
        };
        let fv = extractor().extract_keystroke(&samples, ExtractionMode::Batch);
        assert_eq!(fv.values[5], 30.0);
    }

    #[test]
    fn non_finite_values_replaced_with_defaults() {
        let samples = SwipeSamples {
            speeds: vec![f64::NAN],
            accelerations: vec![f64::INFINITY],
            ..Default::default()
        };
        let fv = extractor().extract_swipe(&samples, ExtractionMode::Batch);
        assert!(fv.is_finite());
        assert_eq!(fv.values[0], 1.0);
        assert_eq!(fv.values[4], 500.0);
    }

    #[test]
    fn single_event_takes_latest_values() {
        let samples = KeystrokeSamples {
            hold_times: vec![150.0, 190.0],
            backspace_rates: vec![0.05, 0.2],
            typing_speeds: vec![55.0, 62.0],
            ..Default::default()
        };
        let fv = extractor().extract_keystroke(&samples, ExtractionMode::SingleEvent);
        assert_eq!(fv.values[0], 190.0);
        assert!((fv.values[1] - 190.0 * 0.15).abs() < 1e-12);
        assert_eq!(fv.values[4], 0.2);
        assert_eq!(fv.values[5], 62.0);
    }
}
