//! Data standardizer: maps heterogeneous caller field names and shapes into
//! canonical per-modality sample arrays. Pure aside from warning collection;
//! never fails. Unrecognized fields pass through untouched.

use serde_json::{Map, Value};
use tracing::warn;

/// Caller field name → canonical swipe field.
const SWIPE_FIELDS: [(&str, SwipeField); 5] = [
    ("swipeDistances", SwipeField::Distances),
    ("swipeDurations", SwipeField::Durations),
    ("swipeSpeeds", SwipeField::Speeds),
    ("swipeDirections", SwipeField::Directions),
    ("swipeAccelerations", SwipeField::Accelerations),
];

/// Caller field name → canonical keystroke field. Case variants observed in
/// the wild are listed explicitly.
const KEYSTROKE_FIELDS: [(&str, KeystrokeField); 6] = [
    ("holdTimes", KeystrokeField::HoldTimes),
    ("HoldTimes", KeystrokeField::HoldTimes),
    ("flightTimes", KeystrokeField::FlightTimes),
    ("FlightTimes", KeystrokeField::FlightTimes),
    ("backspaceRates", KeystrokeField::BackspaceRates),
    ("typingSpeeds", KeystrokeField::TypingSpeeds),
];

/// Variant suffix stripped from field names before mapping.
const VARIANT_SUFFIX: &str = "New";

#[derive(Debug, Clone, Copy)]
enum SwipeField {
    Distances,
    Durations,
    Speeds,
    Directions,
    Accelerations,
}

#[derive(Debug, Clone, Copy)]
enum KeystrokeField {
    HoldTimes,
    FlightTimes,
    BackspaceRates,
    TypingSpeeds,
}

/// Canonical swipe sample arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwipeSamples {
    pub distances: Vec<f64>,
    pub durations: Vec<f64>,
    pub speeds: Vec<f64>,
    pub directions: Vec<f64>,
    pub accelerations: Vec<f64>,
}

impl SwipeSamples {
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
            && self.durations.is_empty()
            && self.speeds.is_empty()
            && self.directions.is_empty()
            && self.accelerations.is_empty()
    }

    /// Raw sample count: longest observed array.
    pub fn sample_count(&self) -> usize {
        [
            self.distances.len(),
            self.durations.len(),
            self.speeds.len(),
            self.directions.len(),
            self.accelerations.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Canonical keystroke sample arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeystrokeSamples {
    pub hold_times: Vec<f64>,
    pub flight_times: Vec<f64>,
    pub backspace_rates: Vec<f64>,
    pub typing_speeds: Vec<f64>,
}

impl KeystrokeSamples {
    pub fn is_empty(&self) -> bool {
        self.hold_times.is_empty()
            && self.flight_times.is_empty()
            && self.backspace_rates.is_empty()
            && self.typing_speeds.is_empty()
    }

    /// Keystroke events are counted by timing arrays, not rates.
    pub fn sample_count(&self) -> usize {
        self.hold_times.len().max(self.flight_times.len())
    }
}

/// Output of standardization: canonical per-modality arrays, pass-through of
/// unrecognized fields, and the warnings recorded along the way.
#[derive(Debug, Clone, Default)]
pub struct StandardizedData {
    pub swipe: SwipeSamples,
    pub keystroke: KeystrokeSamples,
    pub unrecognized: Map<String, Value>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Standardizer;

impl Standardizer {
    pub fn new() -> Self {
        Self
    }

    /// Standardize a raw `data` object. One level of nested modality dicts
    /// (`{"swiping": {...}, "typing": {...}}`) is hoisted; remaining rules
    /// apply per field: suffix strip, scalar→singleton, one-level flatten,
    /// silent drop of non-numeric entries with a recorded warning.
    pub fn standardize(&self, data: &Map<String, Value>) -> StandardizedData {
        let mut out = StandardizedData::default();

        for (key, value) in data {
            match value {
                // Hoist one nesting level; inner fields are treated as if
                // they appeared at the top.
                Value::Object(inner) => {
                    for (inner_key, inner_value) in inner {
                        self.apply_field(inner_key, inner_value, &mut out);
                    }
                }
                _ => self.apply_field(key, value, &mut out),
            }
        }

        derive_speeds(&mut out);
        out
    }

    fn apply_field(&self, key: &str, value: &Value, out: &mut StandardizedData) {
        let clean_key = key.strip_suffix(VARIANT_SUFFIX).unwrap_or(key);

        if let Some((_, field)) = SWIPE_FIELDS.iter().find(|(n, _)| *n == clean_key) {
            let samples = coerce_samples(clean_key, value, &mut out.warnings);
            let target = match field {
                SwipeField::Distances => &mut out.swipe.distances,
                SwipeField::Durations => &mut out.swipe.durations,
                SwipeField::Speeds => &mut out.swipe.speeds,
                SwipeField::Directions => &mut out.swipe.directions,
                SwipeField::Accelerations => &mut out.swipe.accelerations,
            };
            target.extend(samples);
        } else if let Some((_, field)) = KEYSTROKE_FIELDS.iter().find(|(n, _)| *n == clean_key) {
            let samples = coerce_samples(clean_key, value, &mut out.warnings);
            let target = match field {
                KeystrokeField::HoldTimes => &mut out.keystroke.hold_times,
                KeystrokeField::FlightTimes => &mut out.keystroke.flight_times,
                KeystrokeField::BackspaceRates => &mut out.keystroke.backspace_rates,
                KeystrokeField::TypingSpeeds => &mut out.keystroke.typing_speeds,
            };
            target.extend(samples);
        } else {
            out.unrecognized.insert(key.to_string(), value.clone());
        }
    }
}

/// Coerce a field value to a numeric sample array: scalars become singleton
/// sequences, nested sequences are flattened one level, everything else is
/// dropped with a warning.
fn coerce_samples(field: &str, value: &Value, warnings: &mut Vec<String>) -> Vec<f64> {
    let mut samples = Vec::new();
    let mut dropped = 0usize;

    match value {
        Value::Number(n) => push_number(n.as_f64(), &mut samples, &mut dropped),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Number(n) => push_number(n.as_f64(), &mut samples, &mut dropped),
                    Value::Array(nested) => {
                        for sub in nested {
                            match sub {
                                Value::Number(n) => {
                                    push_number(n.as_f64(), &mut samples, &mut dropped)
                                }
                                _ => dropped += 1,
                            }
                        }
                    }
                    _ => dropped += 1,
                }
            }
        }
        _ => dropped += 1,
    }

    if dropped > 0 {
        let msg = format!("dropped {dropped} non-numeric value(s) from {field}");
        warn!(field, dropped, "non-numeric samples dropped");
        warnings.push(msg);
    }
    samples
}

fn push_number(n: Option<f64>, samples: &mut Vec<f64>, dropped: &mut usize) {
    match n {
        Some(v) if v.is_finite() => samples.push(v),
        _ => *dropped += 1,
    }
}

/// Infer speeds elementwise from distance/duration when the caller did not
/// supply them. Zero or negative durations are skipped.
fn derive_speeds(out: &mut StandardizedData) {
    if !out.swipe.speeds.is_empty()
        || out.swipe.distances.is_empty()
        || out.swipe.durations.is_empty()
    {
        return;
    }
    let n = out.swipe.distances.len().min(out.swipe.durations.len());
    for i in 0..n {
        let duration = out.swipe.durations[i];
        if duration > 0.0 {
            out.swipe.speeds.push(out.swipe.distances[i] / duration);
        }
    }
    if !out.swipe.speeds.is_empty() {
        out.warnings
            .push(format!("derived {} speed sample(s) from distance/duration", out.swipe.speeds.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn suffix_stripped_and_mapped() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({
            "swipeSpeedsNew": [0.9, 1.1],
            "holdTimesNew": [180, 200]
        })));
        assert_eq!(out.swipe.speeds, vec![0.9, 1.1]);
        assert_eq!(out.keystroke.hold_times, vec![180.0, 200.0]);
    }

    #[test]
    fn nested_modalities_hoisted() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({
            "swiping": { "swipeSpeeds": [1.2] },
            "typing": { "flightTimes": [150, 160] }
        })));
        assert_eq!(out.swipe.speeds, vec![1.2]);
        assert_eq!(out.keystroke.flight_times, vec![150.0, 160.0]);
    }

    #[test]
    fn scalars_coerced_to_singletons() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({ "swipeSpeeds": 0.85 })));
        assert_eq!(out.swipe.speeds, vec![0.85]);
    }

    #[test]
    fn nested_sequences_flattened_one_level() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({
            "flightTimes": [[120, 130], [140]]
        })));
        assert_eq!(out.keystroke.flight_times, vec![120.0, 130.0, 140.0]);
    }

    #[test]
    fn non_numeric_dropped_with_warning() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({
            "swipeSpeeds": [0.9, "fast", null, 1.0]
        })));
        assert_eq!(out.swipe.speeds, vec![0.9, 1.0]);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn unrecognized_fields_pass_through() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({ "deviceModel": "x200" })));
        assert!(out.unrecognized.contains_key("deviceModel"));
        assert!(out.swipe.is_empty());
        assert!(out.keystroke.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let std = Standardizer::new();
        let out = std.standardize(&Map::new());
        assert!(out.swipe.is_empty());
        assert!(out.keystroke.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn speeds_derived_from_distance_and_duration() {
        let std = Standardizer::new();
        let out = std.standardize(&data(json!({
            "swipeDistances": [100.0, 240.0],
            "swipeDurations": [200.0, 300.0]
        })));
        assert_eq!(out.swipe.speeds, vec![0.5, 0.8]);
    }
}
