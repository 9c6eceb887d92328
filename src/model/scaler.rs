//! Per-dimension standardization transform (zero mean, unit variance),
//! fitted on the training split and persisted with the baseline.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations. Zero-variance columns get
    /// unit scale so transforms stay finite.
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for col in x.axis_iter(Axis(1)) {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            scale.push(if s > 0.0 { s } else { 1.0 });
        }
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }

    /// Z-score a single session vector.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.mean[j]) / self.scale[j])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fit_transform_zero_mean_unit_scale() {
        let x = array![[1.0, 10.0], [3.0, 30.0], [5.0, 50.0]];
        let scaler = StandardScaler::fit(x.view());
        let z = scaler.transform(x.view());
        for j in 0..2 {
            let col = z.column(j);
            assert!(col.sum().abs() < 1e-9);
        }
        let row = scaler.transform_row(&[3.0, 30.0]);
        assert!(row[0].abs() < 1e-9);
        assert!(row[1].abs() < 1e-9);
    }

    #[test]
    fn constant_column_stays_finite() {
        let x = array![[2.0, 5.0], [2.0, 7.0], [2.0, 9.0]];
        let scaler = StandardScaler::fit(x.view());
        let row = scaler.transform_row(&[2.0, 7.0]);
        assert!(row.iter().all(|v| v.is_finite()));
        assert_eq!(row[0], 0.0);
    }
}
