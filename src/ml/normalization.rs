//! Feature Normalization
//!
//! Robust per-column scaling of the numeric feature matrix before it is fed
//! to the reconstruction model. Columns are centred on the median and
//! divided by the interquartile range, then clipped to `±clip`.

use serde::{Deserialize, Serialize};

use super::features::{NumericRow, NUMERIC_FEATURES};
use super::threshold::percentile;

/// Spread below which a column is treated as constant
const MIN_SPREAD: f64 = 1e-12;

/// Centre and spread of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub center: f64,
    pub scale: f64,
}

impl Default for ColumnScale {
    fn default() -> Self {
        Self {
            center: 0.0,
            scale: 1.0,
        }
    }
}

impl ColumnScale {
    /// Fit median / IQR
    ///
    /// A zero IQR (more than half the column identical) falls back to the
    /// mean absolute deviation from the median, then to 1 for a constant
    /// column.
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let center = percentile(&sorted, 50.0);
        let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);

        let scale = if iqr > MIN_SPREAD {
            iqr
        } else {
            let mad = sorted.iter().map(|v| (v - center).abs()).sum::<f64>() / sorted.len() as f64;
            if mad > MIN_SPREAD {
                mad
            } else {
                1.0
            }
        };

        Self { center, scale }
    }

    pub fn scale(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value * self.scale + self.center
    }
}

/// Robust scaler for the numeric feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub columns: [ColumnScale; NUMERIC_FEATURES],
    /// Absolute bound on scaled values
    pub clip: f64,
}

impl RobustScaler {
    /// Fit column statistics on a batch
    pub fn fit(data: &[NumericRow], clip: f64) -> Self {
        let mut columns = [ColumnScale::default(); NUMERIC_FEATURES];
        for (col, column) in columns.iter_mut().enumerate() {
            let values: Vec<f64> = data.iter().map(|row| row[col]).collect();
            *column = ColumnScale::fit(&values);
        }
        Self { columns, clip }
    }

    /// Scale and clip one row
    pub fn transform(&self, row: &NumericRow) -> NumericRow {
        let mut out = [0.0; NUMERIC_FEATURES];
        for (col, value) in out.iter_mut().enumerate() {
            *value = self.columns[col].scale(row[col]).clamp(-self.clip, self.clip);
        }
        out
    }

    /// Map a scaled row back to original units
    pub fn inverse_transform(&self, row: &NumericRow) -> NumericRow {
        let mut out = [0.0; NUMERIC_FEATURES];
        for (col, value) in out.iter_mut().enumerate() {
            *value = self.columns[col].unscale(row[col]);
        }
        out
    }

    /// Scale a whole batch
    pub fn transform_all(&self, data: &[NumericRow]) -> Vec<NumericRow> {
        data.iter().map(|row| self.transform(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_scale_median_iqr() {
        let scale = ColumnScale::fit(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(scale.center, 3.0);
        assert_eq!(scale.scale, 2.0);
        assert_eq!(scale.scale(5.0), 1.0);
        assert_eq!(scale.unscale(1.0), 5.0);
    }

    #[test]
    fn test_zero_iqr_falls_back_to_mean_abs_deviation() {
        let mut values = vec![100.0; 19];
        values.push(100_000.0);
        let scale = ColumnScale::fit(&values);
        assert_eq!(scale.center, 100.0);
        assert!((scale.scale - 4995.0).abs() < 1e-9);
        // the lone outlier still lands far outside the clip range
        assert!(scale.scale(100_000.0) > 5.0);
    }

    #[test]
    fn test_constant_column_uses_unit_scale() {
        let scale = ColumnScale::fit(&[42.0; 8]);
        assert_eq!(scale.center, 42.0);
        assert_eq!(scale.scale, 1.0);
        assert_eq!(scale.scale(42.0), 0.0);
    }

    #[test]
    fn test_transform_clips_extremes() {
        let data: Vec<NumericRow> = (0..10).map(|i| [100.0 + i as f64, i as f64]).collect();
        let scaler = RobustScaler::fit(&data, 5.0);

        let scaled = scaler.transform(&[1_000_000.0, 4.5]);
        assert_eq!(scaled[0], 5.0);
        assert!(scaled[1].abs() < 1.0);

        let back = scaler.inverse_transform(&scaler.transform(&[104.0, 3.0]));
        assert!((back[0] - 104.0).abs() < 1e-9);
        assert!((back[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch() {
        let scaler = RobustScaler::fit(&[], 5.0);
        assert_eq!(scaler.columns[0], ColumnScale::default());
        assert!(scaler.transform_all(&[]).is_empty());
    }
}
