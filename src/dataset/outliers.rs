//! Per-Plant Outlier Handling
//!
//! Training labels are cleaned per plant before the model sees them, either by
//! dropping rows whose robust z-score exceeds a cutoff or by winsorizing
//! labels into a per-plant quantile range. Group statistics are computed on
//! the training split only, so nothing leaks from the test period. Inputs
//! (the weather grids) are never modified by either mode.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::error::{EnergyGridError, Result};

/// Scale that makes the MAD consistent with the standard deviation under
/// normality: z = 0.6745 * (y - median) / MAD
pub const ROBUST_Z_SCALE: f64 = 0.6745;

/// Floor applied when a group's MAD is zero, keeping the z-score finite
pub const MAD_FLOOR: f64 = 1e-6;

/// Median with the midpoint convention for even-length input
///
/// Panics on an empty slice; group slices are built from existing rows and
/// are never empty.
pub fn median(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "median of empty slice");

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median absolute deviation, floored at [`MAD_FLOOR`] when zero
pub fn mad(values: &[f64]) -> f64 {
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let m = median(&deviations);
    if m > 0.0 {
        m
    } else {
        MAD_FLOOR
    }
}

/// Quantile with linear interpolation between order statistics
pub fn quantile(values: &[f64], q: f64) -> f64 {
    assert!(!values.is_empty(), "quantile of empty slice");
    assert!((0.0..=1.0).contains(&q), "quantile out of [0, 1]");

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// How training labels are cleaned before the model sees them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMode {
    /// Drop rows whose robust z-score exceeds the cutoff
    Drop,
    /// Clip labels into a per-plant quantile range, keeping every row
    Winsorize,
    /// Leave the training labels untouched
    Disabled,
}

impl FromStr for OutlierMode {
    type Err = EnergyGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(OutlierMode::Drop),
            "winsorize" => Ok(OutlierMode::Winsorize),
            "none" | "off" | "disabled" => Ok(OutlierMode::Disabled),
            other => Err(EnergyGridError::Config(format!(
                "unknown outlier mode '{}' (expected drop, winsorize, or none)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for OutlierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlierMode::Drop => write!(f, "drop"),
            OutlierMode::Winsorize => write!(f, "winsorize"),
            OutlierMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// Configuration for the outlier policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Cleaning mode
    pub mode: OutlierMode,
    /// Robust z cutoff for drop mode
    pub mad_k: f64,
    /// Lower winsorization quantile
    pub q_lo: f64,
    /// Upper winsorization quantile
    pub q_hi: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            mode: OutlierMode::Drop,
            mad_k: 3.0,
            q_lo: 0.01,
            q_hi: 0.99,
        }
    }
}

impl OutlierConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.mad_k.is_finite() || self.mad_k <= 0.0 {
            return Err(EnergyGridError::Config(format!(
                "mad_k must be positive, got {}",
                self.mad_k
            )));
        }
        if !(0.0..=1.0).contains(&self.q_lo)
            || !(0.0..=1.0).contains(&self.q_hi)
            || self.q_lo >= self.q_hi
        {
            return Err(EnergyGridError::Config(format!(
                "winsorization quantiles must satisfy 0 <= q_lo < q_hi <= 1, got [{}, {}]",
                self.q_lo, self.q_hi
            )));
        }
        Ok(())
    }
}

/// Result of applying the outlier policy to the training rows
#[derive(Debug, Clone)]
pub enum OutlierOutcome {
    /// Rows flagged by the robust z-score were removed
    Dropped {
        /// Dataset indices that survive, in original train order
        kept_indices: Vec<usize>,
        /// Fraction of training rows kept
        kept_frac: f64,
    },
    /// Labels were clipped into per-plant quantile ranges; the row set is unchanged
    Winsorized {
        /// Clipped labels, aligned with the training rows
        labels: Vec<f32>,
    },
    /// Policy disabled; rows and labels unchanged
    Disabled,
}

/// Apply the configured outlier policy to the training rows
///
/// `train_indices` selects dataset rows; `plant_names` and `labels` are
/// aligned with it. Group statistics come from these rows only.
pub fn apply_outlier_policy(
    config: &OutlierConfig,
    train_indices: &[usize],
    plant_names: &[&str],
    labels: &[f32],
) -> Result<OutlierOutcome> {
    config.validate()?;

    if plant_names.len() != train_indices.len() || labels.len() != train_indices.len() {
        return Err(EnergyGridError::InvalidInput(format!(
            "outlier policy inputs are misaligned: {} indices, {} names, {} labels",
            train_indices.len(),
            plant_names.len(),
            labels.len()
        )));
    }

    match config.mode {
        OutlierMode::Disabled => {
            info!("Outlier filtering disabled");
            Ok(OutlierOutcome::Disabled)
        }

        OutlierMode::Drop => {
            let scores = robust_z_scores(plant_names, labels);
            let kept_indices: Vec<usize> = train_indices
                .iter()
                .zip(scores.iter())
                .filter_map(|(&idx, &z)| (z.abs() <= config.mad_k).then_some(idx))
                .collect();

            let kept_frac = if train_indices.is_empty() {
                0.0
            } else {
                kept_indices.len() as f64 / train_indices.len() as f64
            };

            if kept_frac == 0.0 {
                return Err(EnergyGridError::Dataset(
                    "All training samples flagged as outliers. Relax MAD_K or disable outlier filtering."
                        .to_string(),
                ));
            }

            info!(
                "Outlier drop kept {}/{} training rows ({:.1}%)",
                kept_indices.len(),
                train_indices.len(),
                kept_frac * 100.0
            );

            Ok(OutlierOutcome::Dropped {
                kept_indices,
                kept_frac,
            })
        }

        OutlierMode::Winsorize => {
            let bounds = group_quantile_bounds(plant_names, labels, config.q_lo, config.q_hi);
            let clipped: Vec<f32> = plant_names
                .iter()
                .zip(labels.iter())
                .map(|(name, &y)| {
                    let (lo, hi) = bounds[name];
                    (y as f64).clamp(lo, hi) as f32
                })
                .collect();

            let changed = clipped
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            info!(
                "Winsorized {} of {} training labels into [{}, {}] per plant",
                changed,
                labels.len(),
                config.q_lo,
                config.q_hi
            );

            Ok(OutlierOutcome::Winsorized { labels: clipped })
        }
    }
}

/// Robust z-scores computed within each plant group
pub fn robust_z_scores(plant_names: &[&str], labels: &[f32]) -> Vec<f64> {
    let groups = group_rows(plant_names);
    let mut scores = vec![0.0f64; labels.len()];

    for (name, rows) in &groups {
        let values: Vec<f64> = rows.iter().map(|&row| labels[row] as f64).collect();
        let med = median(&values);
        let scale = mad(&values);
        debug!("Plant '{}': median={:.4}, mad={:.6}", name, med, scale);

        for &row in rows {
            scores[row] = ROBUST_Z_SCALE * (labels[row] as f64 - med) / scale;
        }
    }

    scores
}

/// Per-plant `[q_lo, q_hi]` label bounds
pub fn group_quantile_bounds<'a>(
    plant_names: &[&'a str],
    labels: &[f32],
    q_lo: f64,
    q_hi: f64,
) -> HashMap<&'a str, (f64, f64)> {
    let groups = group_rows(plant_names);
    let mut bounds = HashMap::with_capacity(groups.len());

    for (name, rows) in groups {
        let values: Vec<f64> = rows.iter().map(|&row| labels[row] as f64).collect();
        bounds.insert(name, (quantile(&values, q_lo), quantile(&values, q_hi)));
    }

    bounds
}

/// Row positions grouped by plant name
fn group_rows<'a>(plant_names: &[&'a str]) -> HashMap<&'a str, Vec<usize>> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, name) in plant_names.iter().enumerate() {
        groups.entry(name).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[7.0]), 7.0);
    }

    #[test]
    fn test_mad_and_floor() {
        // median 3, deviations [2, 1, 0, 1, 2] -> mad 1
        assert_eq!(mad(&[1.0, 2.0, 3.0, 4.0, 5.0]), 1.0);
        // constant group floors at MAD_FLOOR
        assert_eq!(mad(&[2.0, 2.0, 2.0]), MAD_FLOOR);
    }

    #[test]
    fn test_quantile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert!((quantile(&values, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("drop".parse::<OutlierMode>().unwrap(), OutlierMode::Drop);
        assert_eq!(
            "Winsorize".parse::<OutlierMode>().unwrap(),
            OutlierMode::Winsorize
        );
        assert_eq!("none".parse::<OutlierMode>().unwrap(), OutlierMode::Disabled);
        assert!("median".parse::<OutlierMode>().is_err());
    }

    #[test]
    fn test_config_validate() {
        assert!(OutlierConfig::default().validate().is_ok());

        let bad_k = OutlierConfig {
            mad_k: 0.0,
            ..OutlierConfig::default()
        };
        assert!(bad_k.validate().is_err());

        let bad_q = OutlierConfig {
            q_lo: 0.9,
            q_hi: 0.1,
            ..OutlierConfig::default()
        };
        assert!(bad_q.validate().is_err());
    }

    #[test]
    fn test_robust_z_centers_on_group_median() {
        let names = vec!["a", "a", "a", "b"];
        let labels = vec![1.0f32, 2.0, 3.0, 100.0];
        let scores = robust_z_scores(&names, &labels);

        // group a: median 2, mad 1
        assert!((scores[0] + ROBUST_Z_SCALE).abs() < 1e-9);
        assert!(scores[1].abs() < 1e-9);
        assert!((scores[2] - ROBUST_Z_SCALE).abs() < 1e-9);
        // singleton group b sits on its own median
        assert!(scores[3].abs() < 1e-9);
    }

    #[test]
    fn test_drop_removes_flagged_rows() {
        let config = OutlierConfig::default();
        // dataset indices deliberately offset from row positions
        let train_indices = vec![10, 11, 12, 13, 14, 15];
        let names = vec!["a"; 6];
        let labels = vec![10.0f32, 10.1, 9.9, 10.05, 9.95, 100.0];

        let outcome = apply_outlier_policy(&config, &train_indices, &names, &labels).unwrap();
        match outcome {
            OutlierOutcome::Dropped {
                kept_indices,
                kept_frac,
            } => {
                assert_eq!(kept_indices, vec![10, 11, 12, 13, 14]);
                assert!((kept_frac - 5.0 / 6.0).abs() < 1e-9);
            }
            other => panic!("expected drop outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_keeps_rows_within_cutoff() {
        let config = OutlierConfig::default();
        let train_indices: Vec<usize> = (0..7).collect();
        let names = vec!["a", "a", "a", "b", "b", "b", "b"];
        let labels = vec![5.0f32, 5.5, 6.0, 1.0, 1.2, 0.8, 1.1];

        let scores = robust_z_scores(&names, &labels);
        let outcome = apply_outlier_policy(&config, &train_indices, &names, &labels).unwrap();

        match outcome {
            OutlierOutcome::Dropped { kept_indices, .. } => {
                // every kept row satisfies the cutoff it was filtered with
                for &idx in &kept_indices {
                    assert!(scores[idx].abs() <= config.mad_k);
                }
                assert_eq!(kept_indices.len(), 7);
            }
            other => panic!("expected drop outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_all_flagged_is_an_error() {
        // two-row group: both sit 0.6745 robust-z away from the midpoint median
        let config = OutlierConfig {
            mad_k: 0.5,
            ..OutlierConfig::default()
        };
        let train_indices = vec![0, 1];
        let names = vec!["a", "a"];
        let labels = vec![1.0f32, 2.0];

        let err = apply_outlier_policy(&config, &train_indices, &names, &labels).unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("All training samples flagged as outliers"));
        assert!(message.contains("Relax MAD_K or disable outlier filtering"));
    }

    #[test]
    fn test_winsorize_clips_into_group_range() {
        let config = OutlierConfig {
            mode: OutlierMode::Winsorize,
            q_lo: 0.25,
            q_hi: 0.75,
            ..OutlierConfig::default()
        };
        let train_indices: Vec<usize> = (0..5).collect();
        let names = vec!["a"; 5];
        let labels = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];

        let outcome = apply_outlier_policy(&config, &train_indices, &names, &labels).unwrap();
        match outcome {
            OutlierOutcome::Winsorized { labels: clipped } => {
                // quantiles of 1..5 at 0.25/0.75 are 2 and 4
                assert_eq!(clipped, vec![2.0, 2.0, 3.0, 4.0, 4.0]);
            }
            other => panic!("expected winsorize outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_winsorize_respects_group_boundaries() {
        let config = OutlierConfig {
            mode: OutlierMode::Winsorize,
            ..OutlierConfig::default()
        };
        let train_indices: Vec<usize> = (0..4).collect();
        let names = vec!["low", "low", "high", "high"];
        let labels = vec![1.0f32, 2.0, 100.0, 200.0];

        let outcome = apply_outlier_policy(&config, &train_indices, &names, &labels).unwrap();
        match outcome {
            OutlierOutcome::Winsorized { labels: clipped } => {
                // each group clips within its own range, so the low group
                // never inherits the high group's bounds
                assert!(clipped[0] >= 1.0 && clipped[1] <= 2.0);
                assert!(clipped[2] >= 100.0 && clipped[3] <= 200.0);
            }
            other => panic!("expected winsorize outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_passthrough() {
        let config = OutlierConfig {
            mode: OutlierMode::Disabled,
            ..OutlierConfig::default()
        };
        let outcome =
            apply_outlier_policy(&config, &[0, 1], &["a", "b"], &[1.0, 2.0]).unwrap();
        assert!(matches!(outcome, OutlierOutcome::Disabled));
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let config = OutlierConfig::default();
        let result = apply_outlier_policy(&config, &[0, 1, 2], &["a", "b"], &[1.0, 2.0]);
        assert!(result.is_err());
    }
}
