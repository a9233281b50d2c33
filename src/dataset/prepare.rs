//! Synthetic Dataset Generation
//!
//! Produces a demo weather/energy dataset: a tensor bundle of 3x14x14 grids
//! with per-sample energy labels, plus the trace CSV giving each sample's
//! date and plant name. Labels follow a wind-power-like curve per plant with
//! a configurable fraction of spiked outliers, so the filtering modes have
//! something realistic to chew on.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Days, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::loader::{write_trace, DatasetStats, EnergyGridDataset, GridBundle, TraceRecord};
use crate::utils::error::{EnergyGridError, Result};
use crate::{GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH};

/// Configuration for synthetic dataset generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Total number of samples to generate
    pub samples: usize,
    /// Number of distinct plants
    pub plants: usize,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Fraction of labels spiked into outliers
    pub outlier_frac: f64,
    /// Date of the first generated day
    pub start_date: NaiveDate,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            samples: 24_000,
            plants: 12,
            seed: 42,
            outlier_frac: 0.01,
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        }
    }
}

impl PrepareConfig {
    /// Check that the configuration is generatable
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(EnergyGridError::Config(
                "samples must be at least 1".to_string(),
            ));
        }
        if self.plants == 0 || self.plants > self.samples {
            return Err(EnergyGridError::Config(format!(
                "plants must be between 1 and samples ({}), got {}",
                self.samples, self.plants
            )));
        }
        if !(0.0..1.0).contains(&self.outlier_frac) {
            return Err(EnergyGridError::Config(format!(
                "outlier_frac must be in [0, 1), got {}",
                self.outlier_frac
            )));
        }
        Ok(())
    }
}

/// Statistics about the generated dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareStats {
    pub seed: u64,
    pub injected_outliers: usize,
    pub dataset: DatasetStats,
}

/// Tensor bundle path for a given output base
pub fn bundle_path(base: &Path) -> PathBuf {
    base.with_extension("bin")
}

/// Trace CSV path for a given output base
pub fn trace_path(base: &Path) -> PathBuf {
    base.with_extension("trace.csv")
}

/// Stats JSON path for a given output base
pub fn stats_path(base: &Path) -> PathBuf {
    base.with_extension("stats.json")
}

/// Fixed per-plant generation parameters, drawn once from the master seed
struct PlantProfile {
    name: String,
    capacity: f32,
    wind_bias: f32,
}

/// Generate a synthetic dataset and write bundle, trace and stats files
///
/// `output` is a base path; the files land at `{output}.bin`,
/// `{output}.trace.csv` and `{output}.stats.json`. Dates advance round-robin
/// over the plants, so every plant contributes one sample per day and the
/// file order is already chronological.
pub fn prepare_synthetic_dataset(output: &Path, config: &PrepareConfig) -> Result<PrepareStats> {
    config.validate()?;

    println!("Generating synthetic dataset...");
    println!("  Samples: {}", config.samples);
    println!("  Plants: {}", config.plants);
    println!("  Seed: {}", config.seed);
    println!("  Outlier fraction: {:.1}%", config.outlier_frac * 100.0);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let profiles: Vec<PlantProfile> = (0..config.plants)
        .map(|idx| PlantProfile {
            name: format!("plant_{:02}", idx),
            capacity: master_rng.gen_range(80.0..400.0),
            wind_bias: master_rng.gen_range(-1.5..1.5),
        })
        .collect();

    let pb = ProgressBar::new(config.samples as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    let generated = AtomicUsize::new(0);

    // Parallel generation; per-sample RNGs keep the output independent of
    // the rayon scheduling order
    let samples: Vec<(Vec<f32>, f32, bool)> = (0..config.samples)
        .into_par_iter()
        .map(|i| {
            let profile = &profiles[i % config.plants];
            let day = i / config.plants;
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64 + 1));

            let sample = generate_sample(profile, day, config.outlier_frac, &mut rng);

            let count = generated.fetch_add(1, Ordering::Relaxed);
            if count % 100 == 0 {
                pb.set_position(count as u64);
            }
            sample
        })
        .collect();

    pb.finish_and_clear();

    let mut bundle = GridBundle::new(GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH);
    let mut trace = Vec::with_capacity(config.samples);
    let mut injected_outliers = 0;

    for (i, (grid, label, is_outlier)) in samples.iter().enumerate() {
        bundle.push(grid, *label)?;
        if *is_outlier {
            injected_outliers += 1;
        }

        let day = (i / config.plants) as u64;
        let date = config
            .start_date
            .checked_add_days(Days::new(day))
            .ok_or_else(|| {
                EnergyGridError::InvalidInput(format!(
                    "date overflow at day {} from {}",
                    day, config.start_date
                ))
            })?;
        trace.push(TraceRecord {
            date,
            name: profiles[i % config.plants].name.clone(),
        });
    }

    bundle.save(bundle_path(output))?;
    write_trace(trace_path(output), &trace)?;

    let dataset = EnergyGridDataset::new(bundle, trace)?;
    let stats = PrepareStats {
        seed: config.seed,
        injected_outliers,
        dataset: dataset.get_stats(),
    };

    let stats_json = serde_json::to_string_pretty(&stats)?;
    fs::write(stats_path(output), stats_json)?;

    println!();
    println!("Dataset generated successfully!");
    println!("  Bundle: {:?}", bundle_path(output));
    println!("  Trace: {:?}", trace_path(output));
    println!("  Date range: {} to {}", stats.dataset.first_date, stats.dataset.last_date);
    println!("  Injected outliers: {}", injected_outliers);

    Ok(stats)
}

/// Generate one sample: a flattened weather grid, its label and whether the
/// label was spiked
fn generate_sample(
    profile: &PlantProfile,
    day: usize,
    outlier_frac: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<f32>, f32, bool) {
    let phase = (day % 365) as f32 / 365.0 * std::f32::consts::TAU;
    let wind_base = 7.0 + 2.5 * phase.sin() + profile.wind_bias;
    let temp_base = 12.0 - 10.0 * phase.cos();
    let humid_base = 0.7 - 0.1 * phase.sin();

    let cells = GRID_HEIGHT * GRID_WIDTH;
    let mut grid = Vec::with_capacity(GRID_CHANNELS * cells);
    let mut wind_sum = 0.0f32;

    // Channel 0: wind speed with a mild spatial gradient
    for y in 0..GRID_HEIGHT {
        for x in 0..GRID_WIDTH {
            let gradient = 1.0 + 0.05 * ((y + x) as f32 - 13.0) / 13.0;
            let wind = (wind_base * gradient + rng.gen_range(-1.2..1.2)).max(0.0);
            wind_sum += wind;
            grid.push(wind);
        }
    }
    // Channel 1: temperature
    for y in 0..GRID_HEIGHT {
        for _ in 0..GRID_WIDTH {
            let north_south = 0.3 * (y as f32 - 6.5) / 6.5;
            grid.push(temp_base + north_south + rng.gen_range(-0.8..0.8));
        }
    }
    // Channel 2: relative humidity
    for _ in 0..cells {
        grid.push((humid_base + rng.gen_range(-0.05..0.05)).clamp(0.0, 1.0));
    }

    // Cubic capacity-factor curve, the usual wind-power shape
    let mean_wind = wind_sum / cells as f32;
    let capacity_factor = ((mean_wind - 3.0) / 9.0).clamp(0.0, 1.0).powi(3);
    let mut label = (profile.capacity * capacity_factor + rng.gen_range(-5.0..5.0)).max(0.0);

    let is_outlier = rng.gen_bool(outlier_frac);
    if is_outlier {
        label *= rng.gen_range(5.0..12.0);
    }

    (grid, label, is_outlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PrepareConfig {
        PrepareConfig {
            samples: 24,
            plants: 3,
            seed: 7,
            outlier_frac: 0.0,
            ..PrepareConfig::default()
        }
    }

    #[test]
    fn test_prepare_config_default() {
        let config = PrepareConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.samples, 24_000);
        assert_eq!(config.plants, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prepare_config_validation() {
        let mut config = small_config();
        config.plants = 0;
        assert!(config.validate().is_err());

        let mut config = small_config();
        config.outlier_frac = 1.0;
        assert!(config.validate().is_err());

        let mut config = small_config();
        config.plants = config.samples + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prepare_writes_loadable_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("demo");
        let config = small_config();

        let stats = prepare_synthetic_dataset(&base, &config).unwrap();
        assert_eq!(stats.dataset.total_samples, 24);
        assert_eq!(stats.dataset.num_plants, 3);
        assert!(stats_path(&base).exists());

        let dataset = EnergyGridDataset::load(bundle_path(&base), trace_path(&base)).unwrap();
        assert_eq!(dataset.len(), 24);

        // Round-robin order: plants interleave, dates never go backwards
        assert_eq!(dataset.plant_name(0), Some("plant_00"));
        assert_eq!(dataset.plant_name(1), Some("plant_01"));
        assert_eq!(dataset.plant_name(3), Some("plant_00"));
        for i in 1..dataset.len() {
            assert!(dataset.date(i - 1).unwrap() <= dataset.date(i).unwrap());
        }
        assert!(dataset.labels().iter().all(|&label| label >= 0.0));
    }

    #[test]
    fn test_prepare_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config();

        let base_a = dir.path().join("a");
        let base_b = dir.path().join("b");
        prepare_synthetic_dataset(&base_a, &config).unwrap();
        prepare_synthetic_dataset(&base_b, &config).unwrap();

        let bundle_a = GridBundle::load(bundle_path(&base_a)).unwrap();
        let bundle_b = GridBundle::load(bundle_path(&base_b)).unwrap();
        assert_eq!(bundle_a.labels, bundle_b.labels);
        assert_eq!(bundle_a.features, bundle_b.features);

        let mut other_seed = config;
        other_seed.seed = 8;
        let base_c = dir.path().join("c");
        prepare_synthetic_dataset(&base_c, &other_seed).unwrap();
        let bundle_c = GridBundle::load(bundle_path(&base_c)).unwrap();
        assert_ne!(bundle_a.labels, bundle_c.labels);
    }

    #[test]
    fn test_outlier_injection_counted() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = small_config();
        config.samples = 200;
        config.outlier_frac = 0.5;
        let stats = prepare_synthetic_dataset(&dir.path().join("spiked"), &config).unwrap();
        assert!(stats.injected_outliers > 0);

        config.outlier_frac = 0.0;
        let stats = prepare_synthetic_dataset(&dir.path().join("clean"), &config).unwrap();
        assert_eq!(stats.injected_outliers, 0);
    }
}
