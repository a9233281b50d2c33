//! Energy Grid Regression CLI
//!
//! This is the main entry point for the weather-to-energy regression
//! experiment: synthetic dataset generation, CNN training with the Burn
//! framework and saved-model verification.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use energy_grid::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use energy_grid::dataset::prepare::{bundle_path, stats_path, trace_path};
use energy_grid::dataset::{
    EnergyGridDataset, OutlierConfig, OutlierMode, PrepareConfig, SplitConfig,
};
use energy_grid::inference::verify_model;
use energy_grid::model::{ModelConfig, TrainingConfig};
use energy_grid::training::run_training;
use energy_grid::utils::logging::{init_logging, LogConfig};

/// Energy Grid Regression
///
/// Predicts energy plant output from gridded weather data with a small CNN,
/// trained on chronologically earlier days and evaluated on later ones.
#[derive(Parser, Debug)]
#[command(name = "energy_grid")]
#[command(version = "0.1.0")]
#[command(about = "Weather-to-energy regression with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a synthetic weather/energy dataset
    Prepare {
        /// Base path for the generated files (.bin, .trace.csv, .stats.json)
        #[arg(short, long, default_value = "data/energy_grid")]
        output: String,

        /// Number of samples to generate
        #[arg(long, default_value = "24000")]
        samples: usize,

        /// Number of plants to simulate
        #[arg(long, default_value = "12")]
        plants: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Fraction of samples given an injected outlier label
        #[arg(long, default_value = "0.01")]
        outlier_frac: f64,

        /// First recording date (YYYY-MM-DD)
        #[arg(long, default_value = "2015-01-01")]
        start_date: String,
    },

    /// Train the energy regressor
    Train {
        /// Path to the tensor bundle
        #[arg(long, default_value = "data/energy_grid.bin")]
        bundle: String,

        /// Path to the trace CSV (per-sample date and plant name)
        #[arg(long, default_value = "data/energy_grid.trace.csv")]
        trace: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "1")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(long, default_value = "0.001")]
        learning_rate: f64,

        /// Batches between progress prints
        #[arg(long, default_value = "50")]
        update_freq: usize,

        /// Upper bound on training samples; the earliest ones train
        #[arg(long, default_value = "20000")]
        max_train: usize,

        /// Outlier handling for training labels (drop, winsorize, none)
        #[arg(long, default_value = "drop")]
        outlier_mode: String,

        /// Robust z cutoff for drop mode
        #[arg(long, default_value = "3.0")]
        mad_k: f64,

        /// Lower winsorization quantile
        #[arg(long, default_value = "0.01")]
        q_lo: f64,

        /// Upper winsorization quantile
        #[arg(long, default_value = "0.99")]
        q_hi: f64,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory for model checkpoints
        #[arg(short, long, default_value = "output/models")]
        output_dir: String,
    },

    /// Verify a saved model with a random probe grid
    Verify {
        /// Path to the saved weights
        #[arg(short, long)]
        model: String,

        /// Path to the model configuration (defaults to the sibling .config.json)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the tensor bundle
        #[arg(long, default_value = "data/energy_grid.bin")]
        bundle: String,

        /// Path to the trace CSV
        #[arg(long, default_value = "data/energy_grid.trace.csv")]
        trace: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Prepare {
            output,
            samples,
            plants,
            seed,
            outlier_frac,
            start_date,
        } => {
            cmd_prepare(&output, samples, plants, seed, outlier_frac, &start_date)?;
        }

        Commands::Train {
            bundle,
            trace,
            epochs,
            batch_size,
            learning_rate,
            update_freq,
            max_train,
            outlier_mode,
            mad_k,
            q_lo,
            q_hi,
            seed,
            output_dir,
        } => {
            let training_config = TrainingConfig {
                epochs,
                batch_size,
                learning_rate,
                update_freq,
                seed,
                split: SplitConfig { max_train },
                outliers: OutlierConfig {
                    mode: outlier_mode.parse::<OutlierMode>()?,
                    mad_k,
                    q_lo,
                    q_hi,
                },
                ..TrainingConfig::default()
            };

            cmd_train(&bundle, &trace, training_config, &output_dir)?;
        }

        Commands::Verify { model, config } => {
            cmd_verify(&model, config.as_deref())?;
        }

        Commands::Stats { bundle, trace } => {
            cmd_stats(&bundle, &trace)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════╗
 ║   ⚡ Energy Grid Regression                                      ║
 ║   Weather-to-Energy Prediction with Burn + Rust                  ║
 ╚══════════════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn cmd_prepare(
    output: &str,
    samples: usize,
    plants: usize,
    seed: u64,
    outlier_frac: f64,
    start_date: &str,
) -> Result<()> {
    info!("Generating synthetic dataset at: {}", output);
    info!("  Samples: {}", samples);
    info!("  Plants: {}", plants);

    let start_date = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid start date '{}': {}", start_date, e))?;

    let config = PrepareConfig {
        samples,
        plants,
        seed,
        outlier_frac,
        start_date,
    };

    let base = Path::new(output);
    let stats = energy_grid::dataset::prepare_synthetic_dataset(base, &config)?;

    println!();
    println!("{}", "Dataset ready!".green().bold());
    println!("  📊 Samples: {}", stats.dataset.total_samples);
    println!("  Plants: {}", stats.dataset.num_plants);
    println!("  Injected outliers: {}", stats.injected_outliers);
    println!("  Bundle: {:?}", bundle_path(base));
    println!("  Trace:  {:?}", trace_path(base));
    println!("  Stats:  {:?}", stats_path(base));
    println!();
    println!("{}", "Next steps:".green());
    println!(
        "  energy_grid train --bundle {:?} --trace {:?}",
        bundle_path(base),
        trace_path(base)
    );

    Ok(())
}

fn cmd_train(
    bundle: &str,
    trace: &str,
    training_config: TrainingConfig,
    output_dir: &str,
) -> Result<()> {
    info!("Starting training");
    info!("  Bundle: {}", bundle);
    info!("  Trace: {}", trace);
    info!("  Output: {}", output_dir);

    println!("{}", "Training Setup:".cyan().bold());
    println!("  Bundle:  {}", bundle);
    println!("  Trace:   {}", trace);
    println!("  Backend: {}", backend_name());
    println!();

    if !Path::new(bundle).exists() {
        println!("{} Bundle not found: {}", "Error:".red(), bundle);
        println!();
        println!("Generate a synthetic dataset first:");
        println!("  energy_grid prepare --output data/energy_grid");
        return Ok(());
    }
    if !Path::new(trace).exists() {
        println!("{} Trace not found: {}", "Error:".red(), trace);
        return Ok(());
    }

    let dataset = EnergyGridDataset::load(bundle, trace)?;
    let model_config = ModelConfig::default();
    let device = default_device();

    run_training::<TrainingBackend>(
        &dataset,
        &model_config,
        &training_config,
        Path::new(output_dir),
        device,
    )?;

    Ok(())
}

fn cmd_verify(model: &str, config: Option<&str>) -> Result<()> {
    info!("Verifying model artifact");
    info!("  Model: {}", model);

    println!("{}", "Verification Setup:".cyan().bold());
    println!("  Model:   {}", model);
    if let Some(path) = config {
        println!("  Config:  {}", path);
    }
    println!("  Backend: {}", backend_name());
    println!();

    let model_path = Path::new(model);
    if !model_path.exists() && !model_path.with_extension("mpk").exists() {
        println!("{} Model path not found: {}", "Error:".red(), model);
        return Ok(());
    }

    let device = default_device();
    let report = verify_model::<DefaultBackend>(model_path, config.map(Path::new), &device)?;

    println!();
    println!("{}", report.display());

    Ok(())
}

fn cmd_stats(bundle: &str, trace: &str) -> Result<()> {
    info!("Computing dataset statistics for: {}", bundle);

    if !Path::new(bundle).exists() {
        println!("{} Bundle not found: {}", "Error:".red(), bundle);
        println!();
        println!("Generate a synthetic dataset first:");
        println!("  energy_grid prepare --output data/energy_grid");
        return Ok(());
    }

    match EnergyGridDataset::load(bundle, trace) {
        Ok(dataset) => {
            let stats = dataset.get_stats();

            println!("{}", "Dataset Statistics:".cyan().bold());
            println!("  📊 Total samples: {}", stats.total_samples);
            println!("  Plants: {}", stats.num_plants);
            println!("  Date range: {} to {}", stats.first_date, stats.last_date);
            println!(
                "  Labels: min {:.2}, max {:.2}, mean {:.2}",
                stats.label_min, stats.label_max, stats.label_mean
            );
            println!();

            println!("{}", "Per-Plant Labels:".cyan().bold());
            for plant in &stats.plants {
                println!(
                    "  {:20} {:>6} samples  median {:>8.2}  MAD {:>8.2}",
                    plant.name, plant.count, plant.median, plant.mad
                );
            }
        }
        Err(e) => {
            println!("{} Failed to load dataset: {}", "Error:".red(), e);
        }
    }

    Ok(())
}
