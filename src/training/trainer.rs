//! Training Pipeline for the Energy Regressor
//!
//! This module implements the full training loop using the Burn framework,
//! including:
//! - Forward/backward passes with automatic differentiation
//! - MSE loss computation
//! - Adam optimizer with reduce-on-plateau learning rate scheduling
//! - Per-epoch validation on the held-out chronological split
//! - Checkpoint saving and loading

use std::path::{Path, PathBuf};

use burn::{
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use burn::data::dataloader::batcher::Batcher;
use chrono::Local;
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::burn_dataset::{GridBatcher, GridItem, GridTensorDataset};
use crate::dataset::loader::EnergyGridDataset;
use crate::dataset::outliers::{apply_outlier_policy, OutlierOutcome};
use crate::dataset::split::ChronologicalSplits;
use crate::model::cnn::EnergyRegressor;
use crate::model::config::{ExperimentConfig, ModelConfig, TrainingConfig};
use crate::training::scheduler::ReduceOnPlateau;
use crate::utils::error::{EnergyGridError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{RegressionMetrics, RunningAverage};
use crate::utils::{format_duration, format_number};

/// Training state for checkpointing and monitoring
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Best validation MSE seen so far
    pub best_val_mse: f64,
    /// Epoch that produced the best validation MSE (0-indexed)
    pub best_epoch: usize,
    /// Training loss history (per epoch)
    pub train_losses: Vec<f64>,
    /// Validation MSE history (per epoch)
    pub val_mses: Vec<f64>,
    /// Total training samples seen
    pub samples_seen: usize,
    /// Current learning rate
    pub current_lr: f64,
}

impl TrainingState {
    /// Create a new training state with the initial learning rate
    pub fn new(initial_lr: f64) -> Self {
        Self {
            epoch: 0,
            best_val_mse: f64::INFINITY,
            best_epoch: 0,
            train_losses: Vec::new(),
            val_mses: Vec::new(),
            samples_seen: 0,
            current_lr: initial_lr,
        }
    }

    /// Record training loss for the current epoch
    pub fn record_train_loss(&mut self, loss: f64) {
        if self.train_losses.len() <= self.epoch {
            self.train_losses.push(loss);
        } else {
            self.train_losses[self.epoch] = loss;
        }
    }

    /// Record validation MSE for the current epoch
    pub fn record_val_mse(&mut self, mse: f64) {
        if self.val_mses.len() <= self.epoch {
            self.val_mses.push(mse);
        } else {
            self.val_mses[self.epoch] = mse;
        }
    }
}

/// Main trainer for the energy regressor using Burn
pub struct Trainer<B: AutodiffBackend> {
    /// Model being trained
    pub model: EnergyRegressor<B>,
    /// Adam optimizer
    optimizer: OptimizerAdaptor<Adam, EnergyRegressor<B>, B>,
    /// Training configuration
    pub config: TrainingConfig,
    /// Current training state
    pub state: TrainingState,
    /// Learning rate scheduler
    scheduler: ReduceOnPlateau,
    /// Device to train on
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer with the given model and configuration
    pub fn new(model: EnergyRegressor<B>, config: TrainingConfig, device: B::Device) -> Self {
        let optimizer = AdamConfig::new().init();
        let scheduler = ReduceOnPlateau::new(
            config.learning_rate,
            config.scheduler_factor,
            config.scheduler_patience,
            config.min_lr,
        );
        let state = TrainingState::new(config.learning_rate);

        Self {
            model,
            optimizer,
            config,
            state,
            scheduler,
            device,
        }
    }

    /// Train for one epoch over a shuffled pass of the training split
    ///
    /// Prints a running loss every `update_freq` batches and returns the
    /// average batch loss of the whole epoch.
    pub fn train_epoch(
        &mut self,
        dataset: &GridTensorDataset,
        batcher: &GridBatcher<B>,
        rng: &mut ChaCha8Rng,
    ) -> Result<f64> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(rng);

        let num_batches = (order.len() + self.config.batch_size - 1) / self.config.batch_size;
        if num_batches == 0 {
            return Err(EnergyGridError::Training(
                "training split is empty".to_string(),
            ));
        }

        info!(
            "Training epoch {} with {} batches",
            self.state.epoch + 1,
            num_batches
        );

        let mut epoch_loss = 0.0;
        let mut window = RunningAverage::new();

        for (batch_idx, chunk) in order.chunks(self.config.batch_size).enumerate() {
            let items = self.collect_items(dataset, chunk)?;
            let batch = batcher.batch(items, &self.device);

            // Forward pass
            let predictions = self.model.forward(batch.grids);
            let loss = MseLoss::new().forward(predictions, batch.targets, Reduction::Mean);
            let loss_value: f64 = loss.clone().into_scalar().elem();

            // Backward pass and parameter update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.state.current_lr, self.model.clone(), grads);

            epoch_loss += loss_value;
            window.add(loss_value);
            self.state.samples_seen += chunk.len();

            if (batch_idx + 1) % self.config.update_freq == 0 {
                println!(
                    "Epoch: {}, Batch: {}, Loss: {:.3}",
                    self.state.epoch + 1,
                    batch_idx + 1,
                    window.average()
                );
                window.reset();
            }
        }

        let avg_loss = epoch_loss / num_batches as f64;
        self.state.record_train_loss(avg_loss);

        Ok(avg_loss)
    }

    /// Evaluate on a held-out split and return the average batch MSE
    ///
    /// Iterates in natural order without shuffling, using the inner
    /// (non-autodiff) model. The result divides by the number of batches,
    /// not the number of samples.
    pub fn evaluate(
        &self,
        dataset: &GridTensorDataset,
        batcher: &GridBatcher<B::InnerBackend>,
    ) -> Result<f64> {
        let order: Vec<usize> = (0..dataset.len()).collect();
        let num_batches = (order.len() + self.config.batch_size - 1) / self.config.batch_size;
        if num_batches == 0 {
            return Err(EnergyGridError::Training(
                "evaluation split is empty".to_string(),
            ));
        }

        let model_valid = self.model.valid();
        let mut total_loss = 0.0;

        for chunk in order.chunks(self.config.batch_size) {
            let items = self.collect_items(dataset, chunk)?;
            let batch = batcher.batch(items, &self.device);

            let predictions = model_valid.forward(batch.grids);
            let loss = MseLoss::new().forward(predictions, batch.targets, Reduction::Mean);
            let loss_value: f64 = loss.into_scalar().elem();
            total_loss += loss_value;
        }

        Ok(total_loss / num_batches as f64)
    }

    /// Run inference over a split in natural order and collect predictions
    pub fn predict(
        &self,
        dataset: &GridTensorDataset,
        batcher: &GridBatcher<B::InnerBackend>,
    ) -> Result<Vec<f32>> {
        let model_valid = self.model.valid();
        let order: Vec<usize> = (0..dataset.len()).collect();
        let mut predictions = Vec::with_capacity(dataset.len());

        for chunk in order.chunks(self.config.batch_size) {
            let items = self.collect_items(dataset, chunk)?;
            let batch = batcher.batch(items, &self.device);

            let output = model_valid.forward(batch.grids);
            let values = output.into_data().to_vec::<f32>().map_err(|e| {
                EnergyGridError::Inference(format!("failed to read predictions: {:?}", e))
            })?;
            predictions.extend(values);
        }

        Ok(predictions)
    }

    /// Close out an epoch after validation
    ///
    /// Updates the best-model tracking, feeds the scheduler and advances the
    /// epoch counter. Returns true if this epoch produced a new best MSE.
    pub fn finish_epoch(&mut self, val_mse: f64) -> bool {
        self.state.record_val_mse(val_mse);

        let is_best = val_mse < self.state.best_val_mse;
        if is_best {
            self.state.best_val_mse = val_mse;
            self.state.best_epoch = self.state.epoch;
        }

        self.state.current_lr = self.scheduler.step(val_mse);
        self.state.epoch += 1;

        is_best
    }

    /// Save model weights
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        info!("Saving checkpoint to {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| EnergyGridError::Model(format!("failed to save model: {:?}", e)))?;

        Ok(())
    }

    /// Load model weights
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        info!("Loading checkpoint from {:?}", path);

        let recorder = CompactRecorder::new();
        self.model = self
            .model
            .clone()
            .load_file(path, &recorder, &self.device)
            .map_err(|e| EnergyGridError::Model(format!("failed to load model: {:?}", e)))?;

        Ok(())
    }

    /// Get the current learning rate
    pub fn current_lr(&self) -> f64 {
        self.state.current_lr
    }

    /// Get a reference to the model
    pub fn model(&self) -> &EnergyRegressor<B> {
        &self.model
    }

    fn collect_items(&self, dataset: &GridTensorDataset, indices: &[usize]) -> Result<Vec<GridItem>> {
        indices
            .iter()
            .map(|&index| {
                dataset.get(index).ok_or_else(|| {
                    EnergyGridError::Training(format!("batch index {} out of range", index))
                })
            })
            .collect()
    }
}

/// Per-epoch summary kept in the training report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Epoch number (1-based)
    pub epoch: usize,
    pub train_loss: f64,
    pub val_mse: f64,
    pub learning_rate: f64,
}

/// Everything a training run leaves behind, saved as JSON beside the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochSummary>,
    pub best_val_mse: f64,
    /// Epoch number of the best validation MSE (1-based)
    pub best_epoch: usize,
    pub final_val_mse: f64,
    pub test_metrics: RegressionMetrics,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
}

/// Run the full training pipeline
///
/// Splits the dataset chronologically, applies the configured outlier
/// policy to the training rows, trains for the configured number of epochs
/// with per-epoch validation, then evaluates once more, reports regression
/// metrics on the held-out split and saves the model with its configuration
/// and report.
pub fn run_training<B: AutodiffBackend>(
    dataset: &EnergyGridDataset,
    model_config: &ModelConfig,
    config: &TrainingConfig,
    output_dir: &Path,
    device: B::Device,
) -> Result<TrainingReport> {
    model_config.validate()?;
    config.validate()?;

    let run_start = std::time::Instant::now();
    B::seed(config.seed);
    println!("{}", "Initializing Training...".green().bold());
    println!("  Device: {:?}", device);
    println!("{}", config);

    // Chronological split
    println!();
    println!("{}", "Preparing Splits...".cyan());
    let splits = ChronologicalSplits::from_dataset(dataset, &config.split)?;
    if splits.test_indices.is_empty() {
        return Err(EnergyGridError::Training(format!(
            "test split is empty: all {} samples fall inside the training window; \
             reduce max_train or provide more data",
            dataset.len()
        )));
    }
    let all_dates: Vec<_> = (0..dataset.len()).filter_map(|i| dataset.date(i)).collect();
    println!("{}", splits.stats(&all_dates));

    // Outlier policy on training rows only
    let train_names: Vec<&str> = splits
        .train_indices
        .iter()
        .filter_map(|&i| dataset.plant_name(i))
        .collect();
    let train_labels: Vec<f32> = splits
        .train_indices
        .iter()
        .map(|&i| dataset.labels()[i])
        .collect();
    if train_names.len() != splits.train_indices.len() {
        return Err(EnergyGridError::Dataset(
            "trace row missing for a training sample".to_string(),
        ));
    }

    let outcome = apply_outlier_policy(
        &config.outliers,
        &splits.train_indices,
        &train_names,
        &train_labels,
    )?;

    let train_dataset = match &outcome {
        OutlierOutcome::Dropped {
            kept_indices,
            kept_frac,
        } => {
            println!(
                "[outliers] drop mode: kept {:.1}% of train, removed {:.1}%",
                kept_frac * 100.0,
                (1.0 - kept_frac) * 100.0
            );
            GridTensorDataset::select(dataset, kept_indices)?
        }
        OutlierOutcome::Winsorized { labels } => {
            println!(
                "[outliers] winsorize mode: labels clipped to [{}%, {}%] per plant",
                (config.outliers.q_lo * 100.0) as u32,
                (config.outliers.q_hi * 100.0) as u32
            );
            GridTensorDataset::select_with_labels(dataset, &splits.train_indices, labels)?
        }
        OutlierOutcome::Disabled => {
            println!("[outliers] disabled");
            GridTensorDataset::select(dataset, &splits.train_indices)?
        }
    };
    let test_dataset = GridTensorDataset::select(dataset, &splits.test_indices)?;

    println!();
    println!("{}", "Creating Model...".cyan());
    let model = EnergyRegressor::<B>::new(model_config, &device);
    let mut trainer = Trainer::new(model, config.clone(), device.clone());

    let train_batcher = GridBatcher::<B>::new(device.clone());
    let eval_batcher = GridBatcher::<B::InnerBackend>::new(device.clone());

    println!();
    println!("{}", "Starting Training...".green().bold());
    println!("  Training samples: {}", format_number(train_dataset.len()));
    println!("  Test samples: {}", format_number(test_dataset.len()));
    println!();

    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut logger = TrainingLogger::new(config.epochs);
    let mut epoch_summaries = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        println!(
            "{}",
            format!("Epoch {}/{}", epoch + 1, config.epochs)
                .yellow()
                .bold()
        );

        logger.start_epoch(epoch);
        let lr = trainer.current_lr();
        let train_loss = trainer.train_epoch(&train_dataset, &train_batcher, &mut epoch_rng)?;
        let val_mse = trainer.evaluate(&test_dataset, &eval_batcher)?;
        let is_best = trainer.finish_epoch(val_mse);
        logger.end_epoch(train_loss, val_mse, lr);

        if is_best {
            logger.log_new_best(val_mse);
        }

        epoch_summaries.push(EpochSummary {
            epoch: epoch + 1,
            train_loss,
            val_mse,
            learning_rate: lr,
        });
    }

    // Final held-out evaluation
    let final_val_mse = trainer.evaluate(&test_dataset, &eval_batcher)?;
    println!("Avg. Validation Loss: {}", final_val_mse);

    let predictions = trainer.predict(&test_dataset, &eval_batcher)?;
    let test_metrics = RegressionMetrics::from_predictions(&predictions, &test_dataset.targets());
    println!("{}", test_metrics.display());

    // Save artifacts
    println!("{}", "Saving Model...".cyan());
    std::fs::create_dir_all(output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let model_name = format!("energy_regressor_{}", timestamp);
    let checkpoint_path = output_dir.join(&model_name);
    trainer.save_checkpoint(&checkpoint_path)?;

    let config_path = output_dir.join(format!("{}.config.json", model_name));
    ExperimentConfig {
        model: model_config.clone(),
        training: config.clone(),
    }
    .save(&config_path)?;

    let report = TrainingReport {
        epochs: epoch_summaries,
        best_val_mse: trainer.state.best_val_mse,
        best_epoch: trainer.state.best_epoch + 1,
        final_val_mse,
        test_metrics,
        model_path: checkpoint_path.with_extension("mpk"),
        config_path,
    };
    let report_path = output_dir.join(format!("{}.report.json", model_name));
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    logger.log_complete(trainer.state.best_val_mse);
    println!("  Saved to: {:?}", report.model_path);
    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Best validation MSE: {:.4}", trainer.state.best_val_mse);
    println!(
        "  Total time: {}",
        format_duration(run_start.elapsed().as_secs_f64())
    );
    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!(
        "  - Verify the artifact: energy_grid verify --model {:?}",
        report.model_path
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrainingBackend;
    use crate::dataset::loader::{GridBundle, TraceRecord};
    use crate::dataset::outliers::{OutlierConfig, OutlierMode};
    use crate::dataset::split::SplitConfig;
    use crate::{GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH};
    use chrono::NaiveDate;

    fn synthetic_dataset(n: usize) -> EnergyGridDataset {
        let mut bundle = GridBundle::new(GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH);
        let grid_len = bundle.grid_len();
        for i in 0..n {
            let value = (i % 7) as f32 * 0.1;
            bundle.push(&vec![value; grid_len], 10.0 + value).unwrap();
        }
        let trace = (0..n)
            .map(|i| TraceRecord {
                date: NaiveDate::from_ymd_opt(2020, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new((i / 2) as u64))
                    .unwrap(),
                name: format!("plant_{}", i % 2),
            })
            .collect();
        EnergyGridDataset::new(bundle, trace).unwrap()
    }

    fn tiny_model_config() -> ModelConfig {
        ModelConfig {
            base_filters: 2,
            fc_units: 8,
            ..ModelConfig::default()
        }
    }

    fn tiny_training_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 1,
            batch_size: 8,
            update_freq: 1000,
            split: SplitConfig { max_train: 30 },
            outliers: OutlierConfig {
                mode: OutlierMode::Disabled,
                ..OutlierConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_training_state_new() {
        let state = TrainingState::new(0.001);
        assert_eq!(state.epoch, 0);
        assert_eq!(state.current_lr, 0.001);
        assert!(state.best_val_mse.is_infinite());
        assert!(state.train_losses.is_empty());
    }

    #[test]
    fn test_training_state_record() {
        let mut state = TrainingState::new(0.001);

        state.record_train_loss(0.5);
        assert_eq!(state.train_losses, vec![0.5]);

        state.record_val_mse(0.85);
        assert_eq!(state.val_mses, vec![0.85]);
    }

    #[test]
    fn test_finish_epoch_tracks_best() {
        let device = Default::default();
        let model = EnergyRegressor::<TrainingBackend>::new(&tiny_model_config(), &device);
        let mut trainer = Trainer::new(model, tiny_training_config(), device);

        assert!(trainer.finish_epoch(1.0));
        assert!(!trainer.finish_epoch(2.0));
        assert!(trainer.finish_epoch(0.5));

        assert_eq!(trainer.state.best_val_mse, 0.5);
        assert_eq!(trainer.state.best_epoch, 2);
        assert_eq!(trainer.state.epoch, 3);
        assert_eq!(trainer.state.val_mses, vec![1.0, 2.0, 0.5]);
    }

    #[test]
    fn test_train_epoch_and_evaluate() {
        let device = <TrainingBackend as burn::tensor::backend::Backend>::Device::default();
        let dataset = synthetic_dataset(20);
        let indices: Vec<usize> = (0..20).collect();
        let split = GridTensorDataset::select(&dataset, &indices).unwrap();

        let model = EnergyRegressor::<TrainingBackend>::new(&tiny_model_config(), &device);
        let mut trainer = Trainer::new(model, tiny_training_config(), device.clone());

        let train_batcher = GridBatcher::<TrainingBackend>::new(device.clone());
        let eval_batcher = GridBatcher::new(device);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let loss = trainer.train_epoch(&split, &train_batcher, &mut rng).unwrap();
        assert!(loss.is_finite());
        assert_eq!(trainer.state.samples_seen, 20);
        assert_eq!(trainer.state.train_losses.len(), 1);

        let mse = trainer.evaluate(&split, &eval_batcher).unwrap();
        assert!(mse.is_finite() && mse >= 0.0);

        let predictions = trainer.predict(&split, &eval_batcher).unwrap();
        assert_eq!(predictions.len(), 20);
        assert!(predictions.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_evaluate_empty_split_errors() {
        let device = Default::default();
        let dataset = synthetic_dataset(4);
        let empty = GridTensorDataset::select(&dataset, &[]).unwrap();

        let model = EnergyRegressor::<TrainingBackend>::new(&tiny_model_config(), &device);
        let trainer = Trainer::new(model, tiny_training_config(), device);

        let eval_batcher = GridBatcher::new(Default::default());
        assert!(trainer.evaluate(&empty, &eval_batcher).is_err());
    }

    #[test]
    fn test_run_training_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = synthetic_dataset(40);
        let device = Default::default();

        let report = run_training::<TrainingBackend>(
            &dataset,
            &tiny_model_config(),
            &tiny_training_config(),
            dir.path(),
            device,
        )
        .unwrap();

        assert_eq!(report.epochs.len(), 1);
        assert!(report.final_val_mse.is_finite());
        assert_eq!(report.best_epoch, 1);
        assert!(report.model_path.exists());
        assert!(report.config_path.exists());
        assert_eq!(report.test_metrics.total_samples, 10);
    }

    #[test]
    fn test_run_training_rejects_empty_test_split() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = synthetic_dataset(10);
        let mut config = tiny_training_config();
        config.split.max_train = 20_000; // swallows every sample

        let result = run_training::<TrainingBackend>(
            &dataset,
            &tiny_model_config(),
            &config,
            dir.path(),
            Default::default(),
        );
        assert!(result.is_err());
    }
}
