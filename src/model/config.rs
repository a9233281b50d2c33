//! Model and Training Configuration
//!
//! Defines configuration structures for the CNN architecture and the
//! training hyperparameters, both serializable so a trained model can be
//! reproduced from the JSON written next to its weights.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::outliers::OutlierConfig;
use crate::dataset::split::SplitConfig;
use crate::utils::error::{EnergyGridError, Result};
use crate::GRID_CHANNELS;

/// Configuration for the CNN regression architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of input weather channels
    pub input_channels: usize,

    /// Filters in the first convolutional block; the second and third
    /// blocks double and quadruple this
    pub base_filters: usize,

    /// Kernel size for convolutional layers
    pub kernel_size: usize,

    /// Side length of the adaptive average pooling output
    pub pool_output: usize,

    /// Units in the hidden fully connected layer
    pub fc_units: usize,

    /// Beta parameter of the softplus output activation
    pub softplus_beta: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_channels: GRID_CHANNELS,
            base_filters: 16,
            kernel_size: 3,
            pool_output: 3,
            fc_units: 256,
            softplus_beta: 1.0,
        }
    }
}

impl ModelConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.input_channels == 0 {
            return Err(EnergyGridError::Config(
                "input_channels must be greater than 0".to_string(),
            ));
        }
        if self.base_filters == 0 {
            return Err(EnergyGridError::Config(
                "base_filters must be greater than 0".to_string(),
            ));
        }
        if self.kernel_size < 1 || self.kernel_size % 2 == 0 {
            return Err(EnergyGridError::Config(
                "kernel_size must be a positive odd number".to_string(),
            ));
        }
        if self.pool_output == 0 {
            return Err(EnergyGridError::Config(
                "pool_output must be greater than 0".to_string(),
            ));
        }
        if self.fc_units == 0 {
            return Err(EnergyGridError::Config(
                "fc_units must be greater than 0".to_string(),
            ));
        }
        if self.softplus_beta <= 0.0 {
            return Err(EnergyGridError::Config(
                "softplus_beta must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Feature length after pooling and flattening the last conv block
    pub fn flattened_features(&self) -> usize {
        self.base_filters * 4 * self.pool_output * self.pool_output
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and evaluation
    pub batch_size: usize,

    /// Initial learning rate for Adam
    pub learning_rate: f64,

    /// Print a running loss every this many batches
    pub update_freq: usize,

    /// Random seed for reproducibility
    pub seed: u64,

    /// Multiplier applied to the learning rate on plateau
    pub scheduler_factor: f64,

    /// Non-improving validations tolerated before reducing the rate
    pub scheduler_patience: usize,

    /// Lower bound for the learning rate
    pub min_lr: f64,

    /// Chronological split settings
    pub split: SplitConfig,

    /// Outlier filtering settings
    pub outliers: OutlierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 32,
            learning_rate: 1e-3,
            update_freq: 50,
            seed: 42,
            scheduler_factor: 0.5,
            scheduler_patience: 2,
            min_lr: 1e-6,
            split: SplitConfig::default(),
            outliers: OutlierConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(EnergyGridError::Config(
                "epochs must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EnergyGridError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(EnergyGridError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.update_freq == 0 {
            return Err(EnergyGridError::Config(
                "update_freq must be greater than 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.scheduler_factor) || self.scheduler_factor == 0.0 {
            return Err(EnergyGridError::Config(
                "scheduler_factor must be in (0, 1)".to_string(),
            ));
        }
        if self.min_lr <= 0.0 || self.min_lr > self.learning_rate {
            return Err(EnergyGridError::Config(
                "min_lr must be positive and not exceed learning_rate".to_string(),
            ));
        }
        self.split.validate()?;
        self.outliers.validate()?;
        Ok(())
    }
}

impl fmt::Display for TrainingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training configuration:")?;
        writeln!(f, "  Epochs: {}", self.epochs)?;
        writeln!(f, "  Batch size: {}", self.batch_size)?;
        writeln!(f, "  Learning rate: {}", self.learning_rate)?;
        writeln!(
            f,
            "  Scheduler: ReduceOnPlateau (factor {}, patience {}, min {})",
            self.scheduler_factor, self.scheduler_patience, self.min_lr
        )?;
        writeln!(f, "  Max train samples: {}", self.split.max_train)?;
        write!(f, "  Outlier mode: {}", self.outliers.mode)
    }
}

/// Everything needed to reproduce a trained model, saved beside the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)?;
        config.model.validate()?;
        config.training.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::outliers::OutlierMode;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.input_channels, 3);
        assert_eq!(config.base_filters, 16);
        assert_eq!(config.flattened_features(), 576);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ModelConfig::default();
        config.kernel_size = 4; // even
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.base_filters = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.softplus_beta = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 1);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.update_freq, 50);
        assert_eq!(config.scheduler_patience, 2);
        assert_eq!(config.split.max_train, 20_000);
        assert_eq!(config.outliers.mode, OutlierMode::Drop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_training_config_validation() {
        let mut config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.scheduler_factor = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.min_lr = config.learning_rate * 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_experiment_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ExperimentConfig::default();
        config.training.epochs = 3;
        config.save(&path).unwrap();

        let loaded = ExperimentConfig::load(&path).unwrap();
        assert_eq!(loaded.training.epochs, 3);
        assert_eq!(loaded.model.fc_units, config.model.fc_units);
    }
}
