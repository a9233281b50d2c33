//! # Energy Grid Regression
//!
//! A Rust library for predicting energy plant output from gridded weather
//! data using the Burn framework. A small CNN regresses a single energy
//! value from a 3x14x14 grid of wind, temperature and humidity fields.
//!
//! ## Features
//!
//! - **Convolutional regression** with a softplus head keeping predictions non-negative
//! - **Burn framework** for portable, efficient neural network training and inference
//! - **Chronological splits** so models are always evaluated on later, unseen days
//! - **Per-plant outlier handling** with robust-z dropping or quantile winsorization
//!
//! ## Modules
//!
//! - `backend`: Compile-time backend selection (CPU by default)
//! - `dataset`: Bundle loading, synthetic data generation, splits and outlier policies
//! - `model`: CNN architecture built with Burn
//! - `training`: Training loop, learning rate scheduling and reporting
//! - `inference`: Saved-model verification
//! - `utils`: Logging, metrics, and helper functions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use energy_grid::dataset::EnergyGridDataset;
//! use energy_grid::training::{run_training, TrainingConfig};
//!
//! // Load dataset
//! let dataset = EnergyGridDataset::load("data/energy.bin", "data/energy.trace.csv")?;
//!
//! // Train with the default recipe
//! let config = TrainingConfig::default();
//! // ... training and verification
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use backend::{default_device, DefaultBackend, TrainingBackend};
pub use dataset::loader::EnergyGridDataset;
pub use dataset::split::{ChronologicalSplits, SplitConfig};
pub use dataset::{
    GridBatch, GridBatcher, GridItem, GridTensorDataset, OutlierConfig, OutlierMode,
};
pub use dataset::{GRID_CHANNELS, GRID_HEIGHT, GRID_LEN, GRID_WIDTH};
pub use inference::verifier::{verify_model, VerifyReport};
pub use model::cnn::EnergyRegressor;
pub use model::config::{ExperimentConfig, ModelConfig};
pub use training::trainer::{run_training, Trainer, TrainingReport, TrainingState};
pub use training::TrainingConfig;
pub use utils::error::{EnergyGridError, Result};
pub use utils::metrics::RegressionMetrics;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
