//! Model module for the CNN regressor using the Burn framework
//!
//! This module provides:
//! - The convolutional regression architecture
//! - Model and training configuration structures
//!
//! ## Architecture
//!
//! The regressor maps a multi-channel weather grid to a single non-negative
//! energy prediction. It is intentionally small: three conv blocks, adaptive
//! pooling and a two-layer head, sized for 14x14 inputs.

pub mod cnn;
pub mod config;

// Re-export main types for convenience
pub use cnn::{ConvBlock, EnergyRegressor};
pub use config::{ExperimentConfig, ModelConfig, TrainingConfig};
