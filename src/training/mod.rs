//! Training module for the energy regression experiment
//!
//! This module provides:
//! - Main training loop with Burn framework
//! - Adam optimization with MSE loss
//! - Reduce-on-plateau learning rate scheduling
//! - Per-epoch validation on the chronological test split
//!
//! ## Training Approach
//!
//! The pipeline mirrors a fixed supervised recipe:
//! 1. Split samples chronologically, earliest block trains
//! 2. Clean training labels per plant (drop or winsorize)
//! 3. Train the CNN with Adam on minibatches of 32
//! 4. Validate each epoch and feed the MSE to the scheduler
//! 5. Save the final model with its configuration and report

pub mod scheduler;
pub mod trainer;

// Re-export main types for convenience
pub use scheduler::ReduceOnPlateau;
pub use trainer::{run_training, EpochSummary, Trainer, TrainingReport, TrainingState};

// Re-export TrainingConfig from model::config where it's defined
pub use crate::model::config::TrainingConfig;

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 1;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Default number of batches between progress prints
pub const DEFAULT_UPDATE_FREQ: usize = 50;
