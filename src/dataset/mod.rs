//! Dataset module for weather grid and energy label handling
//!
//! This module provides functionality for:
//! - Loading the tensor bundle and trace CSV into a merged dataset view
//! - Splitting samples chronologically into train and test
//! - Filtering or clipping outlier labels per plant
//! - Batching samples into Burn tensors for training
//! - Generating a synthetic demo dataset
//!
//! ## Split Strategy
//!
//! Samples are ordered by recording date; the earliest `max_train` samples
//! form the training split and everything after them is held out for
//! evaluation. Outlier statistics are computed on the training split only,
//! grouped by plant, so the held-out period stays untouched.

pub mod burn_dataset;
pub mod loader;
pub mod outliers;
pub mod prepare;
pub mod split;

// Re-export main types for convenience
pub use burn_dataset::{GridBatch, GridBatcher, GridItem, GridTensorDataset};
pub use loader::{DatasetStats, EnergyGridDataset, GridBundle, PlantStats, TraceRecord};
pub use outliers::{apply_outlier_policy, OutlierConfig, OutlierMode, OutlierOutcome};
pub use prepare::{prepare_synthetic_dataset, PrepareConfig, PrepareStats};
pub use split::{ChronologicalSplits, SplitConfig, SplitStats};

/// Weather channels per grid (wind speed, temperature, humidity)
pub const GRID_CHANNELS: usize = 3;

/// Grid height in cells
pub const GRID_HEIGHT: usize = 14;

/// Grid width in cells
pub const GRID_WIDTH: usize = 14;

/// Values in one flattened grid
pub const GRID_LEN: usize = GRID_CHANNELS * GRID_HEIGHT * GRID_WIDTH;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_constants() {
        assert_eq!(GRID_LEN, 588);
        assert_eq!(GRID_CHANNELS * GRID_HEIGHT * GRID_WIDTH, GRID_LEN);
    }
}
