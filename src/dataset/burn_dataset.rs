//! Burn Dataset Integration
//!
//! This module implements Burn's Dataset trait and Batcher for the weather
//! grid samples, turning selected rows of an [`EnergyGridDataset`] into
//! `[batch, channels, height, width]` input tensors and `[batch, 1]` targets.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::loader::EnergyGridDataset;
use crate::utils::error::{EnergyGridError, Result};
use crate::{GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH};

/// A single training sample ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridItem {
    /// Weather grid as flattened CHW float array [channels * height * width]
    pub grid: Vec<f32>,
    /// Energy output target
    pub target: f32,
}

/// In-memory tensor dataset over a selected subset of samples
///
/// Rows are materialized up front; a single grid is only 588 floats, so even
/// the full training split fits comfortably in memory.
#[derive(Clone, Debug)]
pub struct GridTensorDataset {
    items: Vec<GridItem>,
}

impl GridTensorDataset {
    /// Materialize the samples at `indices`, keeping the dataset's labels
    pub fn select(dataset: &EnergyGridDataset, indices: &[usize]) -> Result<Self> {
        Self::build(dataset, indices, None)
    }

    /// Materialize the samples at `indices` with replacement labels
    ///
    /// `labels` is aligned with `indices`, not with the underlying dataset;
    /// this is how winsorized training labels are carried into batching.
    pub fn select_with_labels(
        dataset: &EnergyGridDataset,
        indices: &[usize],
        labels: &[f32],
    ) -> Result<Self> {
        if labels.len() != indices.len() {
            return Err(EnergyGridError::InvalidInput(format!(
                "{} replacement labels for {} selected samples",
                labels.len(),
                indices.len()
            )));
        }
        Self::build(dataset, indices, Some(labels))
    }

    fn build(
        dataset: &EnergyGridDataset,
        indices: &[usize],
        labels: Option<&[f32]>,
    ) -> Result<Self> {
        let bundle = &dataset.bundle;
        if (bundle.channels, bundle.height, bundle.width) != (GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH)
        {
            return Err(EnergyGridError::Dataset(format!(
                "bundle grids are {}x{}x{}, expected {}x{}x{}",
                bundle.channels,
                bundle.height,
                bundle.width,
                GRID_CHANNELS,
                GRID_HEIGHT,
                GRID_WIDTH
            )));
        }

        let mut items = Vec::with_capacity(indices.len());
        for (row, &index) in indices.iter().enumerate() {
            let grid = dataset.grid(index).ok_or_else(|| {
                EnergyGridError::Dataset(format!(
                    "selected index {} out of bounds for dataset of {} samples",
                    index,
                    dataset.len()
                ))
            })?;
            let target = match labels {
                Some(labels) => labels[row],
                None => dataset.labels()[index],
            };
            items.push(GridItem {
                grid: grid.to_vec(),
                target,
            });
        }

        Ok(Self { items })
    }

    /// All targets in selection order
    pub fn targets(&self) -> Vec<f32> {
        self.items.iter().map(|item| item.target).collect()
    }
}

impl Dataset<GridItem> for GridTensorDataset {
    fn get(&self, index: usize) -> Option<GridItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of weather grids and their regression targets
#[derive(Clone, Debug)]
pub struct GridBatch<B: Backend> {
    /// Batch of grids with shape [batch_size, channels, height, width]
    pub grids: Tensor<B, 4>,
    /// Batch of energy targets with shape [batch_size, 1]
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating weather grid batches
#[derive(Clone, Debug)]
pub struct GridBatcher<B: Backend> {
    #[allow(dead_code)]
    device: B::Device,
}

impl<B: Backend> GridBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<B, GridItem, GridBatch<B>> for GridBatcher<B> {
    fn batch(&self, items: Vec<GridItem>, device: &B::Device) -> GridBatch<B> {
        let batch_size = items.len();

        // Flatten all grids into a single vector
        let grids_data: Vec<f32> = items.iter().flat_map(|item| item.grid.clone()).collect();

        let grids = Tensor::<B, 4>::from_floats(
            TensorData::new(
                grids_data,
                [batch_size, GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH],
            ),
            device,
        );

        let targets_data: Vec<f32> = items.iter().map(|item| item.target).collect();
        let targets =
            Tensor::<B, 2>::from_floats(TensorData::new(targets_data, [batch_size, 1]), device);

        GridBatch { grids, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, DefaultBackend};
    use crate::dataset::loader::{GridBundle, TraceRecord};
    use chrono::NaiveDate;

    fn test_dataset(n: usize) -> EnergyGridDataset {
        let mut bundle = GridBundle::new(GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH);
        let grid_len = bundle.grid_len();
        for i in 0..n {
            bundle
                .push(&vec![i as f32; grid_len], 100.0 + i as f32)
                .unwrap();
        }
        let trace = (0..n)
            .map(|i| TraceRecord {
                date: NaiveDate::from_ymd_opt(2021, 3, 1 + i as u32).unwrap(),
                name: "alpha".to_string(),
            })
            .collect();
        EnergyGridDataset::new(bundle, trace).unwrap()
    }

    #[test]
    fn test_select_keeps_dataset_labels() {
        let dataset = test_dataset(4);
        let selected = GridTensorDataset::select(&dataset, &[2, 0]).unwrap();

        assert_eq!(selected.len(), 2);
        let first = selected.get(0).unwrap();
        assert_eq!(first.target, 102.0);
        assert_eq!(first.grid[0], 2.0);
        assert_eq!(selected.get(1).unwrap().target, 100.0);
        assert!(selected.get(2).is_none());
    }

    #[test]
    fn test_select_with_labels_overrides_targets() {
        let dataset = test_dataset(3);
        let selected =
            GridTensorDataset::select_with_labels(&dataset, &[0, 1], &[7.0, 8.0]).unwrap();

        assert_eq!(selected.targets(), vec![7.0, 8.0]);
        // Grids come from the dataset untouched
        assert_eq!(selected.get(1).unwrap().grid[0], 1.0);
    }

    #[test]
    fn test_select_rejects_bad_index() {
        let dataset = test_dataset(2);
        assert!(GridTensorDataset::select(&dataset, &[0, 5]).is_err());
    }

    #[test]
    fn test_select_rejects_misaligned_labels() {
        let dataset = test_dataset(3);
        assert!(GridTensorDataset::select_with_labels(&dataset, &[0, 1], &[1.0]).is_err());
    }

    #[test]
    fn test_select_rejects_wrong_grid_shape() {
        let mut bundle = GridBundle::new(1, 2, 2);
        bundle.push(&[1.0, 2.0, 3.0, 4.0], 5.0).unwrap();
        let trace = vec![TraceRecord {
            date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            name: "alpha".to_string(),
        }];
        let dataset = EnergyGridDataset::new(bundle, trace).unwrap();

        assert!(GridTensorDataset::select(&dataset, &[0]).is_err());
    }

    #[test]
    fn test_batch_shapes() {
        let dataset = test_dataset(3);
        let selected = GridTensorDataset::select(&dataset, &[0, 1, 2]).unwrap();
        let device = default_device();
        let batcher: GridBatcher<DefaultBackend> = GridBatcher::new(device.clone());

        let items: Vec<GridItem> = (0..selected.len()).map(|i| selected.get(i).unwrap()).collect();
        let batch = batcher.batch(items, &device);

        assert_eq!(
            batch.grids.dims(),
            [3, GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH]
        );
        assert_eq!(batch.targets.dims(), [3, 1]);

        let targets = batch.targets.into_data().to_vec::<f32>().unwrap();
        assert_eq!(targets, vec![100.0, 101.0, 102.0]);
    }
}
