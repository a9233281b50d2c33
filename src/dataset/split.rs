//! Chronological dataset splitting
//!
//! Samples are ordered by recording date; the earliest block becomes the
//! training set and everything after it stays unseen for evaluation. The
//! split is deterministic: ties on the same date keep their original file
//! order (stable sort).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::loader::EnergyGridDataset;
use crate::utils::error::{EnergyGridError, Result};

/// Configuration for the chronological split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Upper bound on the number of training samples; the earliest
    /// `min(max_train, n)` samples train, the rest test
    pub max_train: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { max_train: 20_000 }
    }
}

impl SplitConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_train == 0 {
            return Err(EnergyGridError::Config(
                "max_train must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Train/test partition of dataset indices in chronological order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronologicalSplits {
    /// Indices of the earliest samples, sorted by date
    pub train_indices: Vec<usize>,
    /// Indices of everything after the training block, sorted by date
    pub test_indices: Vec<usize>,
}

impl ChronologicalSplits {
    /// Split by per-sample dates
    pub fn from_dates(dates: &[NaiveDate], config: &SplitConfig) -> Result<Self> {
        config.validate()?;

        if dates.is_empty() {
            return Err(EnergyGridError::Dataset(
                "no samples provided for splitting".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..dates.len()).collect();
        // stable, so same-date samples keep their file order
        order.sort_by_key(|&idx| dates[idx]);

        let n_train = config.max_train.min(order.len());
        let test_indices = order.split_off(n_train);
        let train_indices = order;

        info!(
            "Chronological split: {} train / {} test",
            train_indices.len(),
            test_indices.len()
        );

        Ok(Self {
            train_indices,
            test_indices,
        })
    }

    /// Split a loaded dataset by its trace dates
    pub fn from_dataset(dataset: &EnergyGridDataset, config: &SplitConfig) -> Result<Self> {
        let dates: Vec<NaiveDate> = dataset.trace.iter().map(|record| record.date).collect();
        Self::from_dates(&dates, config)
    }

    /// Total number of samples covered by the split
    pub fn total(&self) -> usize {
        self.train_indices.len() + self.test_indices.len()
    }

    /// Summarize both sides of the split
    pub fn stats(&self, dates: &[NaiveDate]) -> SplitStats {
        let side_range = |indices: &[usize]| {
            let first = indices.first().map(|&idx| dates[idx]);
            let last = indices.last().map(|&idx| dates[idx]);
            (first, last)
        };

        let (train_first, train_last) = side_range(&self.train_indices);
        let (test_first, test_last) = side_range(&self.test_indices);

        SplitStats {
            total: self.total(),
            train: self.train_indices.len(),
            test: self.test_indices.len(),
            train_first,
            train_last,
            test_first,
            test_last,
        }
    }
}

/// Summary of a chronological split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitStats {
    pub total: usize,
    pub train: usize,
    pub test: usize,
    pub train_first: Option<NaiveDate>,
    pub train_last: Option<NaiveDate>,
    pub test_first: Option<NaiveDate>,
    pub test_last: Option<NaiveDate>,
}

impl std::fmt::Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Chronological split ({} samples):", self.total)?;
        match (self.train_first, self.train_last) {
            (Some(first), Some(last)) => {
                writeln!(f, "  Train: {:>7} samples, {} to {}", self.train, first, last)?
            }
            _ => writeln!(f, "  Train: {:>7} samples", self.train)?,
        }
        match (self.test_first, self.test_last) {
            (Some(first), Some(last)) => {
                write!(f, "  Test:  {:>7} samples, {} to {}", self.test, first, last)
            }
            _ => write!(f, "  Test:  {:>7} samples (empty)", self.test),
        }
    }
}
