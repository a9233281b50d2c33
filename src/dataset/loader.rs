//! Energy Grid Dataset Loader
//!
//! This module handles loading the serialized tensor bundle (stacked weather
//! grids plus energy labels) and the accompanying trace CSV (per-sample date
//! and plant name), merging them into a single in-memory dataset view.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::outliers::{mad, median};
use crate::utils::error::{EnergyGridError, Result};

/// Serialized tensor bundle: stacked weather grids and their energy labels
///
/// `features` holds all grids back to back in `[n, channels, height, width]`
/// row-major order; `labels` holds one energy value per sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridBundle {
    /// Number of weather channels per grid
    pub channels: usize,
    /// Grid height in cells
    pub height: usize,
    /// Grid width in cells
    pub width: usize,
    /// Flattened input grids, sample-major
    pub features: Vec<f32>,
    /// Energy label per sample
    pub labels: Vec<f32>,
}

impl GridBundle {
    /// Create an empty bundle with the given grid shape
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            features: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Number of samples in the bundle
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the bundle holds no samples
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of values in a single flattened grid
    pub fn grid_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Append one sample
    pub fn push(&mut self, grid: &[f32], label: f32) -> Result<()> {
        if grid.len() != self.grid_len() {
            return Err(EnergyGridError::InvalidInput(format!(
                "grid has {} values, expected {} ({}x{}x{})",
                grid.len(),
                self.grid_len(),
                self.channels,
                self.height,
                self.width
            )));
        }
        self.features.extend_from_slice(grid);
        self.labels.push(label);
        Ok(())
    }

    /// Borrow the flattened grid of one sample
    pub fn grid(&self, index: usize) -> Option<&[f32]> {
        let grid_len = self.grid_len();
        let start = index.checked_mul(grid_len)?;
        self.features.get(start..start + grid_len)
    }

    /// Check the shape identities the file format promises
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.height == 0 || self.width == 0 {
            return Err(EnergyGridError::Dataset(
                "bundle declares a zero-sized grid dimension".to_string(),
            ));
        }
        if self.features.len() != self.labels.len() * self.grid_len() {
            return Err(EnergyGridError::Dataset(format!(
                "bundle shape mismatch: {} feature values for {} labels of {}-value grids",
                self.features.len(),
                self.labels.len(),
                self.grid_len()
            )));
        }
        Ok(())
    }

    /// Serialize the bundle to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        fs::write(path.as_ref(), bytes)?;
        debug!("Saved bundle with {} samples to {:?}", self.len(), path.as_ref());
        Ok(())
    }

    /// Load and validate a bundle from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let bundle: GridBundle = bincode::deserialize(&bytes)?;
        bundle.validate()?;
        Ok(bundle)
    }
}

/// One row of the trace CSV: when and at which plant a sample was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Recording date
    pub date: NaiveDate,
    /// Plant name
    pub name: String,
}

/// Raw CSV row before date parsing
#[derive(Debug, Deserialize)]
struct RawTraceRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Name")]
    name: String,
}

/// Read the trace CSV (`Date,Name` header, ISO dates)
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();

    for (idx, row) in reader.deserialize().enumerate() {
        let raw: RawTraceRow = row?;
        let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").map_err(|e| {
            EnergyGridError::Dataset(format!(
                "invalid date '{}' in trace line {}: {}",
                raw.date,
                idx + 2,
                e
            ))
        })?;
        records.push(TraceRecord {
            date,
            name: raw.name,
        });
    }

    Ok(records)
}

/// Write a trace CSV next to a bundle
pub fn write_trace<P: AsRef<Path>>(path: P, records: &[TraceRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    writer.write_record(["Date", "Name"])?;
    for record in records {
        writer.write_record([record.date.format("%Y-%m-%d").to_string(), record.name.clone()])?;
    }
    writer.flush()?;

    Ok(())
}

/// Merged dataset view: tensor bundle plus per-sample trace metadata
#[derive(Debug, Clone)]
pub struct EnergyGridDataset {
    /// The tensor bundle
    pub bundle: GridBundle,
    /// Per-sample trace, aligned with the bundle by index
    pub trace: Vec<TraceRecord>,
}

impl EnergyGridDataset {
    /// Merge a bundle and its trace, checking alignment
    pub fn new(bundle: GridBundle, trace: Vec<TraceRecord>) -> Result<Self> {
        bundle.validate()?;

        if bundle.is_empty() {
            return Err(EnergyGridError::Dataset(
                "dataset bundle contains no samples".to_string(),
            ));
        }
        if trace.len() != bundle.len() {
            return Err(EnergyGridError::Dataset(format!(
                "trace has {} rows but bundle has {} samples",
                trace.len(),
                bundle.len()
            )));
        }

        Ok(Self { bundle, trace })
    }

    /// Load the bundle and trace files and merge them
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(bundle_path: P, trace_path: Q) -> Result<Self> {
        info!("Loading dataset bundle from: {:?}", bundle_path.as_ref());
        let bundle = GridBundle::load(bundle_path)?;

        info!("Loading trace from: {:?}", trace_path.as_ref());
        let trace = read_trace(trace_path)?;

        let dataset = Self::new(bundle, trace)?;
        info!("Loaded {} samples", dataset.len());

        Ok(dataset)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.bundle.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.bundle.is_empty()
    }

    /// All energy labels, aligned with sample indices
    pub fn labels(&self) -> &[f32] {
        &self.bundle.labels
    }

    /// Flattened grid of one sample
    pub fn grid(&self, index: usize) -> Option<&[f32]> {
        self.bundle.grid(index)
    }

    /// Plant name of one sample
    pub fn plant_name(&self, index: usize) -> Option<&str> {
        self.trace.get(index).map(|r| r.name.as_str())
    }

    /// Recording date of one sample
    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.trace.get(index).map(|r| r.date)
    }

    /// Summary statistics over the whole dataset
    pub fn get_stats(&self) -> DatasetStats {
        let mut first_date = self.trace[0].date;
        let mut last_date = self.trace[0].date;
        for record in &self.trace {
            if record.date < first_date {
                first_date = record.date;
            }
            if record.date > last_date {
                last_date = record.date;
            }
        }

        let labels = self.labels();
        let mut label_min = labels[0];
        let mut label_max = labels[0];
        let mut label_sum = 0.0f64;
        for &label in labels {
            label_min = label_min.min(label);
            label_max = label_max.max(label);
            label_sum += label as f64;
        }

        let mut per_plant: HashMap<&str, Vec<f64>> = HashMap::new();
        for (record, &label) in self.trace.iter().zip(labels.iter()) {
            per_plant.entry(record.name.as_str()).or_default().push(label as f64);
        }

        let mut plants: Vec<PlantStats> = per_plant
            .into_iter()
            .map(|(name, values)| PlantStats {
                name: name.to_string(),
                count: values.len(),
                median: median(&values),
                mad: mad(&values),
            })
            .collect();
        plants.sort_by(|a, b| a.name.cmp(&b.name));

        DatasetStats {
            total_samples: self.len(),
            num_plants: plants.len(),
            first_date,
            last_date,
            label_min,
            label_max,
            label_mean: label_sum / self.len() as f64,
            plants,
        }
    }
}

/// Dataset-wide summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_plants: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub label_min: f32,
    pub label_max: f32,
    pub label_mean: f64,
    /// Per-plant label summaries, sorted by plant name
    pub plants: Vec<PlantStats>,
}

/// Label summary for a single plant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantStats {
    pub name: String,
    pub count: usize,
    pub median: f64,
    pub mad: f64,
}
