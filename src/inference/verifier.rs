//! Model Artifact Verification
//!
//! Loads saved model weights and runs a single random probe grid through
//! them, confirming the artifact deserializes, accepts the expected input
//! shape and produces a non-negative prediction.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Distribution, Tensor},
};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::inference::PROBE_BATCH;
use crate::model::cnn::EnergyRegressor;
use crate::model::config::{ExperimentConfig, ModelConfig};
use crate::utils::error::{EnergyGridError, Result};
use crate::{GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH};

/// Result of probing saved model weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Path of the verified weights
    pub model_path: PathBuf,
    /// Shape of the probe output
    pub output_shape: Vec<usize>,
    /// Prediction for the random probe grid
    pub prediction: f32,
}

impl VerifyReport {
    /// Pretty print the verification result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Model: {:?}\n", self.model_path));
        output.push_str(&format!("Output shape: {:?}\n", self.output_shape));
        output.push_str(&format!("Probe prediction: {:.4}\n", self.prediction));

        output
    }
}

/// Locate the configuration saved beside the weights
fn sibling_config(model_path: &Path) -> Option<PathBuf> {
    let candidate = model_path.with_extension("config.json");
    candidate.exists().then_some(candidate)
}

/// Load saved weights and run a random `[1, 3, 14, 14]` probe through them
///
/// The model configuration is taken from `config_path` when given, otherwise
/// from the `.config.json` file saved beside the weights, otherwise from the
/// defaults. A report is returned only if the output has shape `[1, 1]` and
/// the prediction respects the non-negative output head.
pub fn verify_model<B: Backend>(
    model_path: &Path,
    config_path: Option<&Path>,
    device: &B::Device,
) -> Result<VerifyReport> {
    if !model_path.exists() && !model_path.with_extension("mpk").exists() {
        return Err(EnergyGridError::PathNotFound(model_path.to_path_buf()));
    }

    let model_config = match config_path
        .map(Path::to_path_buf)
        .or_else(|| sibling_config(model_path))
    {
        Some(path) => {
            info!("Using model configuration from {:?}", path);
            ExperimentConfig::load(&path)?.model
        }
        None => {
            info!("No configuration found beside the weights, using defaults");
            ModelConfig::default()
        }
    };

    let recorder = CompactRecorder::new();
    let model = EnergyRegressor::<B>::new(&model_config, device)
        .load_file(model_path, &recorder, device)
        .map_err(|e| EnergyGridError::Model(format!("failed to load model: {:?}", e)))?;

    let probe = Tensor::<B, 4>::random(
        [PROBE_BATCH, GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH],
        Distribution::Normal(0.0, 1.0),
        device,
    );
    let output = model.forward(probe);
    let output_shape = output.dims().to_vec();

    if output_shape != [PROBE_BATCH, 1] {
        return Err(EnergyGridError::Inference(format!(
            "unexpected probe output shape {:?}, expected [1, 1]",
            output_shape
        )));
    }

    let values = output.into_data().to_vec::<f32>().map_err(|e| {
        EnergyGridError::Inference(format!("failed to read probe output: {:?}", e))
    })?;
    let prediction = values.first().copied().ok_or_else(|| {
        EnergyGridError::Inference("probe output holds no values".to_string())
    })?;

    if prediction < 0.0 {
        return Err(EnergyGridError::Inference(format!(
            "probe prediction is negative ({}); the output head keeps predictions non-negative",
            prediction
        )));
    }

    println!("{} Model loaded successfully", "✓".green().bold());
    println!("  Output shape: {:?}", output_shape);
    println!("  Probe prediction: {:.4}", prediction);

    Ok(VerifyReport {
        model_path: model_path.to_path_buf(),
        output_shape,
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::model::config::TrainingConfig;

    fn save_model(dir: &Path, config: &ModelConfig) -> PathBuf {
        let device = Default::default();
        let model = EnergyRegressor::<DefaultBackend>::new(config, &device);
        let path = dir.join("model");
        model.save_file(&path, &CompactRecorder::new()).unwrap();
        path.with_extension("mpk")
    }

    #[test]
    fn test_verify_saved_model() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = save_model(dir.path(), &ModelConfig::default());

        let device = Default::default();
        let report = verify_model::<DefaultBackend>(&model_path, None, &device).unwrap();

        assert_eq!(report.output_shape, vec![1, 1]);
        assert!(report.prediction >= 0.0);
        assert!(report.display().contains("Output shape"));
    }

    #[test]
    fn test_verify_missing_file() {
        let device = Default::default();
        let result = verify_model::<DefaultBackend>(
            Path::new("output/models/does_not_exist.mpk"),
            None,
            &device,
        );

        assert!(matches!(result, Err(EnergyGridError::PathNotFound(_))));
    }

    #[test]
    fn test_verify_reads_sibling_config() {
        let dir = tempfile::tempdir().unwrap();
        // non-default width, so loading with defaults would fail
        let model_config = ModelConfig {
            base_filters: 8,
            ..ModelConfig::default()
        };
        let model_path = save_model(dir.path(), &model_config);

        let config = ExperimentConfig {
            model: model_config,
            training: TrainingConfig::default(),
        };
        config.save(&dir.path().join("model.config.json")).unwrap();

        let device = Default::default();
        let report = verify_model::<DefaultBackend>(&model_path, None, &device).unwrap();
        assert_eq!(report.output_shape, vec![1, 1]);
    }
}
