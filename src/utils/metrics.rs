//! Metrics Module for Model Evaluation
//!
//! Provides regression metrics for evaluating energy prediction models:
//! - Mean squared error (the training criterion)
//! - Root mean squared error
//! - Mean absolute error

use serde::{Deserialize, Serialize};

/// Regression metrics for model evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Mean squared error
    pub mse: f64,

    /// Root mean squared error
    pub rmse: f64,

    /// Mean absolute error
    pub mae: f64,

    /// Mean of the ground-truth targets
    pub mean_target: f64,

    /// Mean of the model predictions
    pub mean_prediction: f64,
}

impl RegressionMetrics {
    /// Create metrics from predictions and ground-truth targets
    pub fn from_predictions(predictions: &[f32], targets: &[f32]) -> Self {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        let total_samples = predictions.len();
        if total_samples == 0 {
            return Self::default();
        }

        let n = total_samples as f64;
        let mut sq_sum = 0.0;
        let mut abs_sum = 0.0;
        let mut target_sum = 0.0;
        let mut pred_sum = 0.0;

        for (&pred, &target) in predictions.iter().zip(targets.iter()) {
            let diff = pred as f64 - target as f64;
            sq_sum += diff * diff;
            abs_sum += diff.abs();
            target_sum += target as f64;
            pred_sum += pred as f64;
        }

        let mse = sq_sum / n;

        Self {
            total_samples,
            mse,
            rmse: mse.sqrt(),
            mae: abs_sum / n,
            mean_target: target_sum / n,
            mean_prediction: pred_sum / n,
        }
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════╗\n");
        output.push_str("║            Evaluation Metrics            ║\n");
        output.push_str("╠══════════════════════════════════════════╣\n");
        output.push_str(&format!("║ MSE:              {:>12.4}           ║\n", self.mse));
        output.push_str(&format!("║ RMSE:             {:>12.4}           ║\n", self.rmse));
        output.push_str(&format!("║ MAE:              {:>12.4}           ║\n", self.mae));
        output.push_str(&format!("║ Mean target:      {:>12.4}           ║\n", self.mean_target));
        output.push_str(&format!("║ Mean prediction:  {:>12.4}           ║\n", self.mean_prediction));
        output.push_str(&format!("║ Total samples:    {:>12}           ║\n", self.total_samples));
        output.push_str("╚══════════════════════════════════════════╝\n");

        output
    }
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Running average for tracking metrics during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    /// Create a new running average
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Get the current average
    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    /// Get the count
    pub fn count(&self) -> usize {
        self.count
    }

    /// Reset the running average
    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}
