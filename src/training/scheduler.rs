//! Learning Rate Scheduler Module
//!
//! Reduce-on-plateau scheduling for the Adam learning rate: the validation
//! MSE is fed in once per epoch, and after `patience` consecutive epochs
//! without improvement the rate is multiplied by `factor`, never dropping
//! below `min_lr`.

/// State for the reduce-on-plateau scheduler
#[derive(Debug, Clone)]
pub struct ReduceOnPlateau {
    best_metric: f64,
    epochs_without_improvement: usize,
    current_lr: f64,
    factor: f64,
    patience: usize,
    min_lr: f64,
}

impl ReduceOnPlateau {
    /// Create a new scheduler starting at `initial_lr`
    pub fn new(initial_lr: f64, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            best_metric: f64::INFINITY,
            epochs_without_improvement: 0,
            current_lr: initial_lr,
            factor,
            patience,
            min_lr,
        }
    }

    /// Update with a new metric value and return the learning rate to use next
    ///
    /// Improvement is a strict decrease of the metric. The non-improvement
    /// counter resets after an actual reduction, so the next reduction needs
    /// another full run of `patience` stagnant epochs.
    pub fn step(&mut self, metric: f64) -> f64 {
        if metric < self.best_metric {
            self.best_metric = metric;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;

            if self.epochs_without_improvement >= self.patience {
                let new_lr = (self.current_lr * self.factor).max(self.min_lr);
                if new_lr < self.current_lr {
                    self.current_lr = new_lr;
                    self.epochs_without_improvement = 0;
                }
            }
        }

        self.current_lr
    }

    /// Get the current learning rate
    pub fn current_lr(&self) -> f64 {
        self.current_lr
    }

    /// Best metric value seen so far
    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_keeps_rate() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 2, 1e-6);

        assert_eq!(scheduler.step(1.0), 0.001);
        assert_eq!(scheduler.step(0.9), 0.001);
        assert_eq!(scheduler.step(0.8), 0.001);
        assert_eq!(scheduler.best_metric(), 0.8);
    }

    #[test]
    fn test_reduces_after_patience() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 2, 1e-6);

        assert_eq!(scheduler.step(1.0), 0.001);
        assert_eq!(scheduler.step(1.1), 0.001); // 1 stagnant epoch
        assert_eq!(scheduler.step(1.2), 0.0005); // 2 stagnant epochs, reduce
    }

    #[test]
    fn test_counter_resets_after_reduction() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 2, 1e-6);

        scheduler.step(1.0);
        scheduler.step(1.1);
        assert_eq!(scheduler.step(1.2), 0.0005);

        // A fresh round of patience is needed before the next cut
        assert_eq!(scheduler.step(1.3), 0.0005);
        assert_eq!(scheduler.step(1.4), 0.00025);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 2, 1e-6);

        scheduler.step(1.0);
        scheduler.step(1.1); // 1 stagnant epoch
        scheduler.step(0.5); // improvement clears the counter
        assert_eq!(scheduler.step(0.6), 0.001); // stagnant again, only 1
        assert_eq!(scheduler.step(0.7), 0.0005);
    }

    #[test]
    fn test_clamps_at_min_lr() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 1, 4e-4);

        scheduler.step(1.0);
        assert_eq!(scheduler.step(1.1), 5e-4);
        assert_eq!(scheduler.step(1.2), 4e-4); // clamped, not 2.5e-4
        // At the floor the rate can no longer move
        assert_eq!(scheduler.step(1.3), 4e-4);
        assert_eq!(scheduler.current_lr(), 4e-4);
    }

    #[test]
    fn test_equal_metric_is_not_improvement() {
        let mut scheduler = ReduceOnPlateau::new(0.001, 0.5, 2, 1e-6);

        scheduler.step(1.0);
        scheduler.step(1.0);
        assert_eq!(scheduler.step(1.0), 0.0005);
    }
}
