//! Maximum Likelihood Estimation

use crate::optimizer::{LbfgsOptimizer, OptimizationResult, OptimizerConfig};
use bl_core::Result;
use bl_core::traits::LogDensityModel;

/// Maximum Likelihood Estimator
///
/// Fits models by minimizing the negative log-likelihood. Conditional
/// (profiled) fits are run by pinning parameters through clamped bounds and
/// warm-starting from a previous solution.
#[derive(Clone)]
pub struct MaximumLikelihoodEstimator {
    config: OptimizerConfig,
}

impl MaximumLikelihoodEstimator {
    /// Create an MLE with the default optimizer configuration
    pub fn new() -> Self {
        Self { config: OptimizerConfig::default() }
    }

    /// Create an MLE with a custom optimizer configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimize the NLL from the model's suggested initial point.
    pub fn fit_minimum<M: LogDensityModel>(&self, model: &M) -> Result<OptimizationResult> {
        let init = model.parameter_init();
        let bounds = model.parameter_bounds();
        self.fit_minimum_from_with_bounds(model, &init, &bounds)
    }

    /// Minimize the NLL from a caller-provided start point (warm start).
    pub fn fit_minimum_from<M: LogDensityModel>(
        &self,
        model: &M,
        init: &[f64],
    ) -> Result<OptimizationResult> {
        let bounds = model.parameter_bounds();
        self.fit_minimum_from_with_bounds(model, init, &bounds)
    }

    /// Minimize the NLL with explicit start point and bounds.
    ///
    /// Pinning a parameter to `(v, v)` fixes it without cloning the model;
    /// this is how conditional fits are run throughout the workspace.
    pub fn fit_minimum_from_with_bounds<M: LogDensityModel>(
        &self,
        model: &M,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        let optimizer = LbfgsOptimizer::new(self.config.clone());
        optimizer.minimize(model, init, bounds)
    }
}

impl Default for MaximumLikelihoodEstimator {
    fn default() -> Self {
        Self::new()
    }
}
