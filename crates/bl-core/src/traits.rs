//! Core traits for Beltline
//!
//! Two families live here. The model-facing traits (`LogDensityModel`,
//! `PoiModel`, `FixedParamModel`) are what the fitting engine depends on.
//! The toy-facing traits (`ToyGenerator`, `TestStatistic`) are the seams of
//! the Neyman construction: concrete models plug in as plain values or
//! closures, not subclasses.

use crate::Result;

/// Universal model interface for likelihood-based inference.
///
/// High-level code (MLE, profile scans, belt construction) depends on this
/// interface, not on a concrete model type.
pub trait LogDensityModel: Send + Sync {
    /// Number of parameters.
    fn dim(&self) -> usize;

    /// Parameter names (stable order).
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max) (stable order).
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Suggested initial values (stable order).
    fn parameter_init(&self) -> Vec<f64>;

    /// Negative log-likelihood.
    fn nll(&self, params: &[f64]) -> Result<f64>;

    /// Gradient of NLL.
    ///
    /// Default: central differences with adaptive step size. Models with a
    /// cheap closed form should override.
    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        let n = params.len();
        let mut grad = vec![0.0; n];

        for i in 0..n {
            let eps = 1e-8 * params[i].abs().max(1.0);

            let mut params_plus = params.to_vec();
            params_plus[i] += eps;
            let f_plus = self.nll(&params_plus)?;

            let mut params_minus = params.to_vec();
            params_minus[i] -= eps;
            let f_minus = self.nll(&params_minus)?;

            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }

        Ok(grad)
    }
}

/// Optional extension: parameter-of-interest (POI) index.
pub trait PoiModel: Send + Sync {
    /// Index of the POI in the model's parameter order.
    fn poi_index(&self) -> Option<usize>;
}

/// Optional extension: create a copy of the model with one parameter fixed.
///
/// Used by profile likelihood / belt-construction workflows.
pub trait FixedParamModel: Sized + Send + Sync {
    /// Return a copy with parameter `param_idx` fixed at `value` (bounds clamped).
    fn with_fixed_param(&self, param_idx: usize, value: f64) -> Self;
}

/// Pseudo-dataset generator: parameter configuration → dataset.
///
/// A generation point's parameters fully determine the sampling distribution;
/// `seed` makes each draw deterministic and thread-order independent. Whether
/// auxiliary/global observables fluctuate is the implementation's
/// configuration (see [`crate::Ensemble`]), not part of this contract.
pub trait ToyGenerator: Send + Sync {
    /// The dataset type produced per toy.
    type Dataset: Send;

    /// Generate one pseudo-dataset under `params`.
    fn generate(&self, params: &[f64], seed: u64) -> Result<Self::Dataset>;
}

/// Test statistic: dataset × tested POI value → real number.
///
/// Implementations profile nuisance parameters internally. The one-sided
/// convention (zero when the fitted POI exceeds the tested value) is the
/// implementation's responsibility.
pub trait TestStatistic<D>: Send + Sync {
    /// Evaluate the statistic on `data` at `poi_value`.
    fn evaluate(&self, data: &D, poi_value: f64) -> Result<f64>;
}

impl<D, F> TestStatistic<D> for F
where
    F: Fn(&D, f64) -> Result<f64> + Send + Sync,
{
    fn evaluate(&self, data: &D, poi_value: f64) -> Result<f64> {
        self(data, poi_value)
    }
}
