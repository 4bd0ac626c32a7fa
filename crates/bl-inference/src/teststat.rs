//! One-sided profile-likelihood test statistic
//!
//! `q(mu) = 2 * (nll(mu) - nll_hat)` clipped at zero, and zero whenever the
//! unconditional estimate exceeds the tested value (`mu_hat > mu`) — the
//! upper-limit convention. Nuisance parameters are profiled in both fits.

use crate::mle::MaximumLikelihoodEstimator;
use bl_core::traits::{LogDensityModel, TestStatistic};
use bl_core::{Error, Result};
use bl_model::{CountingModel, ToyDataset};

fn poi_index(model: &CountingModel) -> Result<usize> {
    model.poi_index().ok_or_else(|| Error::Validation("No POI defined".to_string()))
}

/// Profile-likelihood state for one dataset.
///
/// The unconditional fit is done once at construction; conditional fits at
/// each tested POI value warm-start from it. Use this when the same dataset
/// is scored at several scan points (interval extraction).
pub struct DatasetProfile<'a> {
    mle: &'a MaximumLikelihoodEstimator,
    model: CountingModel,
    bounds: Vec<(f64, f64)>,
    poi: usize,
    free_params: Vec<f64>,
    mu_hat: f64,
    free_nll: f64,
}

impl<'a> DatasetProfile<'a> {
    /// Install `data` into `base` and run the unconditional fit.
    pub fn new(
        mle: &'a MaximumLikelihoodEstimator,
        base: &CountingModel,
        data: &ToyDataset,
    ) -> Result<Self> {
        let model = base.with_dataset(data)?;
        Self::from_model(mle, model)
    }

    /// Run the unconditional fit on a model as-is (observed data).
    pub fn from_model(mle: &'a MaximumLikelihoodEstimator, model: CountingModel) -> Result<Self> {
        let poi = poi_index(&model)?;
        let bounds = LogDensityModel::parameter_bounds(&model);

        let free = mle.fit_minimum(&model)?;
        if !free.converged {
            log::warn!("profile: unconditional fit did not converge: {}", free.message);
        }
        let mu_hat = free.parameters[poi];
        let free_nll = free.fval;

        Ok(Self { mle, model, bounds, poi, free_params: free.parameters, mu_hat, free_nll })
    }

    /// Unconditional best-fit POI on this dataset.
    pub fn mu_hat(&self) -> f64 {
        self.mu_hat
    }

    /// Unconditional best-fit parameter vector.
    pub fn parameters(&self) -> &[f64] {
        &self.free_params
    }

    /// Unconditional NLL minimum on this dataset.
    pub fn free_nll(&self) -> f64 {
        self.free_nll
    }

    /// One-sided profile-likelihood ratio at `mu`.
    pub fn q(&self, mu: f64) -> Result<f64> {
        if self.mu_hat > mu {
            return Ok(0.0);
        }

        // Warm-start the conditional fit from the unconditional solution.
        let mut bounds = self.bounds.clone();
        bounds[self.poi] = (mu, mu);
        let mut init = self.free_params.clone();
        init[self.poi] = mu;

        let fixed = self.mle.fit_minimum_from_with_bounds(&self.model, &init, &bounds)?;
        if !fixed.converged {
            log::warn!(
                "profile: conditional fit did not converge at mu={}: {} (continuing with best-found)",
                mu,
                fixed.message
            );
        }

        Ok((2.0 * (fixed.fval - self.free_nll)).max(0.0))
    }
}

/// One-sided profile-likelihood evaluator bound to a base model.
///
/// Implements [`TestStatistic`] over [`ToyDataset`]: every call installs the
/// dataset, profiles, and returns `q(mu)`. When many POI values are scored
/// against one dataset, prefer [`DatasetProfile`] directly.
pub struct OneSidedProfileLikelihood<'a> {
    mle: &'a MaximumLikelihoodEstimator,
    model: &'a CountingModel,
}

impl<'a> OneSidedProfileLikelihood<'a> {
    /// Bind the evaluator to a fitting engine and a base model.
    pub fn new(mle: &'a MaximumLikelihoodEstimator, model: &'a CountingModel) -> Self {
        Self { mle, model }
    }
}

impl TestStatistic<ToyDataset> for OneSidedProfileLikelihood<'_> {
    fn evaluate(&self, data: &ToyDataset, poi_value: f64) -> Result<f64> {
        DatasetProfile::new(self.mle, self.model, data)?.q(poi_value)
    }
}
