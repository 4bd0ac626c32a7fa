//! Toy data generation
//!
//! Pseudo-datasets for a [`CountingModel`]: Poisson-fluctuated main bin
//! counts, plus global-observable values that are either resampled from the
//! constraint terms (unconditional ensemble) or held at the model values
//! (conditional ensemble). Nuisance parameters themselves are never
//! randomized — that would be a Bayesian procedure.

use bl_core::traits::ToyGenerator;
use bl_core::{Ensemble, Error, Result};
use bl_model::{CountingModel, ToyDataset};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};

/// Sample one Poisson-fluctuated main dataset from a vector of expectations.
pub fn poisson_main_from_expected(expected_main: &[f64], rng: &mut StdRng) -> Vec<f64> {
    expected_main
        .iter()
        .map(|&lam| {
            if !lam.is_finite() || lam <= 0.0 {
                // Poisson(0) is deterministically 0; negative/NaN/inf expected
                // yields are treated as 0 for toy generation.
                return 0.0;
            }
            let pois = Poisson::new(lam).expect("Poisson::new(lambda>0)");
            pois.sample(rng)
        })
        .collect()
}

/// Sample global observables around the generation point.
///
/// For each constrained parameter `alpha_i` with width `sigma_i`, draws
/// `g_i ~ Normal(params[i], sigma_i)`. Unconstrained slots are 0.
pub fn gaussian_globals_from_params(
    model: &CountingModel,
    params: &[f64],
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(model.n_params());
    for (i, p) in model.parameters().iter().enumerate() {
        if let (true, Some(width)) = (p.constrained, p.constraint_width) {
            let normal = Normal::new(params[i], width).map_err(|e| {
                Error::Computation(format!(
                    "Invalid constraint width for '{}': {}",
                    p.name, e
                ))
            })?;
            out.push(normal.sample(rng));
        } else {
            out.push(0.0);
        }
    }
    Ok(out)
}

/// Toy-dataset sampler for a counting model.
///
/// Implements [`ToyGenerator`]: a generation point's parameter vector plus a
/// per-toy seed yields one [`ToyDataset`]. Randomness is deterministic per
/// seed and independent of threading.
#[derive(Debug, Clone)]
pub struct CountingToySampler {
    model: CountingModel,
    ensemble: Ensemble,
}

impl CountingToySampler {
    /// Create a sampler, validating the model shape.
    ///
    /// A non-extended model must carry exactly one main data entry: toys then
    /// fluctuate only that entry's value, never the entry count. Any other
    /// non-extended shape has no defined generation policy and is rejected.
    pub fn new(model: &CountingModel, ensemble: Ensemble) -> Result<Self> {
        if !model.is_extended() && model.n_main_bins() != 1 {
            return Err(Error::UnsupportedModel(format!(
                "non-extended model with {} data entries; only single-entry \
                 non-extended models are supported",
                model.n_main_bins()
            )));
        }
        Ok(Self { model: model.clone(), ensemble })
    }

    /// The ensemble this sampler generates.
    pub fn ensemble(&self) -> Ensemble {
        self.ensemble
    }
}

impl ToyGenerator for CountingToySampler {
    type Dataset = ToyDataset;

    fn generate(&self, params: &[f64], seed: u64) -> Result<ToyDataset> {
        let expected = self.model.expected_main(params)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let main = poisson_main_from_expected(&expected, &mut rng);
        let globals = match self.ensemble {
            Ensemble::Unconditional => {
                gaussian_globals_from_params(&self.model, params, &mut rng)?
            }
            Ensemble::Conditional => self.model.global_observables(),
        };

        Ok(ToyDataset { main, globals })
    }
}
