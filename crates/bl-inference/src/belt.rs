//! Confidence-belt construction (Neyman construction with profiled
//! nuisance parameters)
//!
//! For each point on a POI grid: profile the nuisance parameters on observed
//! data with the POI fixed, generate a toy ensemble at that generation point,
//! evaluate the test statistic on every toy, and record the empirical
//! CL-quantile of the resulting distribution as the acceptance-region
//! threshold.
//!
//! Accuracy caveat: because the POI fit range equals the scan range, toys
//! thrown near the upper edge of the grid pile up at `mu_hat = mu_max` and
//! the threshold inflates there. Choose the scan maximum well above the
//! expected limit; the effect is a modeling limitation, not an error.

use crate::mle::MaximumLikelihoodEstimator;
use bl_core::traits::{LogDensityModel, PoiModel, TestStatistic, ToyGenerator};
use bl_core::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for belt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeltConfig {
    /// Confidence level of the acceptance regions (e.g. 0.95).
    pub confidence_level: f64,
    /// Multiplier on the default per-point toy count `50 / (1 - CL)`.
    ///
    /// The default resolves the `CL` tail quantile with ~50 toys; raise for
    /// accuracy, lower for speed.
    pub toys_factor: f64,
    /// Base random seed; per-point and per-toy seeds derive from it.
    pub seed: u64,
}

impl Default for BeltConfig {
    fn default() -> Self {
        Self { confidence_level: 0.95, toys_factor: 1.0, seed: 0 }
    }
}

impl BeltConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0 < self.confidence_level && self.confidence_level < 1.0) {
            return Err(Error::Validation(format!(
                "confidence_level must be in (0,1), got {}",
                self.confidence_level
            )));
        }
        if !(self.toys_factor > 0.0) {
            return Err(Error::Validation(format!(
                "toys_factor must be > 0, got {}",
                self.toys_factor
            )));
        }
        Ok(())
    }

    /// Per-point toy count: `ceil(toys_factor * 50 / (1 - CL))`.
    pub fn toys_per_point(&self) -> usize {
        (self.toys_factor * 50.0 / (1.0 - self.confidence_level)).ceil() as usize
    }
}

/// A fixed POI value plus the nuisance-parameter configuration used to
/// generate toys at that value. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Tested POI value.
    pub poi_value: f64,
    /// Full parameter vector for toy generation (POI fixed, nuisances
    /// profiled on observed data).
    pub generation_params: Vec<f64>,
}

/// One belt entry: scan point plus its acceptance-region threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeltPoint {
    /// The scan point this threshold belongs to.
    pub point: ScanPoint,
    /// Acceptance-region maximum: observed statistics at or below this value
    /// are inside the region (subject to the extractor's tie policy).
    pub threshold: f64,
    /// Toys requested at this point.
    pub n_toys: usize,
    /// Toys that produced a finite statistic.
    pub n_valid: usize,
    /// Toys dropped for errors or non-finite statistics.
    pub n_error: usize,
}

/// Ordered collection of acceptance thresholds at a fixed confidence level.
///
/// Built once, read-only thereafter; thresholds are meaningful only at the
/// stored confidence level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBelt {
    /// Confidence level the thresholds were built for.
    pub confidence_level: f64,
    /// Per-grid-point thresholds, ascending in POI value.
    pub points: Vec<BeltPoint>,
}

impl ConfidenceBelt {
    /// POI values of the grid, ascending.
    pub fn poi_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.point.poi_value).collect()
    }

    /// Thresholds aligned with [`Self::poi_values`].
    pub fn thresholds(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.threshold).collect()
    }
}

/// Uniform scan grid: bin centers of `n` bins over `[lo, hi]`.
///
/// Bin centers keep the belt aligned with an `n`-bin histogram over the POI
/// range, one scan point per bin.
pub fn scan_grid(lo: f64, hi: f64, n: usize) -> Result<Vec<f64>> {
    if n == 0 {
        return Err(Error::Validation("scan grid needs at least 1 point".to_string()));
    }
    if !(hi > lo) {
        return Err(Error::Validation(format!("invalid scan range: [{}, {}]", lo, hi)));
    }
    let width = (hi - lo) / n as f64;
    Ok((0..n).map(|i| lo + (i as f64 + 0.5) * width).collect())
}

/// Profile the generation point for each grid value.
///
/// Conditional MLE on observed data with the POI pinned via bounds,
/// warm-started from the previous grid point (ascending order).
pub fn profile_generation_points<M>(
    mle: &MaximumLikelihoodEstimator,
    model: &M,
    grid: &[f64],
) -> Result<Vec<ScanPoint>>
where
    M: LogDensityModel + PoiModel,
{
    let poi = model.poi_index().ok_or_else(|| Error::Validation("No POI defined".to_string()))?;
    let base_bounds = model.parameter_bounds();

    let free = mle.fit_minimum(model)?;
    if !free.converged {
        log::warn!("belt: unconditional fit on observed data did not converge: {}", free.message);
    }
    let mut warm = free.parameters;

    let mut points = Vec::with_capacity(grid.len());
    for &mu in grid {
        let mut bounds = base_bounds.clone();
        bounds[poi] = (mu, mu);
        warm[poi] = mu;

        let fixed = mle.fit_minimum_from_with_bounds(model, &warm, &bounds)?;
        if !fixed.converged {
            log::warn!(
                "belt: conditional fit did not converge at mu={}: {} (continuing with best-found)",
                mu,
                fixed.message
            );
        }
        warm = fixed.parameters.clone();
        points.push(ScanPoint { poi_value: mu, generation_params: fixed.parameters });
    }

    Ok(points)
}

/// Empirical acceptance threshold: the smallest sample value such that at
/// least `cl` of the sample is `<=` it (order statistic `ceil(cl * n)`).
pub fn acceptance_threshold(sorted: &[f64], cl: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let k = ((cl * n as f64).ceil() as usize).clamp(1, n);
    sorted[k - 1]
}

// Per-point seeds are spaced far enough apart that per-toy offsets never
// collide between neighbouring points.
const POINT_SEED_STRIDE: u64 = 1_000_000_007;

/// Build a confidence belt over prepared scan points.
///
/// Toys at each point run in parallel; toy `j` of point `i` uses seed
/// `seed + i * STRIDE + j`, so results are independent of thread scheduling.
/// Toys whose generation or evaluation fails, or whose statistic is not
/// finite, are excluded from the quantile and counted in `n_error`.
pub fn build_belt<G, T>(
    points: Vec<ScanPoint>,
    generator: &G,
    test_stat: &T,
    config: &BeltConfig,
) -> Result<ConfidenceBelt>
where
    G: ToyGenerator,
    T: TestStatistic<G::Dataset>,
{
    config.validate()?;
    if points.is_empty() {
        return Err(Error::Validation("belt needs at least one scan point".to_string()));
    }
    let n_toys = config.toys_per_point();

    let mut belt_points = Vec::with_capacity(points.len());
    for (i, point) in points.into_iter().enumerate() {
        let base_seed = config.seed.wrapping_add((i as u64).wrapping_mul(POINT_SEED_STRIDE));

        let results: Vec<Option<f64>> = (0..n_toys)
            .into_par_iter()
            .with_min_len(16)
            .map(|toy_idx| {
                let toy_seed = base_seed.wrapping_add(toy_idx as u64);
                let q = generator
                    .generate(&point.generation_params, toy_seed)
                    .and_then(|data| test_stat.evaluate(&data, point.poi_value));
                match q {
                    Ok(v) if v.is_finite() => Some(v),
                    Ok(_) => None,
                    Err(_) => None,
                }
            })
            .collect();

        let mut q_sample: Vec<f64> = results.iter().filter_map(|r| *r).collect();
        let n_valid = q_sample.len();
        let n_error = n_toys - n_valid;
        if n_valid == 0 {
            return Err(Error::Computation(format!(
                "All {} toys failed at mu={}",
                n_toys, point.poi_value
            )));
        }
        if n_error > 0 {
            log::warn!(
                "belt: {} of {} toys dropped at mu={}",
                n_error,
                n_toys,
                point.poi_value
            );
        }

        q_sample.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let threshold = acceptance_threshold(&q_sample, config.confidence_level);

        belt_points.push(BeltPoint { point, threshold, n_toys, n_valid, n_error });
    }

    Ok(ConfidenceBelt { confidence_level: config.confidence_level, points: belt_points })
}
