//! End-to-end upper-limit analysis
//!
//! Ties the pieces together the way an analysis runs them: build (or reuse)
//! the confidence belt, extract the observed upper limit, then run the
//! background-only ensemble for CLb and the expected bands.

use crate::bands::{self, BandsConfig, ClbReference, ExpectedBands};
use crate::belt::{self, BeltConfig, ConfidenceBelt};
use crate::interval::{self, LimitOutcome};
use crate::mle::MaximumLikelihoodEstimator;
use crate::teststat::{DatasetProfile, OneSidedProfileLikelihood};
use crate::toys::CountingToySampler;
use bl_core::traits::LogDensityModel;
use bl_core::{Ensemble, Error, Result, TiePolicy};
use bl_model::{CountingModel, ToyDataset};
use serde::{Deserialize, Serialize};

/// Band toys must never share seeds with belt toys.
const BAND_SEED_OFFSET: u64 = 1u64 << 63;

/// Configuration for a full upper-limit analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpperLimitConfig {
    /// Confidence level (e.g. 0.95).
    pub confidence_level: f64,
    /// Number of POI grid points over the POI bounds.
    pub n_scan_points: usize,
    /// Multiplier on the default per-point belt toy count.
    pub toys_factor: f64,
    /// Number of background-only toys for CLb and the expected bands.
    pub n_band_toys: usize,
    /// Global-observable treatment in toy generation.
    pub ensemble: Ensemble,
    /// Tie policy for interval extraction.
    pub tie_policy: TiePolicy,
    /// Base random seed.
    pub seed: u64,
}

impl Default for UpperLimitConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            n_scan_points: 20,
            toys_factor: 1.0,
            n_band_toys: 200,
            ensemble: Ensemble::Unconditional,
            tie_policy: TiePolicy::Inclusive,
            seed: 0,
        }
    }
}

impl UpperLimitConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0 < self.confidence_level && self.confidence_level < 1.0) {
            return Err(Error::Validation(format!(
                "confidence_level must be in (0,1), got {}",
                self.confidence_level
            )));
        }
        if self.n_scan_points == 0 {
            return Err(Error::Validation("n_scan_points must be > 0".to_string()));
        }
        if self.n_band_toys == 0 {
            return Err(Error::Validation("n_band_toys must be > 0".to_string()));
        }
        Ok(())
    }

    fn belt_config(&self) -> BeltConfig {
        BeltConfig {
            confidence_level: self.confidence_level,
            toys_factor: self.toys_factor,
            seed: self.seed,
        }
    }
}

/// Full analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpperLimitReport {
    /// Confidence level of the analysis.
    pub confidence_level: f64,
    /// POI name.
    pub poi_name: String,
    /// Unconditional best-fit POI on observed data.
    pub mu_hat: f64,
    /// Observed upper limit (or empty acceptance).
    pub observed: LimitOutcome,
    /// Observed test statistic at the observed limit.
    pub q_obs_at_limit: Option<f64>,
    /// Background-only p-value, strict counting (`toy_q > q_obs`).
    pub clb_strict: Option<f64>,
    /// Background-only p-value, inclusive counting (`toy_q >= q_obs`).
    pub clb_inclusive: Option<f64>,
    /// Expected-limit bands from background-only toys.
    pub bands: ExpectedBands,
    /// Background-only upper-limit sample, ascending.
    pub upper_limits: Vec<f64>,
    /// Band toys whose acceptance region was empty.
    pub n_empty_acceptance: usize,
    /// Band toys requested.
    pub n_band_toys: usize,
    /// Band toys dropped for errors.
    pub n_band_errors: usize,
    /// The confidence belt used.
    pub belt: ConfidenceBelt,
}

/// Build the confidence belt for a model per the analysis configuration.
pub fn build_model_belt(
    mle: &MaximumLikelihoodEstimator,
    model: &CountingModel,
    config: &UpperLimitConfig,
) -> Result<ConfidenceBelt> {
    config.validate()?;

    let (lo, hi) = model.poi_bounds()?;
    let grid = belt::scan_grid(lo, hi, config.n_scan_points)?;
    let points = belt::profile_generation_points(mle, model, &grid)?;

    let sampler = CountingToySampler::new(model, config.ensemble)?;
    let test_stat = OneSidedProfileLikelihood::new(mle, model);
    belt::build_belt(points, &sampler, &test_stat, &config.belt_config())
}

fn validate_belt(belt: &ConfidenceBelt, config: &UpperLimitConfig) -> Result<()> {
    if belt.points.is_empty() {
        return Err(Error::Validation("belt has no points".to_string()));
    }
    if (belt.confidence_level - config.confidence_level).abs() > 1e-9 {
        return Err(Error::Validation(format!(
            "belt was built at CL={} but the analysis requests CL={}",
            belt.confidence_level, config.confidence_level
        )));
    }
    let ascending = belt
        .points
        .windows(2)
        .all(|w| w[0].point.poi_value < w[1].point.poi_value);
    if !ascending {
        return Err(Error::Validation(
            "belt points must be strictly ascending in POI value".to_string(),
        ));
    }
    Ok(())
}

/// Run the full analysis, building the belt first.
pub fn upper_limit_with_bands(
    mle: &MaximumLikelihoodEstimator,
    model: &CountingModel,
    config: &UpperLimitConfig,
) -> Result<UpperLimitReport> {
    let belt = build_model_belt(mle, model, config)?;
    upper_limit_with_bands_using_belt(mle, model, belt, config)
}

/// Run the analysis against a prebuilt belt (e.g. loaded from disk).
pub fn upper_limit_with_bands_using_belt(
    mle: &MaximumLikelihoodEstimator,
    model: &CountingModel,
    belt: ConfidenceBelt,
    config: &UpperLimitConfig,
) -> Result<UpperLimitReport> {
    config.validate()?;
    validate_belt(&belt, config)?;

    let poi = model
        .poi_index()
        .ok_or_else(|| Error::Validation("No POI defined".to_string()))?;
    let poi_name = model.parameters()[poi].name.clone();

    // Observed limit: profile the observed dataset once, score it across the
    // belt through the cached profile.
    let obs_data =
        ToyDataset { main: model.observed_main(), globals: model.global_observables() };
    let obs_profile = DatasetProfile::from_model(mle, model.clone())?;
    let mu_hat = obs_profile.mu_hat();

    let obs_stat = |_d: &ToyDataset, mu: f64| obs_profile.q(mu);
    let observed =
        interval::upper_limit(&belt, &obs_data, &obs_stat, config.tie_policy)?.outcome;

    let (q_obs_at_limit, clb_reference) = match observed {
        LimitOutcome::UpperLimit(mu_up) => {
            let q_obs = obs_profile.q(mu_up)?;
            (Some(q_obs), Some(ClbReference { observed_limit: mu_up, q_obs }))
        }
        LimitOutcome::EmptyAcceptance => {
            log::warn!("observed acceptance region is empty; CLb is undefined");
            (None, None)
        }
    };

    // Background-only generation point: POI pinned to zero, nuisances at
    // their data-conditioned best fit.
    let mut bounds0 = LogDensityModel::parameter_bounds(model);
    bounds0[poi] = (0.0, 0.0);
    let mut init0 = obs_profile.parameters().to_vec();
    init0[poi] = 0.0;
    let fixed0 = mle.fit_minimum_from_with_bounds(model, &init0, &bounds0)?;
    if !fixed0.converged {
        return Err(Error::Computation(format!(
            "Failed to fit background-only generation point: {}",
            fixed0.message
        )));
    }

    let sampler = CountingToySampler::new(model, config.ensemble)?;
    let test_stat = OneSidedProfileLikelihood::new(mle, model);
    let bands_config = BandsConfig {
        n_toys: config.n_band_toys,
        seed: config.seed.wrapping_add(BAND_SEED_OFFSET),
        tie_policy: config.tie_policy,
    };
    let ensemble = bands::expected_bands(
        &belt,
        &sampler,
        &test_stat,
        &fixed0.parameters,
        clb_reference,
        &bands_config,
    )?;

    Ok(UpperLimitReport {
        confidence_level: config.confidence_level,
        poi_name,
        mu_hat,
        observed,
        q_obs_at_limit,
        clb_strict: ensemble.clb_strict,
        clb_inclusive: ensemble.clb_inclusive,
        bands: ensemble.bands,
        upper_limits: ensemble.upper_limits,
        n_empty_acceptance: ensemble.n_empty_acceptance,
        n_band_toys: config.n_band_toys,
        n_band_errors: ensemble.n_error,
        belt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_model::simplemodels;

    fn tiny_config() -> UpperLimitConfig {
        // Deliberately small counts: CI-friendly end-to-end run.
        UpperLimitConfig {
            confidence_level: 0.90,
            n_scan_points: 4,
            toys_factor: 0.04, // 20 toys per point
            n_band_toys: 12,
            ensemble: Ensemble::Unconditional,
            tie_policy: TiePolicy::Inclusive,
            seed: 42,
        }
    }

    fn tiny_model() -> CountingModel {
        let mut ws = simplemodels::single_bin_counting(5.0, 8.0, Some(0.1), 9.0);
        ws.measurement.parameters.push(bl_model::schema::ParameterConfig {
            name: "mu".to_string(),
            init: Some(1.0),
            bounds: Some([0.0, 4.0]),
            fixed: false,
        });
        CountingModel::from_workspace(&ws).unwrap()
    }

    #[test]
    fn end_to_end_report_is_sane_and_deterministic() {
        let model = tiny_model();
        let mle = MaximumLikelihoodEstimator::new();
        let cfg = tiny_config();

        let a = upper_limit_with_bands(&mle, &model, &cfg).unwrap();
        let b = upper_limit_with_bands(&mle, &model, &cfg).unwrap();

        // Determinism under a fixed seed.
        assert_eq!(a.belt.thresholds(), b.belt.thresholds());
        assert_eq!(a.observed, b.observed);
        assert_eq!(a.upper_limits, b.upper_limits);
        assert_eq!(a.bands.as_array(), b.bands.as_array());

        // Band ordering invariant.
        let bands = a.bands.as_array();
        for w in bands.windows(2) {
            assert!(w[0] <= w[1], "bands must be ascending: {:?}", bands);
        }

        // The observed limit, when bounded, sits on the grid.
        if let LimitOutcome::UpperLimit(mu) = a.observed {
            assert!(a.belt.poi_values().contains(&mu));
            let q = a.q_obs_at_limit.unwrap();
            assert!(q.is_finite() && q >= 0.0);
            let clb = a.clb_strict.unwrap();
            assert!((0.0..=1.0).contains(&clb));
            assert!(a.clb_strict.unwrap() <= a.clb_inclusive.unwrap());
        }

        assert_eq!(a.poi_name, "mu");
        assert_eq!(a.upper_limits.len() + a.n_band_errors, cfg.n_band_toys);
    }

    #[test]
    fn belt_reuse_matches_inline_construction() {
        let model = tiny_model();
        let mle = MaximumLikelihoodEstimator::new();
        let cfg = tiny_config();

        let belt = build_model_belt(&mle, &model, &cfg).unwrap();
        let via_reuse =
            upper_limit_with_bands_using_belt(&mle, &model, belt, &cfg).unwrap();
        let inline = upper_limit_with_bands(&mle, &model, &cfg).unwrap();

        assert_eq!(via_reuse.observed, inline.observed);
        assert_eq!(via_reuse.bands.as_array(), inline.bands.as_array());
    }

    #[test]
    fn belt_at_wrong_level_is_rejected() {
        let model = tiny_model();
        let mle = MaximumLikelihoodEstimator::new();
        let cfg = tiny_config();

        let mut belt = build_model_belt(&mle, &model, &cfg).unwrap();
        belt.confidence_level = 0.95;
        let err = upper_limit_with_bands_using_belt(&mle, &model, belt, &cfg).unwrap_err();
        assert!(err.to_string().contains("CL"), "got: {}", err);
    }

    #[test]
    fn threshold_roughly_monotone_away_from_best_fit() {
        // With one-sided q and generation points above mu_hat, thresholds
        // should not collapse as mu grows (allowing boundary noise).
        let model = tiny_model();
        let mle = MaximumLikelihoodEstimator::new();
        let cfg = tiny_config();

        let belt = build_model_belt(&mle, &model, &cfg).unwrap();
        let thresholds = belt.thresholds();
        let first = thresholds.first().copied().unwrap();
        let last = thresholds.last().copied().unwrap();
        assert!(
            last >= first - 0.5,
            "threshold collapsed across the scan: first={} last={}",
            first,
            last
        );
    }

    #[test]
    #[ignore = "heavyweight determinism check; run with `cargo test -p bl-inference --release -- --ignored`"]
    fn reference_configuration_is_deterministic() {
        // The reference setup: 20 grid points, 200 band toys, CL = 0.95.
        let model = tiny_model();
        let mle = MaximumLikelihoodEstimator::new();
        let cfg = UpperLimitConfig { seed: 7, ..UpperLimitConfig::default() };

        let a = upper_limit_with_bands(&mle, &model, &cfg).unwrap();
        let b = upper_limit_with_bands(&mle, &model, &cfg).unwrap();
        assert_eq!(a.belt.thresholds(), b.belt.thresholds());
        assert_eq!(a.bands.as_array(), b.bands.as_array());
        assert_eq!(a.upper_limits, b.upper_limits);
    }
}
