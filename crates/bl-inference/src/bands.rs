//! Expected-limit bands from background-only toys
//!
//! Repeatedly generates background-only pseudo-datasets (POI fixed to zero,
//! nuisances at their data-conditioned best fit), extracts each toy's upper
//! limit from the belt, and summarizes the resulting distribution: the
//! median and ±1σ/±2σ expected bands, and CLb — the fraction of toys whose
//! statistic at the observed limit exceeds the observed one.

use crate::belt::ConfidenceBelt;
use crate::interval::{self, LimitOutcome};
use bl_core::traits::{TestStatistic, ToyGenerator};
use bl_core::{Error, Result, TiePolicy};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Standard normal CDF via `erfc`, stable in the tails.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * statrs::function::erf::erfc(-x / std::f64::consts::SQRT_2)
}

/// Significance-to-p-value mapping: `p = Φ(-nsig)`.
pub fn significance_to_pvalue(nsig: f64) -> f64 {
    normal_cdf(-nsig)
}

/// Linearly interpolated quantile of an ascending-sorted sample.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[n - 1];
    }
    let idx = p * ((n - 1) as f64);
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - (lo as f64);
    sorted[lo] + w * (sorted[hi] - sorted[lo])
}

/// The five expected-limit bands, ascending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpectedBands {
    /// −2σ band (quantile at `Φ(-2)`).
    pub two_sig_down: f64,
    /// −1σ band (quantile at `Φ(-1)`).
    pub one_sig_down: f64,
    /// Median expected limit.
    pub median: f64,
    /// +1σ band (quantile at `Φ(1)`).
    pub one_sig_up: f64,
    /// +2σ band (quantile at `Φ(2)`).
    pub two_sig_up: f64,
}

impl ExpectedBands {
    /// Read the bands off an ascending-sorted upper-limit sample.
    pub fn from_sorted_sample(sorted: &[f64]) -> Self {
        Self {
            two_sig_down: quantile_sorted(sorted, significance_to_pvalue(2.0)),
            one_sig_down: quantile_sorted(sorted, significance_to_pvalue(1.0)),
            median: quantile_sorted(sorted, 0.5),
            one_sig_up: quantile_sorted(sorted, significance_to_pvalue(-1.0)),
            two_sig_up: quantile_sorted(sorted, significance_to_pvalue(-2.0)),
        }
    }

    /// Band values ascending: `[-2σ, -1σ, median, +1σ, +2σ]`.
    pub fn as_array(&self) -> [f64; 5] {
        [self.two_sig_down, self.one_sig_down, self.median, self.one_sig_up, self.two_sig_up]
    }
}

/// Configuration for the background-only toy loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandsConfig {
    /// Number of background-only toys (`M`).
    pub n_toys: usize,
    /// Base random seed; toy `j` uses `seed + j`.
    pub seed: u64,
    /// Tie policy for per-toy interval extraction.
    pub tie_policy: TiePolicy,
}

/// Reference point for CLb counting: the observed upper limit and the
/// observed test-statistic value there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClbReference {
    /// Observed upper limit.
    pub observed_limit: f64,
    /// Observed test statistic at the observed limit.
    pub q_obs: f64,
}

/// Summary of the background-only ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedBandsResult {
    /// The five expected-limit bands.
    pub bands: ExpectedBands,
    /// Fraction of toys with `toy_q > q_obs` at the observed limit.
    pub clb_strict: Option<f64>,
    /// Fraction of toys with `toy_q >= q_obs` at the observed limit.
    pub clb_inclusive: Option<f64>,
    /// Upper-limit sample, ascending (empty-acceptance toys enter as 0).
    pub upper_limits: Vec<f64>,
    /// Toys whose acceptance region was empty (upper limit 0).
    pub n_empty_acceptance: usize,
    /// Toys dropped for generation or fit errors.
    pub n_error: usize,
}

struct ToyOutcome {
    upper_limit: Option<f64>,
    empty: bool,
    clb_gt: bool,
    clb_ge: bool,
}

/// Run the background-only toy loop.
///
/// `generation_params` is the background-only configuration (POI fixed to
/// zero, nuisances at their data-conditioned best fit). Each toy is
/// independent: the belt is shared read-only, per-toy results are merged only
/// at the final aggregation. When `clb_reference` is `None` (observed
/// acceptance region empty), CLb is not defined and both fractions are
/// `None`.
pub fn expected_bands<G, T>(
    belt: &ConfidenceBelt,
    generator: &G,
    test_stat: &T,
    generation_params: &[f64],
    clb_reference: Option<ClbReference>,
    config: &BandsConfig,
) -> Result<ExpectedBandsResult>
where
    G: ToyGenerator,
    T: TestStatistic<G::Dataset>,
{
    if config.n_toys == 0 {
        return Err(Error::Validation("n_toys must be > 0".to_string()));
    }

    let outcomes: Vec<ToyOutcome> = (0..config.n_toys)
        .into_par_iter()
        .with_min_len(1)
        .map(|toy_idx| {
            let toy_seed = config.seed.wrapping_add(toy_idx as u64);
            let data = match generator.generate(generation_params, toy_seed) {
                Ok(d) => d,
                Err(_) => {
                    return ToyOutcome {
                        upper_limit: None,
                        empty: false,
                        clb_gt: false,
                        clb_ge: false,
                    };
                }
            };

            let (clb_gt, clb_ge) = match clb_reference {
                Some(reference) => match test_stat.evaluate(&data, reference.observed_limit) {
                    Ok(toy_q) if toy_q.is_finite() => {
                        (toy_q > reference.q_obs, toy_q >= reference.q_obs)
                    }
                    _ => (false, false),
                },
                None => (false, false),
            };

            match interval::upper_limit(belt, &data, test_stat, config.tie_policy) {
                Ok(r) => match r.outcome {
                    LimitOutcome::UpperLimit(mu) => ToyOutcome {
                        upper_limit: Some(mu),
                        empty: false,
                        clb_gt,
                        clb_ge,
                    },
                    LimitOutcome::EmptyAcceptance => ToyOutcome {
                        upper_limit: Some(0.0),
                        empty: true,
                        clb_gt,
                        clb_ge,
                    },
                },
                Err(_) => {
                    ToyOutcome { upper_limit: None, empty: false, clb_gt, clb_ge }
                }
            }
        })
        .collect();

    let mut upper_limits = Vec::with_capacity(config.n_toys);
    let mut n_empty_acceptance = 0usize;
    let mut n_error = 0usize;
    let mut n_gt = 0usize;
    let mut n_ge = 0usize;
    for o in &outcomes {
        match o.upper_limit {
            Some(ul) => upper_limits.push(ul),
            None => n_error += 1,
        }
        if o.empty {
            n_empty_acceptance += 1;
        }
        if o.clb_gt {
            n_gt += 1;
        }
        if o.clb_ge {
            n_ge += 1;
        }
    }

    if upper_limits.is_empty() {
        return Err(Error::Computation(format!(
            "All {} background-only toys failed",
            config.n_toys
        )));
    }
    if n_error > 0 {
        log::warn!("bands: {} of {} toys dropped", n_error, config.n_toys);
    }

    upper_limits.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let bands = ExpectedBands::from_sorted_sample(&upper_limits);

    let n_valid = upper_limits.len() as f64;
    let (clb_strict, clb_inclusive) = match clb_reference {
        Some(_) => (Some(n_gt as f64 / n_valid), Some(n_ge as f64 / n_valid)),
        None => (None, None),
    };

    Ok(ExpectedBandsResult {
        bands,
        clb_strict,
        clb_inclusive,
        upper_limits,
        n_empty_acceptance,
        n_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::{BeltPoint, ConfidenceBelt, ScanPoint};
    use approx::assert_relative_eq;

    #[test]
    fn significance_mapping_matches_known_values() {
        assert_relative_eq!(significance_to_pvalue(0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(significance_to_pvalue(1.0), 0.158_655_253_9, epsilon = 1e-9);
        assert_relative_eq!(significance_to_pvalue(2.0), 0.022_750_131_9, epsilon = 1e-9);
        assert_relative_eq!(
            significance_to_pvalue(1.0) + significance_to_pvalue(-1.0),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn quantiles_interpolate_between_order_statistics() {
        let s = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&s, 0.0), 0.0);
        assert_eq!(quantile_sorted(&s, 1.0), 4.0);
        assert_eq!(quantile_sorted(&s, 0.5), 2.0);
        assert_relative_eq!(quantile_sorted(&s, 0.625), 2.5, epsilon = 1e-12);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn band_ordering_invariant_holds_for_any_sample() {
        let mut sample: Vec<f64> =
            (0..500).map(|i| ((i * 2654435761u64 as usize) % 1000) as f64 / 100.0).collect();
        sample.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let b = ExpectedBands::from_sorted_sample(&sample);
        assert!(b.two_sig_down <= b.one_sig_down);
        assert!(b.one_sig_down <= b.median);
        assert!(b.median <= b.one_sig_up);
        assert!(b.one_sig_up <= b.two_sig_up);
    }

    fn flat_belt(thresholds: &[f64]) -> ConfidenceBelt {
        let points = thresholds
            .iter()
            .enumerate()
            .map(|(i, &t)| BeltPoint {
                point: ScanPoint {
                    poi_value: (i + 1) as f64,
                    generation_params: vec![0.0],
                },
                threshold: t,
                n_toys: 10,
                n_valid: 10,
                n_error: 0,
            })
            .collect();
        ConfidenceBelt { confidence_level: 0.95, points }
    }

    /// Generator whose dataset is the toy seed; used with statistics that
    /// map seeds to known values.
    struct SeedEcho;

    impl ToyGenerator for SeedEcho {
        type Dataset = u64;
        fn generate(&self, _params: &[f64], seed: u64) -> Result<u64> {
            Ok(seed)
        }
    }

    #[test]
    fn degenerate_single_toy_gives_binary_clb() {
        let belt = flat_belt(&[10.0, 10.0]);
        // q = seed, constant in mu: toy 0 has q = 0.
        let stat = |data: &u64, _mu: f64| -> Result<f64> { Ok(*data as f64) };
        let cfg = BandsConfig { n_toys: 1, seed: 0, tie_policy: TiePolicy::Inclusive };
        let reference = ClbReference { observed_limit: 2.0, q_obs: 0.0 };

        let r = expected_bands(&belt, &SeedEcho, &stat, &[0.0], Some(reference), &cfg).unwrap();
        assert_eq!(r.upper_limits.len(), 1);
        let clb = r.clb_strict.unwrap();
        assert!(clb == 0.0 || clb == 1.0, "single toy must give binary CLb, got {}", clb);
        // toy_q = 0 = q_obs: strict misses the tie, inclusive counts it.
        assert_eq!(r.clb_strict.unwrap(), 0.0);
        assert_eq!(r.clb_inclusive.unwrap(), 1.0);
    }

    #[test]
    fn clb_strict_never_exceeds_inclusive() {
        let belt = flat_belt(&[100.0; 3]);
        let stat = |data: &u64, _mu: f64| -> Result<f64> { Ok((*data % 7) as f64) };
        let cfg = BandsConfig { n_toys: 50, seed: 3, tie_policy: TiePolicy::Inclusive };
        let reference = ClbReference { observed_limit: 1.0, q_obs: 3.0 };

        let r = expected_bands(&belt, &SeedEcho, &stat, &[0.0], Some(reference), &cfg).unwrap();
        let strict = r.clb_strict.unwrap();
        let inclusive = r.clb_inclusive.unwrap();
        assert!(strict <= inclusive);
        // Ties exist (q values cycle 0..7, q_obs = 3), so the two differ.
        assert!(strict < inclusive);
    }

    #[test]
    fn empty_acceptance_toys_enter_at_zero_and_are_counted() {
        // Threshold below any q: every toy's acceptance region is empty.
        let belt = flat_belt(&[-1.0]);
        let stat = |_d: &u64, _mu: f64| -> Result<f64> { Ok(0.0) };
        let cfg = BandsConfig { n_toys: 5, seed: 0, tie_policy: TiePolicy::Inclusive };

        let r = expected_bands(&belt, &SeedEcho, &stat, &[0.0], None, &cfg).unwrap();
        assert_eq!(r.n_empty_acceptance, 5);
        assert!(r.upper_limits.iter().all(|&ul| ul == 0.0));
        assert!(r.clb_strict.is_none());
    }

    #[test]
    fn bands_are_deterministic_per_seed() {
        let belt = flat_belt(&[5.0, 5.0, 5.0]);
        let stat = |data: &u64, mu: f64| -> Result<f64> { Ok(((*data % 11) as f64) * mu / 10.0) };
        let cfg = BandsConfig { n_toys: 40, seed: 9, tie_policy: TiePolicy::Inclusive };

        let a = expected_bands(&belt, &SeedEcho, &stat, &[0.0], None, &cfg).unwrap();
        let b = expected_bands(&belt, &SeedEcho, &stat, &[0.0], None, &cfg).unwrap();
        assert_eq!(a.upper_limits, b.upper_limits);
        assert_eq!(a.bands.as_array(), b.bands.as_array());
    }
}
