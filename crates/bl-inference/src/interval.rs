//! Interval extraction
//!
//! Walks the belt in ascending POI order and keeps the last grid point whose
//! observed test statistic is inside the acceptance region. Scanning stops at
//! the first rejected point: the one-sided statistic is assumed
//! non-decreasing as the tested value moves above the data's point estimate.

use crate::belt::ConfidenceBelt;
use bl_core::traits::TestStatistic;
use bl_core::{Result, TiePolicy};
use serde::{Deserialize, Serialize};

/// Outcome of a one-sided upper-limit extraction.
///
/// An empty acceptance region is a valid result (the limit is below the
/// grid), distinct from a limit that happens to equal the first grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOutcome {
    /// The largest accepted POI value.
    UpperLimit(f64),
    /// No grid point was accepted.
    EmptyAcceptance,
}

impl LimitOutcome {
    /// The limit value, with an empty acceptance region mapped to `floor`
    /// (typically 0 or the grid minimum).
    pub fn value_or(&self, floor: f64) -> f64 {
        match self {
            LimitOutcome::UpperLimit(v) => *v,
            LimitOutcome::EmptyAcceptance => floor,
        }
    }
}

/// Result of scanning a dataset against a belt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalResult {
    /// Extraction outcome.
    pub outcome: LimitOutcome,
    /// Grid points accepted before the scan stopped.
    pub n_accepted: usize,
    /// Grid points evaluated (scanning stops at the first rejection).
    pub n_evaluated: usize,
}

/// Extract the one-sided upper limit for `data` from a belt.
///
/// A point is accepted when `tie_policy.accepts(q, threshold)`; the scan
/// starts at the grid minimum and stops at the first rejection.
pub fn upper_limit<D, T>(
    belt: &ConfidenceBelt,
    data: &D,
    test_stat: &T,
    tie_policy: TiePolicy,
) -> Result<IntervalResult>
where
    T: TestStatistic<D>,
{
    let mut last_accepted: Option<f64> = None;
    let mut n_accepted = 0usize;
    let mut n_evaluated = 0usize;

    for bp in &belt.points {
        let q = test_stat.evaluate(data, bp.point.poi_value)?;
        n_evaluated += 1;
        if tie_policy.accepts(q, bp.threshold) {
            last_accepted = Some(bp.point.poi_value);
            n_accepted += 1;
        } else {
            break;
        }
    }

    let outcome = match last_accepted {
        Some(mu) => LimitOutcome::UpperLimit(mu),
        None => LimitOutcome::EmptyAcceptance,
    };
    Ok(IntervalResult { outcome, n_accepted, n_evaluated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::{BeltPoint, ScanPoint};

    fn belt_with_thresholds(thresholds: &[f64]) -> ConfidenceBelt {
        let points = thresholds
            .iter()
            .enumerate()
            .map(|(i, &t)| BeltPoint {
                point: ScanPoint {
                    poi_value: (i + 1) as f64,
                    generation_params: vec![(i + 1) as f64],
                },
                threshold: t,
                n_toys: 100,
                n_valid: 100,
                n_error: 0,
            })
            .collect();
        ConfidenceBelt { confidence_level: 0.95, points }
    }

    /// Statistic independent of the dataset: q(mu) = mu - 1.
    fn linear_stat() -> impl TestStatistic<()> {
        |_d: &(), mu: f64| -> Result<f64> { Ok(mu - 1.0) }
    }

    #[test]
    fn limit_is_the_last_accepted_point() {
        // thresholds: accept at mu=1 (q=0 <= 2), mu=2 (q=1 <= 2), reject at mu=3 (q=2 > 1.5).
        let belt = belt_with_thresholds(&[2.0, 2.0, 1.5, 9.0]);
        let r = upper_limit(&belt, &(), &linear_stat(), TiePolicy::Inclusive).unwrap();
        assert_eq!(r.outcome, LimitOutcome::UpperLimit(2.0));
        assert_eq!(r.n_accepted, 2);
        // Scanning stopped at the rejection; the mu=4 point was never scored.
        assert_eq!(r.n_evaluated, 3);
    }

    #[test]
    fn empty_acceptance_is_distinct_from_first_point_limit() {
        // First point rejected outright.
        let belt = belt_with_thresholds(&[-1.0, 9.0]);
        let r = upper_limit(&belt, &(), &linear_stat(), TiePolicy::Inclusive).unwrap();
        assert_eq!(r.outcome, LimitOutcome::EmptyAcceptance);
        assert_eq!(r.n_accepted, 0);
        assert_eq!(r.outcome.value_or(0.0), 0.0);

        // First point accepted, second rejected: the limit IS the first point.
        let belt = belt_with_thresholds(&[0.5, -1.0]);
        let r = upper_limit(&belt, &(), &linear_stat(), TiePolicy::Inclusive).unwrap();
        assert_eq!(r.outcome, LimitOutcome::UpperLimit(1.0));
    }

    #[test]
    fn tie_policy_decides_exact_threshold_hits() {
        // q(mu=1) = 0 exactly equals the threshold.
        let belt = belt_with_thresholds(&[0.0]);
        let inc = upper_limit(&belt, &(), &linear_stat(), TiePolicy::Inclusive).unwrap();
        let strict = upper_limit(&belt, &(), &linear_stat(), TiePolicy::Strict).unwrap();
        assert_eq!(inc.outcome, LimitOutcome::UpperLimit(1.0));
        assert_eq!(strict.outcome, LimitOutcome::EmptyAcceptance);
    }

    #[test]
    fn outcome_serializes_distinctly() {
        let a = serde_json::to_string(&LimitOutcome::UpperLimit(1.0)).unwrap();
        let b = serde_json::to_string(&LimitOutcome::EmptyAcceptance).unwrap();
        assert_ne!(a, b);
        let back: LimitOutcome = serde_json::from_str(&a).unwrap();
        assert_eq!(back, LimitOutcome::UpperLimit(1.0));
    }
}
