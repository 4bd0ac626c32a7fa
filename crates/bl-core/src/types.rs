//! Shared configuration enums for Beltline

use serde::{Deserialize, Serialize};

/// Which toy ensemble to generate.
///
/// Controls whether global observables (the auxiliary-measurement centers of
/// nuisance-parameter constraints) are resampled per toy. This is a
/// configuration switch on the generator, not a type distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ensemble {
    /// Fluctuate global observables per toy (frequentist treatment of
    /// auxiliary measurements).
    #[default]
    Unconditional,
    /// Hold global observables fixed at their model values.
    Conditional,
}

/// How a test-statistic value that exactly equals the acceptance threshold
/// is treated when extracting an interval.
///
/// The original logic's `<` vs `<=` choice is uncertain in its own
/// commentary; here it is an explicit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TiePolicy {
    /// Accept a point when `q <= threshold`.
    #[default]
    Inclusive,
    /// Accept a point only when `q < threshold`.
    Strict,
}

impl TiePolicy {
    /// Whether a statistic value passes the threshold under this policy.
    pub fn accepts(self, q: f64, threshold: f64) -> bool {
        match self {
            TiePolicy::Inclusive => q <= threshold,
            TiePolicy::Strict => q < threshold,
        }
    }
}
