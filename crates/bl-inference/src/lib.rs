//! # bl-inference
//!
//! Statistical inference for Beltline: maximum-likelihood fitting, the
//! one-sided profile-likelihood test statistic, toy-dataset generation, and
//! the three components of the toy-based Neyman construction — belt
//! building, interval extraction, and expected-band generation.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Expected-limit bands from background-only toys (CLb, ±1σ/±2σ bands).
pub mod bands;
/// Confidence-belt construction over a POI scan grid.
pub mod belt;
/// Observed-interval extraction from a belt and a dataset.
pub mod interval;
/// End-to-end upper-limit analysis (belt + interval + bands).
pub mod limits;
/// Maximum-likelihood estimation.
pub mod mle;
/// Generic numerical optimizer (argmin L-BFGS backend).
pub mod optimizer;
/// One-sided profile-likelihood test statistic.
pub mod teststat;
/// Toy data generation (Poisson main counts + Gaussian global observables).
pub mod toys;

pub use bands::{BandsConfig, ExpectedBands, ExpectedBandsResult};
pub use belt::{BeltConfig, BeltPoint, ConfidenceBelt, ScanPoint};
pub use interval::{IntervalResult, LimitOutcome};
pub use limits::{UpperLimitConfig, UpperLimitReport};
pub use mle::MaximumLikelihoodEstimator;
pub use optimizer::{LbfgsOptimizer, OptimizationResult, OptimizerConfig};
pub use teststat::{DatasetProfile, OneSidedProfileLikelihood};
pub use toys::CountingToySampler;
