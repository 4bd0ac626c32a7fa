//! # bl-model
//!
//! Workspace JSON format and the binned Poisson counting model used by the
//! Beltline inference stack. A workspace declares channels of per-bin yields
//! with multiplicative modifiers, the observed counts, and a measurement
//! configuration naming the parameter of interest.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Workspace JSON schema types.
pub mod schema;

/// The counting model (NLL, gradient, dataset overrides).
pub mod model;

/// Convenience builders for small models (tests, demos).
pub mod simplemodels;

pub use model::{CountingModel, Parameter, ToyDataset};
pub use schema::{Channel, Measurement, Modifier, NormSysData, Observation, Sample, Workspace};
