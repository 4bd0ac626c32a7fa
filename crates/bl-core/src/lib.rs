//! # bl-core
//!
//! Core types for Beltline: the shared error type, the capability traits
//! that decouple the belt/interval/band machinery from any concrete model,
//! and the small configuration enums used across the workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;
/// Capability traits (model, toy generation, test statistic).
pub mod traits;
/// Shared configuration enums.
pub mod types;

pub use error::{Error, Result};
pub use types::{Ensemble, TiePolicy};
