//! # bl-viz
//!
//! Visualization artifacts for Beltline.
//!
//! This crate is intentionally dependency-light: it emits plot-friendly JSON
//! structures (flat arrays instead of nested objects) plus a minimal static
//! SVG rendering of each artifact. All statistics happen upstream; nothing
//! here feeds back into the analysis.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Threshold-vs-POI belt curve artifact.
pub mod belt_curve;

/// Upper-limit distribution histogram artifact (with band markers).
pub mod ul_hist;

/// Static SVG rendering of the artifacts.
pub mod svg;

pub use belt_curve::BeltCurveArtifact;
pub use ul_hist::UpperLimitHistArtifact;
