//! Upper-limit distribution artifact: a histogram of the background-only
//! upper-limit sample plus the expected-band markers and CLb numbers.

use bl_inference::UpperLimitReport;
use serde::{Deserialize, Serialize};

/// Plot-friendly artifact for the expected-limit distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpperLimitHistArtifact {
    /// Bin edges (length `counts.len() + 1`), from 0 to the POI scan maximum.
    pub bin_edges: Vec<f64>,
    /// Entries per bin.
    pub counts: Vec<u64>,
    /// Band values ascending: `[-2σ, -1σ, median, +1σ, +2σ]`.
    pub bands: [f64; 5],
    /// Observed upper limit, if the acceptance region was non-empty.
    pub observed_limit: Option<f64>,
    /// Strict CLb at the observed limit.
    pub clb_strict: Option<f64>,
    /// Inclusive CLb at the observed limit.
    pub clb_inclusive: Option<f64>,
    /// Toys entering the histogram.
    pub n_toys: usize,
}

impl UpperLimitHistArtifact {
    /// Histogram the report's upper-limit sample into `n_bins` uniform bins
    /// over `[0, mu_max]`, where `mu_max` is recovered from the belt grid
    /// (bin centers: last point + half the spacing).
    pub fn from_report(report: &UpperLimitReport, n_bins: usize) -> Self {
        let mu_values = report.belt.poi_values();
        let hi = match mu_values.len() {
            0 => 1.0,
            1 => 2.0 * mu_values[0],
            n => {
                let spacing = mu_values[1] - mu_values[0];
                mu_values[n - 1] + 0.5 * spacing
            }
        };
        let n_bins = n_bins.max(1);

        let mut counts = vec![0u64; n_bins];
        let width = hi / n_bins as f64;
        for &ul in &report.upper_limits {
            let mut bin = ((ul / width).floor() as usize).min(n_bins - 1);
            if ul >= hi {
                bin = n_bins - 1;
            }
            counts[bin] += 1;
        }

        let bin_edges = (0..=n_bins).map(|i| i as f64 * width).collect();

        Self {
            bin_edges,
            counts,
            bands: report.bands.as_array(),
            observed_limit: match report.observed {
                bl_inference::LimitOutcome::UpperLimit(mu) => Some(mu),
                bl_inference::LimitOutcome::EmptyAcceptance => None,
            },
            clb_strict: report.clb_strict,
            clb_inclusive: report.clb_inclusive,
            n_toys: report.upper_limits.len(),
        }
    }
}
