//! Simple model builders for quick experiments and tests.
//!
//! Convenience functions that construct a [`Workspace`] from minimal inputs.

use crate::schema::{
    Channel, Measurement, Modifier, NormSysData, Observation, Sample, Workspace,
};

/// Build a single-channel, single-bin counting workspace.
///
/// One signal sample scaled by the POI `mu` and one background sample,
/// optionally carrying a `normsys` normalization uncertainty
/// (`hi = 1 + rel_unc`, `lo = 1 - rel_unc`).
///
/// # Panics
/// Panics if `signal` or `background` is negative, or if `rel_unc` is not in
/// `(0, 1)`.
pub fn single_bin_counting(
    signal: f64,
    background: f64,
    rel_unc: Option<f64>,
    observed: f64,
) -> Workspace {
    assert!(signal >= 0.0, "signal must be non-negative");
    assert!(background >= 0.0, "background must be non-negative");

    let mut bkg_modifiers = Vec::new();
    if let Some(unc) = rel_unc {
        assert!(unc > 0.0 && unc < 1.0, "rel_unc must be in (0, 1)");
        bkg_modifiers.push(Modifier::NormSys {
            name: "bkg_norm".to_string(),
            data: NormSysData { hi: 1.0 + unc, lo: 1.0 - unc },
        });
    }

    Workspace {
        channels: vec![Channel {
            name: "singlechannel".to_string(),
            samples: vec![
                Sample {
                    name: "signal".to_string(),
                    data: vec![signal],
                    modifiers: vec![Modifier::NormFactor { name: "mu".to_string() }],
                },
                Sample {
                    name: "background".to_string(),
                    data: vec![background],
                    modifiers: bkg_modifiers,
                },
            ],
        }],
        observations: vec![Observation {
            name: "singlechannel".to_string(),
            counts: vec![observed],
        }],
        measurement: Measurement {
            name: "Measurement".to_string(),
            poi: "mu".to_string(),
            extended: true,
            parameters: vec![],
        },
        version: Some("1.0.0".to_string()),
    }
}

/// Build a single-channel counting workspace with several bins and one
/// correlated background normalization uncertainty.
///
/// # Panics
/// Panics if the slices are empty or have different lengths, or if
/// `bkg_norm_unc` is not in `(0, 1)`.
pub fn multi_bin_counting(
    signal: &[f64],
    background: &[f64],
    bkg_norm_unc: f64,
    observed: &[f64],
) -> Workspace {
    assert!(!signal.is_empty(), "signal must not be empty");
    assert_eq!(signal.len(), background.len(), "signal and background must have the same length");
    assert_eq!(signal.len(), observed.len(), "signal and observed must have the same length");
    assert!(bkg_norm_unc > 0.0 && bkg_norm_unc < 1.0, "bkg_norm_unc must be in (0, 1)");

    Workspace {
        channels: vec![Channel {
            name: "singlechannel".to_string(),
            samples: vec![
                Sample {
                    name: "signal".to_string(),
                    data: signal.to_vec(),
                    modifiers: vec![Modifier::NormFactor { name: "mu".to_string() }],
                },
                Sample {
                    name: "background".to_string(),
                    data: background.to_vec(),
                    modifiers: vec![Modifier::NormSys {
                        name: "bkg_norm".to_string(),
                        data: NormSysData { hi: 1.0 + bkg_norm_unc, lo: 1.0 - bkg_norm_unc },
                    }],
                },
            ],
        }],
        observations: vec![Observation {
            name: "singlechannel".to_string(),
            counts: observed.to_vec(),
        }],
        measurement: Measurement {
            name: "Measurement".to_string(),
            poi: "mu".to_string(),
            extended: true,
            parameters: vec![],
        },
        version: Some("1.0.0".to_string()),
    }
}
