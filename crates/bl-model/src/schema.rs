//! Workspace JSON schema types

use serde::{Deserialize, Serialize};

/// Workspace: channels + observations + measurement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Channels (regions)
    pub channels: Vec<Channel>,
    /// Observed data per channel
    pub observations: Vec<Observation>,
    /// Measurement configuration
    pub measurement: Measurement,
    /// Schema version
    #[serde(default)]
    pub version: Option<String>,
}

/// Channel (region)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name
    pub name: String,
    /// Samples in this channel
    pub samples: Vec<Sample>,
}

/// Sample (process)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Sample name
    pub name: String,
    /// Expected event counts per bin
    pub data: Vec<f64>,
    /// Modifiers (normalizations and systematics)
    pub modifiers: Vec<Modifier>,
}

/// Multiplicative modifier on a sample's yields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Modifier {
    /// normfactor: free-floating normalization (e.g., the POI)
    #[serde(rename = "normfactor")]
    NormFactor {
        /// Modifier name (one parameter per unique name).
        name: String,
    },

    /// normsys: log-normal normalization uncertainty with a unit-Gaussian
    /// constrained nuisance parameter and an associated global observable
    #[serde(rename = "normsys")]
    NormSys {
        /// Modifier name (one parameter per unique name).
        name: String,
        /// Up/down multiplicative factors at ±1σ.
        data: NormSysData,
    },
}

/// normsys data (hi/lo factors)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormSysData {
    /// High (up) multiplicative factor.
    pub hi: f64,
    /// Low (down) multiplicative factor.
    pub lo: f64,
}

/// Observation (data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Channel name this observation belongs to
    pub name: String,
    /// Observed event counts per bin
    pub counts: Vec<f64>,
}

/// Measurement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Measurement name
    pub name: String,
    /// Parameter of interest
    pub poi: String,
    /// Whether the model is extended (dataset entry counts fluctuate in
    /// toys). Non-extended models must carry exactly one main data entry.
    #[serde(default = "default_extended")]
    pub extended: bool,
    /// Per-parameter overrides
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

fn default_extended() -> bool {
    true
}

/// Parameter override (init, bounds, fixed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Parameter name
    pub name: String,
    /// Initial value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<f64>,
    /// Bounds [min, max]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 2]>,
    /// Whether this parameter is frozen in fits.
    #[serde(default)]
    pub fixed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_roundtrips_through_json() {
        let json = r#"{
            "channels": [{
                "name": "SR",
                "samples": [
                    {"name": "signal", "data": [3.0],
                     "modifiers": [{"type": "normfactor", "name": "mu"}]},
                    {"name": "background", "data": [10.0],
                     "modifiers": [{"type": "normsys", "name": "bkg_norm",
                                    "data": {"hi": 1.1, "lo": 0.9}}]}
                ]
            }],
            "observations": [{"name": "SR", "counts": [11.0]}],
            "measurement": {"name": "meas", "poi": "mu"}
        }"#;

        let ws: Workspace = serde_json::from_str(json).unwrap();
        assert_eq!(ws.channels.len(), 1);
        assert_eq!(ws.channels[0].samples.len(), 2);
        assert!(ws.measurement.extended, "extended defaults to true");

        let back = serde_json::to_string(&ws).unwrap();
        let ws2: Workspace = serde_json::from_str(&back).unwrap();
        assert_eq!(ws2.observations[0].counts, vec![11.0]);
    }

    #[test]
    fn modifier_tag_is_type() {
        let m: Modifier =
            serde_json::from_str(r#"{"type": "normfactor", "name": "mu"}"#).unwrap();
        match m {
            Modifier::NormFactor { name } => assert_eq!(name, "mu"),
            _ => panic!("wrong variant"),
        }
    }
}
