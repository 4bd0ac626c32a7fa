//! Belt curve artifact: acceptance threshold vs POI value.

use bl_inference::ConfidenceBelt;
use serde::{Deserialize, Serialize};

/// Plot-friendly artifact for the confidence belt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeltCurveArtifact {
    /// Confidence level the belt was built for.
    pub confidence_level: f64,
    /// Scan x-values (POI), ascending.
    pub mu_values: Vec<f64>,
    /// Acceptance thresholds aligned with `mu_values`.
    pub thresholds: Vec<f64>,
    /// Valid toys per point, aligned with `mu_values`.
    pub n_valid: Vec<usize>,
}

impl BeltCurveArtifact {
    /// Flatten a belt into plotting arrays.
    pub fn from_belt(belt: &ConfidenceBelt) -> Self {
        Self {
            confidence_level: belt.confidence_level,
            mu_values: belt.poi_values(),
            thresholds: belt.thresholds(),
            n_valid: belt.points.iter().map(|p| p.n_valid).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_inference::{BeltPoint, ScanPoint};

    #[test]
    fn arrays_stay_aligned() {
        let belt = ConfidenceBelt {
            confidence_level: 0.95,
            points: vec![
                BeltPoint {
                    point: ScanPoint { poi_value: 0.5, generation_params: vec![0.5, 0.1] },
                    threshold: 1.2,
                    n_toys: 100,
                    n_valid: 99,
                    n_error: 1,
                },
                BeltPoint {
                    point: ScanPoint { poi_value: 1.5, generation_params: vec![1.5, 0.2] },
                    threshold: 1.4,
                    n_toys: 100,
                    n_valid: 100,
                    n_error: 0,
                },
            ],
        };

        let a = BeltCurveArtifact::from_belt(&belt);
        assert_eq!(a.mu_values, vec![0.5, 1.5]);
        assert_eq!(a.thresholds, vec![1.2, 1.4]);
        assert_eq!(a.n_valid, vec![99, 100]);

        let json = serde_json::to_value(&a).unwrap();
        assert!(json.get("mu_values").unwrap().is_array());
    }
}
