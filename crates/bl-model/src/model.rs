//! Counting model representation
//!
//! Converts a [`Workspace`] into an internal model suitable for inference:
//! a binned Poisson likelihood over channel yields with multiplicative
//! modifiers, plus unit-Gaussian constraint terms whose centers are the
//! model's global observables.

use crate::schema::*;
use bl_core::traits::{FixedParamModel, LogDensityModel, PoiModel};
use bl_core::{Error, Result};
use statrs::function::gamma::ln_gamma;
use std::collections::HashMap;

/// Yields below this are clamped before taking logs.
const LAMBDA_MIN: f64 = 1e-10;

/// A pseudo-dataset: main bin counts plus global-observable values.
///
/// `globals` is a full parameter-length vector; entries are meaningful only
/// at constrained-parameter indices. Created per toy, scored, and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ToyDataset {
    /// Main observed counts, flat across channels in declaration order.
    pub main: Vec<f64>,
    /// Global-observable values (constraint centers), parameter-aligned.
    pub globals: Vec<f64>,
}

/// Model parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Initial value
    pub init: f64,
    /// Bounds (min, max)
    pub bounds: (f64, f64),
    /// Is this a nuisance parameter with a Gaussian constraint?
    pub constrained: bool,
    /// Constraint center — the global observable (for constrained NP)
    pub constraint_center: Option<f64>,
    /// Constraint width (for constrained NP)
    pub constraint_width: Option<f64>,
}

/// Counting model
#[derive(Debug, Clone)]
pub struct CountingModel {
    /// Model parameters
    parameters: Vec<Parameter>,
    /// Parameter of interest index
    poi_index: Option<usize>,
    /// Channels
    channels: Vec<ModelChannel>,
    /// Whether toy generation may fluctuate the dataset entry count.
    extended: bool,
}

#[derive(Debug, Clone)]
struct ModelChannel {
    #[allow(dead_code)]
    name: String,
    samples: Vec<ModelSample>,
    /// Observed main counts for this channel.
    observed: Vec<f64>,
    /// `ln Γ(n+1)` per observed bin, precomputed at construction.
    ln_factorials: Vec<f64>,
}

#[derive(Debug, Clone)]
struct ModelSample {
    #[allow(dead_code)]
    name: String,
    nominal: Vec<f64>,
    modifiers: Vec<ModelModifier>,
}

#[derive(Debug, Clone)]
enum ModelModifier {
    /// Free normalization factor (POI or unconstrained nuisance)
    NormFactor { param_idx: usize },
    /// Log-normal normalization systematic: `hi^alpha` up, `lo^-alpha` down
    NormSys { param_idx: usize, hi: f64, lo: f64 },
}

impl ModelModifier {
    fn factor(&self, params: &[f64]) -> f64 {
        match self {
            ModelModifier::NormFactor { param_idx } => params[*param_idx],
            ModelModifier::NormSys { param_idx, hi, lo } => {
                let alpha = params[*param_idx];
                if alpha >= 0.0 { hi.powf(alpha) } else { lo.powf(-alpha) }
            }
        }
    }

    /// `d factor / d theta` for this modifier's own parameter.
    fn dfactor(&self, params: &[f64]) -> f64 {
        match self {
            ModelModifier::NormFactor { .. } => 1.0,
            ModelModifier::NormSys { param_idx, hi, lo } => {
                let alpha = params[*param_idx];
                if alpha >= 0.0 {
                    hi.powf(alpha) * hi.ln()
                } else {
                    -(lo.powf(-alpha)) * lo.ln()
                }
            }
        }
    }

    fn param_idx(&self) -> usize {
        match self {
            ModelModifier::NormFactor { param_idx } => *param_idx,
            ModelModifier::NormSys { param_idx, .. } => *param_idx,
        }
    }
}

impl CountingModel {
    /// Create a model from a workspace.
    ///
    /// The POI is registered first; nuisance parameters follow in modifier
    /// declaration order. `normsys` parameters get a unit-Gaussian constraint
    /// centered at 0 (the center is the global observable).
    pub fn from_workspace(ws: &Workspace) -> Result<Self> {
        let mut parameters: Vec<Parameter> = Vec::new();
        let mut param_map: HashMap<String, usize> = HashMap::new();

        let poi_name = ws.measurement.poi.as_str();
        if poi_name.is_empty() {
            return Err(Error::Validation("Measurement POI name is empty".to_string()));
        }

        param_map.insert(poi_name.to_string(), 0);
        parameters.push(Parameter {
            name: poi_name.to_string(),
            init: 1.0,
            bounds: (0.0, 10.0),
            constrained: false,
            constraint_center: None,
            constraint_width: None,
        });
        let poi_index = Some(0);

        // First pass: register parameters.
        for channel in &ws.channels {
            for sample in &channel.samples {
                for modifier in &sample.modifiers {
                    match modifier {
                        Modifier::NormFactor { name } => {
                            if !param_map.contains_key(name) {
                                param_map.insert(name.clone(), parameters.len());
                                parameters.push(Parameter {
                                    name: name.clone(),
                                    init: 1.0,
                                    bounds: (0.0, 10.0),
                                    constrained: false,
                                    constraint_center: None,
                                    constraint_width: None,
                                });
                            }
                        }
                        Modifier::NormSys { name, data } => {
                            if data.hi <= 0.0 || data.lo <= 0.0 {
                                return Err(Error::Validation(format!(
                                    "normsys '{}' factors must be positive: hi={} lo={}",
                                    name, data.hi, data.lo
                                )));
                            }
                            if !param_map.contains_key(name) {
                                param_map.insert(name.clone(), parameters.len());
                                parameters.push(Parameter {
                                    name: name.clone(),
                                    init: 0.0,
                                    bounds: (-5.0, 5.0),
                                    constrained: true,
                                    constraint_center: Some(0.0),
                                    constraint_width: Some(1.0),
                                });
                            }
                        }
                    }
                }
            }
        }

        // Apply measurement-level parameter overrides.
        for cfg in &ws.measurement.parameters {
            let idx = *param_map.get(&cfg.name).ok_or_else(|| {
                Error::Validation(format!(
                    "Parameter override '{}' does not match any model parameter",
                    cfg.name
                ))
            })?;
            let p = &mut parameters[idx];
            if let Some(init) = cfg.init {
                p.init = init;
            }
            if let Some([lo, hi]) = cfg.bounds {
                if hi < lo {
                    return Err(Error::Validation(format!(
                        "Parameter '{}' bounds inverted: [{}, {}]",
                        cfg.name, lo, hi
                    )));
                }
                p.bounds = (lo, hi);
            }
            if cfg.fixed {
                p.bounds = (p.init, p.init);
            }
        }

        // Second pass: build channels with observed data.
        let obs_by_name: HashMap<&str, &Observation> =
            ws.observations.iter().map(|o| (o.name.as_str(), o)).collect();

        let mut channels = Vec::with_capacity(ws.channels.len());
        for channel in &ws.channels {
            let obs = obs_by_name.get(channel.name.as_str()).ok_or_else(|| {
                Error::Validation(format!("No observation for channel '{}'", channel.name))
            })?;

            let n_bins = channel
                .samples
                .first()
                .map(|s| s.data.len())
                .ok_or_else(|| {
                    Error::Validation(format!("Channel '{}' has no samples", channel.name))
                })?;
            if n_bins == 0 {
                return Err(Error::Validation(format!(
                    "Channel '{}' has zero bins",
                    channel.name
                )));
            }

            let mut samples = Vec::with_capacity(channel.samples.len());
            for sample in &channel.samples {
                if sample.data.len() != n_bins {
                    return Err(Error::Validation(format!(
                        "Sample '{}' in channel '{}' has {} bins, expected {}",
                        sample.name,
                        channel.name,
                        sample.data.len(),
                        n_bins
                    )));
                }
                let modifiers = sample
                    .modifiers
                    .iter()
                    .map(|m| match m {
                        Modifier::NormFactor { name } => {
                            ModelModifier::NormFactor { param_idx: param_map[name.as_str()] }
                        }
                        Modifier::NormSys { name, data } => ModelModifier::NormSys {
                            param_idx: param_map[name.as_str()],
                            hi: data.hi,
                            lo: data.lo,
                        },
                    })
                    .collect();
                samples.push(ModelSample {
                    name: sample.name.clone(),
                    nominal: sample.data.clone(),
                    modifiers,
                });
            }

            if obs.counts.len() != n_bins {
                return Err(Error::Validation(format!(
                    "Observation for channel '{}' has {} bins, expected {}",
                    channel.name,
                    obs.counts.len(),
                    n_bins
                )));
            }

            let ln_factorials = obs.counts.iter().map(|&n| ln_gamma(n + 1.0)).collect();
            channels.push(ModelChannel {
                name: channel.name.clone(),
                samples,
                observed: obs.counts.clone(),
                ln_factorials,
            });
        }

        Ok(Self { parameters, poi_index, channels, extended: ws.measurement.extended })
    }

    fn validate_params_len(&self, got: usize) -> Result<()> {
        let expected = self.parameters.len();
        if got != expected {
            return Err(Error::Validation(format!(
                "Parameter length mismatch: expected {}, got {}",
                expected, got
            )));
        }
        Ok(())
    }

    /// Number of parameters
    pub fn n_params(&self) -> usize {
        self.parameters.len()
    }

    /// Get parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Total number of main bins across channels (dataset entries).
    pub fn n_main_bins(&self) -> usize {
        self.channels.iter().map(|c| c.observed.len()).sum()
    }

    /// Whether toy generation may fluctuate the dataset entry count.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Observed main counts, flat across channels in declaration order.
    pub fn observed_main(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_main_bins());
        for channel in &self.channels {
            out.extend_from_slice(&channel.observed);
        }
        out
    }

    /// Current global-observable values, parameter-aligned.
    ///
    /// Entries at unconstrained indices are 0 and carry no meaning.
    pub fn global_observables(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.constraint_center.unwrap_or(0.0)).collect()
    }

    /// Create a copy with overridden observed (main) data.
    ///
    /// `observed_main` must be flat across channels in declaration order.
    pub fn with_observed_main(&self, observed_main: &[f64]) -> Result<Self> {
        let expected_len = self.n_main_bins();
        if observed_main.len() != expected_len {
            return Err(Error::Validation(format!(
                "Observed main data length mismatch: expected {}, got {}",
                expected_len,
                observed_main.len()
            )));
        }

        let mut out = self.clone();
        let mut offset = 0;
        for channel in &mut out.channels {
            let n_bins = channel.observed.len();
            channel.observed.clear();
            channel.observed.extend_from_slice(&observed_main[offset..offset + n_bins]);
            channel.ln_factorials = channel.observed.iter().map(|&n| ln_gamma(n + 1.0)).collect();
            offset += n_bins;
        }
        Ok(out)
    }

    /// Create a copy with updated global observables (constraint centers).
    ///
    /// `globals` is a full parameter-length vector; only constrained
    /// parameters pick up their entry.
    pub fn with_global_observables(&self, globals: &[f64]) -> Result<Self> {
        self.validate_params_len(globals.len())?;

        let mut out = self.clone();
        for (i, p) in out.parameters.iter_mut().enumerate() {
            if p.constrained && p.constraint_center.is_some() {
                p.constraint_center = Some(globals[i]);
            }
        }
        Ok(out)
    }

    /// Create a copy with a toy dataset installed (main counts + globals).
    pub fn with_dataset(&self, data: &ToyDataset) -> Result<Self> {
        self.with_observed_main(&data.main)?.with_global_observables(&data.globals)
    }

    /// Get POI index
    pub fn poi_index(&self) -> Option<usize> {
        self.poi_index
    }

    /// POI bounds (min, max).
    pub fn poi_bounds(&self) -> Result<(f64, f64)> {
        let poi = self
            .poi_index
            .ok_or_else(|| Error::Validation("No POI defined".to_string()))?;
        Ok(self.parameters[poi].bounds)
    }

    /// Expected main yields at `params`, flat across channels.
    pub fn expected_main(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params_len(params.len())?;

        let mut out = Vec::with_capacity(self.n_main_bins());
        for channel in &self.channels {
            let n_bins = channel.observed.len();
            for bin in 0..n_bins {
                let mut lam = 0.0;
                for sample in &channel.samples {
                    let mut factor = 1.0;
                    for m in &sample.modifiers {
                        factor *= m.factor(params);
                    }
                    lam += sample.nominal[bin] * factor;
                }
                out.push(lam);
            }
        }
        Ok(out)
    }

    /// Compute negative log-likelihood.
    ///
    /// Poisson terms per main bin plus `0.5 * ((alpha - g) / sigma)^2` per
    /// constrained parameter (constant offsets dropped).
    pub fn nll(&self, params: &[f64]) -> Result<f64> {
        self.validate_params_len(params.len())?;

        let mut nll = 0.0;
        for channel in &self.channels {
            for bin in 0..channel.observed.len() {
                let mut lam = 0.0;
                for sample in &channel.samples {
                    let mut factor = 1.0;
                    for m in &sample.modifiers {
                        factor *= m.factor(params);
                    }
                    lam += sample.nominal[bin] * factor;
                }
                let lam = lam.max(LAMBDA_MIN);
                let n = channel.observed[bin];
                nll += lam - n * lam.ln() + channel.ln_factorials[bin];
            }
        }

        for (i, p) in self.parameters.iter().enumerate() {
            if let (true, Some(center), Some(width)) =
                (p.constrained, p.constraint_center, p.constraint_width)
            {
                let z = (params[i] - center) / width;
                nll += 0.5 * z * z;
            }
        }

        if !nll.is_finite() {
            return Err(Error::Computation(format!("NLL is not finite at params {:?}", params)));
        }
        Ok(nll)
    }

    /// Analytic gradient of the NLL.
    pub fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params_len(params.len())?;

        let mut grad = vec![0.0; params.len()];
        for channel in &self.channels {
            for bin in 0..channel.observed.len() {
                let n = channel.observed[bin];

                let mut lam = 0.0;
                for sample in &channel.samples {
                    let mut factor = 1.0;
                    for m in &sample.modifiers {
                        factor *= m.factor(params);
                    }
                    lam += sample.nominal[bin] * factor;
                }
                let lam = lam.max(LAMBDA_MIN);
                // d nll / d lam = 1 - n / lam
                let dnll_dlam = 1.0 - n / lam;

                for sample in &channel.samples {
                    for (k, m) in sample.modifiers.iter().enumerate() {
                        let mut prod_excl = 1.0;
                        for (j, other) in sample.modifiers.iter().enumerate() {
                            if j != k {
                                prod_excl *= other.factor(params);
                            }
                        }
                        let dlam = sample.nominal[bin] * prod_excl * m.dfactor(params);
                        grad[m.param_idx()] += dnll_dlam * dlam;
                    }
                }
            }
        }

        for (i, p) in self.parameters.iter().enumerate() {
            if let (true, Some(center), Some(width)) =
                (p.constrained, p.constraint_center, p.constraint_width)
            {
                grad[i] += (params[i] - center) / (width * width);
            }
        }

        Ok(grad)
    }
}

impl LogDensityModel for CountingModel {
    fn dim(&self) -> usize {
        self.n_params()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    fn parameter_init(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.init).collect()
    }

    fn nll(&self, params: &[f64]) -> Result<f64> {
        CountingModel::nll(self, params)
    }

    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.gradient(params)
    }
}

impl PoiModel for CountingModel {
    fn poi_index(&self) -> Option<usize> {
        self.poi_index
    }
}

impl FixedParamModel for CountingModel {
    fn with_fixed_param(&self, param_idx: usize, value: f64) -> Self {
        let mut out = self.clone();
        if let Some(p) = out.parameters.get_mut(param_idx) {
            p.init = value;
            p.bounds = (value, value);
        }
        out
    }
}
