//! Optimization backend
//!
//! A thin wrapper around argmin's L-BFGS with box constraints via clamping.
//! Cost and gradient go through [`LogDensityModel`], so any model with an NLL
//! can be minimized.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use bl_core::traits::LogDensityModel;
use bl_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for the L-BFGS optimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate the inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective evaluations.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct EvalCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Bounded NLL problem handed to argmin.
struct BoundedNll<'a, M: LogDensityModel> {
    model: &'a M,
    bounds: &'a [(f64, f64)],
    counts: Arc<EvalCounts>,
}

impl<M: LogDensityModel> CostFunction for BoundedNll<'_, M> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.model.nll(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl<M: LogDensityModel> Gradient for BoundedNll<'_, M> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let mut g =
            self.model.grad_nll(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        // Projected gradient: at an active bound, a component pushing further
        // outside is zeroed so the line search does not step into the flat
        // clamped region.
        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }

        Ok(g)
    }
}

/// L-BFGS optimizer with box constraints
pub struct LbfgsOptimizer {
    config: OptimizerConfig,
}

impl LbfgsOptimizer {
    /// Create a new optimizer with the given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize a model's NLL with bounds.
    ///
    /// # Arguments
    /// * `model` - model whose NLL is minimized
    /// * `init_params` - initial parameter values
    /// * `bounds` - parameter bounds as (lower, upper) per parameter
    pub fn minimize<M: LogDensityModel>(
        &self,
        model: &M,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }

        let init_clamped = clamp_params(init_params, bounds);
        let counts = Arc::new(EvalCounts::default());
        let problem = BoundedNll { model, bounds, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // argmin's default cost tolerance is ~EPS, too strict for NLL scales;
        // derive a looser one from the gradient tolerance.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| {
                Error::Validation(format!("Invalid optimizer configuration (tol): {e}"))
            })?;
        let solver = solver.with_tolerance_cost(tol_cost).map_err(|e| {
            Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
        })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_clamped).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Optimization failed: {}", e)))?;

        let state = res.state();
        let best_unclamped = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?
            .clone();
        let parameters = clamp_params(&best_unclamped, bounds);
        let fval = state.get_best_cost();
        let n_iter = state.get_iter();
        let n_fev = counts.cost.load(Ordering::Relaxed);
        let n_gev = counts.grad.load(Ordering::Relaxed);

        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        let message = termination.to_string();

        Ok(OptimizationResult { parameters, fval, n_iter, n_fev, n_gev, converged, message })
    }
}

impl Default for LbfgsOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // f(x, y) = (x - 2)^2 + (y - 3)^2, minimum at (2, 3)
    struct Quadratic;

    impl LogDensityModel for Quadratic {
        fn dim(&self) -> usize {
            2
        }
        fn parameter_names(&self) -> Vec<String> {
            vec!["x".into(), "y".into()]
        }
        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(-10.0, 10.0), (-10.0, 10.0)]
        }
        fn parameter_init(&self) -> Vec<f64> {
            vec![0.0, 0.0]
        }
        fn nll(&self, p: &[f64]) -> Result<f64> {
            Ok((p[0] - 2.0).powi(2) + (p[1] - 3.0).powi(2))
        }
        fn grad_nll(&self, p: &[f64]) -> Result<Vec<f64>> {
            Ok(vec![2.0 * (p[0] - 2.0), 2.0 * (p[1] - 3.0)])
        }
    }

    #[test]
    fn quadratic_converges_to_minimum() {
        let optimizer = LbfgsOptimizer::default();
        let result =
            optimizer.minimize(&Quadratic, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)]).unwrap();

        assert!(result.converged, "should converge: {}", result.message);
        assert_relative_eq!(result.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.parameters[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.fval, 0.0, epsilon = 1e-6);
        assert!(result.n_fev > 0);
    }

    #[test]
    fn bounded_minimum_lands_on_boundary() {
        // Constrain to x in [3, 5], y in [1, 2]: optimum at (3, 2).
        let optimizer = LbfgsOptimizer::default();
        let result =
            optimizer.minimize(&Quadratic, &[4.0, 1.5], &[(3.0, 5.0), (1.0, 2.0)]).unwrap();

        assert_relative_eq!(result.parameters[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.parameters[1], 2.0, epsilon = 1e-4);
        assert!(
            result.converged,
            "should converge at the boundary, not hit MaxIter: {}",
            result.message
        );
    }

    #[test]
    fn pinned_parameter_stays_pinned() {
        // Bounds (v, v) freeze a parameter; mimics POI pinning in scans.
        let optimizer = LbfgsOptimizer::default();
        let result =
            optimizer.minimize(&Quadratic, &[0.0, 0.0], &[(0.0, 0.0), (-10.0, 10.0)]).unwrap();

        assert_relative_eq!(result.parameters[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.parameters[1], 3.0, epsilon = 1e-4);
        // f(0, 3) = 4
        assert_relative_eq!(result.fval, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let optimizer = LbfgsOptimizer::default();
        assert!(optimizer.minimize(&Quadratic, &[0.0], &[(-1.0, 1.0), (-1.0, 1.0)]).is_err());
    }
}
