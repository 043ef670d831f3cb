//! Maximum-likelihood fitting through argmin's L-BFGS solver

use super::FitError;
use crate::error::{ClvError, Result};
use argmin::core::{
    CostFunction, Error as ArgminError, Executor, Gradient, State, TerminationReason,
    TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Convergence settings for maximum-likelihood fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Gradient norm tolerance on the log-likelihood scaled by its starting magnitude
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Number of corrections kept by L-BFGS
    #[serde(default = "default_memory")]
    pub memory: usize,
}

fn default_max_iterations() -> usize { 100 }
fn default_tolerance() -> f64 { 1e-9 }
fn default_memory() -> usize { 10 }

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-9,
            memory: 10,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ClvError::InvalidConfig {
                field: "fit.max_iterations".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ClvError::InvalidConfig {
                field: "fit.tolerance".to_string(),
                reason: "must be finite and > 0".to_string(),
            });
        }
        if self.memory == 0 {
            return Err(ClvError::InvalidConfig {
                field: "fit.memory".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Log-likelihood with its first and second derivatives at a point
pub(crate) struct Evaluation {
    pub log_likelihood: f64,
    pub gradient: DVector<f64>,
    pub hessian: DMatrix<f64>,
}

impl Evaluation {
    fn is_finite(&self) -> bool {
        self.log_likelihood.is_finite()
            && self.gradient.iter().all(|v| v.is_finite())
            && self.hessian.iter().all(|v| v.is_finite())
    }
}

pub(crate) trait Likelihood {
    fn dim(&self) -> usize;

    /// Log-likelihood only; `-inf` or NaN marks an infeasible point
    fn log_likelihood(&self, theta: &DVector<f64>) -> f64;

    fn evaluate(&self, theta: &DVector<f64>) -> Evaluation;
}

pub(crate) struct Optimum {
    pub theta: DVector<f64>,
    pub log_likelihood: f64,
    /// Inverse observed information at the optimum
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
}

/// argmin problem: the negative log-likelihood divided by `scale`
struct NegativeLogLikelihood<'a, L> {
    likelihood: &'a L,
    scale: f64,
}

impl<L: Likelihood> CostFunction for NegativeLogLikelihood<'_, L> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let ll = self.likelihood.log_likelihood(&DVector::from_column_slice(param));
        Ok(if ll.is_finite() { -ll / self.scale } else { f64::INFINITY })
    }
}

impl<L: Likelihood> Gradient for NegativeLogLikelihood<'_, L> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        let eval = self.likelihood.evaluate(&DVector::from_column_slice(param));
        if !eval.gradient.iter().all(|g| g.is_finite()) {
            return Err(ArgminError::msg("log-likelihood gradient is not finite"));
        }
        Ok(eval.gradient.iter().map(|g| -g / self.scale).collect())
    }
}

/// Maximise `likelihood` from `init`.
///
/// L-BFGS with a More-Thuente line search minimises the scaled negative
/// log-likelihood. The analytic Hessian is only used at the optimum, where
/// its negated inverse gives the covariance.
pub(crate) fn maximize<L: Likelihood>(
    likelihood: &L,
    init: DVector<f64>,
    options: &FitOptions,
) -> std::result::Result<Optimum, FitError> {
    debug_assert_eq!(init.len(), likelihood.dim());

    let start = likelihood.log_likelihood(&init);
    if !start.is_finite() {
        return Err(FitError::NonFinite);
    }
    let scale = 1.0 + start.abs();

    let solver = LBFGS::new(MoreThuenteLineSearch::new(), options.memory)
        .with_tolerance_grad(options.tolerance)
        .and_then(|s| s.with_tolerance_cost(0.1 * options.tolerance))
        .map_err(|e| FitError::Optimizer(e.to_string()))?;

    let problem = NegativeLogLikelihood { likelihood, scale };
    let max_iters = options.max_iterations as u64;
    let result = Executor::new(problem, solver)
        .configure(|state| state.param(init.iter().copied().collect()).max_iters(max_iters))
        .run()
        .map_err(|e| FitError::Optimizer(e.to_string()))?;

    let state = result.state();
    let best = state
        .get_best_param()
        .map(|p| DVector::from_column_slice(p))
        .ok_or(FitError::NonFinite)?;
    let iterations = state.get_iter() as usize;
    let solver_converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    );

    let eval = likelihood.evaluate(&best);
    if !eval.is_finite() {
        return Err(FitError::NonFinite);
    }
    // An iteration cap reached right at a stationary point still counts.
    let stationary = eval.gradient.norm() / scale < options.tolerance.sqrt();
    if !(solver_converged || stationary) {
        return Err(FitError::NotConverged { iterations });
    }

    let information = -eval.hessian;
    let covariance = information.cholesky().ok_or(FitError::Singular)?.inverse();
    log::trace!("Likelihood maximised after {} iterations (ll {:.6})", iterations, eval.log_likelihood);
    Ok(Optimum {
        theta: best,
        log_likelihood: eval.log_likelihood,
        covariance,
        iterations,
    })
}
