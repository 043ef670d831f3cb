//! Survival regressions for customer churn.
//!
//! Four families are supported: Weibull, log-normal and log-logistic
//! accelerated failure time models, and the Cox proportional hazards model.
//! Every family is fitted by maximum likelihood with the same L-BFGS
//! solver and produces a [`FittedModel`] that can predict survival curves.

mod aft;
mod cox;
mod design;
mod fitted;
mod optimizer;
mod summary;

pub use aft::{AftDistribution, AftFitter};
pub use cox::CoxFitter;
pub use design::Design;
pub use fitted::{FittedModel, InformationCriterion};
pub use optimizer::FitOptions;
pub use summary::{CoefficientRow, CoefficientTable, ParameterGroup, INTERCEPT};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Significance level used for coefficient confidence intervals
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    WeibullAft,
    LogNormalAft,
    LogLogisticAft,
    CoxPh,
}

impl ModelFamily {
    /// Candidate order for model selection; earlier families win ties
    pub const CANDIDATES: [ModelFamily; 4] = [
        ModelFamily::WeibullAft,
        ModelFamily::LogNormalAft,
        ModelFamily::LogLogisticAft,
        ModelFamily::CoxPh,
    ];

    /// Label of the regression that carries the covariates
    pub fn location_parameter(self) -> &'static str {
        match self {
            ModelFamily::WeibullAft => "lambda_",
            ModelFamily::LogNormalAft => "mu_",
            ModelFamily::LogLogisticAft => "alpha_",
            ModelFamily::CoxPh => "coef",
        }
    }

    pub fn fit(self, design: &Design, options: &FitOptions) -> Result<FittedModel, FitError> {
        log::debug!(
            "Fitting {} on {} rows ({} events, {} covariates)",
            self,
            design.n(),
            design.n_events(),
            design.p()
        );
        match self {
            ModelFamily::WeibullAft => AftFitter::new(AftDistribution::Weibull).fit(design, options),
            ModelFamily::LogNormalAft => AftFitter::new(AftDistribution::LogNormal).fit(design, options),
            ModelFamily::LogLogisticAft => {
                AftFitter::new(AftDistribution::LogLogistic).fit(design, options)
            }
            ModelFamily::CoxPh => CoxFitter.fit(design, options),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::WeibullAft => "Weibull AFT",
            ModelFamily::LogNormalAft => "Log-Normal AFT",
            ModelFamily::LogLogisticAft => "Log-Logistic AFT",
            ModelFamily::CoxPh => "Cox PH",
        };
        f.write_str(name)
    }
}

/// Why a single model could not be fitted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("information matrix is singular")]
    Singular,

    #[error("optimiser did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("no observed events")]
    NoEvents,

    #[error("model needs at least one covariate")]
    NoCovariates,

    #[error("{rows} rows is too few to estimate {params} parameters")]
    InsufficientData { rows: usize, params: usize },

    #[error("likelihood is not finite at the current estimate")]
    NonFinite,

    #[error("optimiser failed: {0}")]
    Optimizer(String),
}

/// A model family that can be fitted to survival data
pub trait SurvivalRegression {
    fn family(&self) -> ModelFamily;

    fn fit(&self, design: &Design, options: &FitOptions) -> Result<FittedModel, FitError>;
}
