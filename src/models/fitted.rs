use super::aft::AftDistribution;
use super::cox::BaselineHazard;
use super::summary::CoefficientTable;
use super::ModelFamily;
use crate::customer::CustomerTable;
use crate::error::{ClvError, Result};
use nalgebra::DMatrix;
use serde::Serialize;
use std::fmt;

/// Goodness-of-fit score used to rank models; lower is better.
///
/// Cox models only have a partial likelihood, so their score is not on the
/// same footing as the full-likelihood AIC of the parametric families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InformationCriterion {
    Aic(f64),
    PartialAic(f64),
}

impl InformationCriterion {
    pub fn value(&self) -> f64 {
        match *self {
            InformationCriterion::Aic(v) | InformationCriterion::PartialAic(v) => v,
        }
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InformationCriterion::Aic(v) => write!(f, "AIC {:.3}", v),
            InformationCriterion::PartialAic(v) => write!(f, "partial AIC {:.3}", v),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Predictor {
    Aft {
        dist: AftDistribution,
        /// Intercept followed by one coefficient per covariate, raw scale
        location: Vec<f64>,
        log_scale: f64,
    },
    Cox {
        beta: Vec<f64>,
        baseline: BaselineHazard,
    },
}

/// A survival regression fitted to a customer table
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub(crate) family: ModelFamily,
    pub(crate) covariates: Vec<String>,
    pub(crate) covariate_means: Vec<f64>,
    pub(crate) dropped: Vec<String>,
    pub(crate) predictor: Predictor,
    pub(crate) summary: CoefficientTable,
    pub(crate) log_likelihood: f64,
    pub(crate) criterion: InformationCriterion,
    pub(crate) n_observations: usize,
    pub(crate) n_events: usize,
    pub(crate) iterations: usize,
    pub(crate) alpha: f64,
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Covariates in the order the model expects them
    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn covariate_means(&self) -> &[f64] {
        &self.covariate_means
    }

    /// Constant columns left out of the fit
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn has_covariate(&self, name: &str) -> bool {
        self.covariates.iter().any(|c| c == name)
    }

    pub fn summary(&self) -> &CoefficientTable {
        &self.summary
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn criterion(&self) -> InformationCriterion {
        self.criterion
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn n_events(&self) -> usize {
        self.n_events
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Wald p-value of the covariate's coefficient in the family's location regression
    pub fn location_p_value(&self, covariate: &str) -> Option<f64> {
        self.summary.location(covariate).map(|row| row.p)
    }

    /// Survival probabilities for one covariate profile.
    ///
    /// `profile` holds raw covariate values in [`covariates`](Self::covariates)
    /// order; missing trailing entries are taken at the covariate mean.
    pub fn survival(&self, profile: &[f64], times: &[f64]) -> Vec<f64> {
        let value = |j: usize| profile.get(j).copied().unwrap_or(self.covariate_means[j]);

        match &self.predictor {
            Predictor::Aft {
                dist,
                location,
                log_scale,
            } => {
                let mu = location[0]
                    + (0..self.covariates.len())
                        .map(|j| location[j + 1] * value(j))
                        .sum::<f64>();
                let sigma = log_scale.exp();
                times
                    .iter()
                    .map(|&t| if t > 0.0 { dist.survival((t.ln() - mu) / sigma) } else { 1.0 })
                    .collect()
            }
            Predictor::Cox { beta, baseline } => {
                let eta: f64 = beta
                    .iter()
                    .enumerate()
                    .map(|(j, b)| b * (value(j) - self.covariate_means[j]))
                    .sum();
                let risk = eta.exp();
                times.iter().map(|&t| (-baseline.at(t) * risk).exp()).collect()
            }
        }
    }

    /// Survival for every customer in `table`: one row per time, one column per customer
    pub fn survival_matrix(&self, table: &CustomerTable, times: &[f64]) -> Result<DMatrix<f64>> {
        let columns = self
            .covariates
            .iter()
            .map(|name| table.numeric(name))
            .collect::<Result<Vec<_>>>()?;

        let n = table.len();
        let mut matrix = DMatrix::zeros(times.len(), n);
        let mut profile = vec![0.0; columns.len()];
        for customer in 0..n {
            for (slot, column) in profile.iter_mut().zip(&columns) {
                *slot = column[customer];
            }
            for (step, s) in self.survival(&profile, times).into_iter().enumerate() {
                matrix[(step, customer)] = s;
            }
        }
        Ok(matrix)
    }

    /// Profile with every covariate at its mean except `covariate` set to `value`
    pub fn profile_with(&self, covariate: &str, value: f64) -> Result<Vec<f64>> {
        let index = self
            .covariates
            .iter()
            .position(|c| c == covariate)
            .ok_or_else(|| ClvError::UnknownCovariate {
                covariate: covariate.to_string(),
                family: self.family,
            })?;
        let mut profile = self.covariate_means.clone();
        profile[index] = value;
        Ok(profile)
    }
}
