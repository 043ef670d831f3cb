//! Accelerated failure time regressions.
//!
//! All three families are location-scale models on log time:
//! `ln T = x·β + σ W`, where `W` is a standard minimum-extreme-value
//! (Weibull), normal (log-normal) or logistic (log-logistic) variable.
//! The location `x·β` carries every covariate plus an intercept; `ln σ` is an
//! intercept-only ancillary parameter. Right-censored rows contribute
//! `ln S_W(z)`, observed rows `ln f_W(z) - ln σ - ln t`.
//!
//! Fitting happens on standardised covariates and is mapped back to the raw
//! scale afterwards, covariance included.

use super::design::Design;
use super::fitted::{FittedModel, InformationCriterion, Predictor};
use super::optimizer::{maximize, Evaluation, FitOptions, Likelihood};
use super::summary::{CoefficientTable, ParameterGroup, INTERCEPT};
use super::{FitError, ModelFamily, SurvivalRegression, DEFAULT_ALPHA};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AftDistribution {
    Weibull,
    LogNormal,
    LogLogistic,
}

/// `ln(1 + e^x)` without overflow
fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln Φ(-z)` and the Mills ratio `φ(z) / Φ(-z)`
fn log_normal_sf(z: f64) -> (f64, f64) {
    let sf = 0.5 * erfc(z / SQRT_2);
    if sf > 1e-300 {
        let pdf = (-0.5 * z * z).exp() / (2.0 * PI).sqrt();
        (sf.ln(), pdf / sf)
    } else {
        // Deep upper tail: Φ(-z) ≈ φ(z) / z
        let log_sf = -0.5 * z * z - z.ln() - 0.5 * (2.0 * PI).ln();
        (log_sf, z + 1.0 / z)
    }
}

impl AftDistribution {
    pub fn family(self) -> ModelFamily {
        match self {
            AftDistribution::Weibull => ModelFamily::WeibullAft,
            AftDistribution::LogNormal => ModelFamily::LogNormalAft,
            AftDistribution::LogLogistic => ModelFamily::LogLogisticAft,
        }
    }

    /// `ln f_W(z)` with its first and second derivatives in `z`
    fn event_terms(self, z: f64) -> (f64, f64, f64) {
        match self {
            AftDistribution::Weibull => {
                let ez = z.exp();
                (z - ez, 1.0 - ez, -ez)
            }
            AftDistribution::LogNormal => (-0.5 * z * z - 0.5 * (2.0 * PI).ln(), -z, -1.0),
            AftDistribution::LogLogistic => {
                let p = sigmoid(z);
                (-softplus(-z) - softplus(z), 1.0 - 2.0 * p, -2.0 * p * (1.0 - p))
            }
        }
    }

    /// `ln S_W(z)` with its first and second derivatives in `z`
    fn censored_terms(self, z: f64) -> (f64, f64, f64) {
        match self {
            AftDistribution::Weibull => {
                let ez = z.exp();
                (-ez, -ez, -ez)
            }
            AftDistribution::LogNormal => {
                let (log_sf, mills) = log_normal_sf(z);
                (log_sf, -mills, -mills * (mills - z))
            }
            AftDistribution::LogLogistic => {
                let p = sigmoid(z);
                (-softplus(z), -p, -p * (1.0 - p))
            }
        }
    }

    /// `S_W(z)`
    pub fn survival(self, z: f64) -> f64 {
        match self {
            AftDistribution::Weibull => (-z.exp()).exp(),
            AftDistribution::LogNormal => 0.5 * erfc(z / SQRT_2),
            AftDistribution::LogLogistic => sigmoid(-z),
        }
    }
}

struct AftLikelihood<'a> {
    dist: AftDistribution,
    /// Intercept column followed by standardised covariates
    x: DMatrix<f64>,
    log_times: Vec<f64>,
    events: &'a [bool],
}

impl AftLikelihood<'_> {
    fn location(&self, theta: &DVector<f64>, i: usize) -> f64 {
        (0..self.x.ncols()).map(|j| self.x[(i, j)] * theta[j]).sum()
    }
}

impl Likelihood for AftLikelihood<'_> {
    fn dim(&self) -> usize {
        self.x.ncols() + 1
    }

    fn log_likelihood(&self, theta: &DVector<f64>) -> f64 {
        let log_sigma = theta[self.dim() - 1];
        let sigma = log_sigma.exp();
        let mut ll = 0.0;
        for (i, &y) in self.log_times.iter().enumerate() {
            let z = (y - self.location(theta, i)) / sigma;
            ll += if self.events[i] {
                self.dist.event_terms(z).0 - log_sigma - y
            } else {
                self.dist.censored_terms(z).0
            };
        }
        ll
    }

    fn evaluate(&self, theta: &DVector<f64>) -> Evaluation {
        let k = self.dim();
        let s = k - 1;
        let log_sigma = theta[s];
        let sigma = log_sigma.exp();

        let mut ll = 0.0;
        let mut gradient = DVector::zeros(k);
        let mut hessian = DMatrix::zeros(k, k);

        for (i, &y) in self.log_times.iter().enumerate() {
            let z = (y - self.location(theta, i)) / sigma;
            let (term, q, r, delta) = if self.events[i] {
                let (lf, q, r) = self.dist.event_terms(z);
                (lf - log_sigma - y, q, r, 1.0)
            } else {
                let (ls, q, r) = self.dist.censored_terms(z);
                (ls, q, r, 0.0)
            };
            ll += term;

            // Derivatives with respect to the location μ and s = ln σ
            let d_mu = -q / sigma;
            let d_s = -z * q - delta;
            let d_mu_mu = r / (sigma * sigma);
            let d_mu_s = (z * r + q) / sigma;
            let d_s_s = z * q + z * z * r;

            for a in 0..s {
                let xa = self.x[(i, a)];
                gradient[a] += xa * d_mu;
                hessian[(a, s)] += xa * d_mu_s;
                for b in 0..=a {
                    hessian[(a, b)] += xa * self.x[(i, b)] * d_mu_mu;
                }
            }
            gradient[s] += d_s;
            hessian[(s, s)] += d_s_s;
        }

        for a in 0..k {
            for b in (a + 1)..k {
                if b == s {
                    hessian[(s, a)] = hessian[(a, s)];
                } else {
                    hessian[(a, b)] = hessian[(b, a)];
                }
            }
        }

        Evaluation {
            log_likelihood: ll,
            gradient,
            hessian,
        }
    }
}

/// Fits one AFT family
#[derive(Debug, Clone, Copy)]
pub struct AftFitter {
    pub dist: AftDistribution,
}

impl AftFitter {
    pub fn new(dist: AftDistribution) -> Self {
        Self { dist }
    }

    fn initial_point(log_times: &[f64], k: usize) -> DVector<f64> {
        let n = log_times.len() as f64;
        let mean = log_times.iter().sum::<f64>() / n;
        let sd = (log_times.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n).sqrt();

        let mut init = DVector::zeros(k);
        init[0] = mean;
        init[k - 1] = if sd > 1e-8 { sd.ln() } else { 0.0 };
        init
    }
}

impl SurvivalRegression for AftFitter {
    fn family(&self) -> ModelFamily {
        self.dist.family()
    }

    fn fit(&self, design: &Design, options: &FitOptions) -> Result<FittedModel, FitError> {
        let n = design.n();
        let p = design.p();
        let k = p + 2;
        let family = self.family();

        if design.n_events() == 0 {
            return Err(FitError::NoEvents);
        }
        if n < k {
            return Err(FitError::InsufficientData { rows: n, params: k });
        }

        let standardized = design.standardized();
        let x = DMatrix::from_fn(n, p + 1, |i, j| if j == 0 { 1.0 } else { standardized[(i, j - 1)] });
        let log_times: Vec<f64> = design.times().iter().map(|t| t.ln()).collect();
        let init = Self::initial_point(&log_times, k);

        let likelihood = AftLikelihood {
            dist: self.dist,
            x,
            log_times,
            events: design.events(),
        };
        let optimum = maximize(&likelihood, init, options)?;

        // Back to raw covariates: β_j = β'_j / s_j, β_0 = β'_0 - Σ β'_j m_j / s_j
        let mut transform = DMatrix::identity(k, k);
        for j in 0..p {
            let (mean, scale) = (design.means()[j], design.scales()[j]);
            transform[(0, j + 1)] = -mean / scale;
            transform[(j + 1, j + 1)] = 1.0 / scale;
        }
        let theta = &transform * &optimum.theta;
        let covariance = &transform * &optimum.covariance * transform.transpose();

        let location: Vec<f64> = theta.iter().take(p + 1).copied().collect();
        let log_scale = theta[k - 1];

        let (location_name, scale_name, scale_sign) = match self.dist {
            // Reported as ln ρ = -ln σ
            AftDistribution::Weibull => ("lambda_", "rho_", -1.0),
            AftDistribution::LogNormal => ("mu_", "sigma_", 1.0),
            // Reported as ln β = -ln σ
            AftDistribution::LogLogistic => ("alpha_", "beta_", -1.0),
        };

        let mut summary = CoefficientTable::new(DEFAULT_ALPHA);
        summary.push(location_name, ParameterGroup::Location, INTERCEPT, location[0], covariance[(0, 0)]);
        for (j, name) in design.names().iter().enumerate() {
            summary.push(
                location_name,
                ParameterGroup::Location,
                name,
                location[j + 1],
                covariance[(j + 1, j + 1)],
            );
        }
        summary.push(
            scale_name,
            ParameterGroup::Scale,
            INTERCEPT,
            scale_sign * log_scale,
            covariance[(k - 1, k - 1)],
        );

        let aic = -2.0 * optimum.log_likelihood + 2.0 * k as f64;

        Ok(FittedModel {
            family,
            covariates: design.names().to_vec(),
            covariate_means: design.means().to_vec(),
            dropped: design.dropped().to_vec(),
            predictor: Predictor::Aft {
                dist: self.dist,
                location,
                log_scale,
            },
            summary,
            log_likelihood: optimum.log_likelihood,
            criterion: InformationCriterion::Aic(aic),
            n_observations: n,
            n_events: design.n_events(),
            iterations: optimum.iterations,
            alpha: DEFAULT_ALPHA,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{Column, CustomerTable};
    use approx::assert_relative_eq;

    fn design(times: Vec<f64>, events: Vec<f64>, extra: Option<Vec<f64>>) -> Design {
        let n = times.len();
        let mut names = vec!["tenure".to_string(), "churn".to_string()];
        let mut columns = vec![Column::Numeric(times), Column::Numeric(events)];
        if let Some(x) = extra {
            names.push("x".to_string());
            columns.push(Column::Numeric(x));
        }
        let table = CustomerTable::new((0..n).map(|i| i.to_string()).collect(), names, columns).unwrap();
        Design::from_table(&table, "tenure", "churn").unwrap()
    }

    #[test]
    fn test_uncensored_log_normal_matches_closed_form() {
        // μ̂ = mean(ln t), σ̂ = population sd of ln t
        let times = vec![2.0, 3.0, 5.0, 7.0, 11.0, 13.0, 17.0, 19.0];
        let d = design(times.clone(), vec![1.0; 8], None);
        let model = AftFitter::new(AftDistribution::LogNormal)
            .fit(&d, &FitOptions::default())
            .unwrap();

        let logs: Vec<f64> = times.iter().map(|t| t.ln()).collect();
        let mean = logs.iter().sum::<f64>() / 8.0;
        let sd = (logs.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / 8.0).sqrt();

        let mu = model.summary().location(INTERCEPT).unwrap().coef;
        assert_relative_eq!(mu, mean, epsilon = 1e-5);
        let log_sigma = model.summary().rows().last().unwrap().coef;
        assert_relative_eq!(log_sigma, sd.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_weibull_survival_is_monotone() {
        let times = vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 14.0, 20.0, 30.0];
        let events = vec![1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let d = design(times, events, None);
        let model = AftFitter::new(AftDistribution::Weibull)
            .fit(&d, &FitOptions::default())
            .unwrap();

        let s = model.survival(&[], &[1.0, 5.0, 10.0, 50.0]);
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
        assert!(s[0] < 1.0 && s[3] > 0.0);
        assert!(matches!(model.criterion(), InformationCriterion::Aic(v) if v.is_finite()));
    }

    #[test]
    fn test_covariate_effect_direction() {
        // Larger x → much longer lifetimes: the location coefficient is positive
        let x: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let times: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 1 { 30.0 + (i % 7) as f64 } else { 3.0 + (i % 5) as f64 })
            .collect();
        let events: Vec<f64> = (0..40).map(|i| if i % 6 == 0 { 0.0 } else { 1.0 }).collect();
        let d = design(times, events, Some(x));

        for dist in [AftDistribution::Weibull, AftDistribution::LogNormal, AftDistribution::LogLogistic] {
            let model = AftFitter::new(dist).fit(&d, &FitOptions::default()).unwrap();
            let row = model.summary().location("x").unwrap();
            assert!(row.coef > 1.5, "{:?}: coef = {}", dist, row.coef);
            assert!(row.p < 0.001, "{:?}: p = {}", dist, row.p);
        }
    }

    #[test]
    fn test_all_censored_is_rejected() {
        let d = design(vec![3.0, 5.0, 8.0], vec![0.0, 0.0, 0.0], None);
        let result = AftFitter::new(AftDistribution::Weibull).fit(&d, &FitOptions::default());
        assert!(matches!(result, Err(FitError::NoEvents)));
    }

    #[test]
    fn test_survival_at_location_is_distribution_median_or_mode() {
        assert_relative_eq!(AftDistribution::LogNormal.survival(0.0), 0.5);
        assert_relative_eq!(AftDistribution::LogLogistic.survival(0.0), 0.5);
        assert_relative_eq!(AftDistribution::Weibull.survival(0.0), (-1.0f64).exp());
    }

    #[test]
    fn test_analytic_gradient_matches_finite_differences() {
        let times = vec![1.5, 2.0, 4.0, 4.5, 7.0, 9.0, 12.0, 15.0];
        let events = [true, false, true, true, false, true, true, false];
        let x = DMatrix::from_fn(8, 2, |i, j| if j == 0 { 1.0 } else { (i as f64 - 3.5) / 2.0 });
        let theta = DVector::from_vec(vec![1.8, 0.2, -0.3]);

        for dist in [AftDistribution::Weibull, AftDistribution::LogNormal, AftDistribution::LogLogistic] {
            let lik = AftLikelihood {
                dist,
                x: x.clone(),
                log_times: times.iter().map(|t: &f64| t.ln()).collect(),
                events: &events,
            };
            let eval = lik.evaluate(&theta);
            assert_relative_eq!(eval.log_likelihood, lik.log_likelihood(&theta), epsilon = 1e-12);

            let h = 1e-6;
            for a in 0..3 {
                let mut up = theta.clone();
                let mut down = theta.clone();
                up[a] += h;
                down[a] -= h;
                let numeric = (lik.log_likelihood(&up) - lik.log_likelihood(&down)) / (2.0 * h);
                assert_relative_eq!(eval.gradient[a], numeric, epsilon = 1e-5);

                let grad_up = lik.evaluate(&up).gradient;
                let grad_down = lik.evaluate(&down).gradient;
                for b in 0..3 {
                    let numeric = (grad_up[b] - grad_down[b]) / (2.0 * h);
                    assert_relative_eq!(eval.hessian[(a, b)], numeric, epsilon = 1e-4);
                }
            }
        }
    }
}
