//! Cox proportional hazards regression.
//!
//! Coefficients maximise the partial likelihood with Efron's correction for
//! tied event times. The baseline cumulative hazard is Breslow's estimator,
//! taken at the covariate means so that predictions centre on them.

use super::design::Design;
use super::fitted::{FittedModel, InformationCriterion, Predictor};
use super::optimizer::{maximize, Evaluation, FitOptions, Likelihood};
use super::summary::{CoefficientTable, ParameterGroup};
use super::{FitError, ModelFamily, SurvivalRegression, DEFAULT_ALPHA};
use nalgebra::{DMatrix, DVector};

/// Rows sharing one distinct time, latest time first
struct TieGroup {
    rows: Vec<usize>,
    events: Vec<usize>,
}

fn tie_groups_descending(times: &[f64], events: &[bool]) -> Vec<TieGroup> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[b].total_cmp(&times[a]));

    let mut groups: Vec<TieGroup> = Vec::new();
    for i in order {
        match groups.last_mut() {
            Some(group) if times[group.rows[0]] == times[i] => group.rows.push(i),
            _ => groups.push(TieGroup { rows: vec![i], events: Vec::new() }),
        }
        if events[i] {
            if let Some(group) = groups.last_mut() {
                group.events.push(i);
            }
        }
    }
    groups
}

struct CoxLikelihood {
    x: DMatrix<f64>,
    groups: Vec<TieGroup>,
}

impl CoxLikelihood {
    fn new(design: &Design) -> Self {
        Self {
            x: design.standardized(),
            groups: tie_groups_descending(design.times(), design.events()),
        }
    }

    fn linear_predictor(&self, beta: &DVector<f64>) -> DVector<f64> {
        &self.x * beta
    }

    fn accumulate(&self, beta: &DVector<f64>, with_derivatives: bool) -> Evaluation {
        let p = self.x.ncols();
        let eta = self.linear_predictor(beta);

        let mut ll = 0.0;
        let mut gradient = DVector::zeros(p);
        let mut hessian = DMatrix::zeros(p, p);

        // Running sums over the risk set
        let mut s0 = 0.0;
        let mut s1 = DVector::zeros(p);
        let mut s2 = DMatrix::zeros(p, p);

        for group in &self.groups {
            for &i in &group.rows {
                let w = eta[i].exp();
                s0 += w;
                if with_derivatives {
                    let xi = self.x.row(i).transpose();
                    s1 += &xi * w;
                    s2 += &xi * xi.transpose() * w;
                }
            }

            let d = group.events.len();
            if d == 0 {
                continue;
            }

            // Sums over the tied events
            let mut d0 = 0.0;
            let mut d1 = DVector::zeros(p);
            let mut d2 = DMatrix::zeros(p, p);
            for &i in &group.events {
                let w = eta[i].exp();
                ll += eta[i];
                d0 += w;
                if with_derivatives {
                    let xi = self.x.row(i).transpose();
                    gradient += &xi;
                    d1 += &xi * w;
                    d2 += &xi * xi.transpose() * w;
                }
            }

            for r in 0..d {
                let f = r as f64 / d as f64;
                let den = s0 - f * d0;
                ll -= den.ln();
                if with_derivatives {
                    let num1 = &s1 - &d1 * f;
                    let num2 = &s2 - &d2 * f;
                    gradient -= &num1 / den;
                    hessian -= num2 / den - &num1 * num1.transpose() / (den * den);
                }
            }
        }

        Evaluation {
            log_likelihood: ll,
            gradient,
            hessian,
        }
    }

    /// Breslow increments `d_k / Σ_{risk} exp(η)` accumulated over ascending event times
    fn baseline_cumulative_hazard(&self, beta: &DVector<f64>, times: &[f64]) -> Vec<(f64, f64)> {
        let eta = self.linear_predictor(beta);
        let mut risk = 0.0;
        let mut increments = Vec::new();
        for group in &self.groups {
            risk += group.rows.iter().map(|&i| eta[i].exp()).sum::<f64>();
            if !group.events.is_empty() {
                increments.push((times[group.rows[0]], group.events.len() as f64 / risk));
            }
        }

        let mut cumulative = 0.0;
        increments
            .into_iter()
            .rev()
            .map(|(t, h)| {
                cumulative += h;
                (t, cumulative)
            })
            .collect()
    }
}

impl Likelihood for CoxLikelihood {
    fn dim(&self) -> usize {
        self.x.ncols()
    }

    fn log_likelihood(&self, theta: &DVector<f64>) -> f64 {
        self.accumulate(theta, false).log_likelihood
    }

    fn evaluate(&self, theta: &DVector<f64>) -> Evaluation {
        self.accumulate(theta, true)
    }
}

/// Cumulative baseline hazard as a right-continuous step function
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BaselineHazard {
    steps: Vec<(f64, f64)>,
}

impl BaselineHazard {
    pub(crate) fn at(&self, t: f64) -> f64 {
        let idx = self.steps.partition_point(|&(time, _)| time <= t);
        if idx == 0 {
            0.0
        } else {
            self.steps[idx - 1].1
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoxFitter;

impl SurvivalRegression for CoxFitter {
    fn family(&self) -> ModelFamily {
        ModelFamily::CoxPh
    }

    fn fit(&self, design: &Design, options: &FitOptions) -> Result<FittedModel, FitError> {
        let n = design.n();
        let p = design.p();

        if p == 0 {
            return Err(FitError::NoCovariates);
        }
        if design.n_events() == 0 {
            return Err(FitError::NoEvents);
        }
        if n <= p {
            return Err(FitError::InsufficientData { rows: n, params: p });
        }

        let likelihood = CoxLikelihood::new(design);
        let optimum = maximize(&likelihood, DVector::zeros(p), options)?;
        let baseline = BaselineHazard {
            steps: likelihood.baseline_cumulative_hazard(&optimum.theta, design.times()),
        };

        let mut summary = CoefficientTable::new(DEFAULT_ALPHA);
        let mut beta = Vec::with_capacity(p);
        for (j, name) in design.names().iter().enumerate() {
            let scale = design.scales()[j];
            let coef = optimum.theta[j] / scale;
            let variance = optimum.covariance[(j, j)] / (scale * scale);
            summary.push(
                ModelFamily::CoxPh.location_parameter(),
                ParameterGroup::Location,
                name,
                coef,
                variance,
            );
            beta.push(coef);
        }

        let partial_aic = -2.0 * optimum.log_likelihood + 2.0 * p as f64;

        Ok(FittedModel {
            family: ModelFamily::CoxPh,
            covariates: design.names().to_vec(),
            covariate_means: design.means().to_vec(),
            dropped: design.dropped().to_vec(),
            predictor: Predictor::Cox { beta, baseline },
            summary,
            log_likelihood: optimum.log_likelihood,
            criterion: InformationCriterion::PartialAic(partial_aic),
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

    fn design(times: Vec<f64>, events: Vec<f64>, x: Vec<f64>) -> Design {
        let n = times.len();
        let table = CustomerTable::new(
            (0..n).map(|i| i.to_string()).collect(),
            vec!["tenure".into(), "x".into(), "churn".into()],
            vec![Column::Numeric(times), Column::Numeric(x), Column::Numeric(events)],
        )
        .unwrap();
        Design::from_table(&table, "tenure", "churn").unwrap()
    }

    #[test]
    fn test_efron_ties_at_zero() {
        // Risk sets of 1, 2 and 4 with a tied pair at t = 1:
        // ll(0) = -(ln 1 + ln 2 + ln 4 + ln 3)
        let d = design(vec![1.0, 1.0, 2.0, 3.0], vec![1.0; 4], vec![0.5, 1.0, 2.0, 4.0]);
        let lik = CoxLikelihood::new(&d);
        let ll = lik.log_likelihood(&DVector::zeros(1));
        assert_relative_eq!(ll, -(24.0f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let d = design(
            vec![2.0, 3.0, 3.0, 5.0, 7.0, 7.0, 7.0, 11.0, 12.0, 15.0],
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0],
        );
        let lik = CoxLikelihood::new(&d);
        let beta = DVector::from_vec(vec![0.4]);
        let eval = lik.evaluate(&beta);

        let h = 1e-6;
        let up = DVector::from_vec(vec![0.4 + h]);
        let down = DVector::from_vec(vec![0.4 - h]);
        let numeric = (lik.log_likelihood(&up) - lik.log_likelihood(&down)) / (2.0 * h);
        assert_relative_eq!(eval.gradient[0], numeric, epsilon = 1e-6);

        let numeric = (lik.evaluate(&up).gradient[0] - lik.evaluate(&down).gradient[0]) / (2.0 * h);
        assert_relative_eq!(eval.hessian[(0, 0)], numeric, epsilon = 1e-5);
    }

    #[test]
    fn test_higher_risk_group_has_positive_coefficient() {
        // x = 1 customers tend to churn earlier
        let x: Vec<f64> = (0..60).map(|i| (i % 2) as f64).collect();
        let times: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 1 { 1.0 + (i % 7) as f64 } else { 4.0 + (i % 9) as f64 })
            .collect();
        let events: Vec<f64> = (0..60).map(|i| if i % 5 == 0 { 0.0 } else { 1.0 }).collect();
        let model = CoxFitter.fit(&design(times, events, x), &FitOptions::default()).unwrap();

        let row = model.summary().location("x").unwrap();
        assert!(row.coef > 0.0);
        assert!(row.p < 0.05);
        assert!(matches!(model.criterion(), InformationCriterion::PartialAic(v) if v.is_finite()));
    }

    #[test]
    fn test_baseline_hazard_is_non_decreasing() {
        let d = design(
            vec![2.0, 3.0, 3.0, 5.0, 7.0, 7.0, 7.0, 11.0, 12.0, 15.0],
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0],
        );
        let model = CoxFitter.fit(&d, &FitOptions::default()).unwrap();

        let s = model.survival(&[3.9], &[0.5, 2.0, 3.0, 7.0, 15.0, 40.0]);
        assert_relative_eq!(s[0], 1.0);
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
        assert!(s.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_step_function_lookup() {
        let baseline = BaselineHazard {
            steps: vec![(2.0, 0.1), (5.0, 0.3)],
        };
        assert_relative_eq!(baseline.at(1.9), 0.0);
        assert_relative_eq!(baseline.at(2.0), 0.1);
        assert_relative_eq!(baseline.at(4.9), 0.1);
        assert_relative_eq!(baseline.at(60.0), 0.3);
    }

    #[test]
    fn test_no_events_rejected() {
        let d = design(vec![1.0, 2.0, 3.0], vec![0.0; 3], vec![1.0, 2.0, 3.0]);
        assert!(matches!(CoxFitter.fit(&d, &FitOptions::default()), Err(FitError::NoEvents)));
    }
}
