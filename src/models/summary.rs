//! Coefficient summary tables with Wald statistics

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Which regression a coefficient belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroup {
    /// Regression on the location (log time scale, or log hazard for Cox)
    Location,
    /// Intercept-only ancillary shape/scale parameter
    Scale,
}

/// One line of the summary: coefficient, standard error, Wald z and p-value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    /// Family-specific parameter label, e.g. `lambda_` or `mu_`
    pub parameter: String,
    pub group: ParameterGroup,
    pub covariate: String,
    pub coef: f64,
    pub se: f64,
    pub z: f64,
    pub p: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

pub const INTERCEPT: &str = "Intercept";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientTable {
    alpha: f64,
    rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub(crate) fn new(alpha: f64) -> Self {
        Self {
            alpha,
            rows: Vec::new(),
        }
    }

    pub(crate) fn push(
        &mut self,
        parameter: &str,
        group: ParameterGroup,
        covariate: &str,
        coef: f64,
        variance: f64,
    ) {
        let se = variance.max(0.0).sqrt();
        let (z, p, ci_lower, ci_upper) = wald(coef, se, self.alpha);
        self.rows.push(CoefficientRow {
            parameter: parameter.to_string(),
            group,
            covariate: covariate.to_string(),
            coef,
            se,
            z,
            p,
            ci_lower,
            ci_upper,
        });
    }

    /// Confidence level of the intervals is `1 - alpha`
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn rows(&self) -> &[CoefficientRow] {
        &self.rows
    }

    /// Location-regression row for a covariate
    pub fn location(&self, covariate: &str) -> Option<&CoefficientRow> {
        self.rows
            .iter()
            .find(|r| r.group == ParameterGroup::Location && r.covariate == covariate)
    }

    /// Location-regression rows excluding the intercept
    pub fn covariate_rows(&self) -> impl Iterator<Item = &CoefficientRow> {
        self.rows
            .iter()
            .filter(|r| r.group == ParameterGroup::Location && r.covariate != INTERCEPT)
    }
}

/// Two-sided Wald test and `1 - alpha` confidence interval
fn wald(coef: f64, se: f64, alpha: f64) -> (f64, f64, f64, f64) {
    if !(se.is_finite() && se > 0.0) {
        return (f64::NAN, f64::NAN, f64::NAN, f64::NAN);
    }
    let normal = Normal::standard();
    let z = coef / se;
    let p = (2.0 * normal.sf(z.abs())).min(1.0);
    let crit = normal.inverse_cdf(1.0 - alpha / 2.0);
    (z, p, coef - crit * se, coef + crit * se)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wald_statistics() {
        let mut table = CoefficientTable::new(0.05);
        table.push("mu_", ParameterGroup::Location, "age", 1.96, 1.0);

        let row = table.location("age").unwrap();
        assert_relative_eq!(row.z, 1.96);
        assert_relative_eq!(row.p, 0.05, epsilon = 1e-3);
        assert_relative_eq!(row.ci_lower, 1.96 - 1.959964, epsilon = 1e-5);
        assert_relative_eq!(row.ci_upper, 1.96 + 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_coefficient_has_unit_p_value() {
        let mut table = CoefficientTable::new(0.05);
        table.push("coef", ParameterGroup::Location, "income", 0.0, 0.25);
        assert_relative_eq!(table.location("income").unwrap().p, 1.0);
    }

    #[test]
    fn test_degenerate_variance_gives_nan() {
        let mut table = CoefficientTable::new(0.05);
        table.push("coef", ParameterGroup::Location, "income", 0.3, 0.0);
        assert!(table.location("income").unwrap().p.is_nan());
    }

    #[test]
    fn test_covariate_rows_skip_intercept_and_scale() {
        let mut table = CoefficientTable::new(0.05);
        table.push("lambda_", ParameterGroup::Location, INTERCEPT, 3.0, 0.1);
        table.push("lambda_", ParameterGroup::Location, "age", 0.02, 0.001);
        table.push("rho_", ParameterGroup::Scale, INTERCEPT, 0.3, 0.01);

        let names: Vec<&str> = table.covariate_rows().map(|r| r.covariate.as_str()).collect();
        assert_eq!(names, vec!["age"]);
        assert!(table.location("rho_").is_none());
    }
}
