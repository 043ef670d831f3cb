//! Design matrix construction from an encoded customer table

use crate::customer::{Column, CustomerTable};
use crate::error::{ClvError, Result};
use nalgebra::DMatrix;

/// Survival data ready for fitting.
///
/// Covariates are every numeric column except the duration and event
/// columns, in table order. Columns that are constant across the rows are
/// dropped, since they cannot be estimated alongside an intercept.
#[derive(Debug, Clone)]
pub struct Design {
    names: Vec<String>,
    x: DMatrix<f64>,
    times: Vec<f64>,
    events: Vec<bool>,
    means: Vec<f64>,
    scales: Vec<f64>,
    dropped: Vec<String>,
}

impl Design {
    pub fn from_table(table: &CustomerTable, duration: &str, event: &str) -> Result<Self> {
        if table.is_empty() {
            return Err(ClvError::EmptyTable);
        }

        let times = table.numeric(duration)?.to_vec();
        if let Some(row) = times.iter().position(|t| !(t.is_finite() && *t > 0.0)) {
            return Err(ClvError::InvalidDuration { row, value: times[row] });
        }

        let raw_events = table.numeric(event)?;
        let events = raw_events
            .iter()
            .enumerate()
            .map(|(row, &v)| match v {
                v if v == 1.0 => Ok(true),
                v if v == 0.0 => Ok(false),
                value => Err(ClvError::InvalidEvent { row, value }),
            })
            .collect::<Result<Vec<_>>>()?;

        let n = table.len();
        let mut names = Vec::new();
        let mut columns: Vec<&[f64]> = Vec::new();
        let mut means = Vec::new();
        let mut scales = Vec::new();
        let mut dropped = Vec::new();

        for (name, column) in table.iter() {
            if name == duration || name == event {
                continue;
            }
            let values = match column {
                Column::Numeric(values) => values.as_slice(),
                Column::Text(_) => {
                    return Err(ClvError::NonNumericColumn { column: name.to_string() });
                }
            };

            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(ClvError::NonFiniteValue {
                    column: name.to_string(),
                    row,
                    value: values[row],
                });
            }

            let mean = values.iter().sum::<f64>() / n as f64;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let scale = variance.sqrt();
            if !(scale.is_finite() && scale > 1e-12 * (1.0 + mean.abs())) {
                dropped.push(name.to_string());
                continue;
            }

            names.push(name.to_string());
            columns.push(values);
            means.push(mean);
            scales.push(scale);
        }

        if !dropped.is_empty() {
            log::warn!("Dropping constant covariates from the design: {}", dropped.join(", "));
        }

        let x = DMatrix::from_fn(n, names.len(), |i, j| columns[j][i]);

        Ok(Self {
            names,
            x,
            times,
            events,
            means,
            scales,
            dropped,
        })
    }

    /// Number of observations
    pub fn n(&self) -> usize {
        self.times.len()
    }

    /// Number of covariates
    pub fn p(&self) -> usize {
        self.names.len()
    }

    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn events(&self) -> &[bool] {
        &self.events
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Covariates removed for having no variation
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Raw covariate matrix, one row per customer
    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// Covariates centred and scaled to unit variance
    pub fn standardized(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n(), self.p(), |i, j| (self.x[(i, j)] - self.means[j]) / self.scales[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(churn: Vec<f64>) -> CustomerTable {
        CustomerTable::new(
            (0..4).map(|i| i.to_string()).collect(),
            vec!["tenure".into(), "age".into(), "voice".into(), "churn".into()],
            vec![
                Column::Numeric(vec![5.0, 12.0, 30.0, 2.0]),
                Column::Numeric(vec![30.0, 40.0, 50.0, 60.0]),
                Column::Numeric(vec![1.0, 1.0, 1.0, 1.0]),
                Column::Numeric(churn),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_covariates_exclude_duration_event_and_constants() {
        let design = Design::from_table(&table(vec![1.0, 0.0, 0.0, 1.0]), "tenure", "churn").unwrap();

        assert_eq!(design.names(), &["age".to_string()]);
        assert_eq!(design.dropped(), &["voice".to_string()]);
        assert_eq!(design.n(), 4);
        assert_eq!(design.n_events(), 2);
        assert_relative_eq!(design.means()[0], 45.0);

        let z = design.standardized();
        let mean: f64 = z.column(0).iter().sum::<f64>() / 4.0;
        let var: f64 = z.column(0).iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_event_rejected() {
        let result = Design::from_table(&table(vec![1.0, 2.0, 0.0, 1.0]), "tenure", "churn");
        assert!(matches!(result, Err(ClvError::InvalidEvent { row: 1, .. })));
    }

    #[test]
    fn test_missing_duration_column() {
        let result = Design::from_table(&table(vec![1.0, 0.0, 0.0, 1.0]), "months", "churn");
        assert!(matches!(result, Err(ClvError::MissingColumn { .. })));
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let mut t = table(vec![1.0, 0.0, 0.0, 1.0]);
        t.set_column("tenure", Column::Numeric(vec![5.0, 0.0, 30.0, 2.0])).unwrap();
        let result = Design::from_table(&t, "tenure", "churn");
        assert!(matches!(result, Err(ClvError::InvalidDuration { row: 1, .. })));
    }

    #[test]
    fn test_non_finite_covariate_rejected() {
        for bad in [f64::NAN, f64::INFINITY] {
            let mut t = table(vec![1.0, 0.0, 0.0, 1.0]);
            t.set_column("age", Column::Numeric(vec![30.0, bad, 50.0, 60.0])).unwrap();
            let result = Design::from_table(&t, "tenure", "churn");
            assert!(
                matches!(&result, Err(ClvError::NonFiniteValue { column, row: 1, .. }) if column == "age"),
                "{:?}",
                result.map(|d| d.dropped().to_vec())
            );
        }
    }

    #[test]
    fn test_nan_cell_from_csv_is_not_dropped_silently() {
        let csv = ",tenure,age,churn\na,5,30,1\nb,12,NaN,0\nc,30,50,1\n";
        let t = crate::customer::load_customers_from_reader(csv.as_bytes()).unwrap();
        let result = Design::from_table(&t, "tenure", "churn");
        assert!(matches!(result, Err(ClvError::NonFiniteValue { row: 1, .. })));
    }
}
