//! Projects survival for a customer window and values the expected margin

use super::cashflows::{CashflowRow, CustomerValue, ProjectionResult};
use super::discount_factors;
use crate::assumptions::{ClvConfig, TimeGrid, ValuationAssumptions};
use crate::customer::CustomerTable;
use crate::error::{ClvError, Result};
use crate::models::FittedModel;
use crate::selection::{select_best, CandidateReport};
use crate::stats::Describe;
use chrono::Utc;
use nalgebra::DMatrix;

pub struct ProjectionEngine {
    valuation: ValuationAssumptions,
}

impl ProjectionEngine {
    pub fn new(valuation: ValuationAssumptions) -> Self {
        Self { valuation }
    }

    pub fn valuation(&self) -> &ValuationAssumptions {
        &self.valuation
    }

    /// Projection times: `1..=horizon`, or the first `horizon` distinct
    /// observed durations in ascending order.
    pub fn time_grid(&self, table: &CustomerTable, duration: &str) -> Result<Vec<f64>> {
        let horizon = self.valuation.horizon;
        match self.valuation.time_grid {
            TimeGrid::Monthly => Ok((1..=horizon).map(|t| t as f64).collect()),
            TimeGrid::Observed => {
                let mut observed = table.numeric(duration)?.to_vec();
                observed.sort_by(f64::total_cmp);
                observed.dedup();
                observed.truncate(horizon);
                Ok(observed)
            }
        }
    }

    /// Rows valued: the first `customer_window` customers, or all of them
    pub fn window(&self, table: &CustomerTable) -> CustomerTable {
        match self.valuation.customer_window {
            Some(k) => table.head(k),
            None => table.clone(),
        }
    }

    /// Value the customer window under an already fitted model
    pub fn project(
        &self,
        model: &FittedModel,
        table: &CustomerTable,
        duration: &str,
        candidates: Vec<CandidateReport>,
    ) -> Result<ProjectionResult> {
        let times = self.time_grid(table, duration)?;
        let window = self.window(table);
        let grid = model.survival_matrix(&window, &times)?;
        let factors = discount_factors(self.valuation.annual_discount_rate, times.len());
        let margin = self.valuation.monthly_margin;

        let values = discounted_values(&grid, &factors, margin);
        let summary = Describe::new(values.iter().copied()).ok_or(ClvError::EmptyTable)?;

        let customers = window
            .ids()
            .iter()
            .zip(&values)
            .enumerate()
            .map(|(j, (id, &clv))| CustomerValue {
                customer_id: id.clone(),
                survival: grid.column(j).iter().copied().collect(),
                clv,
            })
            .collect();

        let cashflows = times
            .iter()
            .zip(&factors)
            .enumerate()
            .map(|(i, (&time, &discount_factor))| {
                let expected_customers = grid.row(i).sum();
                let row_margin = margin * expected_customers;
                CashflowRow {
                    step: i + 1,
                    time,
                    discount_factor,
                    expected_customers,
                    margin: row_margin,
                    discounted_margin: row_margin * discount_factor,
                }
            })
            .collect();

        log::info!(
            "Valued {} customers over {} steps: mean CLV {:.2}",
            summary.count,
            times.len(),
            summary.mean
        );

        Ok(ProjectionResult {
            generated_at: Utc::now(),
            family: model.family(),
            candidates,
            times,
            customers,
            cashflows,
            summary,
        })
    }
}

/// Per-customer `margin × Σ_i S_i · v_i` over a time-by-customer grid
fn discounted_values(grid: &DMatrix<f64>, factors: &[f64], margin: f64) -> Vec<f64> {
    grid.column_iter()
        .map(|survival| {
            let pv: f64 = survival.iter().zip(factors).map(|(s, v)| s * v).sum();
            margin * pv
        })
        .collect()
}

/// Select the best model on the whole table and value the configured window
pub fn estimate_clv(table: &CustomerTable, config: &ClvConfig) -> Result<ProjectionResult> {
    config.validate()?;
    let selection = select_best(table, &config.columns, &config.fit)?;
    let engine = ProjectionEngine::new(config.valuation.clone());
    engine.project(&selection.best, table, &config.columns.duration, selection.candidates)
}
