//! Projection output records

use crate::models::ModelFamily;
use crate::selection::CandidateReport;
use crate::stats::Describe;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Expected margin across the valued customers for one projection step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowRow {
    /// 1-indexed step
    pub step: usize,
    pub time: f64,
    pub discount_factor: f64,
    /// Sum of survival probabilities over the valued customers
    pub expected_customers: f64,
    pub margin: f64,
    pub discounted_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerValue {
    pub customer_id: String,
    /// Survival probability at each projection time
    pub survival: Vec<f64>,
    pub clv: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionResult {
    pub generated_at: DateTime<Utc>,
    pub family: ModelFamily,
    pub candidates: Vec<CandidateReport>,
    pub times: Vec<f64>,
    pub customers: Vec<CustomerValue>,
    pub cashflows: Vec<CashflowRow>,
    pub summary: Describe,
}

impl ProjectionResult {
    pub fn clv_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.customers.iter().map(|c| c.clv)
    }

    /// Discounted margin summed over every customer and step
    pub fn total_value(&self) -> f64 {
        self.cashflows.iter().map(|row| row.discounted_margin).sum()
    }
}
