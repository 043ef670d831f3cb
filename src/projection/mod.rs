//! Survival projection and discounted customer value

mod cashflows;
mod engine;

pub use cashflows::{CashflowRow, CustomerValue, ProjectionResult};
pub use engine::{estimate_clv, ProjectionEngine};

// ============================================================================
// Discounting
// ============================================================================
// Margin earned at step i (1-indexed) is discounted by i - 1 months, so the
// first month is taken at face value.

/// Monthly discount factor `(1 + r/12)^-(step - 1)` for annual rate `r`
pub fn discount_factor(annual_rate: f64, step: usize) -> f64 {
    let monthly = annual_rate / 12.0;
    (1.0 + monthly).powi(-(step.saturating_sub(1) as i32))
}

/// Factors for steps `1..=horizon`
pub fn discount_factors(annual_rate: f64, horizon: usize) -> Vec<f64> {
    (1..=horizon).map(|step| discount_factor(annual_rate, step)).collect()
}
