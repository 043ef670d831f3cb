//! Valuation assumptions: margin, discounting and projection window

use crate::error::{ClvError, Result};
use serde::{Deserialize, Serialize};

/// Default monthly margin earned per surviving customer
pub const DEFAULT_MONTHLY_MARGIN: f64 = 1300.0;

/// Default annual discount rate, compounded monthly (10%)
pub const DEFAULT_ANNUAL_DISCOUNT_RATE: f64 = 0.10;

/// Default number of monthly steps projected
pub const DEFAULT_HORIZON: usize = 24;

/// Default number of customers (from the top of the file) valued
pub const DEFAULT_CUSTOMER_WINDOW: usize = 5;

/// Where the projection's time steps fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrid {
    /// t = 1, 2, ..., horizon
    #[default]
    Monthly,
    /// The first `horizon` distinct observed durations
    Observed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationAssumptions {
    #[serde(default = "default_margin")]
    pub monthly_margin: f64,

    /// Annual rate; the monthly rate is `annual_discount_rate / 12`
    #[serde(default = "default_discount_rate")]
    pub annual_discount_rate: f64,

    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Customers valued from the top of the table; `None` values everyone
    #[serde(default = "default_window")]
    pub customer_window: Option<usize>,

    #[serde(default)]
    pub time_grid: TimeGrid,
}

fn default_margin() -> f64 { DEFAULT_MONTHLY_MARGIN }
fn default_discount_rate() -> f64 { DEFAULT_ANNUAL_DISCOUNT_RATE }
fn default_horizon() -> usize { DEFAULT_HORIZON }
fn default_window() -> Option<usize> { Some(DEFAULT_CUSTOMER_WINDOW) }

impl Default for ValuationAssumptions {
    fn default() -> Self {
        Self {
            monthly_margin: DEFAULT_MONTHLY_MARGIN,
            annual_discount_rate: DEFAULT_ANNUAL_DISCOUNT_RATE,
            horizon: DEFAULT_HORIZON,
            customer_window: Some(DEFAULT_CUSTOMER_WINDOW),
            time_grid: TimeGrid::Monthly,
        }
    }
}

impl ValuationAssumptions {
    pub fn validate(&self) -> Result<()> {
        if !self.monthly_margin.is_finite() || self.monthly_margin < 0.0 {
            return Err(invalid("valuation.monthly_margin", "must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.annual_discount_rate) {
            return Err(invalid("valuation.annual_discount_rate", "must be within [0, 1]"));
        }
        if !(1..=1200).contains(&self.horizon) {
            return Err(invalid("valuation.horizon", "must be between 1 and 1200 steps"));
        }
        if self.customer_window == Some(0) {
            return Err(invalid("valuation.customer_window", "must be at least 1 when set"));
        }
        Ok(())
    }

    /// Monthly discount rate `r / 12`
    pub fn monthly_discount_rate(&self) -> f64 {
        self.annual_discount_rate / 12.0
    }
}

pub(super) fn invalid(field: &str, reason: &str) -> ClvError {
    ClvError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
