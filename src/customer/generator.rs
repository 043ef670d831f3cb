//! Synthetic subscriber generator
//!
//! Produces a raw (unencoded) customer file shaped like a telecom churn
//! extract:
//! - categorical fields carry the encoder's source labels
//! - churn follows a Weibull latent lifetime whose scale depends on covariates
//! - observation windows are staggered, so later joiners are censored earlier

use super::data::{Column, CustomerTable};
use super::encoder::Encoder;
use crate::error::{ClvError, Result};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Weibull};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Parameters for generating a synthetic customer file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorParams {
    /// Number of customers
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// RNG seed; identical seeds give identical files
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Longest observable tenure in months
    #[serde(default = "default_max_tenure")]
    pub max_tenure: u32,
}

fn default_rows() -> usize { 1000 }
fn default_seed() -> u64 { 42 }
fn default_max_tenure() -> u32 { 72 }

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            rows: 1000,
            seed: 42,
            max_tenure: 72,
        }
    }
}

/// Weibull shape of the latent churn time
const LIFETIME_SHAPE: f64 = 1.3;

/// Generate a raw customer table
pub fn generate_customers(params: &GeneratorParams) -> Result<CustomerTable> {
    if params.rows == 0 {
        return Err(ClvError::InvalidConfig {
            field: "rows".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if params.max_tenure == 0 {
        return Err(ClvError::InvalidConfig {
            field: "max_tenure".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let mut rng = Pcg64::seed_from_u64(params.seed);
    let log_income = Normal::<f64>::new(3.7, 0.7).map_err(|e| ClvError::InvalidConfig {
        field: "income".to_string(),
        reason: e.to_string(),
    })?;
    let encoder = Encoder::default();

    let mut cols = RawColumns::with_capacity(params.rows);
    for _ in 0..params.rows {
        let age: u32 = rng.gen_range(18..=77);
        let address = rng.gen_range(0..=(age - 18).min(54));
        let income = log_income.sample(&mut rng).exp().round().clamp(9.0, 1668.0);
        let ed = rng.gen_range(0..=4u32);
        let marital = u32::from(rng.gen_bool(0.5));
        let retire = u32::from(if age >= 65 { rng.gen_bool(0.7) } else { rng.gen_bool(0.02) });
        let gender = u32::from(rng.gen_bool(0.5));
        let voice = u32::from(rng.gen_bool(0.3));
        let internet = u32::from(rng.gen_bool(0.35));
        let forward = u32::from(rng.gen_bool(0.45));
        let region = rng.gen_range(0..=2u32);
        let custcat = rng.gen_range(0..=3u32);

        // Older, longer-settled, higher-tier customers stay longer; internet
        // subscribers churn faster.
        let log_scale = 3.4
            + 0.025 * (f64::from(age) - 40.0)
            + 0.02 * f64::from(address)
            + 0.15 * f64::from(custcat)
            - 0.45 * f64::from(internet)
            + 0.1 * f64::from(marital);
        let lifetime = Weibull::new(log_scale.exp(), LIFETIME_SHAPE)
            .map_err(|e| ClvError::InvalidConfig {
                field: "lifetime".to_string(),
                reason: e.to_string(),
            })?
            .sample(&mut rng);
        let churn_month = lifetime.ceil().max(1.0);
        let window = f64::from(rng.gen_range(1..=params.max_tenure));
        let (tenure, churn) = if churn_month <= window {
            (churn_month, 1)
        } else {
            (window, 0)
        };

        cols.numeric("tenure", tenure);
        cols.numeric("age", f64::from(age));
        cols.numeric("address", f64::from(address));
        cols.numeric("income", income);
        cols.label(&encoder, "marital", marital);
        cols.label(&encoder, "ed", ed);
        cols.label(&encoder, "retire", retire);
        cols.label(&encoder, "gender", gender);
        cols.label(&encoder, "voice", voice);
        cols.label(&encoder, "internet", internet);
        cols.label(&encoder, "forward", forward);
        cols.label(&encoder, "region", region);
        cols.label(&encoder, "custcat", custcat);
        cols.label(&encoder, "churn", churn);
    }

    let ids = (1..=params.rows).map(|i| i.to_string()).collect();
    let (names, columns) = cols.finish();
    CustomerTable::new(ids, names, columns)
}

/// Column builders in insertion order
struct RawColumns {
    capacity: usize,
    names: Vec<&'static str>,
    columns: Vec<Column>,
}

impl RawColumns {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn slot(&mut self, name: &'static str, text: bool) -> &mut Column {
        let idx = match self.names.iter().position(|n| *n == name) {
            Some(idx) => idx,
            None => {
                self.names.push(name);
                self.columns.push(if text {
                    Column::Text(Vec::with_capacity(self.capacity))
                } else {
                    Column::Numeric(Vec::with_capacity(self.capacity))
                });
                self.columns.len() - 1
            }
        };
        &mut self.columns[idx]
    }

    fn numeric(&mut self, name: &'static str, value: f64) {
        if let Column::Numeric(values) = self.slot(name, false) {
            values.push(value);
        }
    }

    fn label(&mut self, encoder: &Encoder, name: &'static str, code: u32) {
        let label = encoder
            .map_for(name)
            .and_then(|m| m.label_for(code))
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string());
        if let Column::Text(values) = self.slot(name, true) {
            values.push(label);
        }
    }

    fn finish(self) -> (Vec<String>, Vec<Column>) {
        (self.names.into_iter().map(str::to_string).collect(), self.columns)
    }
}
