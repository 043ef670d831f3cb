//! Customer lifetime value from subscriber survival models.
//!
//! The pipeline: load and encode a customer file, fit Weibull, log-normal and
//! log-logistic AFT models plus a Cox model, keep the one with the lowest
//! information criterion, and value each customer as the discounted margin
//! expected over their projected survival.

pub mod assumptions;
pub mod customer;
pub mod error;
pub mod hypothesis;
pub mod models;
pub mod projection;
pub mod selection;
pub mod stats;
pub mod viz;

pub use assumptions::ClvConfig;
pub use customer::{CustomerTable, Encoder};
pub use error::{ClvError, Result};
pub use models::{FittedModel, ModelFamily};
pub use projection::{estimate_clv, ProjectionResult};
pub use selection::{select_best, Selection};
