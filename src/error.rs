//! Error types shared across the crate

use crate::models::{FitError, ModelFamily};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Column '{column}' not found")]
    MissingColumn { column: String },

    #[error("Column '{column}' is not numeric; encode it before fitting")]
    NonNumericColumn { column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Non-finite value {value} in column '{column}' at row {row}")]
    NonFiniteValue { column: String, row: usize, value: f64 },

    #[error("Unmapped value '{value}' in categorical column '{column}' at row {row}")]
    UnmappedCategory {
        column: String,
        value: String,
        row: usize,
    },

    #[error("Category map for '{column}' is not injective: code {code} is used twice")]
    DuplicateCategoryCode { column: String, code: u32 },

    #[error("Invalid duration {value} at row {row}: durations must be finite and > 0")]
    InvalidDuration { row: usize, value: f64 },

    #[error("Invalid event indicator {value} at row {row}: expected 0 or 1")]
    InvalidEvent { row: usize, value: f64 },

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to fit {family}: {source}")]
    Fit {
        family: ModelFamily,
        #[source]
        source: FitError,
    },

    #[error("No candidate model could be fitted ({details})")]
    NoModelFitted { details: String },

    #[error("Covariate '{covariate}' is not part of the fitted {family} model")]
    UnknownCovariate {
        covariate: String,
        family: ModelFamily,
    },

    #[error("Customer table is empty")]
    EmptyTable,

    #[error("Plotting error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, ClvError>;
