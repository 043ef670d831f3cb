//! Run configuration: column roles, valuation, segmentation, fitting and
//! chart ranges. Every field has a default, so an empty JSON object is a
//! complete configuration.

mod ranges;
mod segmentation;
mod valuation;

pub use ranges::{RangePreset, RangePresets};
pub use segmentation::{
    validate_alpha, SegmentationAssumptions, DEFAULT_MIN_SEGMENT_ROWS, DEFAULT_SEGMENT_CUTOFF,
};
pub use valuation::{
    TimeGrid, ValuationAssumptions, DEFAULT_ANNUAL_DISCOUNT_RATE, DEFAULT_CUSTOMER_WINDOW,
    DEFAULT_HORIZON, DEFAULT_MONTHLY_MARGIN,
};

use crate::error::Result;
use crate::models::FitOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which columns hold the survival outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNames {
    #[serde(default = "default_duration")]
    pub duration: String,

    #[serde(default = "default_event")]
    pub event: String,
}

fn default_duration() -> String { "tenure".to_string() }
fn default_event() -> String { "churn".to_string() }

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            event: default_event(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClvConfig {
    #[serde(default)]
    pub columns: ColumnNames,

    #[serde(default)]
    pub valuation: ValuationAssumptions,

    #[serde(default)]
    pub segmentation: SegmentationAssumptions,

    #[serde(default)]
    pub fit: FitOptions,

    #[serde(default)]
    pub ranges: RangePresets,
}

impl ClvConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: ClvConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.duration == self.columns.event {
            return Err(valuation::invalid(
                "columns",
                "duration and event must be different columns",
            ));
        }
        self.valuation.validate()?;
        self.segmentation.validate()?;
        self.fit.validate()?;
        self.ranges.validate()?;
        Ok(())
    }
}
