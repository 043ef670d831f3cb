//! Segmented hypothesis testing assumptions

use super::valuation::invalid;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Columns with at most this many distinct values are treated as segments
pub const DEFAULT_SEGMENT_CUTOFF: usize = 10;

/// Segments smaller than this are reported as having insufficient data
pub const DEFAULT_MIN_SEGMENT_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationAssumptions {
    #[serde(default = "default_cutoff")]
    pub cutoff: usize,

    /// Columns never used for segmentation (`retire` by default)
    #[serde(default = "default_excluded")]
    pub excluded_columns: Vec<String>,

    #[serde(default = "default_min_rows")]
    pub min_segment_rows: usize,

    /// Significance level; `None` uses the fitted model's default
    #[serde(default)]
    pub alpha: Option<f64>,
}

fn default_cutoff() -> usize { DEFAULT_SEGMENT_CUTOFF }
fn default_excluded() -> Vec<String> { vec!["retire".to_string()] }
fn default_min_rows() -> usize { DEFAULT_MIN_SEGMENT_ROWS }

impl Default for SegmentationAssumptions {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_SEGMENT_CUTOFF,
            excluded_columns: default_excluded(),
            min_segment_rows: DEFAULT_MIN_SEGMENT_ROWS,
            alpha: None,
        }
    }
}

impl SegmentationAssumptions {
    pub fn validate(&self) -> Result<()> {
        if self.cutoff < 2 {
            return Err(invalid("segmentation.cutoff", "must be at least 2"));
        }
        if self.min_segment_rows < 2 {
            return Err(invalid("segmentation.min_segment_rows", "must be at least 2"));
        }
        if let Some(alpha) = self.alpha {
            validate_alpha(alpha)?;
        }
        Ok(())
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_columns.iter().any(|c| c == column)
    }
}

/// Significance levels must lie strictly between 0 and 1
pub fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(invalid("alpha", "must lie strictly between 0 and 1"))
    }
}
