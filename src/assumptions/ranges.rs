//! Covariate value ranges for partial-effect charts

use super::valuation::invalid;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A fixed value range `start, start + step, ...` stopping before `end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePreset {
    pub covariate: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl RangePreset {
    fn new(covariate: &str, start: f64, end: f64, step: f64) -> Self {
        Self {
            covariate: covariate.to_string(),
            start,
            end,
            step,
        }
    }

    /// Empty unless the bounds are finite and `step` is positive
    pub fn values(&self) -> Vec<f64> {
        let bounded = self.start.is_finite() && self.end.is_finite() && self.step.is_finite();
        if !bounded || self.step <= 0.0 {
            return Vec::new();
        }

        let mut values = Vec::new();
        let mut i = 0.0;
        loop {
            let v = self.start + i * self.step;
            if v >= self.end {
                break;
            }
            values.push(v);
            i += 1.0;
        }
        values
    }
}

/// Range selection policy: named presets, otherwise the observed integer span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePresets {
    pub presets: Vec<RangePreset>,
}

impl Default for RangePresets {
    fn default() -> Self {
        Self {
            presets: vec![
                RangePreset::new("age", 20.0, 80.0, 5.0),
                RangePreset::new("address", 0.0, 55.0, 5.0),
                RangePreset::new("income", 0.0, 1670.0, 50.0),
            ],
        }
    }
}

impl RangePresets {
    pub fn validate(&self) -> Result<()> {
        for preset in &self.presets {
            let ok = preset.start.is_finite()
                && preset.end.is_finite()
                && preset.step.is_finite()
                && preset.step > 0.0
                && preset.end > preset.start;
            if !ok {
                return Err(invalid(
                    &format!("ranges.{}", preset.covariate),
                    "needs finite start < end and a positive step",
                ));
            }
        }
        Ok(())
    }

    pub fn preset(&self, covariate: &str) -> Option<&RangePreset> {
        self.presets.iter().find(|p| p.covariate == covariate)
    }

    /// Values at which to draw partial effects for `covariate`.
    ///
    /// Without a preset this is every integer from `floor(min)` to
    /// `floor(max)` of the observed values.
    pub fn values_for(&self, covariate: &str, observed: &[f64]) -> Vec<f64> {
        if let Some(preset) = self.preset(covariate) {
            return preset.values();
        }

        let finite = observed.iter().copied().filter(|v| v.is_finite());
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min > max {
            return Vec::new();
        }

        let (lo, hi) = (min.floor() as i64, max.floor() as i64);
        (lo..=hi).map(|v| v as f64).collect()
    }
}
