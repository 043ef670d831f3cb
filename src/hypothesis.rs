//! Wald tests on a covariate's location coefficient, for the whole customer
//! base and for each categorical segment.

use crate::assumptions::{validate_alpha, ClvConfig};
use crate::customer::{Column, CustomerTable, Encoder};
use crate::error::{ClvError, Result};
use crate::models::{Design, FittedModel, ModelFamily};
use crate::selection::{fit_family, select_best, select_from_design};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Reject,
    FailToReject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Reject => f.write_str("Reject Null Hypothesis"),
            Decision::FailToReject => f.write_str("Null Hypothesis can't be rejected"),
        }
    }
}

/// Reject when `p < alpha`; an undefined p-value never rejects
pub fn decide(p_value: f64, alpha: f64) -> Decision {
    if p_value < alpha {
        Decision::Reject
    } else {
        Decision::FailToReject
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisResult {
    pub family: ModelFamily,
    pub covariate: String,
    /// Regression the p-value was read from, e.g. `lambda_`
    pub parameter: String,
    pub p_value: f64,
    pub alpha: f64,
    pub decision: Decision,
}

/// Test `covariate` under an already fitted model
pub fn test_model(model: &FittedModel, covariate: &str, alpha: Option<f64>) -> Result<HypothesisResult> {
    let p_value = model
        .location_p_value(covariate)
        .ok_or_else(|| ClvError::UnknownCovariate {
            covariate: covariate.to_string(),
            family: model.family(),
        })?;
    let alpha = alpha.unwrap_or_else(|| model.alpha());

    Ok(HypothesisResult {
        family: model.family(),
        covariate: covariate.to_string(),
        parameter: model.family().location_parameter().to_string(),
        p_value,
        alpha,
        decision: decide(p_value, alpha),
    })
}

/// Fit the best model on the full table and test `covariate`.
///
/// `alpha` falls back to the configured segmentation alpha, then to the
/// model's default.
pub fn test_global(
    table: &CustomerTable,
    config: &ClvConfig,
    covariate: &str,
    alpha: Option<f64>,
) -> Result<HypothesisResult> {
    config.validate()?;
    let alpha = alpha.or(config.segmentation.alpha);
    if let Some(alpha) = alpha {
        validate_alpha(alpha)?;
    }

    let selection = select_best(table, &config.columns, &config.fit)?;
    let result = test_model(&selection.best, covariate, alpha)?;
    log::info!(
        "{} on {}: p = {:.4}, alpha = {} -> {}",
        covariate,
        result.family,
        result.p_value,
        result.alpha,
        result.decision
    );
    Ok(result)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentOutcome {
    Tested(HypothesisResult),
    InsufficientData { rows: usize, events: usize },
    FitFailed { reason: String },
    /// The covariate is constant or absent within the segment
    CovariateUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentResult {
    pub column: String,
    pub value: f64,
    /// Source label of the value when the column is a known category
    pub label: String,
    pub rows: usize,
    pub outcome: SegmentOutcome,
}

impl SegmentResult {
    pub fn is_rejected(&self) -> bool {
        matches!(&self.outcome, SegmentOutcome::Tested(r) if r.decision == Decision::Reject)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub family: ModelFamily,
    pub covariate: String,
    pub segments: Vec<SegmentResult>,
}

impl SegmentReport {
    pub fn rejected(&self) -> impl Iterator<Item = &SegmentResult> {
        self.segments.iter().filter(|s| s.is_rejected())
    }

    /// One line per rejected segment, or a single line saying there were none
    pub fn lines(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .rejected()
            .map(|s| format!("Reject Null Hypothesis for {} {}", s.column, s.value))
            .collect();
        if lines.is_empty() {
            vec!["Null Hypothesis not rejected for any segment".to_string()]
        } else {
            lines
        }
    }
}

/// Columns eligible for segmentation: numeric, few distinct values, not excluded
fn segment_columns(table: &CustomerTable, config: &ClvConfig) -> Vec<(String, Vec<f64>)> {
    table
        .iter()
        .filter(|(name, column)| {
            matches!(column, Column::Numeric(_)) && !config.segmentation.is_excluded(name)
        })
        .filter_map(|(name, _)| {
            let values = table.distinct_values(name).ok()?;
            (values.len() <= config.segmentation.cutoff).then(|| (name.to_string(), values))
        })
        .collect()
}

/// Select the family once on the full table, then refit it on every segment
/// and test `covariate` there.
pub fn test_segments(
    table: &CustomerTable,
    config: &ClvConfig,
    covariate: &str,
    alpha: Option<f64>,
) -> Result<SegmentReport> {
    config.validate()?;
    let alpha = alpha.or(config.segmentation.alpha);
    if let Some(alpha) = alpha {
        validate_alpha(alpha)?;
    }

    let columns = &config.columns;
    let design = Design::from_table(table, &columns.duration, &columns.event)?;
    let selection = select_from_design(&design, &config.fit)?;
    let family = selection.best.family();
    if !selection.best.has_covariate(covariate) {
        return Err(ClvError::UnknownCovariate {
            covariate: covariate.to_string(),
            family,
        });
    }

    let encoder = Encoder::default();
    let mut segments = Vec::new();

    for (column, values) in segment_columns(table, config) {
        for value in values {
            let subset = table.filter_eq(&column, value)?;
            let outcome = test_segment(&subset, config, family, covariate, alpha)?;
            log::debug!("Segment {} = {}: {:?}", column, value, outcome);
            segments.push(SegmentResult {
                label: encoder.describe_value(&column, value),
                column: column.clone(),
                value,
                rows: subset.len(),
                outcome,
            });
        }
    }

    let report = SegmentReport {
        family,
        covariate: covariate.to_string(),
        segments,
    };
    log::info!(
        "Tested {} segments with {}: {} rejected",
        report.segments.len(),
        family,
        report.rejected().count()
    );
    Ok(report)
}

fn test_segment(
    subset: &CustomerTable,
    config: &ClvConfig,
    family: ModelFamily,
    covariate: &str,
    alpha: Option<f64>,
) -> Result<SegmentOutcome> {
    let rows = subset.len();
    let events = subset
        .numeric(&config.columns.event)?
        .iter()
        .filter(|&&e| e == 1.0)
        .count();
    if rows < config.segmentation.min_segment_rows || events == 0 {
        return Ok(SegmentOutcome::InsufficientData { rows, events });
    }

    let design = Design::from_table(subset, &config.columns.duration, &config.columns.event)?;
    if !design.names().iter().any(|n| n == covariate) {
        return Ok(SegmentOutcome::CovariateUnavailable);
    }

    match fit_family(&design, family, &config.fit) {
        Ok(model) => match test_model(&model, covariate, alpha) {
            Ok(result) => Ok(SegmentOutcome::Tested(result)),
            Err(ClvError::UnknownCovariate { .. }) => Ok(SegmentOutcome::CovariateUnavailable),
            Err(err) => Err(err),
        },
        Err(ClvError::Fit { source, .. }) => {
            log::warn!("{} failed on segment: {}", family, source);
            Ok(SegmentOutcome::FitFailed { reason: source.to_string() })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{generate_customers, GeneratorParams};

    fn tested(column: &str, value: f64, p_value: f64) -> SegmentResult {
        SegmentResult {
            column: column.to_string(),
            value,
            label: value.to_string(),
            rows: 50,
            outcome: SegmentOutcome::Tested(HypothesisResult {
                family: ModelFamily::LogNormalAft,
                covariate: "income".to_string(),
                parameter: "mu_".to_string(),
                p_value,
                alpha: 0.05,
                decision: decide(p_value, 0.05),
            }),
        }
    }

    #[test]
    fn test_decision_thresholds() {
        assert_eq!(decide(0.001, 0.05), Decision::Reject);
        assert_eq!(decide(0.5, 0.05), Decision::FailToReject);
        assert_eq!(decide(0.05, 0.05), Decision::FailToReject);
        assert_eq!(decide(f64::NAN, 0.05), Decision::FailToReject);
        assert_eq!(Decision::Reject.to_string(), "Reject Null Hypothesis");
        assert_eq!(Decision::FailToReject.to_string(), "Null Hypothesis can't be rejected");
    }

    #[test]
    fn test_no_segment_rejected() {
        let report = SegmentReport {
            family: ModelFamily::LogNormalAft,
            covariate: "income".to_string(),
            segments: vec![
                tested("gender", 0.0, 0.4),
                tested("gender", 1.0, 0.9),
                SegmentResult {
                    column: "region".to_string(),
                    value: 2.0,
                    label: "Zone 3".to_string(),
                    rows: 4,
                    outcome: SegmentOutcome::InsufficientData { rows: 4, events: 1 },
                },
            ],
        };
        assert_eq!(report.rejected().count(), 0);
        assert_eq!(report.lines(), vec!["Null Hypothesis not rejected for any segment"]);
    }

    #[test]
    fn test_exactly_one_segment_rejected() {
        let report = SegmentReport {
            family: ModelFamily::LogNormalAft,
            covariate: "income".to_string(),
            segments: vec![
                tested("gender", 0.0, 0.3),
                tested("gender", 1.0, 0.2),
                tested("region", 1.0, 0.001),
                tested("region", 2.0, 0.7),
            ],
        };
        assert_eq!(report.lines(), vec!["Reject Null Hypothesis for region 1"]);
    }

    #[test]
    fn test_segment_columns_respect_cutoff_and_exclusions() {
        let raw = generate_customers(&GeneratorParams { rows: 120, ..Default::default() }).unwrap();
        let table = Encoder::default().encode(raw).unwrap();
        let config = ClvConfig::default();

        let names: Vec<String> = segment_columns(&table, &config).into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"gender".to_string()));
        assert!(names.contains(&"custcat".to_string()));
        assert!(names.contains(&"churn".to_string()));
        assert!(!names.contains(&"retire".to_string()));
        assert!(!names.contains(&"age".to_string()));
        assert!(!names.contains(&"income".to_string()));
    }

    #[test]
    fn test_segmented_run_reports_every_partition() {
        let raw = generate_customers(&GeneratorParams { rows: 300, ..Default::default() }).unwrap();
        let table = Encoder::default().encode(raw).unwrap();
        let config = ClvConfig::default();

        let report = test_segments(&table, &config, "age", None).unwrap();

        let gender: Vec<&SegmentResult> = report.segments.iter().filter(|s| s.column == "gender").collect();
        assert_eq!(gender.len(), 2);
        assert_eq!(gender.iter().map(|s| s.rows).sum::<usize>(), 300);

        // Customers who never churned cannot support a fit
        let retained = report
            .segments
            .iter()
            .find(|s| s.column == "churn" && s.value == 0.0)
            .unwrap();
        assert!(matches!(retained.outcome, SegmentOutcome::InsufficientData { events: 0, .. }));
    }

    #[test]
    fn test_unknown_covariate_is_an_error() {
        let raw = generate_customers(&GeneratorParams { rows: 150, ..Default::default() }).unwrap();
        let table = Encoder::default().encode(raw).unwrap();
        let result = test_global(&table, &ClvConfig::default(), "shoe_size", None);
        assert!(matches!(result, Err(ClvError::UnknownCovariate { .. })));
    }
}
