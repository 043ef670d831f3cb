//! Best-model selection by information criterion

use crate::assumptions::ColumnNames;
use crate::customer::CustomerTable;
use crate::error::{ClvError, Result};
use crate::models::{Design, FitError, FitOptions, FittedModel, InformationCriterion, ModelFamily};
use serde::Serialize;

/// What happened to one candidate family
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Fitted { criterion: InformationCriterion },
    FitFailed { reason: String },
    /// The fit succeeded but its criterion is not a finite number
    MetricUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateReport {
    pub family: ModelFamily,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub best: FittedModel,
    /// One entry per candidate, in fitting order
    pub candidates: Vec<CandidateReport>,
}

/// Fit every candidate family to `table` and keep the lowest criterion
pub fn select_best(table: &CustomerTable, columns: &ColumnNames, options: &FitOptions) -> Result<Selection> {
    let design = Design::from_table(table, &columns.duration, &columns.event)?;
    select_from_design(&design, options)
}

/// Candidates are fitted in [`ModelFamily::CANDIDATES`] order; a later
/// candidate replaces the incumbent only with a strictly lower criterion.
pub fn select_from_design(design: &Design, options: &FitOptions) -> Result<Selection> {
    let mut best: Option<FittedModel> = None;
    let mut candidates = Vec::with_capacity(ModelFamily::CANDIDATES.len());

    for family in ModelFamily::CANDIDATES {
        let outcome = match family.fit(design, options) {
            Ok(model) => {
                let criterion = model.criterion();
                if criterion.value().is_finite() {
                    log::debug!("{}: {}", family, criterion);
                    let better = best
                        .as_ref()
                        .map_or(true, |b| criterion.value() < b.criterion().value());
                    if better {
                        best = Some(model);
                    }
                    CandidateOutcome::Fitted { criterion }
                } else {
                    log::warn!("{}: fitted but criterion is not finite", family);
                    CandidateOutcome::MetricUnavailable
                }
            }
            Err(err) => {
                log::warn!("{}: fit failed: {}", family, err);
                CandidateOutcome::FitFailed { reason: err.to_string() }
            }
        };
        candidates.push(CandidateReport { family, outcome });
    }

    match best {
        Some(best) => {
            log::info!("Selected {} ({})", best.family(), best.criterion());
            Ok(Selection { best, candidates })
        }
        None => {
            let details = candidates
                .iter()
                .map(|c| match &c.outcome {
                    CandidateOutcome::FitFailed { reason } => format!("{}: {}", c.family, reason),
                    _ => format!("{}: criterion unavailable", c.family),
                })
                .collect::<Vec<_>>()
                .join("; ");
            Err(ClvError::NoModelFitted { details })
        }
    }
}

/// Fit one family, mapping its failure into the crate error
pub fn fit_family(design: &Design, family: ModelFamily, options: &FitOptions) -> Result<FittedModel> {
    family
        .fit(design, options)
        .map_err(|source: FitError| ClvError::Fit { family, source })
}
