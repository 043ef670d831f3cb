//! Coefficient and partial-effect charts rendered to PNG with Plotters

use crate::assumptions::ClvConfig;
use crate::customer::CustomerTable;
use crate::error::{ClvError, Result};
use crate::models::FittedModel;
use crate::selection::select_best;
use plotters::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One covariate's location coefficient with its confidence interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientBar {
    pub covariate: String,
    pub coef: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Survival curves with one covariate varied and the rest held at their means
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialEffects {
    pub covariate: String,
    pub times: Vec<f64>,
    /// Every covariate at its mean
    pub baseline: Vec<f64>,
    /// `(value, survival curve)` per value of the covariate
    pub curves: Vec<(f64, Vec<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPaths {
    pub coefficients: PathBuf,
    pub partial_effects: PathBuf,
}

/// Location-regression coefficients excluding the intercept
pub fn coefficient_bars(model: &FittedModel) -> Vec<CoefficientBar> {
    model
        .summary()
        .covariate_rows()
        .map(|row| CoefficientBar {
            covariate: row.covariate.clone(),
            coef: row.coef,
            lower: row.ci_lower,
            upper: row.ci_upper,
        })
        .collect()
}

pub fn partial_effects(
    model: &FittedModel,
    covariate: &str,
    values: &[f64],
    times: &[f64],
) -> Result<PartialEffects> {
    let curves = values
        .iter()
        .map(|&value| {
            let profile = model.profile_with(covariate, value)?;
            Ok((value, model.survival(&profile, times)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PartialEffects {
        covariate: covariate.to_string(),
        times: times.to_vec(),
        baseline: model.survival(model.covariate_means(), times),
        curves,
    })
}

fn plot_error<E: std::fmt::Display>(err: E) -> ClvError {
    ClvError::Plot(err.to_string())
}

/// Forest plot: point estimate and interval per covariate
pub fn render_coefficients(bars: &[CoefficientBar], title: &str, path: &Path) -> Result<()> {
    let finite: Vec<&CoefficientBar> = bars
        .iter()
        .filter(|b| b.coef.is_finite() && b.lower.is_finite() && b.upper.is_finite())
        .collect();
    let (lo, hi) = finite
        .iter()
        .fold((0.0f64, 0.0f64), |(lo, hi), b| (lo.min(b.lower), hi.max(b.upper)));
    let pad = ((hi - lo) * 0.1).max(1e-3);
    let n = finite.len() as i32;

    let height = (120 + 36 * n as u32).max(300);
    let root = BitMapBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(110)
        .build_cartesian_2d((lo - pad)..(hi + pad), -1i32..n)
        .map_err(plot_error)?;

    let labels: Vec<String> = finite.iter().map(|b| b.covariate.clone()).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels((n + 1) as usize)
        .y_label_formatter(&|y| {
            usize::try_from(*y)
                .ok()
                .and_then(|i| labels.get(i).cloned())
                .unwrap_or_default()
        })
        .x_desc("coefficient")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, -1), (0.0, n)],
            BLACK.mix(0.4).stroke_width(1),
        )))
        .map_err(plot_error)?;

    for (i, bar) in finite.iter().enumerate() {
        let y = i as i32;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(bar.lower, y), (bar.upper, y)],
                BLUE.stroke_width(2),
            )))
            .map_err(plot_error)?;
        chart
            .draw_series(std::iter::once(Circle::new((bar.coef, y), 5, BLUE.filled())))
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    Ok(())
}

pub fn render_partial_effects(effects: &PartialEffects, title: &str, path: &Path) -> Result<()> {
    let t_max = effects.times.iter().copied().fold(1.0f64, f64::max);

    let root = BitMapBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..t_max, 0f64..1.05f64)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("tenure")
        .y_desc("survival probability")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_error)?;

    for (idx, (value, curve)) in effects.curves.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        chart
            .draw_series(LineSeries::new(
                effects.times.iter().copied().zip(curve.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(plot_error)?
            .label(format!("{} = {}", effects.covariate, value))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .draw_series(LineSeries::new(
            effects.times.iter().copied().zip(effects.baseline.iter().copied()),
            BLACK.stroke_width(3),
        ))
        .map_err(plot_error)?
        .label("baseline")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Fit the best model and write both charts for `covariate` into `out_dir`
pub fn visualize(
    table: &CustomerTable,
    config: &ClvConfig,
    covariate: &str,
    out_dir: &Path,
) -> Result<ChartPaths> {
    config.validate()?;
    let selection = select_best(table, &config.columns, &config.fit)?;
    let model = &selection.best;
    if !model.has_covariate(covariate) {
        return Err(ClvError::UnknownCovariate {
            covariate: covariate.to_string(),
            family: model.family(),
        });
    }

    let values = config.ranges.values_for(covariate, table.numeric(covariate)?);
    let longest = table
        .numeric(&config.columns.duration)?
        .iter()
        .copied()
        .fold(1.0f64, f64::max)
        .ceil() as usize;
    let times: Vec<f64> = (0..=longest).map(|t| t as f64).collect();
    let effects = partial_effects(model, covariate, &values, &times)?;

    std::fs::create_dir_all(out_dir)?;
    let paths = ChartPaths {
        coefficients: out_dir.join(format!("{}_coefficients.png", covariate)),
        partial_effects: out_dir.join(format!("{}_partial_effects.png", covariate)),
    };

    let confidence = (1.0 - model.alpha()) * 100.0;
    render_coefficients(
        &coefficient_bars(model),
        &format!("{} coefficients ({:.0}% CI)", model.family(), confidence),
        &paths.coefficients,
    )?;
    render_partial_effects(
        &effects,
        &format!("{}: partial effects of {}", model.family(), covariate),
        &paths.partial_effects,
    )?;

    log::info!(
        "Charts written to {} and {}",
        paths.coefficients.display(),
        paths.partial_effects.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{generate_customers, Encoder, GeneratorParams};
    use crate::models::FitOptions;
    use crate::assumptions::ColumnNames;
    use tempfile::tempdir;

    fn encoded(rows: usize) -> CustomerTable {
        let raw = generate_customers(&GeneratorParams { rows, ..Default::default() }).unwrap();
        Encoder::default().encode(raw).unwrap()
    }

    fn fitted() -> FittedModel {
        select_best(&encoded(200), &ColumnNames::default(), &FitOptions::default())
            .unwrap()
            .best
    }

    #[test]
    fn test_partial_effect_curves() {
        let model = fitted();
        let times: Vec<f64> = (0..=24).map(f64::from).collect();
        let values = [20.0, 40.0, 60.0];
        let effects = partial_effects(&model, "age", &values, &times).unwrap();

        assert_eq!(effects.curves.len(), 3);
        assert_eq!(effects.baseline.len(), times.len());
        for (value, curve) in &effects.curves {
            assert_eq!(curve.len(), times.len(), "age = {}", value);
            assert!(curve.windows(2).all(|w| w[1] <= w[0] + 1e-12));
            assert!(curve.iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn test_baseline_is_curve_at_the_mean() {
        let model = fitted();
        let times = [6.0, 12.0];
        let index = model.covariates().iter().position(|c| c == "income").unwrap();
        let mean = model.covariate_means()[index];

        let effects = partial_effects(&model, "income", &[mean], &times).unwrap();
        for (a, b) in effects.curves[0].1.iter().zip(&effects.baseline) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_coefficient_bars_cover_covariates() {
        let model = fitted();
        let bars = coefficient_bars(&model);
        assert_eq!(bars.len(), model.covariates().len());
        assert!(bars.iter().all(|b| b.covariate != crate::models::INTERCEPT));
        assert!(bars.iter().all(|b| !(b.lower > b.coef) && !(b.coef > b.upper)));
    }

    #[test]
    fn test_unknown_covariate_in_profile() {
        let model = fitted();
        assert!(matches!(
            partial_effects(&model, "shoe_size", &[1.0], &[1.0]),
            Err(ClvError::UnknownCovariate { .. })
        ));
    }

    #[test]
    fn test_visualize_writes_both_charts() {
        let table = encoded(200);
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("charts");

        let paths = visualize(&table, &ClvConfig::default(), "age", &out_dir).unwrap();

        assert_eq!(paths.coefficients, out_dir.join("age_coefficients.png"));
        assert_eq!(paths.partial_effects, out_dir.join("age_partial_effects.png"));
        for path in [&paths.coefficients, &paths.partial_effects] {
            let size = std::fs::metadata(path).unwrap().len();
            assert!(size > 0, "{} is empty", path.display());
        }
    }

    #[test]
    fn test_visualize_unknown_covariate() {
        let temp_dir = tempdir().unwrap();
        let result = visualize(&encoded(200), &ClvConfig::default(), "shoe_size", temp_dir.path());
        assert!(matches!(result, Err(ClvError::UnknownCovariate { .. })));
        assert!(!temp_dir.path().join("shoe_size_coefficients.png").exists());
    }
}
