//! Customer lifetime value from a subscriber CSV file
//!
//! Usage:
//!   clv --input customers.csv estimate --window 10
//!   clv --input customers.csv select
//!   clv --input customers.csv visualize --covariate age --out charts
//!   clv --input customers.csv test --covariate income --segments

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clv_survival::customer::load_encoded;
use clv_survival::hypothesis::{test_global, test_segments, SegmentOutcome};
use clv_survival::selection::CandidateOutcome;
use clv_survival::viz::visualize;
use clv_survival::{estimate_clv, select_best, ClvConfig, Encoder};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(author, version, about = "Customer lifetime value from survival models", long_about = None)]
struct Cli {
    /// Customer CSV file; the first column is the customer index
    #[arg(long, global = true, default_value = "customers.csv")]
    input: PathBuf,

    /// JSON configuration file; omitted fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Duration column (overrides the configuration)
    #[arg(long, global = true)]
    duration: Option<String>,

    /// Event column (overrides the configuration)
    #[arg(long, global = true)]
    event: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Value the customer window under the best model
    Estimate(EstimateArgs),
    /// Fit every candidate model and report the winner
    Select,
    /// Render coefficient and partial-effect charts
    Visualize(VisualizeArgs),
    /// Test whether a covariate affects survival
    Test(TestArgs),
}

#[derive(Debug, Args)]
struct EstimateArgs {
    /// Monthly margin per surviving customer
    #[arg(long)]
    margin: Option<f64>,

    /// Annual discount rate
    #[arg(long)]
    rate: Option<f64>,

    /// Number of projection steps
    #[arg(long)]
    horizon: Option<usize>,

    /// Customers valued from the top of the file
    #[arg(long, conflicts_with = "all")]
    window: Option<usize>,

    /// Value every customer
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct VisualizeArgs {
    #[arg(long)]
    covariate: String,

    /// Directory for the PNG files
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct TestArgs {
    #[arg(long)]
    covariate: String,

    /// Significance level
    #[arg(long)]
    alpha: Option<f64>,

    /// Test each categorical segment separately
    #[arg(long)]
    segments: bool,
}

fn load_config(cli: &Cli) -> Result<ClvConfig> {
    let mut config = match &cli.config {
        Some(path) => ClvConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ClvConfig::default(),
    };
    if let Some(duration) = &cli.duration {
        config.columns.duration = duration.clone();
    }
    if let Some(event) = &cli.event {
        config.columns.event = event.clone();
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    let table = load_encoded(Path::new(&cli.input), &Encoder::default())
        .with_context(|| format!("Failed to load customers from {}", cli.input.display()))?;

    match &cli.command {
        Command::Estimate(args) => {
            if let Some(margin) = args.margin {
                config.valuation.monthly_margin = margin;
            }
            if let Some(rate) = args.rate {
                config.valuation.annual_discount_rate = rate;
            }
            if let Some(horizon) = args.horizon {
                config.valuation.horizon = horizon;
            }
            if args.all {
                config.valuation.customer_window = None;
            } else if let Some(window) = args.window {
                config.valuation.customer_window = Some(window);
            }

            let result = estimate_clv(&table, &config)?;
            if cli.json {
                return print_json(&result);
            }

            println!("Model: {}", result.family);
            println!("{:>12} {:>12}", "customer", "CLV");
            for customer in &result.customers {
                println!("{:>12} {:>12.2}", customer.customer_id, customer.clv);
            }
            let s = &result.summary;
            println!();
            println!("count {:>12}", s.count);
            println!("mean  {:>12.2}", s.mean);
            match s.std {
                Some(std) => println!("std   {:>12.2}", std),
                None => println!("std   {:>12}", "NaN"),
            }
            println!("min   {:>12.2}", s.min);
            println!("25%   {:>12.2}", s.q25);
            println!("50%   {:>12.2}", s.q50);
            println!("75%   {:>12.2}", s.q75);
            println!("max   {:>12.2}", s.max);
        }

        Command::Select => {
            config.validate()?;
            let selection = select_best(&table, &config.columns, &config.fit)?;
            if cli.json {
                return print_json(&selection.candidates);
            }

            for candidate in &selection.candidates {
                match &candidate.outcome {
                    CandidateOutcome::Fitted { criterion } => {
                        println!("{:<18} {}", candidate.family.to_string(), criterion)
                    }
                    CandidateOutcome::FitFailed { reason } => {
                        println!("{:<18} failed: {}", candidate.family.to_string(), reason)
                    }
                    CandidateOutcome::MetricUnavailable => {
                        println!("{:<18} criterion unavailable", candidate.family.to_string())
                    }
                }
            }
            println!();
            println!("Best model: {}", selection.best.family());
            for row in selection.best.summary().rows() {
                println!(
                    "{:<8} {:<12} {:>10.4} {:>10.4} {:>8.3} {:>8.4}",
                    row.parameter, row.covariate, row.coef, row.se, row.z, row.p
                );
            }
        }

        Command::Visualize(args) => {
            let paths = visualize(&table, &config, &args.covariate, &args.out)?;
            println!("Coefficients:    {}", paths.coefficients.display());
            println!("Partial effects: {}", paths.partial_effects.display());
        }

        Command::Test(args) if args.segments => {
            let report = test_segments(&table, &config, &args.covariate, args.alpha)?;
            if cli.json {
                return print_json(&report);
            }
            for line in report.lines() {
                println!("{}", line);
            }
            let skipped = report
                .segments
                .iter()
                .filter(|s| !matches!(s.outcome, SegmentOutcome::Tested(_)))
                .count();
            if skipped > 0 {
                println!("({} segments could not be tested; run with --json for details)", skipped);
            }
        }

        Command::Test(args) => {
            let result = test_global(&table, &config, &args.covariate, args.alpha)?;
            if cli.json {
                return print_json(&result);
            }
            println!("{}", result.decision);
        }
    }

    Ok(())
}
