//! Write a synthetic subscriber file for demos and testing

use anyhow::{Context, Result};
use clap::Parser;
use clv_survival::customer::{generate_customers, write_customers, GeneratorParams};
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Generate a synthetic customer CSV", long_about = None)]
struct Args {
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Longest observable tenure in months
    #[arg(long, default_value_t = 72)]
    max_tenure: u32,

    #[arg(long, default_value = "customers.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let params = GeneratorParams {
        rows: args.rows,
        seed: args.seed,
        max_tenure: args.max_tenure,
    };

    let table = generate_customers(&params)?;
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_customers(&table, file)?;

    log::info!("Generated {} customers (seed {})", table.len(), params.seed);
    println!("Output written to {}", args.output.display());
    Ok(())
}
