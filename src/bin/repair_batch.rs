// src/bin/repair_batch.rs
//
// Re-save every legacy workbook of a directory as .xlsx through a headless
// office application, trimming banner rows on the way.

use anyhow::{bail, Result};
use clap::Parser;
use pricedash::read::{repair::repair_directory, OfficeRepairer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Batch-repair legacy .xls workbooks into .xlsx")]
struct Args {
    /// Directory with the *.xls files.
    source: PathBuf,
    /// Where the repaired copies are written.
    dest: PathBuf,
    /// Rows removed from the top of every sheet (0 keeps them all).
    #[arg(long, default_value_t = 3)]
    drop_rows: u32,
    /// Office binary run headless.
    #[arg(long, default_value = "soffice")]
    program: PathBuf,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();

    let args = Args::parse();
    if !args.source.is_dir() {
        bail!("source {} is not a directory", args.source.display());
    }

    let repairer = OfficeRepairer::new(args.program);
    let report = repair_directory(&repairer, &args.source, &args.dest, args.drop_rows)?;

    let failed = report.iter().filter(|i| i.result.is_err()).count();
    for item in &report {
        match &item.result {
            Ok(out) => println!("ok    {} -> {}", item.source.display(), out.display()),
            Err(e) => println!("FAIL  {}: {}", item.source.display(), e),
        }
    }
    info!(total = report.len(), failed, "batch finished");
    Ok(())
}
