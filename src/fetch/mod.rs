pub mod api;
pub mod extract;

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::output::{rows_to_csv, run_stamp, Snapshot};
use crate::record::{RawTrial, RAW_COLUMNS};
use crate::settings::{Settings, LATEST};
use api::{fetch_all, PageSource, StudiesApi};

/// Fetch every study for the configured condition and write the raw snapshot.
pub fn run(settings: &Settings) -> Result<Snapshot> {
    let mut api = StudiesApi::new(settings)?;
    run_with(settings, &mut api, &run_stamp())
}

/// Page through `source`, flatten, and write. Nothing is written on error.
pub fn run_with(settings: &Settings, source: &mut dyn PageSource, stamp: &str) -> Result<Snapshot> {
    println!("\nFetching clinical trials for condition: {}\n", settings.condition);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    let studies = fetch_all(source, &pb);
    pb.finish_and_clear();
    let studies = studies?;

    let rows: Vec<RawTrial> = studies.iter().map(extract::flatten_study).collect();
    let missing_ids = rows.iter().filter(|r| r.nct_id.is_none()).count();
    if missing_ids > 0 {
        info!(missing_ids, "studies without an identifier kept in raw snapshot");
    }

    let bytes = rows_to_csv(&RAW_COLUMNS, &rows)?;
    let snapshot = Snapshot {
        dated: settings.raw_path(stamp),
        latest: settings.raw_path(LATEST),
    };
    snapshot.write(&bytes)?;

    println!("Raw files saved:");
    println!(" - {}", snapshot.dated.display());
    println!(" - {}", snapshot.latest.display());
    println!(" Total rows collected: {}\n", rows.len());
    Ok(snapshot)
}
