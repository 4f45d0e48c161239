pub mod clean;
pub mod kpi;

use anyhow::Result;
use tracing::info;

use crate::error::require_input;
use crate::output::{rows_to_csv, run_stamp, Snapshot};
use crate::record::CLEAN_COLUMNS;
use crate::settings::{Settings, LATEST};
use kpi::Kpis;

/// Outputs of one cleaner run, in write order.
#[derive(Debug)]
pub struct AnalyzeOutput {
    pub cleaned: Snapshot,
    pub tables: Vec<(&'static str, Snapshot)>,
    pub kpis: Kpis,
}

pub fn run(settings: &Settings) -> Result<AnalyzeOutput> {
    run_at(settings, &run_stamp())
}

/// Clean the latest raw snapshot and write the cleaned table plus KPIs.
pub fn run_at(settings: &Settings, stamp: &str) -> Result<AnalyzeOutput> {
    let raw_path = settings.raw_path(LATEST);
    require_input("clean", &raw_path)?;

    let raw = clean::read_raw(&raw_path)?;
    let raw_len = raw.len();
    let trials = clean::clean(raw);
    info!(raw = raw_len, cleaned = trials.len(), "deduplicated trials");

    let snapshot = |table: &str| Snapshot {
        dated: settings.processed_path(table, stamp),
        latest: settings.processed_path(table, LATEST),
    };

    let cleaned = snapshot("clean");
    cleaned.write(&rows_to_csv(&CLEAN_COLUMNS, &trials)?)?;

    let kpis = Kpis::compute(&trials);
    let outputs: [(&'static str, Vec<u8>); 5] = [
        ("kpi_status", kpis.status.to_csv()?),
        ("kpi_phase", kpis.phase.to_csv()?),
        ("kpi_year", kpis.year.to_csv()?),
        ("kpi_country", kpis.country.to_csv()?),
        ("kpi_summary", kpis.summary.to_csv()?),
    ];
    let mut tables = Vec::with_capacity(outputs.len());
    for (name, bytes) in outputs {
        let snap = snapshot(name);
        snap.write(&bytes)?;
        tables.push((name, snap));
    }

    println!("Cleaned files saved:");
    println!(" - {}", cleaned.latest.display());
    println!(" - {}\n", cleaned.dated.display());
    println!("KPI files saved:");
    for (_, snap) in &tables {
        println!(" - {}", snap.latest.display());
    }
    println!();
    kpis.print_digest();
    println!();

    Ok(AnalyzeOutput { cleaned, tables, kpis })
}
