mod analyze;
mod db;
mod error;
mod fetch;
mod output;
mod queries;
mod record;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::info;

use settings::Settings;

#[derive(Parser)]
#[command(name = "ct_pipeline", about = "ClinicalTrials.gov fetch, KPI and SQLite pipeline")]
struct Cli {
    /// Condition keyword (overrides CT_CONDITION)
    #[arg(long, global = true)]
    condition: Option<String>,
    /// Root directory for raw/, processed/ and the database unless CT_DB_PATH is set (overrides CT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through the studies API and write the raw snapshot
    Fetch,
    /// Deduplicate the latest raw snapshot and write cleaned + KPI tables
    Clean,
    /// Replace the trials table with the latest cleaned snapshot
    Load,
    /// Run the fixed aggregate reports against the trials table
    Query,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(condition) = cli.condition {
        settings.condition = condition;
    }
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    info!(settings = ?settings, "settings loaded");

    let t0 = Instant::now();
    let result = match cli.command {
        Commands::Fetch => fetch::run(&settings).map(|_| ()),
        Commands::Clean => analyze::run(&settings).map(|out| {
            info!(
                trials = ?out.kpis.summary.get("total_trials"),
                files = 2 * (out.tables.len() + 1),
                cleaned = ?out.cleaned.latest,
                "analysis written"
            );
        }),
        Commands::Load => db::run(&settings).map(|_| ()),
        Commands::Query => queries::run(&settings),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
