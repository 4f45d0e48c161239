use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use serde::Serialize;

use crate::output::{records_to_csv, rows_to_csv};
use crate::record::CleanTrial;

/// One (category, count) pair. `None` is the absent-valued group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiRow {
    pub category: Option<String>,
    pub trials: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiTable {
    pub category_column: &'static str,
    pub rows: Vec<KpiRow>,
}

impl KpiTable {
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let records: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| vec![r.category.clone().unwrap_or_default(), r.trials.to_string()])
            .collect();
        records_to_csv(&[self.category_column, "trials"], &records)
    }

    #[cfg(test)]
    pub fn count_for(&self, category: &str) -> Option<usize> {
        self.rows
            .iter()
            .find(|r| r.category.as_deref() == Some(category))
            .map(|r| r.trials)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub metric: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub metrics: Vec<Metric>,
}

impl Summary {
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        rows_to_csv(&["metric", "value"], &self.metrics)
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.metrics.iter().find(|m| m.metric == name).map(|m| m.value)
    }
}

fn tally<I>(keys: I) -> BTreeMap<Option<String>, usize>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut counts = BTreeMap::new();
    for k in keys {
        *counts.entry(k).or_insert(0) += 1;
    }
    counts
}

/// Descending by count; the map's key order breaks ties.
fn by_count_desc(column: &'static str, counts: BTreeMap<Option<String>, usize>) -> KpiTable {
    let mut rows: Vec<KpiRow> = counts
        .into_iter()
        .map(|(category, trials)| KpiRow { category, trials })
        .collect();
    rows.sort_by(|a, b| b.trials.cmp(&a.trials));
    KpiTable { category_column: column, rows }
}

pub fn by_status(trials: &[CleanTrial]) -> KpiTable {
    by_count_desc(
        "overall_status",
        tally(trials.iter().map(|t| t.overall_status.clone())),
    )
}

pub fn by_phase(trials: &[CleanTrial]) -> KpiTable {
    by_count_desc("phase", tally(trials.iter().map(|t| t.phase.clone())))
}

/// Ascending by year, absent year last.
pub fn by_year(trials: &[CleanTrial]) -> KpiTable {
    let mut counts: BTreeMap<Option<i32>, usize> = BTreeMap::new();
    for t in trials {
        *counts.entry(t.start_year).or_insert(0) += 1;
    }
    let mut rows: Vec<(Option<i32>, usize)> = counts.into_iter().collect();
    rows.sort_by_key(|(year, _)| (year.is_none(), *year));
    KpiTable {
        category_column: "start_year",
        rows: rows
            .into_iter()
            .map(|(year, trials)| KpiRow {
                category: year.map(|y| y.to_string()),
                trials,
            })
            .collect(),
    }
}

/// Explode countries into one increment per distinct country per trial.
/// Trials without countries do not contribute.
pub fn by_country(trials: &[CleanTrial]) -> KpiTable {
    let exploded = trials
        .iter()
        .flat_map(|t| t.country_list())
        .map(|c| Some(c.to_string()));
    by_count_desc("country", tally(exploded))
}

fn distinct<'a, I: Iterator<Item = Option<&'a str>>>(values: I) -> usize {
    values.flatten().collect::<HashSet<_>>().len()
}

pub fn summary(trials: &[CleanTrial], countries: &KpiTable) -> Summary {
    Summary {
        metrics: vec![
            Metric { metric: "total_trials", value: trials.len() },
            Metric {
                metric: "unique_statuses",
                value: distinct(trials.iter().map(|t| t.overall_status.as_deref())),
            },
            Metric {
                metric: "unique_phases",
                value: distinct(trials.iter().map(|t| t.phase.as_deref())),
            },
            Metric {
                metric: "unique_countries_with_trials",
                value: countries.rows.len(),
            },
        ],
    }
}

/// All grouped counts for one cleaned dataset.
#[derive(Debug, Clone)]
pub struct Kpis {
    pub status: KpiTable,
    pub phase: KpiTable,
    pub year: KpiTable,
    pub country: KpiTable,
    pub summary: Summary,
}

impl Kpis {
    pub fn compute(trials: &[CleanTrial]) -> Self {
        let country = by_country(trials);
        Kpis {
            status: by_status(trials),
            phase: by_phase(trials),
            year: by_year(trials),
            summary: summary(trials, &country),
            country,
        }
    }

    /// Console digest: summary, then the top three phases and statuses.
    pub fn print_digest(&self) {
        println!("Quick summary:");
        for m in &self.summary.metrics {
            println!("  {:<30} {:>6}", m.metric, m.value);
        }
        print_top("Top 3 phases:", &self.phase, 3);
        print_top("Top 3 statuses:", &self.status, 3);
    }
}

fn print_top(title: &str, table: &KpiTable, n: usize) {
    println!("\n{}", title);
    println!("  {:<30} {:>6}", table.category_column, "trials");
    for r in table.rows.iter().take(n) {
        let label = r.category.as_deref().unwrap_or("-");
        println!("  {:<30} {:>6}", label, r.trials);
    }
}
