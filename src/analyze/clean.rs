use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::record::{CleanTrial, RawTrial};

/// Read a raw snapshot. Empty cells come back as `None`.
pub fn read_raw(path: &Path) -> Result<Vec<RawTrial>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<RawTrial>, _>>()
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(rows)
}

/// Lossy start-date coercion: `YYYY`, `YYYY-MM` or `YYYY-MM-DD` (dash or
/// slash). Missing month/day default to 1. Anything else is `None`.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\d{4})(?:[-/](\d{1,2})(?:[-/](\d{1,2}))?)?$").unwrap()
    });
    let caps = re.captures(raw.trim())?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    let day: u32 = caps.get(3).map_or(Some(1), |m| m.as_str().parse().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Keep the first row per identifier, drop rows without one, coerce dates.
pub fn clean(raw: Vec<RawTrial>) -> Vec<CleanTrial> {
    let mut seen: HashSet<Option<String>> = HashSet::new();
    raw.into_iter()
        .filter(|r| seen.insert(r.nct_id.clone()))
        .filter_map(|r| {
            let nct_id = r.nct_id?;
            let start_date = r.start_date.as_deref().and_then(parse_start_date);
            Some(CleanTrial {
                nct_id,
                brief_title: r.brief_title,
                overall_status: r.overall_status,
                study_type: r.study_type,
                phase: r.phase,
                start_date,
                lead_sponsor: r.lead_sponsor,
                countries: r.countries,
                start_year: start_date.map(|d| d.year()),
            })
        })
        .collect()
}
