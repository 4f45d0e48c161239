//! Flat trial rows as they appear in the raw and cleaned CSV snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Separator for multi-valued fields (phases, countries).
pub const LIST_SEP: &str = "; ";

pub const RAW_COLUMNS: [&str; 8] = [
    "nct_id",
    "brief_title",
    "overall_status",
    "study_type",
    "phase",
    "start_date",
    "lead_sponsor",
    "countries",
];

pub const CLEAN_COLUMNS: [&str; 9] = [
    "nct_id",
    "brief_title",
    "overall_status",
    "study_type",
    "phase",
    "start_date",
    "lead_sponsor",
    "countries",
    "start_year",
];

/// One study as flattened from the API. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrial {
    pub nct_id: Option<String>,
    pub brief_title: Option<String>,
    pub overall_status: Option<String>,
    pub study_type: Option<String>,
    pub phase: Option<String>,
    pub start_date: Option<String>,
    pub lead_sponsor: Option<String>,
    pub countries: Option<String>,
}

/// A deduplicated trial with its start date coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTrial {
    pub nct_id: String,
    pub brief_title: Option<String>,
    pub overall_status: Option<String>,
    pub study_type: Option<String>,
    pub phase: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub lead_sponsor: Option<String>,
    pub countries: Option<String>,
    pub start_year: Option<i32>,
}

impl CleanTrial {
    /// Country names of this trial, each listed once.
    pub fn country_list(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        if let Some(ref joined) = self.countries {
            for c in joined.split(LIST_SEP).map(str::trim) {
                if !c.is_empty() && !seen.contains(&c) {
                    seen.push(c);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(countries: Option<&str>) -> CleanTrial {
        CleanTrial {
            nct_id: "NCT1".into(),
            brief_title: None,
            overall_status: None,
            study_type: None,
            phase: None,
            start_date: None,
            lead_sponsor: None,
            countries: countries.map(String::from),
            start_year: None,
        }
    }

    #[test]
    fn country_list_splits_and_dedups() {
        assert_eq!(trial(Some("Canada; USA")).country_list(), vec!["Canada", "USA"]);
        assert_eq!(
            trial(Some("Canada; USA; Canada")).country_list(),
            vec!["Canada", "USA"]
        );
        assert!(trial(None).country_list().is_empty());
    }
}
