use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

const DEFAULT_CONDITION: &str = "immunology";
const DEFAULT_API_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DATA_DIR: &str = "data";
const DB_FILE: &str = "clinicaltrials.db";
const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Literal stamp used for the "latest" alias of every output.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub condition: String,
    pub api_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub data_dir: PathBuf,
    /// Explicit database location; `None` means `{data_dir}/clinicaltrials.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    pub preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            condition: DEFAULT_CONDITION.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_path: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Settings {
    /// Defaults, then `ct_pipeline.toml` if present, then `CT_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_with(Environment::with_prefix("CT").try_parsing(true))
    }

    fn load_with(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("condition", DEFAULT_CONDITION)?
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("page_size", DEFAULT_PAGE_SIZE as i64)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .set_default("data_dir", DEFAULT_DATA_DIR)?
            .set_default("preview_rows", DEFAULT_PREVIEW_ROWS as i64)?
            .add_source(config::File::with_name("ct_pipeline").required(false))
            .add_source(env)
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// SQLite file used by the loader and the query runner.
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DB_FILE))
    }

    /// Raw snapshot path for one stamp (a run date or `latest`).
    pub fn raw_path(&self, stamp: &str) -> PathBuf {
        self.data_dir
            .join("raw")
            .join(format!("clinicaltrials_{}_raw_{}.csv", self.condition, stamp))
    }

    /// Processed output path for `table` (`clean`, `kpi_status`, ...).
    pub fn processed_path(&self, table: &str, stamp: &str) -> PathBuf {
        self.data_dir.join("processed").join(format!(
            "clinicaltrials_{}_{}_{}.csv",
            self.condition, table, stamp
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_naming_convention() {
        let s = Settings::default();
        assert_eq!(
            s.raw_path("20250101"),
            PathBuf::from("data/raw/clinicaltrials_immunology_raw_20250101.csv")
        );
        assert_eq!(
            s.processed_path("kpi_country", LATEST),
            PathBuf::from("data/processed/clinicaltrials_immunology_kpi_country_latest.csv")
        );
    }

    #[test]
    fn condition_keys_the_paths() {
        let s = Settings {
            condition: "asthma".into(),
            data_dir: PathBuf::from("/tmp/x"),
            ..Settings::default()
        };
        assert_eq!(
            s.processed_path("clean", LATEST),
            PathBuf::from("/tmp/x/processed/clinicaltrials_asthma_clean_latest.csv")
        );
    }

    #[test]
    fn database_follows_data_dir_unless_set() {
        let mut s = Settings {
            data_dir: PathBuf::from("/srv/trials"),
            ..Settings::default()
        };
        assert_eq!(s.db_path(), PathBuf::from("/srv/trials/clinicaltrials.db"));
        s.db_path = Some(PathBuf::from("/var/db/ct.sqlite"));
        assert_eq!(s.db_path(), PathBuf::from("/var/db/ct.sqlite"));
        assert_eq!(Settings::default().db_path(), PathBuf::from("data/clinicaltrials.db"));
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("CT").try_parsing(true).source(Some(map))
    }

    #[test]
    fn load_uses_defaults_without_overrides() {
        let s = Settings::load_with(env(&[])).unwrap();
        assert_eq!(s.condition, "immunology");
        assert_eq!(s.page_size, 100);
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.preview_rows, 20);
        assert_eq!(s.db_path, None);
        assert_eq!(s.db_path(), PathBuf::from("data/clinicaltrials.db"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let s = Settings::load_with(env(&[
            ("CT_PAGE_SIZE", "7"),
            ("CT_DATA_DIR", "/x/y"),
            ("CT_CONDITION", "asthma"),
        ]))
        .unwrap();
        assert_eq!(s.page_size, 7);
        assert_eq!(s.data_dir, PathBuf::from("/x/y"));
        assert_eq!(s.condition, "asthma");
        assert_eq!(s.db_path(), PathBuf::from("/x/y/clinicaltrials.db"));
        assert_eq!(s.api_url, DEFAULT_API_URL);

        let s = Settings::load_with(env(&[("CT_DB_PATH", "/tmp/other.db")])).unwrap();
        assert_eq!(s.db_path(), PathBuf::from("/tmp/other.db"));
    }
}
