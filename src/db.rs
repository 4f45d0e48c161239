use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};
use tracing::{debug, info};

use crate::error::require_input;
use crate::settings::{Settings, LATEST};

pub const TRIALS_TABLE: &str = "trials";

/// Column affinity inferred from CSV text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    fn value(self, cell: &str) -> SqlValue {
        if cell.is_empty() {
            return SqlValue::Null;
        }
        let text = || SqlValue::Text(cell.to_string());
        match self {
            ColumnType::Integer => cell.parse().map(SqlValue::Integer).unwrap_or_else(|_| text()),
            ColumnType::Real => cell.parse().map(SqlValue::Real).unwrap_or_else(|_| text()),
            ColumnType::Text => text(),
        }
    }
}

/// A CSV file held as text: header plus rows of cells.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn read(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let rows = rdr
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(CsvTable { headers, rows })
    }

    /// INTEGER if every non-empty cell is an i64, REAL if every one is a
    /// finite f64, TEXT otherwise. All-empty columns are TEXT.
    pub fn infer_types(&self) -> Vec<ColumnType> {
        (0..self.headers.len())
            .map(|i| {
                let mut cells = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .filter(|c| !c.is_empty())
                    .peekable();
                if cells.peek().is_none() {
                    return ColumnType::Text;
                }
                let cells: Vec<&String> = cells.collect();
                if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
                    ColumnType::Integer
                } else if cells
                    .iter()
                    .all(|c| c.parse::<f64>().map_or(false, f64::is_finite))
                {
                    ColumnType::Real
                } else {
                    ColumnType::Text
                }
            })
            .collect()
    }
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    Ok(conn)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Drop and recreate `table` from `data` inside one transaction.
pub fn replace_table(conn: &mut Connection, table: &str, data: &CsvTable) -> Result<usize> {
    let types = data.infer_types();
    let columns: Vec<String> = data
        .headers
        .iter()
        .zip(&types)
        .map(|(h, t)| format!("{} {}", quote_ident(h), t.sql()))
        .collect();
    let placeholders: Vec<String> = (1..=data.headers.len()).map(|i| format!("?{}", i)).collect();

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {t}; CREATE TABLE {t} ({cols});",
        t = quote_ident(table),
        cols = columns.join(", ")
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(table),
            placeholders.join(", ")
        ))?;
        for row in &data.rows {
            let values = types
                .iter()
                .enumerate()
                .map(|(i, t)| t.value(row.get(i).map(String::as_str).unwrap_or("")));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;
    debug!(table, rows = data.rows.len(), ?types, "table replaced");
    Ok(data.rows.len())
}

/// Load a cleaned CSV into the `trials` table of the database at `db_path`.
/// The connection lives only for this call.
pub fn load_csv(csv_path: &Path, db_path: &Path) -> Result<usize> {
    let data = CsvTable::read(csv_path)?;
    let loaded = {
        let mut conn = connect(db_path)?;
        let result = replace_table(&mut conn, TRIALS_TABLE, &data);
        drop(conn);
        println!("Database connection closed.");
        result?
    };
    info!(rows = loaded, db = ?db_path, "loaded trials");
    Ok(loaded)
}

/// Loader stage: latest cleaned snapshot into the configured database.
pub fn run(settings: &Settings) -> Result<usize> {
    let clean_path = settings.processed_path("clean", LATEST);
    require_input("load", &clean_path)?;
    println!("\nLoading cleaned data from: {}", clean_path.display());
    let db_path = settings.db_path();
    let n = load_csv(&clean_path, &db_path)?;
    println!(
        "Data successfully loaded into the database at: {} ({} rows)",
        db_path.display(),
        n
    );
    Ok(n)
}
