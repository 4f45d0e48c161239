use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{types::Value as SqlValue, Connection, OpenFlags};

use crate::error::require_input;
use crate::settings::Settings;

pub struct ReportQuery {
    pub title: &'static str,
    pub sql: &'static str,
}

pub const REPORTS: [ReportQuery; 4] = [
    ReportQuery {
        title: "Trials by Phase",
        sql: "SELECT phase, COUNT(*) AS trials
FROM trials
GROUP BY phase
ORDER BY trials DESC;",
    },
    ReportQuery {
        title: "Trials by Status",
        sql: "SELECT overall_status, COUNT(*) AS trials
FROM trials
GROUP BY overall_status
ORDER BY trials DESC;",
    },
    ReportQuery {
        title: "Trials by Start Year",
        sql: "SELECT start_year, COUNT(*) AS trials
FROM trials
GROUP BY start_year
ORDER BY start_year;",
    },
    ReportQuery {
        title: "Top 10 Sponsors by Number of Trials",
        sql: "SELECT lead_sponsor, COUNT(*) AS trials
FROM trials
WHERE lead_sponsor IS NOT NULL
GROUP BY lead_sponsor
ORDER BY trials DESC
LIMIT 10;",
    },
];

/// Every row a query returned, as SQLite values.
pub fn fetch_rows(conn: &Connection, sql: &str) -> Result<Vec<Vec<SqlValue>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<Result<Vec<Vec<SqlValue>>, _>>()?;
    Ok(rows)
}

fn render_value(v: &SqlValue) -> String {
    match v {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
        SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Tuple-style rendering of one result row: `('Completed', 12)`.
pub fn render_row(row: &[SqlValue]) -> String {
    let cells: Vec<String> = row.iter().map(render_value).collect();
    format!("({})", cells.join(", "))
}

/// Printed lines for one report: header, SQL, rule, up to `limit` rows and
/// a truncation notice.
pub fn render_report(query: &ReportQuery, rows: &[Vec<SqlValue>], limit: usize) -> Vec<String> {
    let mut out = vec![format!("\n=== {} ===", query.title), query.sql.to_string(), "-".repeat(60)];
    out.extend(rows.iter().take(limit).map(|r| render_row(r)));
    if rows.len() > limit {
        out.push(format!("...({} rows total, showing first {})", rows.len(), limit));
    }
    out
}

fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .with_context(|| format!("Failed to open {:?}", path))
}

/// Query runner stage. Each report opens and releases its own connection.
pub fn run(settings: &Settings) -> Result<()> {
    let db_path = settings.db_path();
    require_input("query", &db_path)?;
    for query in &REPORTS {
        let rows = {
            let conn = open_read_only(&db_path)?;
            fetch_rows(&conn, query.sql).with_context(|| format!("query failed: {}", query.title))?
        };
        for line in render_report(query, &rows, settings.preview_rows) {
            println!("{}", line);
        }
    }
    Ok(())
}
