//! Guarded Query Executor
//!
//! Runs read-intent SQL written by the model against the local orders file.
//!
//! The guard is a lowercase substring blocklist, not a parser. It rejects
//! harmless text that happens to contain a listed word and it lets through
//! anything the list does not name (`ATTACH DATABASE`, `PRAGMA`, `REPLACE`,
//! ...). Treat it as a UI guardrail only.

use crate::error::{InsightsError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OpenFlags};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Words that make a query be refused before the database is touched.
pub const BLOCKED_KEYWORDS: [&str; 5] = ["delete", "drop", "update", "insert", "alter"];

/// Single database cell, serialized as the matching plain JSON value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Real(r) => Some(*r),
            _ => None,
        }
    }

    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(r) => Cell::Real(r),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(t) => write!(f, "{}", t),
            Cell::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Column names plus row tuples. Every row is as long as `columns`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Copy of the first `n` rows.
    pub fn head(&self, n: usize) -> QueryResult {
        QueryResult {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)
            .map_err(|e| InsightsError::Io(e.into()))?;
        for row in &self.rows {
            out.write_record(row.iter().map(|cell| match cell {
                Cell::Null => String::new(),
                other => other.to_string(),
            }))
            .map_err(|e| InsightsError::Io(e.into()))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Sidebar data: a few sample rows and the table size.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseOverview {
    pub total_rows: i64,
    pub sample: QueryResult,
}

/// True when the text contains any blocked keyword, in any letter case.
pub fn is_blocked(sql: &str) -> bool {
    let lowered = sql.to_lowercase();
    BLOCKED_KEYWORDS.iter().any(|word| lowered.contains(word))
}

/// Read-only access to the orders file. A connection is opened per call.
#[derive(Debug, Clone)]
pub struct OrderStore {
    path: PathBuf,
}

impl OrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one SQL statement as-is and collect every row into memory.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        if is_blocked(sql) {
            warn!("Dangerous query detected, operation cancelled");
            return Err(InsightsError::BlockedQuery);
        }

        info!("Executing query: {}", sql);
        match self.execute(sql) {
            Ok(result) => {
                info!("{} rows returned", result.row_count());
                Ok(result)
            }
            Err(e) => {
                error!("Query failed: {}", e);
                Err(e)
            }
        }
    }

    /// First `sample_rows` rows of `orders` plus the total row count.
    pub fn overview(&self, sample_rows: usize) -> Result<DatabaseOverview> {
        let conn = self.open()?;
        let sample = collect_rows(&conn, &format!("SELECT * FROM orders LIMIT {}", sample_rows))?;
        let total_rows: i64 =
            conn.query_row("SELECT COUNT(*) AS total FROM orders", [], |row| row.get(0))?;
        Ok(DatabaseOverview { total_rows, sample })
    }

    fn open(&self) -> Result<Connection> {
        // No CREATE flag: a missing file is an error, not a fresh empty database.
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }

    fn execute(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.open()?;
        let result = collect_rows(&conn, sql);
        drop(conn);
        result
    }
}

fn collect_rows(conn: &Connection, sql: &str) -> Result<QueryResult> {
    // Trailing whitespace, `;` and comments are fine; a second statement is not.
    let mut batch = Batch::new(conn, sql);
    let mut stmt = batch
        .next()?
        .ok_or_else(|| InsightsError::Database("no SQL statement to execute".to_string()))?;
    if batch.next()?.is_some() {
        return Err(InsightsError::Database(
            "You can only execute one statement at a time.".to_string(),
        ));
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    if columns.is_empty() {
        // The statement still runs; it just has nothing to report.
        stmt.execute([])?;
        return Err(InsightsError::Database(
            "statement did not produce a result set".to_string(),
        ));
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(Cell::from_value_ref(row.get_ref(idx)?));
        }
        rows.push(cells);
    }

    Ok(QueryResult { columns, rows })
}
