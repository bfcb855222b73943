use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use tracing::info;

use crate::dataset::{render_table, Cell, ColumnKind, Dataset};
use crate::error::{EtlError, Result};

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    Ok(conn)
}

/// Table and column names are the only text spliced into SQL; they must be plain identifiers.
pub fn validate_ident(name: &str) -> Result<&str> {
    if IDENT_RE.is_match(name) {
        Ok(name)
    } else {
        Err(EtlError::InvalidIdentifier(name.to_string()))
    }
}

fn quote_ident(name: &str) -> Result<String> {
    Ok(format!("\"{}\"", validate_ident(name)?))
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "TEXT",
        ColumnKind::Numeric => "REAL",
    }
}

fn to_sql_value(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Text(t) => SqlValue::Text(t.clone()),
        Cell::Number(n) => n.value().map_or(SqlValue::Null, SqlValue::Real),
    }
}

// ── Load ──

/// Replaces `table_name` with the dataset's schema and rows in one transaction.
pub fn write_table(conn: &Connection, table_name: &str, dataset: &Dataset) -> Result<usize> {
    let table = quote_ident(table_name)?;
    let columns = dataset
        .columns()
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, sql_type(c.kind))))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} ({});",
        columns.join(", ")
    ))?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
        for record in dataset.records() {
            let values: Vec<SqlValue> = record.cells().iter().map(to_sql_value).collect();
            count += stmt.execute(params_from_iter(values.iter()))?;
        }
    }
    tx.commit()?;

    info!("Loaded {} rows into {}", count, table_name);
    Ok(count)
}

pub fn row_count(conn: &Connection, table_name: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)?);
    let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
    Ok(n as usize)
}

// ── Reports ──

/// A fixed report shape. Only identifiers end up in the SQL text; values are bound.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    SelectAll,
    AtLeast { column: String, min: f64 },
    TopN { columns: Vec<String>, order_by: String, n: usize },
    Average { column: String },
}

impl Report {
    fn statement(&self, table_name: &str) -> Result<(String, Vec<SqlValue>)> {
        let table = quote_ident(table_name)?;
        let stmt = match self {
            Report::SelectAll => (format!("SELECT * FROM {table}"), Vec::new()),
            Report::AtLeast { column, min } => (
                format!("SELECT * FROM {table} WHERE {} >= ?1", quote_ident(column)?),
                vec![SqlValue::Real(*min)],
            ),
            Report::TopN { columns, order_by, n } => {
                let projection = columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                (
                    format!(
                        "SELECT {projection} FROM {table} ORDER BY {} DESC LIMIT ?1",
                        quote_ident(order_by)?
                    ),
                    vec![SqlValue::Integer(*n as i64)],
                )
            }
            Report::Average { column } => (
                format!("SELECT AVG({}) FROM {table}", quote_ident(column)?),
                Vec::new(),
            ),
        };
        Ok(stmt)
    }
}

#[derive(Debug)]
pub struct QueryResult {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

pub fn run_report(conn: &Connection, table_name: &str, report: &Report) -> Result<QueryResult> {
    let (sql, params) = report.statement(table_name)?;
    run_query(conn, &sql, &params)
}

/// Runs one read query. `sql` is built only from pipeline constants.
pub fn run_query(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<std::result::Result<Vec<Vec<SqlValue>>, _>>()?;

    info!("{} -> {} rows", sql, rows.len());
    Ok(QueryResult { sql: sql.to_string(), columns, rows })
}

fn format_value(v: &SqlValue) -> String {
    match v {
        SqlValue::Null => String::new(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(t) => t.clone(),
        SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(format_value).collect())
            .collect();
        writeln!(f, "{}", self.sql)?;
        f.write_str(&render_table(&self.columns, &rows))
    }
}
