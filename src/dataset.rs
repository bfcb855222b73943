use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn text(name: &str) -> Self {
        Column { name: name.to_string(), kind: ColumnKind::Text }
    }

    pub fn numeric(name: &str) -> Self {
        Column { name: name.to_string(), kind: ColumnKind::Numeric }
    }
}

/// Handle to a column, resolved once by name via [`Dataset::column_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnId(pub(crate) usize);

/// A finite, non-negative number already rounded, or null.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NumericCell(Option<f64>);

impl NumericCell {
    pub const NULL: NumericCell = NumericCell(None);

    /// Rounds `value` to `precision` decimals. Negative input, or anything
    /// that is not finite once rounded, becomes null.
    pub fn rounded(value: f64, precision: u32) -> Self {
        if value < 0.0 {
            return NumericCell::NULL;
        }
        let r = round_to(value, precision);
        if !r.is_finite() {
            return NumericCell::NULL;
        }
        // -0.0 prints as "-0"
        NumericCell(Some(if r == 0.0 { 0.0 } else { r }))
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    /// Multiplies by `factor` and re-rounds. Null stays null.
    pub fn scaled(self, factor: f64, precision: u32) -> Self {
        match self.0 {
            Some(v) => NumericCell::rounded(v * factor, precision),
            None => NumericCell::NULL,
        }
    }
}

impl fmt::Display for NumericCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => Ok(()),
        }
    }
}

/// Round half away from zero.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(NumericCell),
}

impl Cell {
    fn kind(&self) -> ColumnKind {
        match self {
            Cell::Text(_) => ColumnKind::Text,
            Cell::Number(_) => ColumnKind::Numeric,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(t) => f.write_str(t),
            Cell::Number(n) => fmt::Display::fmt(n, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    cells: Vec<Cell>,
}

impl Record {
    pub fn new(cells: Vec<Cell>) -> Self {
        Record { cells }
    }

    pub fn numeric(&self, id: ColumnId) -> NumericCell {
        match &self.cells[id.0] {
            Cell::Number(n) => *n,
            Cell::Text(_) => NumericCell::NULL,
        }
    }

    pub fn text(&self, id: ColumnId) -> Option<&str> {
        match &self.cells[id.0] {
            Cell::Text(t) => Some(t),
            Cell::Number(_) => None,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Ordered records sharing one fixed, ordered schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Self {
        Dataset { columns, records: Vec::new() }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_id(&self, name: &str) -> Result<ColumnId> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(ColumnId)
            .ok_or_else(|| EtlError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    /// Appends a record after checking it has exactly the schema's columns.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if record.cells.len() != self.columns.len() {
            return Err(EtlError::SchemaMismatch(format!(
                "expected {} cells, got {}",
                self.columns.len(),
                record.cells.len()
            )));
        }
        for (cell, col) in record.cells.iter().zip(&self.columns) {
            if cell.kind() != col.kind {
                return Err(EtlError::SchemaMismatch(format!(
                    "column {} expects {:?}",
                    col.name, col.kind
                )));
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Appends a numeric column; `values` must hold one cell per record.
    pub(crate) fn append_numeric(&mut self, name: &str, values: Vec<NumericCell>) -> Result<()> {
        if values.len() != self.records.len() {
            return Err(EtlError::SchemaMismatch(format!(
                "column {} has {} values for {} records",
                name,
                values.len(),
                self.records.len()
            )));
        }
        self.columns.push(Column::numeric(name));
        for (record, value) in self.records.iter_mut().zip(values) {
            record.cells.push(Cell::Number(value));
        }
        Ok(())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<String> = self.column_names().map(str::to_string).collect();
        let rows: Vec<Vec<String>> = self
            .records
            .iter()
            .map(|r| r.cells.iter().map(|c| c.to_string()).collect())
            .collect();
        f.write_str(&render_table(&headers, &rows))
    }
}

/// Plain text table with an index column, one line per row.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let index_width = rows.len().saturating_sub(1).to_string().len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&" ".repeat(index_width));
    for (h, w) in headers.iter().zip(&widths) {
        out.push_str(&format!("  {:>w$}", h, w = *w));
    }
    out.push('\n');

    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!("{:>w$}", i, w = index_width));
        for (cell, w) in row.iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", cell, w = *w));
        }
        out.push('\n');
    }
    out
}
