//! In-memory PEtab table and its TSV representation.
//!
//! A [`Table`] is an ordered list of named columns over rows of [`Cell`]s.
//! Cells are typed on read: empty fields stay [`Cell::Empty`], anything that
//! parses as `f64` (including `inf`, `-inf`, `nan`) becomes
//! [`Cell::Number`], everything else is [`Cell::Text`].

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use pt_core::{Error, Result};

/// A single table field.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty field
    Empty,
    /// Numeric field
    Number(f64),
    /// Anything else (ids, formulas, `;`-separated overrides)
    Text(String),
}

impl Cell {
    /// Type a raw TSV field.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        match s.parse::<f64>() {
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(s.to_string()),
        }
    }

    /// Text cell.
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Empty or NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(v) => v.is_nan(),
            Cell::Text(s) => s.is_empty(),
        }
    }

    /// String form used for key comparisons and TSV output.
    pub fn to_key(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(v) => format_number(*v),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::parse(s)
    }
}

/// Canonical text form of a number in written tables.
///
/// Shortest round-trip representation; non-finite values use the spellings
/// PEtab readers accept.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{v:?}")
    }
}

/// Ordered, named columns over rows of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Empty table with the given header.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self { columns: columns.into_iter().map(Into::into).collect(), rows: Vec::new() }
    }

    /// Table from a header and rows; every row must match the header width.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column index, or a validation error naming the missing column.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::Validation(format!("missing required column '{name}'")))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Validation(format!(
                "row has {} fields, header has {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let j = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[j])
    }

    /// All cells of column `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let j = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[j]).collect())
    }

    /// Append a column; `values` must have one entry per row.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::Validation(format!("duplicate column '{name}'")));
        }
        if values.len() != self.rows.len() {
            return Err(Error::Validation(format!(
                "column '{name}' has {} values, table has {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name);
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let j = self.require_column(from)?;
        if self.has_column(to) {
            return Err(Error::Validation(format!("duplicate column '{to}'")));
        }
        self.columns[j] = to.to_string();
        Ok(())
    }

    /// Read a tab-separated file with a header line.
    pub fn read_tsv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        Self::from_tsv_reader(file)
    }

    pub fn from_tsv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(Error::Validation("table has no columns".to_string()));
        }

        let mut table = Self::new(headers);
        for record in rdr.records() {
            let record = record?;
            table.push_row(record.iter().map(Cell::parse).collect())?;
        }
        Ok(table)
    }

    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_tsv_writer(file)
    }

    pub fn to_tsv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::to_key))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// TSV text of this table.
    pub fn to_tsv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_tsv_writer(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Validation(format!("non UTF-8 table: {e}")))
    }
}
