//! Domain models for the benchfig pipeline.
//!
//! This module contains the data structures passed between stages:
//!
//! - [`Cell`] - a single raw or cleaned value
//! - [`Table`] - headers plus rows, as produced by the loader
//! - [`PivotTable`] - 2D mean aggregation (heatmaps)
//! - [`GroupedStat`] - min/max/mean per exact group key (range bands)
//! - [`RegressionCurve`] - evaluated log-log polynomial fit
//! - [`Facet`] / [`Series`] - multi-panel comparison data
//! - [`SizeClass`] - feature-model size labels and their ordering

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Cells
// =============================================================================

/// A table value.
///
/// Cells are totally ordered so they can key pivots: `Missing` sorts first,
/// numbers compare numerically (`Int` before `Float` on ties), text last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Infer a cell from a raw text field.
    ///
    /// Only dot-decimal literals become numbers; `"1,5"` stays text so the
    /// cleaner can apply its locale policy explicitly.
    pub fn infer(raw: &str) -> Cell {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Missing;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Int(i);
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_nan() => Cell::Missing,
            Ok(f) => Cell::Float(f),
            Err(_) => Cell::Text(s.to_string()),
        }
    }

    /// Numeric view of the cell, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// True for the harness's invalid-measurement markers: -1 and missing.
    pub fn is_sentinel(&self) -> bool {
        match self {
            Cell::Int(i) => *i == -1,
            Cell::Float(f) => *f == -1.0 || f.is_nan(),
            Cell::Missing => true,
            Cell::Text(_) => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Missing => 0,
            Cell::Int(_) | Cell::Float(_) => 1,
            Cell::Text(_) => 2,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            // Int(2) and Float(2.0) are the same key.
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

// =============================================================================
// Tables
// =============================================================================

/// One table row: column name to value.
pub type Row = BTreeMap<String, Cell>;

/// An in-memory table with ordered headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from headers and positional rows.
    pub fn from_rows(headers: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|cells| headers.iter().cloned().zip(cells).collect())
            .collect();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Register a header if it is new (derived columns).
    pub fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.headers.push(name.to_string());
        }
    }

    /// Rename a header and the matching key in every row.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        for h in self.headers.iter_mut().filter(|h| h.as_str() == from) {
            *h = to.to_string();
        }
        for row in &mut self.rows {
            if let Some(cell) = row.remove(from) {
                row.insert(to.to_string(), cell);
            }
        }
    }

    /// Rows whose `column` equals `value`, as a new table.
    pub fn filter_eq(&self, column: &str, value: &Cell) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.get(column) == Some(value))
                .cloned()
                .collect(),
        }
    }

    /// Sorted distinct values of a column.
    pub fn distinct(&self, column: &str) -> Vec<Cell> {
        let mut values: Vec<Cell> = self
            .rows
            .iter()
            .filter_map(|r| r.get(column).cloned())
            .collect();
        values.sort();
        values.dedup();
        values
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Mean of a value over (row key, column key) pairs.
///
/// `cells[r][c]` is `None` when no row contributed: the "no data" marker,
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_key: String,
    pub column_key: String,
    pub value: String,
    pub rows: Vec<Cell>,
    pub columns: Vec<Cell>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    /// Mean for a (row key, column key) pair.
    pub fn get(&self, row: &Cell, column: &Cell) -> Option<f64> {
        let r = self.rows.iter().position(|c| c == row)?;
        let c = self.columns.iter().position(|k| k == column)?;
        self.cells[r][c]
    }

    /// Smallest and largest defined cell.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Min/max/mean of a value for one exact group key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupedStat {
    pub key: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Evaluated log-log regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionCurve {
    /// Polynomial coefficients in log space, highest power first.
    pub coefficients: Vec<f64>,
    /// `(x, 10^p(x))` at evenly spaced x.
    pub points: Vec<(f64, f64)>,
}

// =============================================================================
// Faceted comparison
// =============================================================================

/// One measurement with its reported error bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub err: f64,
}

/// The points of one category from one source, sorted by x.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub source: String,
    pub category: String,
    pub points: Vec<Point>,
}

/// One panel of a multi-panel figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    pub label: String,
    pub x_domain: (f64, f64),
    pub series: Vec<Series>,
}

/// Feature-model size classes, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Tiny,
    Small,
    Medium,
    Big,
    Huge,
}

impl SizeClass {
    pub const ALL: [SizeClass; 5] = [
        SizeClass::Tiny,
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Big,
        SizeClass::Huge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Tiny => "Tiny",
            SizeClass::Small => "Small",
            SizeClass::Medium => "Medium",
            SizeClass::Big => "Big",
            SizeClass::Huge => "Huge",
        }
    }

    /// Default facet ordering as labels.
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|s| s.as_str().to_string()).collect()
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown size class: {}", s))
    }
}
