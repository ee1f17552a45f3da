//! Derived columns: unit conversions, complexity and log10.
//!
//! Each [`DeriveStep`] is a pure function of existing columns and writes a
//! (possibly new) target column. Steps run in order, so a `log10` step can
//! consume the output of a preceding `power` step.

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, Row, Table};

/// Nanoseconds in one hour.
pub const NANOS_PER_HOUR: f64 = 3.6e12;

/// Bytes in one mebibyte.
pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Named unit conversions found in the harness exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    NanosToHours,
    MicrosToMillis,
    BytesToMebibytes,
}

impl UnitConversion {
    pub fn divisor(&self) -> f64 {
        match self {
            UnitConversion::NanosToHours => NANOS_PER_HOUR,
            UnitConversion::MicrosToMillis => 1000.0,
            UnitConversion::BytesToMebibytes => BYTES_PER_MIB,
        }
    }
}

/// One derived-column computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeriveStep {
    /// `target = column * multiply / divide`
    Scale {
        column: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default = "one")]
        multiply: f64,
        #[serde(default = "one")]
        divide: f64,
    },

    /// Named unit conversion.
    Convert {
        column: String,
        #[serde(default)]
        target: Option<String>,
        unit: UnitConversion,
    },

    /// `target = base ^ exponent`, in floating point.
    Power {
        base: String,
        exponent: String,
        target: String,
    },

    /// `target = log10(column)`; rows with a non-finite result are dropped.
    Log10 { column: String, target: String },
}

fn one() -> f64 {
    1.0
}

impl DeriveStep {
    /// Columns the step reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            DeriveStep::Scale { column, .. }
            | DeriveStep::Convert { column, .. }
            | DeriveStep::Log10 { column, .. } => vec![column.as_str()],
            DeriveStep::Power { base, exponent, .. } => vec![base.as_str(), exponent.as_str()],
        }
    }

    /// Column the step writes.
    pub fn output(&self) -> &str {
        match self {
            DeriveStep::Scale { column, target, .. } | DeriveStep::Convert { column, target, .. } => {
                target.as_deref().unwrap_or(column)
            }
            DeriveStep::Power { target, .. } | DeriveStep::Log10 { target, .. } => target,
        }
    }
}

/// `base ^ exponent` without integer wraparound.
///
/// Realistic task/alternative counts reach 10^15..10^20 configurations;
/// beyond `f64::MAX` the result is +inf and dropped by the log step.
pub fn complexity(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

/// log10 of a complexity, `None` when the result is not finite.
pub fn log_complexity(complexity: f64) -> Option<f64> {
    Some(complexity.log10()).filter(|v| v.is_finite())
}

/// Apply `steps` in order.
pub fn derive(mut table: Table, steps: &[DeriveStep]) -> TransformResult<Table> {
    for step in steps {
        if let Some(missing) = step.inputs().into_iter().find(|c| !table.has_column(c)) {
            return Err(TransformError::MissingColumn(missing.to_string()));
        }
        table = apply_step(table, step)?;
    }
    Ok(table)
}

fn numeric(table_row: &Row, column: &str, row: usize) -> TransformResult<f64> {
    table_row
        .get(column)
        .and_then(Cell::as_f64)
        .ok_or_else(|| TransformError::NotNumeric {
            row,
            column: column.to_string(),
        })
}

fn apply_step(mut table: Table, step: &DeriveStep) -> TransformResult<Table> {
    let target = step.output().to_string();
    table.ensure_column(&target);

    let rows = std::mem::take(&mut table.rows);
    for (idx, mut row) in rows.into_iter().enumerate() {
        let line = idx + 1;
        let value = match step {
            DeriveStep::Scale {
                column,
                multiply,
                divide,
                ..
            } => Some(numeric(&row, column, line)? * multiply / divide),
            DeriveStep::Convert { column, unit, .. } => Some(numeric(&row, column, line)? / unit.divisor()),
            DeriveStep::Power { base, exponent, .. } => Some(complexity(
                numeric(&row, base, line)?,
                numeric(&row, exponent, line)?,
            )),
            DeriveStep::Log10 { column, .. } => log_complexity(numeric(&row, column, line)?),
        };

        // Only log10 yields None: a non-finite row is excluded, not fatal
        if let Some(value) = value {
            row.insert(target.clone(), Cell::Float(value));
            table.rows.push(row);
        }
    }
    Ok(table)
}
