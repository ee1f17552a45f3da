//! Group rows by an exact key and summarize a value per group.
//!
//! This is the data behind the shaded min-max range bands: rows are grouped
//! by a derived key (typically `log10(complexity)`), and each group yields
//! the minimum, maximum and mean of a measurement.
//!
//! # Grouping
//!
//! ```text
//! Flat rows                       →  Grouped statistics
//! ┌──────────────────────┐          ┌──────────────────────────────┐
//! │ key: 1.0, value: 10  │          │ key 1.0: min 10 max 20 μ 15  │
//! │ key: 1.0, value: 20  │    →     ├──────────────────────────────┤
//! │ key: 2.0, value: 30  │          │ key 2.0: min 30 max 30 μ 30  │
//! └──────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! Keys are compared by exact floating-point equality, never binned: two
//! rows share a group only if their keys are bit-identical (with -0.0 folded
//! into 0.0).

use std::collections::HashMap;

use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, GroupedStat, Table};

/// Min/max/mean of `value` per distinct `key`, ascending by key.
pub fn group_min_max_mean(table: &Table, key: &str, value: &str) -> TransformResult<Vec<GroupedStat>> {
    for column in [key, value] {
        if !table.has_column(column) {
            return Err(TransformError::MissingColumn(column.to_string()));
        }
    }

    let mut groups: HashMap<u64, GroupBuilder> = HashMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let numeric = |column: &str| {
            row.get(column)
                .and_then(Cell::as_f64)
                .ok_or_else(|| TransformError::NotNumeric {
                    row: idx + 1,
                    column: column.to_string(),
                })
        };
        // Adding 0.0 folds -0.0 into 0.0 so both share one group
        let k = numeric(key)? + 0.0;
        let v = numeric(value)?;

        groups
            .entry(k.to_bits())
            .or_insert_with(|| GroupBuilder::new(k))
            .add(v);
    }

    if groups.is_empty() {
        return Err(TransformError::EmptyResult(format!(
            "Grouping '{}' by '{}'",
            value, key
        )));
    }

    let mut stats: Vec<GroupedStat> = groups.into_values().map(GroupBuilder::build).collect();
    stats.sort_by(|a, b| a.key.total_cmp(&b.key));
    Ok(stats)
}

/// Groups whose key is at least `lower_bound`.
pub fn at_least(stats: &[GroupedStat], lower_bound: f64) -> Vec<GroupedStat> {
    stats.iter().filter(|s| s.key >= lower_bound).copied().collect()
}

/// Accumulates one group's statistics.
struct GroupBuilder {
    key: f64,
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl GroupBuilder {
    fn new(key: f64) -> Self {
        Self {
            key,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn build(self) -> GroupedStat {
        GroupedStat {
            key: self.key,
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
            count: self.count,
        }
    }
}
