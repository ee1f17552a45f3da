//! Pivot aggregation: (row key, column key) -> mean of a value.
//!
//! Basis of every heatmap. Keys are the sorted distinct observed values;
//! a pair with no contributing rows stays `None` so the renderer can draw
//! a "no data" marker instead of a zero.

use std::collections::BTreeMap;

use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, PivotTable, Table};

/// Mean of `value` for every (`row_key`, `column_key`) pair.
pub fn pivot_mean(
    table: &Table,
    row_key: &str,
    column_key: &str,
    value: &str,
) -> TransformResult<PivotTable> {
    for column in [row_key, column_key, value] {
        if !table.has_column(column) {
            return Err(TransformError::MissingColumn(column.to_string()));
        }
    }

    let mut sums: BTreeMap<(Cell, Cell), (f64, usize)> = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let (Some(r), Some(c)) = (row.get(row_key), row.get(column_key)) else {
            continue;
        };
        if r.is_missing() || c.is_missing() {
            continue;
        }
        let v = row
            .get(value)
            .and_then(Cell::as_f64)
            .ok_or_else(|| TransformError::NotNumeric {
                row: idx + 1,
                column: value.to_string(),
            })?;

        let entry = sums.entry((r.clone(), c.clone())).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    if sums.is_empty() {
        return Err(TransformError::EmptyResult(format!(
            "Pivot of '{}' by '{}' x '{}'",
            value, row_key, column_key
        )));
    }

    let mut rows: Vec<Cell> = sums.keys().map(|(r, _)| r.clone()).collect();
    rows.dedup();
    let mut columns: Vec<Cell> = sums.keys().map(|(_, c)| c.clone()).collect();
    columns.sort();
    columns.dedup();

    let cells = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| {
                    sums.get(&(r.clone(), c.clone()))
                        .map(|(sum, count)| sum / *count as f64)
                })
                .collect()
        })
        .collect();

    Ok(PivotTable {
        row_key: row_key.to_string(),
        column_key: column_key.to_string(),
        value: value.to_string(),
        rows,
        columns,
        cells,
    })
}

/// One pivot per distinct value of `split_by`, in ascending split order.
pub fn pivot_mean_split(
    table: &Table,
    split_by: &str,
    row_key: &str,
    column_key: &str,
    value: &str,
) -> TransformResult<Vec<(Cell, PivotTable)>> {
    if !table.has_column(split_by) {
        return Err(TransformError::MissingColumn(split_by.to_string()));
    }

    let splits = table.distinct(split_by);
    if splits.is_empty() {
        return Err(TransformError::EmptyResult(format!("Split by '{}'", split_by)));
    }

    splits
        .into_iter()
        .map(|split| {
            let subset = table.filter_eq(split_by, &split);
            pivot_mean(&subset, row_key, column_key, value).map(|pivot| (split, pivot))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs() -> Table {
        Table::from_rows(
            &["col1", "col2", "col3"],
            vec![
                vec![Cell::Int(1), Cell::Int(1), Cell::Int(10)],
                vec![Cell::Int(1), Cell::Int(1), Cell::Int(20)],
                vec![Cell::Int(1), Cell::Int(2), Cell::Int(5)],
            ],
        )
    }

    #[test]
    fn test_pivot_mean() {
        let pivot = pivot_mean(&runs(), "col1", "col2", "col3").unwrap();

        assert_eq!(pivot.get(&Cell::Int(1), &Cell::Int(1)), Some(15.0));
        assert_eq!(pivot.get(&Cell::Int(1), &Cell::Int(2)), Some(5.0));
        assert_eq!(pivot.rows, vec![Cell::Int(1)]);
        assert_eq!(pivot.columns, vec![Cell::Int(1), Cell::Int(2)]);
    }

    #[test]
    fn test_integral_float_key_joins_int_key() {
        let table = crate::parser::parse_delimited("a,b,v\n2,1,10\n2.0,1,20\n", ',').unwrap();
        let pivot = pivot_mean(&table, "a", "b", "v").unwrap();

        assert_eq!(pivot.rows.len(), 1);
        assert_eq!(pivot.columns.len(), 1);
        assert_eq!(pivot.get(&Cell::Int(2), &Cell::Int(1)), Some(15.0));
        assert_eq!(pivot.get(&Cell::Float(2.0), &Cell::Int(1)), Some(15.0));
    }

    #[test]
    fn test_missing_pair_is_none() {
        let mut table = runs();
        table.rows.push(
            [
                ("col1".to_string(), Cell::Int(2)),
                ("col2".to_string(), Cell::Int(1)),
                ("col3".to_string(), Cell::Int(7)),
            ]
            .into_iter()
            .collect(),
        );
        let pivot = pivot_mean(&table, "col1", "col2", "col3").unwrap();

        assert_eq!(pivot.get(&Cell::Int(2), &Cell::Int(1)), Some(7.0));
        assert_eq!(pivot.get(&Cell::Int(2), &Cell::Int(2)), None);
        assert_eq!(pivot.value_range(), Some((5.0, 15.0)));
    }

    #[test]
    fn test_keys_sorted() {
        let table = Table::from_rows(
            &["alt", "tasks", "t"],
            vec![
                vec![Cell::Int(9), Cell::Int(30), Cell::Float(1.0)],
                vec![Cell::Int(2), Cell::Int(4), Cell::Float(2.0)],
                vec![Cell::Int(5), Cell::Int(12), Cell::Float(3.0)],
            ],
        );
        let pivot = pivot_mean(&table, "alt", "tasks", "t").unwrap();
        assert_eq!(pivot.rows, vec![Cell::Int(2), Cell::Int(5), Cell::Int(9)]);
        assert_eq!(pivot.columns, vec![Cell::Int(4), Cell::Int(12), Cell::Int(30)]);
    }

    #[test]
    fn test_empty_pivot_is_error() {
        let table = Table::from_rows(&["col1", "col2", "col3"], vec![]);
        let err = pivot_mean(&table, "col1", "col2", "col3").unwrap_err();
        assert!(matches!(err, TransformError::EmptyResult(_)));
    }

    #[test]
    fn test_non_numeric_value() {
        let table = Table::from_rows(
            &["col1", "col2", "col3"],
            vec![vec![Cell::Int(1), Cell::Int(1), Cell::from("slow")]],
        );
        let err = pivot_mean(&table, "col1", "col2", "col3").unwrap_err();
        assert!(matches!(err, TransformError::NotNumeric { row: 1, .. }));
    }

    #[test]
    fn test_split_pivots() {
        let table = Table::from_rows(
            &["threshold", "alt", "tasks", "Score"],
            vec![
                vec![Cell::Int(20), Cell::Int(2), Cell::Int(3), Cell::Float(4.0)],
                vec![Cell::Int(10), Cell::Int(2), Cell::Int(3), Cell::Float(1.0)],
                vec![Cell::Int(10), Cell::Int(2), Cell::Int(3), Cell::Float(3.0)],
            ],
        );
        let pivots = pivot_mean_split(&table, "threshold", "alt", "tasks", "Score").unwrap();

        assert_eq!(pivots.len(), 2);
        assert_eq!(pivots[0].0, Cell::Int(10));
        assert_eq!(pivots[0].1.get(&Cell::Int(2), &Cell::Int(3)), Some(2.0));
        assert_eq!(pivots[1].1.get(&Cell::Int(2), &Cell::Int(3)), Some(4.0));
    }
}
