//! Cleaner: turns a raw harness table into one safe to aggregate.
//!
//! Steps run in a fixed order for every row:
//!
//! 1. drop rows with a sentinel (-1 or missing) in a relevant column
//! 2. normalize comma-decimal strings to floats ([`OnParseFailure`] policy)
//! 3. cast designated columns to integers
//! 4. replace categorical codes with labels ([`LabelMapping`])
//! 5. drop rows with a non-positive value in a positive-only column
//!
//! Sentinel removal runs before any coercion so a `-1` or an empty field
//! can never turn into a plausible number.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CleanError, CleanResult};
use crate::logs::log_warning;
use crate::models::{Cell, Row, Table};

/// What to do when a locale decimal cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnParseFailure {
    /// Substitute 0.0 (the harness exports leave error bounds empty).
    #[default]
    Zero,
    /// Fail the clean with [`CleanError::Parse`].
    Error,
    /// Drop the row.
    Skip,
}

/// How mapping keys are compared against cell values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The stringified cell equals the key (`1` matches code `1`).
    #[default]
    Exact,
    /// The file name part of a path-valued cell contains the key.
    FileNameContains,
    /// The key is a regular expression matched against the cell.
    Pattern,
}

/// Code-to-label table for one categorical column.
///
/// Values without a matching key pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub column: String,
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl LabelMapping {
    pub fn exact(column: &str, pairs: &[(&str, &str)]) -> Self {
        Self::with_mode(column, pairs, MatchMode::Exact)
    }

    pub fn file_name_contains(column: &str, pairs: &[(&str, &str)]) -> Self {
        Self::with_mode(column, pairs, MatchMode::FileNameContains)
    }

    fn with_mode(column: &str, pairs: &[(&str, &str)], match_mode: MatchMode) -> Self {
        Self {
            column: column.to_string(),
            mapping: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            match_mode,
        }
    }
}

/// Cleaning rules for one input source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanSpec {
    /// Columns checked for sentinels; `None` checks every column.
    #[serde(default)]
    pub sentinel_columns: Option<Vec<String>>,

    /// Columns holding comma-decimal strings
    #[serde(default)]
    pub locale_decimal: Vec<String>,

    #[serde(default)]
    pub on_parse_failure: OnParseFailure,

    /// Columns cast to integers
    #[serde(default)]
    pub integer: Vec<String>,

    #[serde(default)]
    pub labels: Vec<LabelMapping>,

    /// Columns that must be strictly positive (e.g. later fed to log10)
    #[serde(default)]
    pub positive: Vec<String>,
}

impl CleanSpec {
    /// Every column the rules refer to.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self
            .sentinel_columns
            .iter()
            .flatten()
            .chain(&self.locale_decimal)
            .chain(&self.integer)
            .chain(self.labels.iter().map(|m| &m.column))
            .chain(&self.positive)
            .map(String::as_str)
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

/// A mapping with its patterns compiled once per clean.
struct CompiledMapping<'a> {
    spec: &'a LabelMapping,
    patterns: Vec<(Regex, &'a str)>,
}

impl<'a> CompiledMapping<'a> {
    fn new(spec: &'a LabelMapping) -> CleanResult<Self> {
        let patterns = match spec.match_mode {
            MatchMode::Pattern => spec
                .mapping
                .iter()
                .map(|(pattern, label)| {
                    Regex::new(pattern)
                        .map(|re| (re, label.as_str()))
                        .map_err(|e| CleanError::InvalidPattern {
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        })
                })
                .collect::<CleanResult<Vec<_>>>()?,
            _ => Vec::new(),
        };
        Ok(Self { spec, patterns })
    }

    fn apply(&self, cell: &Cell) -> Cell {
        let raw = cell.to_string();
        let label = match self.spec.match_mode {
            MatchMode::Exact => self.spec.mapping.get(&raw).map(String::as_str),
            MatchMode::FileNameContains => {
                let name = file_name(&raw);
                self.spec
                    .mapping
                    .iter()
                    .find(|(key, _)| name.contains(key.as_str()))
                    .map(|(_, label)| label.as_str())
            }
            MatchMode::Pattern => self
                .patterns
                .iter()
                .find(|(re, _)| re.is_match(&raw))
                .map(|(_, label)| *label),
        };
        match label {
            Some(label) => Cell::Text(label.to_string()),
            None => cell.clone(),
        }
    }
}

/// Last path component, accepting both separators.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parse a possibly comma-decimal cell as a float.
pub fn parse_locale_decimal(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Int(i) => Some(*i as f64),
        Cell::Float(f) if f.is_nan() => None,
        Cell::Float(f) => Some(*f),
        Cell::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|f| !f.is_nan()),
        Cell::Missing => None,
    }
}

/// Cast a cell to an integer, truncating fractional values.
pub fn cast_integer(cell: &Cell) -> Option<i64> {
    let truncate = |f: f64| f.is_finite().then(|| f.trunc() as i64);
    match cell {
        Cell::Int(i) => Some(*i),
        Cell::Float(f) => truncate(*f),
        Cell::Text(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_locale_decimal(cell).and_then(truncate)),
        Cell::Missing => None,
    }
}

/// Clean `table` according to `spec`, returning a new table.
pub fn clean(table: &Table, spec: &CleanSpec) -> CleanResult<Table> {
    if let Some(missing) = spec
        .referenced_columns()
        .into_iter()
        .find(|c| !table.has_column(c))
    {
        return Err(CleanError::MissingColumn(missing.to_string()));
    }

    let relevant: Vec<&str> = match &spec.sentinel_columns {
        Some(columns) => columns.iter().map(String::as_str).collect(),
        None => table.headers.iter().map(String::as_str).collect(),
    };
    let mappings = spec
        .labels
        .iter()
        .map(CompiledMapping::new)
        .collect::<CleanResult<Vec<_>>>()?;

    let mut cleaned = Table::new(table.headers.clone());
    // column -> rows whose value was replaced by 0.0
    let mut zero_filled: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        if let Some(row) = clean_row(idx + 1, row, spec, &relevant, &mappings, &mut zero_filled)? {
            cleaned.rows.push(row);
        }
    }

    for (column, rows) in &zero_filled {
        log_warning(format!(
            "Column '{}': {} value(s) not a number, using 0.0 (first at row {})",
            column,
            rows.len(),
            rows[0]
        ));
    }
    Ok(cleaned)
}

/// Returns `None` when the row is filtered out.
fn clean_row(
    line: usize,
    row: &Row,
    spec: &CleanSpec,
    relevant: &[&str],
    mappings: &[CompiledMapping<'_>],
    zero_filled: &mut BTreeMap<String, Vec<usize>>,
) -> CleanResult<Option<Row>> {
    // 1. Sentinels, before any coercion
    if relevant
        .iter()
        .any(|c| row.get(*c).map_or(true, Cell::is_sentinel))
    {
        return Ok(None);
    }

    let mut row = row.clone();

    // 2. Locale decimals
    for column in &spec.locale_decimal {
        let cell = row.get(column).cloned().unwrap_or(Cell::Missing);
        let value = match parse_locale_decimal(&cell) {
            Some(v) => v,
            None => match spec.on_parse_failure {
                OnParseFailure::Zero => {
                    zero_filled.entry(column.clone()).or_default().push(line);
                    0.0
                }
                OnParseFailure::Skip => return Ok(None),
                OnParseFailure::Error => {
                    return Err(CleanError::Parse {
                        row: line,
                        column: column.clone(),
                        value: cell.to_string(),
                    })
                }
            },
        };
        row.insert(column.clone(), Cell::Float(value));
    }

    // 3. Integer casts
    for column in &spec.integer {
        let cell = row.get(column).cloned().unwrap_or(Cell::Missing);
        let value = cast_integer(&cell).ok_or_else(|| CleanError::Type {
            row: line,
            column: column.clone(),
            value: cell.to_string(),
        })?;
        row.insert(column.clone(), Cell::Int(value));
    }

    // 4. Labels
    for mapping in mappings {
        if let Some(cell) = row.get_mut(&mapping.spec.column) {
            *cell = mapping.apply(cell);
        }
    }

    // 5. Strictly positive inputs
    let non_positive = spec
        .positive
        .iter()
        .any(|c| !row.get(c).and_then(Cell::as_f64).is_some_and(|v| v > 0.0));
    if non_positive {
        return Ok(None);
    }

    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_table(rows: Vec<Vec<Cell>>) -> Table {
        Table::from_rows(&["a", "b", "c"], rows)
    }

    #[test]
    fn test_sentinel_rows_dropped() {
        let table = abc_table(vec![
            vec![Cell::Int(-1), Cell::Int(5), Cell::Int(10)],
            vec![Cell::Int(2), Cell::Int(5), Cell::Int(10)],
        ]);
        let spec = CleanSpec {
            sentinel_columns: Some(vec!["a".into()]),
            ..Default::default()
        };

        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.rows[0]["a"], Cell::Int(2));
        assert_eq!(cleaned.rows[0]["b"], Cell::Int(5));
        assert_eq!(cleaned.rows[0]["c"], Cell::Int(10));
    }

    #[test]
    fn test_all_columns_relevant_by_default() {
        let table = abc_table(vec![
            vec![Cell::Int(1), Cell::Missing, Cell::Int(3)],
            vec![Cell::Int(1), Cell::Int(2), Cell::Float(-1.0)],
            vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)],
        ]);
        let cleaned = clean(&table, &CleanSpec::default()).unwrap();
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn test_non_relevant_sentinel_kept() {
        let table = abc_table(vec![vec![Cell::Int(1), Cell::Int(-1), Cell::Int(3)]]);
        let spec = CleanSpec {
            sentinel_columns: Some(vec!["a".into()]),
            ..Default::default()
        };
        assert_eq!(clean(&table, &spec).unwrap().len(), 1);
    }

    #[test]
    fn test_input_not_mutated() {
        let table = abc_table(vec![vec![Cell::from("1,5"), Cell::Int(1), Cell::Int(1)]]);
        let spec = CleanSpec {
            locale_decimal: vec!["a".into()],
            ..Default::default()
        };
        let before = table.clone();
        let _ = clean(&table, &spec).unwrap();
        assert_eq!(table, before);
    }

    #[test]
    fn test_locale_decimal_normalization() {
        assert_eq!(parse_locale_decimal(&Cell::from("1,5")), Some(1.5));
        assert_eq!(parse_locale_decimal(&Cell::from("abc")), None);
        assert_eq!(parse_locale_decimal(&Cell::Int(3)), Some(3.0));

        let table = abc_table(vec![
            vec![Cell::from("1,5"), Cell::Int(1), Cell::Int(1)],
            vec![Cell::from("abc"), Cell::Int(1), Cell::Int(1)],
        ]);
        let spec = CleanSpec {
            locale_decimal: vec!["a".into()],
            ..Default::default()
        };
        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.rows[0]["a"], Cell::Float(1.5));
        assert_eq!(cleaned.rows[1]["a"], Cell::Float(0.0));
    }

    #[test]
    fn test_parse_failure_policies() {
        let table = abc_table(vec![
            vec![Cell::from("abc"), Cell::Int(1), Cell::Int(1)],
            vec![Cell::from("2,5"), Cell::Int(1), Cell::Int(1)],
        ]);

        let skip = CleanSpec {
            locale_decimal: vec!["a".into()],
            on_parse_failure: OnParseFailure::Skip,
            ..Default::default()
        };
        let cleaned = clean(&table, &skip).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.rows[0]["a"], Cell::Float(2.5));

        let strict = CleanSpec {
            on_parse_failure: OnParseFailure::Error,
            ..skip
        };
        let err = clean(&table, &strict).unwrap_err();
        assert!(matches!(err, CleanError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_zero_fill_is_reported() {
        use crate::logs::{LogLevel, LOG_SINK};

        LOG_SINK.set_quiet(true);
        let table = Table::from_rows(
            &["Score Error (zero fill)", "b"],
            vec![
                vec![Cell::from("1,5"), Cell::Int(1)],
                vec![Cell::from("n/a"), Cell::Int(1)],
                vec![Cell::from("?"), Cell::Int(1)],
            ],
        );
        let spec = CleanSpec {
            locale_decimal: vec!["Score Error (zero fill)".into()],
            ..Default::default()
        };
        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.rows[1]["Score Error (zero fill)"], Cell::Float(0.0));

        let warning = LOG_SINK
            .entries()
            .into_iter()
            .rev()
            .find(|e| e.message.starts_with("Column 'Score Error (zero fill)'"))
            .expect("zero fill warning");
        assert_eq!(warning.level, LogLevel::Warning);
        assert_eq!(
            warning.message,
            "Column 'Score Error (zero fill)': 2 value(s) not a number, using 0.0 (first at row 2)"
        );
    }

    #[test]
    fn test_integer_cast() {
        assert_eq!(cast_integer(&Cell::Float(7.9)), Some(7));
        assert_eq!(cast_integer(&Cell::from("12")), Some(12));
        assert_eq!(cast_integer(&Cell::from("3,0")), Some(3));
        assert_eq!(cast_integer(&Cell::from("many")), None);

        let table = abc_table(vec![vec![Cell::Int(1), Cell::from("many"), Cell::Int(1)]]);
        let spec = CleanSpec {
            integer: vec!["b".into()],
            ..Default::default()
        };
        let err = clean(&table, &spec).unwrap_err();
        assert!(matches!(err, CleanError::Type { ref column, .. } if column == "b"));
    }

    #[test]
    fn test_exact_mapping_with_identity_fallback() {
        let table = abc_table(vec![
            vec![Cell::Int(1), Cell::Int(1), Cell::Int(1)],
            vec![Cell::Int(9), Cell::Int(1), Cell::Int(1)],
        ]);
        let spec = CleanSpec {
            labels: vec![LabelMapping::exact("a", &[("1", "Country Side"), ("2", "Small City")])],
            ..Default::default()
        };
        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.rows[0]["a"], Cell::from("Country Side"));
        assert_eq!(cleaned.rows[1]["a"], Cell::Int(9));
    }

    #[test]
    fn test_file_name_mapping() {
        let table = abc_table(vec![vec![
            Cell::from("/data/fms/FM_BenchmarkGraph_6_Services_NoExcludes_4.096_configs.json"),
            Cell::Int(1),
            Cell::Int(1),
        ]]);
        let spec = CleanSpec {
            labels: vec![LabelMapping::file_name_contains(
                "a",
                &[("FM_BenchmarkGraph_6_Services_NoExcludes_4.096_configs.json", "Tiny")],
            )],
            ..Default::default()
        };
        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.rows[0]["a"], Cell::from("Tiny"));
    }

    #[test]
    fn test_pattern_mapping() {
        let table = abc_table(vec![vec![Cell::from("EdgeNodes_Highway.json"), Cell::Int(1), Cell::Int(1)]]);
        let mut mapping = LabelMapping::exact("a", &[(r"Highway\.json$", "Highway")]);
        mapping.match_mode = MatchMode::Pattern;
        let spec = CleanSpec {
            labels: vec![mapping],
            ..Default::default()
        };
        assert_eq!(clean(&table, &spec).unwrap().rows[0]["a"], Cell::from("Highway"));

        let mut broken = LabelMapping::exact("a", &[("(", "x")]);
        broken.match_mode = MatchMode::Pattern;
        let spec = CleanSpec {
            labels: vec![broken],
            ..Default::default()
        };
        assert!(matches!(clean(&table, &spec), Err(CleanError::InvalidPattern { .. })));
    }

    #[test]
    fn test_positive_filter() {
        let table = abc_table(vec![
            vec![Cell::Int(0), Cell::Int(1), Cell::Int(1)],
            vec![Cell::Int(3), Cell::Int(1), Cell::Int(1)],
        ]);
        let spec = CleanSpec {
            positive: vec!["a".into()],
            ..Default::default()
        };
        let cleaned = clean(&table, &spec).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.rows[0]["a"], Cell::Int(3));
    }

    #[test]
    fn test_missing_column_rejected() {
        let table = abc_table(vec![]);
        let spec = CleanSpec {
            integer: vec!["Param: _Tasks".into()],
            ..Default::default()
        };
        let err = clean(&table, &spec).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(ref c) if c == "Param: _Tasks"));
    }
}
