//! Table loader for benchmark harness exports.
//!
//! Reads delimited text (with encoding and delimiter auto-detection) and
//! spreadsheet workbooks into a [`Table`]. Loading is all-or-nothing: any
//! read or decode failure returns an error and no partial table.

use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};
use crate::models::{Cell, Table};

/// Extensions loaded as spreadsheets when the format is `auto`.
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// How to decode an input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputFormat {
    /// Pick by file extension.
    #[default]
    Auto,
    /// Delimiter-separated text. `None` auto-detects the delimiter.
    Delimited {
        #[serde(default)]
        delimiter: Option<char>,
    },
    /// Spreadsheet workbook. `None` reads the first sheet.
    Spreadsheet {
        #[serde(default)]
        sheet: Option<String>,
    },
}

/// One input file plus how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub path: PathBuf,

    #[serde(default)]
    pub format: InputFormat,

    /// Header renames applied after loading (literal harness name -> new name)
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

impl InputSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: InputFormat::Auto,
            rename: BTreeMap::new(),
        }
    }

    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Result of parsing delimited text with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Load the table described by `input`, applying its header renames.
pub fn load_table(input: &InputSpec) -> LoadResult<Table> {
    let path = input.path.as_path();
    let mut table = match resolve_format(path, &input.format) {
        (true, sheet) => load_spreadsheet(path, sheet.as_deref())?,
        (false, _) => {
            let delimiter = match input.format {
                InputFormat::Delimited { delimiter } => delimiter,
                _ => None,
            };
            load_delimited(path, delimiter)?.table
        }
    };

    for (from, to) in &input.rename {
        table.rename_column(from, to);
    }
    Ok(table)
}

/// Whether to read `path` as a spreadsheet, and which sheet.
fn resolve_format(path: &Path, format: &InputFormat) -> (bool, Option<String>) {
    match format {
        InputFormat::Auto => (is_spreadsheet(path), None),
        InputFormat::Delimited { .. } => (false, None),
        InputFormat::Spreadsheet { sheet } => (true, sheet.clone()),
    }
}

/// Whether the file extension names a spreadsheet workbook.
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text into a table.
///
/// Quoted fields are honored; short rows are padded with missing cells and
/// surplus fields are ignored.
pub fn parse_delimited(content: &str, delimiter: char) -> Result<Table, String> {
    if !delimiter.is_ascii() {
        return Err(format!("Delimiter '{}' is not a single-byte character", delimiter));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("Cannot read header: {}", e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err("No headers found".to_string());
    }

    let mut table = Table::new(headers);
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("Line {}: {}", idx + 2, e))?;
        let row = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).map(Cell::infer).unwrap_or(Cell::Missing);
                (header.clone(), cell)
            })
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}

/// Parse delimited bytes, detecting the encoding and (if not given) the delimiter.
pub fn parse_delimited_bytes(bytes: &[u8], delimiter: Option<char>) -> Result<ParseResult, String> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("Empty file".to_string());
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(content));

    Ok(ParseResult {
        table: parse_delimited(content, delimiter)?,
        encoding,
        delimiter,
    })
}

/// Load a delimited text file.
pub fn load_delimited(path: &Path, delimiter: Option<char>) -> LoadResult<ParseResult> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_delimited_bytes(&bytes, delimiter).map_err(|message| LoadError::parse(path, message))
}

/// Load a spreadsheet sheet (the first one unless `sheet` names another).
pub fn load_spreadsheet(path: &Path, sheet: Option<&str>) -> LoadResult<Table> {
    std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::parse(path, e.to_string()))?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| LoadError::parse(path, "Workbook has no sheets"))?,
    }
    .map_err(|e| LoadError::parse(path, e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| LoadError::parse(path, "Sheet is empty"))?
        .iter()
        .map(|d| d.to_string().trim().to_string())
        .collect();

    let mut table = Table::new(headers);
    for data in rows {
        if data.iter().all(|d| matches!(d, Data::Empty)) {
            continue;
        }
        let row = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = data.get(i).map(cell_from_data).unwrap_or(Cell::Missing);
                (header.clone(), cell)
            })
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}

/// Spreadsheets store every number as a float; integral values become `Int`
/// so codes and sentinels compare the same as in delimited exports.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) if f.is_nan() => Cell::Missing,
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) => Cell::infer(s),
        Data::Empty | Data::Error(_) => Cell::Missing,
        other => Cell::Text(other.to_string()),
    }
}
