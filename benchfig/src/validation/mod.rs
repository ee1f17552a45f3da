//! JSON Schema validation for figure job files.
//!
//! Job files are validated as raw JSON before serde sees them, so a user gets
//! every problem in one pass (missing keys, unknown figure types, bad enum
//! values) instead of serde's first-error-only message.
//!
//! # Embedded Schema
//!
//! The schema is embedded at compile time from `schemas/figure-job.json`
//! (JSON Schema Draft 7).
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use benchfig::validation::{is_valid_job, validate_job};
//!
//! let job = json!({
//!     "name": "pivot",
//!     "output": "out.svg",
//!     "figure": {
//!         "type": "heatmap",
//!         "source": { "input": { "path": "results.csv" } },
//!         "row_key": "a",
//!         "column_key": "b",
//!         "value": "c"
//!     }
//! });
//! assert!(is_valid_job(&job));
//!
//! let broken = json!({ "name": "pivot", "figure": { "type": "pie" } });
//! assert!(validate_job(&broken).is_err());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

/// The figure job schema.
pub static JOB_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/figure-job.json")).expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// Returns every validation message, or a single message when the schema
/// itself is invalid.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one figure job.
pub fn validate_job(data: &Value) -> Result<(), Vec<String>> {
    validate(&JOB_SCHEMA, data)
}

/// Quick check of one figure job.
pub fn is_valid_job(data: &Value) -> bool {
    is_valid(&JOB_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heatmap_job() -> Value {
        json!({
            "name": "threshold",
            "output": "Heatmap-Threshold_{split}.svg",
            "figure": {
                "type": "heatmap",
                "source": {
                    "input": { "path": "result.csv", "format": { "type": "delimited", "delimiter": "," } },
                    "clean": { "locale_decimal": ["Score"], "integer": ["Param: _Thresholds"] },
                    "derive": [{ "type": "convert", "column": "Score", "unit": "micros_to_millis" }]
                },
                "row_key": "Param: _Alternatives",
                "column_key": "Param: _Tasks",
                "value": "Score",
                "split_by": "Param: _Thresholds"
            }
        })
    }

    #[test]
    fn test_valid_job() {
        assert!(is_valid_job(&heatmap_job()));
        assert!(validate_job(&heatmap_job()).is_ok());
    }

    #[test]
    fn test_missing_figure_fields() {
        let mut job = heatmap_job();
        job["figure"].as_object_mut().unwrap().remove("row_key");
        let errors = validate_job(&job).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("row_key")));
    }

    #[test]
    fn test_unknown_enums() {
        let mut job = heatmap_job();
        job["figure"]["source"]["clean"]["on_parse_failure"] = json!("ignore");
        job["figure"]["source"]["derive"][0]["unit"] = json!("furlongs");
        let errors = validate_job(&job).unwrap_err();
        assert!(errors.len() >= 2);
        assert!(errors.iter().any(|e| e.contains("ignore")));
        assert!(errors.iter().any(|e| e.contains("furlongs")));
    }

    #[test]
    fn test_unknown_figure_type() {
        let job = json!({ "name": "x", "output": "x.svg", "figure": { "type": "pie" } });
        assert!(!is_valid_job(&job));
    }

    #[test]
    fn test_facet_layout_required() {
        let job = json!({
            "name": "online",
            "output": "Figure7.svg",
            "figure": {
                "type": "faceted_comparison",
                "sources": [{
                    "label": "FM4MC",
                    "source": { "input": { "path": "online.xlsx" } },
                    "category_column": "Param: _EdgeIndex"
                }]
            }
        });
        let errors = validate_job(&job).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("layout")));
    }
}
