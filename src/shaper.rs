//! Component F — Row Shaper.
//!
//! Builds the NDJSON-ready map for one row from the assembler's projection
//! provenance (§4.5) and the backend's already-decoded column values
//! (§4.6). Disambiguation works on request-time provenance rather than
//! driver-reported per-column source tables, which `sqlx` doesn't expose.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::assembler::ColumnProvenance;
use crate::error::AppError;
use crate::registry::DecodedColumn;

/// Shapes one decoded row into a JSON object. `projection` and `columns`
/// must be the same length and in the same order (one entry per output
/// column).
pub fn shape_row(
    projection: &[ColumnProvenance],
    columns: Vec<DecodedColumn>,
) -> Result<Value, AppError> {
    if projection.len() != columns.len() {
        return Err(AppError::internal(
            "row shaper received a projection/column-count mismatch",
        ));
    }

    let mut seen_base = HashSet::new();
    let mut object = Map::with_capacity(columns.len());

    for (provenance, decoded) in projection.iter().zip(columns.into_iter()) {
        let key = if seen_base.insert(provenance.column.to_ascii_lowercase()) {
            provenance.column.clone()
        } else {
            format!("{}_{}", provenance.qualifier, provenance.column)
        };
        object.insert(key, decoded.value);
    }

    Ok(Value::Object(object))
}

/// Serializes a shaped row as one NDJSON line (no trailing newline).
pub fn to_ndjson_line(row: &Value, pretty: bool) -> Result<String, AppError> {
    if pretty {
        serde_json::to_string_pretty(row)
    } else {
        serde_json::to_string(row)
    }
    .map_err(|e| AppError::internal(format!("failed to serialize row: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance(qualifier: &str, column: &str) -> ColumnProvenance {
        ColumnProvenance {
            qualifier: qualifier.to_string(),
            column: column.to_string(),
        }
    }

    fn decoded(name: &str, value: Value) -> DecodedColumn {
        DecodedColumn {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn first_occurrence_keeps_bare_key() {
        let projection = vec![provenance("users", "id"), provenance("users", "name")];
        let columns = vec![decoded("id", Value::from(1)), decoded("name", Value::from("Alice"))];
        let row = shape_row(&projection, columns).unwrap();
        assert_eq!(row["id"], Value::from(1));
        assert_eq!(row["name"], Value::from("Alice"));
    }

    #[test]
    fn second_occurrence_of_same_column_is_disambiguated_by_qualifier() {
        let projection = vec![provenance("u", "id"), provenance("p", "id")];
        let columns = vec![decoded("id", Value::from(1)), decoded("id", Value::from(2))];
        let row = shape_row(&projection, columns).unwrap();
        assert_eq!(row["id"], Value::from(1));
        assert_eq!(row["p_id"], Value::from(2));
        assert!(row.get("u_id").is_none());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let projection = vec![provenance("users", "id")];
        let columns = vec![decoded("id", Value::from(1)), decoded("name", Value::from("x"))];
        assert!(shape_row(&projection, columns).is_err());
    }

    #[test]
    fn pretty_flag_controls_formatting() {
        let row = serde_json::json!({"a": 1});
        let compact = to_ndjson_line(&row, false).unwrap();
        let pretty = to_ndjson_line(&row, true).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
    }
}
