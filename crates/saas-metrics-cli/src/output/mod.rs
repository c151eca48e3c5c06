pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Record arrays a result may carry, most important first.
const RECORD_FIELDS: [&str; 5] = ["rows", "points", "cohorts", "years", "prices"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// True for a non-empty array whose first element is an object.
fn is_record_array(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if matches!(arr.first(), Some(Value::Object(_))))
}

/// Split a result object into scalar fields and record arrays. Record arrays
/// come back in [`RECORD_FIELDS`] order, then any others by key.
fn split_result(result: &Map<String, Value>) -> (Vec<(&str, &Value)>, Vec<(&str, &[Value])>) {
    let mut scalars = Vec::new();
    let mut records: Vec<(&str, &[Value])> = Vec::new();
    for (key, val) in result {
        match val {
            Value::Array(arr) if is_record_array(val) => records.push((key.as_str(), arr.as_slice())),
            _ => scalars.push((key.as_str(), val)),
        }
    }
    records.sort_by_key(|(key, _)| {
        RECORD_FIELDS
            .iter()
            .position(|f| f == key)
            .unwrap_or(RECORD_FIELDS.len())
    });
    (scalars, records)
}

/// Column names across every object in `arr`, in first-seen order.
fn record_columns(arr: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for item in arr {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_puts_rows_first() {
        let result = json!({
            "prices": [{"plan": "A"}],
            "plan": {"mrr_source": "explicit"},
            "rows": [{"date": "2024-01-31"}],
            "dropped_rows": []
        });
        let (scalars, records) = split_result(result.as_object().unwrap());
        let names: Vec<&str> = records.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec!["rows", "prices"]);
        assert_eq!(scalars.len(), 2);
    }

    #[test]
    fn test_record_columns_union() {
        let arr = vec![json!({"a": 1, "b": 2}), json!({"a": 3, "c": 4})];
        assert_eq!(record_columns(&arr), vec!["a", "b", "c"]);
    }
}
