use serde_json::Value;

use super::split_result;

/// Print just the headline value of the output.
///
/// Looks for well-known KPI fields in priority order; a result that is
/// mostly a record array prints its size instead.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "total_mrr",
        "ltv_to_cac",
        "weighted_ltv",
        "weighted_cac",
        "total_arr",
        "active_customers",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        let (_, records) = split_result(map);
        if let Some((key, arr)) = records.first() {
            println!("{} {}", arr.len(), key);
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
