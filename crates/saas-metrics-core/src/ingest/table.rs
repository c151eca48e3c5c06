use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// A sheet of string cells under named headers, as exported from a
/// spreadsheet. Rows shorter than the header list read as blank cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TableRepr")]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Either the explicit `{headers, rows}` shape or an array of record objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum TableRepr {
    Grid {
        headers: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<Value>>,
    },
    Records(Vec<Map<String, Value>>),
}

impl From<TableRepr> for RawTable {
    fn from(repr: TableRepr) -> Self {
        match repr {
            TableRepr::Grid { headers, rows } => RawTable {
                headers,
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(cell_text).collect())
                    .collect(),
            },
            TableRepr::Records(records) => RawTable::from_records(&records),
        }
    }
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from JSON record objects. Headers are collected in the
    /// order they are first seen across all records.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of an exact header name.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell text at (row, column), blank when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
