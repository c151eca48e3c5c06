use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaasMetricsError {
    #[error("Missing columns in {table} table: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("Invalid cell in column '{column}' at line {line}: '{value}' — {reason}")]
    InvalidCell {
        column: String,
        line: usize,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SaasMetricsError {
    fn from(e: serde_json::Error) -> Self {
        SaasMetricsError::SerializationError(e.to_string())
    }
}
