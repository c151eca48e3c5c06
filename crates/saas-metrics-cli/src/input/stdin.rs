use std::io::{self, Read};

use saas_metrics_core::metrics::pipeline::DerivationInput;

/// Read a JSON workbook from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin() -> Result<Option<DerivationInput>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let workbook: DerivationInput = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse workbook from stdin: {}", e))?;
    Ok(Some(workbook))
}
