use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::table::RawTable;

/// Parenthetical annotations: "(optional)", "(€)", "(inferred €)", "(optional €)".
static ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\(\s*(?:optional|inferred)?\s*[€$£%]?\s*(?:optional)?\s*\)")
        .expect("valid regex")
});

/// Bare unit markers left after annotations are removed.
static UNIT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[€$£%]").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Canonical columns
// ---------------------------------------------------------------------------

/// Every column the pipeline understands, across the Data and Prices sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Date,
    Plan,
    NewCustomers,
    LostCustomers,
    ActiveCustomers,
    RealMrr,
    CalculatedMrr,
    Cac,
    SalesMarketingSpend,
    CustomerId,
    NewMrr,
    ExpansionMrr,
    ChurnedMrr,
    DowngradedMrr,
    PriceMrr,
    GrossMargin,
}

/// Columns the Data sheet cannot do without.
pub const REQUIRED_DATA_COLUMNS: [Column; 4] = [
    Column::Date,
    Column::Plan,
    Column::NewCustomers,
    Column::LostCustomers,
];

/// Historical header spellings, compared after cleaning and lowercasing.
const ALIASES: &[(&str, Column)] = &[
    ("period", Column::Date),
    ("plan name", Column::Plan),
    ("tier", Column::Plan),
    ("new logos", Column::NewCustomers),
    ("lost logos", Column::LostCustomers),
    ("churned customers", Column::LostCustomers),
    ("active", Column::ActiveCustomers),
    ("mrr", Column::RealMrr),
    ("actual mrr", Column::RealMrr),
    ("calculated mrr", Column::CalculatedMrr),
    ("cac optional", Column::Cac),
    ("sales and marketing spend", Column::SalesMarketingSpend),
    ("s&m spend", Column::SalesMarketingSpend),
    ("customerid", Column::CustomerId),
    ("client id", Column::CustomerId),
    ("id", Column::CustomerId),
    ("downgrade mrr", Column::DowngradedMrr),
    ("contraction mrr", Column::DowngradedMrr),
    ("price", Column::PriceMrr),
    ("gm", Column::GrossMargin),
];

impl Column {
    pub const ALL: [Column; 16] = [
        Column::Date,
        Column::Plan,
        Column::NewCustomers,
        Column::LostCustomers,
        Column::ActiveCustomers,
        Column::RealMrr,
        Column::CalculatedMrr,
        Column::Cac,
        Column::SalesMarketingSpend,
        Column::CustomerId,
        Column::NewMrr,
        Column::ExpansionMrr,
        Column::ChurnedMrr,
        Column::DowngradedMrr,
        Column::PriceMrr,
        Column::GrossMargin,
    ];

    /// Canonical header text.
    pub fn header(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Plan => "Plan",
            Self::NewCustomers => "New Customers",
            Self::LostCustomers => "Lost Customers",
            Self::ActiveCustomers => "Active Customers",
            Self::RealMrr => "Real MRR",
            Self::CalculatedMrr => "MRR Calculated",
            Self::Cac => "CAC",
            Self::SalesMarketingSpend => "Sales & Marketing Spend",
            Self::CustomerId => "Customer ID",
            Self::NewMrr => "New MRR",
            Self::ExpansionMrr => "Expansion MRR",
            Self::ChurnedMrr => "Churned MRR",
            Self::DowngradedMrr => "Downgraded MRR",
            Self::PriceMrr => "Price MRR",
            Self::GrossMargin => "Gross Margin",
        }
    }

    /// Resolve an already-cleaned header, case-insensitively.
    pub fn from_header(header: &str) -> Option<Column> {
        let key = header.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.header().to_lowercase() == key)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == key)
                    .map(|(_, c)| *c)
            })
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Clean a single header and map it to its canonical spelling when known.
///
/// Unknown headers come back trimmed and stripped of annotations, so
/// `"Region (optional)"` becomes `"Region"`.
pub fn normalize_header(raw: &str) -> String {
    let stripped = ANNOTATION.replace_all(raw.trim(), " ");
    let stripped = UNIT_MARKER.replace_all(&stripped, " ");
    let cleaned = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
    match Column::from_header(&cleaned) {
        Some(column) => column.header().to_string(),
        None => cleaned,
    }
}

/// Rewrite every header of a table to its canonical form. Tables without
/// rows are returned untouched.
pub fn normalize_columns(table: RawTable) -> RawTable {
    if table.is_empty() {
        return table;
    }
    let headers = table.headers.iter().map(|h| normalize_header(h)).collect();
    RawTable {
        headers,
        rows: table.rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_currency_and_optional_annotations() {
        assert_eq!(normalize_header("  Real MRR (€) "), "Real MRR");
        assert_eq!(normalize_header("Real MRR  €"), "Real MRR");
        assert_eq!(normalize_header("MRR Calculated (inferred €)"), "MRR Calculated");
        assert_eq!(normalize_header("Active Customers (optional)"), "Active Customers");
        assert_eq!(normalize_header("CAC (optional €)"), "CAC");
        assert_eq!(normalize_header("Sales & Marketing Spend (€)"), "Sales & Marketing Spend");
        assert_eq!(normalize_header("Gross Margin %"), "Gross Margin");
        assert_eq!(normalize_header("Price MRR ($)"), "Price MRR");
    }

    #[test]
    fn test_alias_table() {
        assert_eq!(normalize_header("CAC optional  €"), "CAC");
        assert_eq!(normalize_header("Calculated MRR"), "MRR Calculated");
        assert_eq!(normalize_header("CustomerID"), "Customer ID");
        assert_eq!(normalize_header("Client ID"), "Customer ID");
        assert_eq!(normalize_header("new customers"), "New Customers");
        assert_eq!(normalize_header("S&M Spend"), "Sales & Marketing Spend");
    }

    #[test]
    fn test_unknown_header_is_only_cleaned() {
        assert_eq!(normalize_header(" Region   (optional) "), "Region");
        assert!(Column::from_header("Region").is_none());
    }

    #[test]
    fn test_empty_table_unchanged() {
        let table = RawTable::new(vec!["  Real MRR (€)".into()], vec![]);
        let out = normalize_columns(table.clone());
        assert_eq!(out, table);
    }

    #[test]
    fn test_table_headers_rewritten() {
        let table = RawTable::new(
            vec!["Date".into(), "Plan ".into(), "New Customers (optional)".into()],
            vec![vec!["2024-01-01".into(), "A".into(), "1".into()]],
        );
        let out = normalize_columns(table);
        assert_eq!(out.headers, vec!["Date", "Plan", "New Customers"]);
        assert_eq!(out.rows.len(), 1);
    }
}
