use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::columns::Column;
use super::schema::ColumnLayout;
use super::table::RawTable;
use crate::types::{Count, Money, PlanId};
use crate::{SaasMetricsError, SaasMetricsResult};

// Slashed and dotted dates without a leading year are read day-first:
// 03/04/2024 is 3 April. US month-first sheets must use ISO dates.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Cell spellings spreadsheets use for "no value".
const BLANK_MARKERS: [&str; 5] = ["nan", "null", "none", "n/a", "-"];

/// Largest serial day Excel can represent (9999-12-31).
const EXCEL_MAX_SERIAL: i64 = 2_958_465;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Optional MRR movement components for a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MrrMovements {
    pub new_mrr: Option<Money>,
    pub expansion_mrr: Option<Money>,
    pub churned_mrr: Option<Money>,
    pub downgraded_mrr: Option<Money>,
}

impl MrrMovements {
    pub fn is_empty(&self) -> bool {
        self.new_mrr.is_none()
            && self.expansion_mrr.is_none()
            && self.churned_mrr.is_none()
            && self.downgraded_mrr.is_none()
    }

    /// New + expansion − churned − downgraded. Losses count by magnitude so
    /// sheets that record them as negative numbers net out the same way.
    /// `None` when no component is present or the total leaves the Decimal
    /// range.
    pub fn net(&self) -> Option<Money> {
        if self.is_empty() {
            return None;
        }
        let gain = self
            .new_mrr
            .unwrap_or_default()
            .checked_add(self.expansion_mrr.unwrap_or_default())?;
        let loss = self
            .churned_mrr
            .unwrap_or_default()
            .abs()
            .checked_add(self.downgraded_mrr.unwrap_or_default().abs())?;
        gain.checked_sub(loss)
    }
}

/// A Data sheet row after type checking, before any derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// 1-based sheet line (header is line 1)
    pub line: usize,
    pub date: NaiveDate,
    pub plan: PlanId,
    pub new_customers: Count,
    pub lost_customers: Count,
    pub active_customers: Option<Count>,
    pub real_mrr: Option<Money>,
    pub calculated_mrr: Option<Money>,
    pub cac: Option<Money>,
    pub sales_marketing_spend: Option<Money>,
    pub customer_id: Option<String>,
    pub movements: MrrMovements,
}

/// A row left out because its date or plan could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRows {
    pub records: Vec<SubscriptionRecord>,
    pub dropped: Vec<DroppedRow>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Type-check every Data sheet row.
///
/// Rows whose date does not parse, or whose plan is blank, are dropped and
/// reported. A malformed number anywhere else fails the whole sheet.
pub fn parse_records(table: &RawTable, layout: &ColumnLayout) -> SaasMetricsResult<ParsedRows> {
    let date_col = layout.index(Column::Date);
    let plan_col = layout.index(Column::Plan);

    let mut parsed = ParsedRows::default();
    for row in 0..table.len() {
        let line = row + 2;
        let cell = |column: Column| cell_at(table, layout, row, column);

        let date_text = date_col.map(|i| table.cell(row, i)).unwrap_or("");
        let Some(date) = parse_date(date_text) else {
            log::debug!("Dropping line {line}: unparseable date '{date_text}'");
            parsed.dropped.push(DroppedRow {
                line,
                reason: format!("unparseable date '{date_text}'"),
            });
            continue;
        };
        let plan = plan_col.map(|i| table.cell(row, i).trim()).unwrap_or("");
        if plan.is_empty() {
            log::debug!("Dropping line {line}: blank plan");
            parsed.dropped.push(DroppedRow {
                line,
                reason: "blank plan".into(),
            });
            continue;
        }

        let amount = |column: Column| -> SaasMetricsResult<Option<Money>> {
            let text = cell(column);
            parse_amount(text).map_err(|reason| invalid(column, line, text, reason))
        };
        let count = |column: Column| -> SaasMetricsResult<Option<Count>> {
            let text = cell(column);
            parse_count(text).map_err(|reason| invalid(column, line, text, reason))
        };

        let customer_id = Some(cell(Column::CustomerId).trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        parsed.records.push(SubscriptionRecord {
            line,
            date,
            plan: plan.to_string(),
            new_customers: count(Column::NewCustomers)?.unwrap_or(0),
            lost_customers: count(Column::LostCustomers)?.unwrap_or(0),
            active_customers: count(Column::ActiveCustomers)?,
            real_mrr: amount(Column::RealMrr)?,
            calculated_mrr: amount(Column::CalculatedMrr)?,
            cac: amount(Column::Cac)?,
            sales_marketing_spend: amount(Column::SalesMarketingSpend)?,
            customer_id,
            movements: MrrMovements {
                new_mrr: amount(Column::NewMrr)?,
                expansion_mrr: amount(Column::ExpansionMrr)?,
                churned_mrr: amount(Column::ChurnedMrr)?,
                downgraded_mrr: amount(Column::DowngradedMrr)?,
            },
        });
    }
    Ok(parsed)
}

/// Parse a spreadsheet date cell. Month-only values (`2024-03`) land on the
/// first of the month; bare numbers are Excel serial days.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d") {
        return Some(d);
    }
    excel_serial_date(text)
}

/// Parse a monetary or numeric cell. Blank cells are `Ok(None)`; currency
/// symbols, percent signs and `,` thousands separators are ignored.
pub fn parse_amount(text: &str) -> Result<Option<Decimal>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || BLANK_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return Ok(None);
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '£' | '%' | ',') && !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map(|d| Some(d.normalize()))
        .map_err(|_| "not a number".to_string())
}

/// Parse a customer count: a non-negative whole number.
pub fn parse_count(text: &str) -> Result<Option<Count>, String> {
    let Some(value) = parse_amount(text)? else {
        return Ok(None);
    };
    if value.is_sign_negative() && !value.is_zero() {
        return Err("customer counts cannot be negative".into());
    }
    if !value.fract().is_zero() {
        return Err("customer counts must be whole numbers".into());
    }
    value
        .to_u64()
        .map(Some)
        .ok_or_else(|| "customer count out of range".to_string())
}

fn cell_at<'a>(table: &'a RawTable, layout: &ColumnLayout, row: usize, column: Column) -> &'a str {
    layout
        .index(column)
        .map(|i| table.cell(row, i))
        .unwrap_or("")
}

fn excel_serial_date(text: &str) -> Option<NaiveDate> {
    let serial = Decimal::from_str(text).ok()?.trunc().to_i64()?;
    if !(1..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial))
}

fn invalid(column: Column, line: usize, text: &str, reason: String) -> SaasMetricsError {
    SaasMetricsError::InvalidCell {
        column: column.header().to_string(),
        line,
        value: text.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024/01/15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("15/01/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("15.01.2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 00:00:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T08:30:00+02:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-02"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date("45292"), Some(ymd(2024, 1, 1)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn test_slashed_dates_are_day_first() {
        assert_eq!(parse_date("03/04/2024"), Some(ymd(2024, 4, 3)));
        assert_eq!(parse_date("04.03.2024"), Some(ymd(2024, 3, 4)));
    }

    #[test]
    fn test_amounts() {
        assert_eq!(parse_amount(" 1,250.50 € "), Ok(Some(dec!(1250.5))));
        assert_eq!(parse_amount("$99"), Ok(Some(dec!(99))));
        assert_eq!(parse_amount("45%"), Ok(Some(dec!(45))));
        assert_eq!(parse_amount("1e3"), Ok(Some(dec!(1000))));
        assert_eq!(parse_amount(""), Ok(None));
        assert_eq!(parse_amount("NaN"), Ok(None));
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_counts() {
        assert_eq!(parse_count("12"), Ok(Some(12)));
        assert_eq!(parse_count("12.0"), Ok(Some(12)));
        assert_eq!(parse_count(""), Ok(None));
        assert!(parse_count("-3").is_err());
        assert!(parse_count("2.5").is_err());
    }

    #[test]
    fn test_bad_dates_and_blank_plans_are_dropped() {
        let t = table(
            &["Date", "Plan", "New Customers", "Lost Customers"],
            &[
                &["2024-01-01", "A", "10", "0"],
                &["garbage", "A", "5", "1"],
                &["2024-02-01", " ", "5", "1"],
                &["2024-02-01", "B", "", ""],
            ],
        );
        let parsed = parse_records(&t, &ColumnLayout::of(&t)).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.dropped.len(), 2);
        assert_eq!(parsed.dropped[0].line, 3);
        assert_eq!(parsed.dropped[1].line, 4);
        assert_eq!(parsed.records[1].plan, "B");
        assert_eq!(parsed.records[1].new_customers, 0);
        assert_eq!(parsed.records[1].active_customers, None);
    }

    #[test]
    fn test_malformed_number_fails_sheet() {
        let t = table(
            &["Date", "Plan", "New Customers", "Lost Customers"],
            &[&["2024-01-01", "A", "ten", "0"]],
        );
        let err = parse_records(&t, &ColumnLayout::of(&t)).unwrap_err();
        match err {
            SaasMetricsError::InvalidCell { column, line, value, .. } => {
                assert_eq!(column, "New Customers");
                assert_eq!(line, 2);
                assert_eq!(value, "ten");
            }
            other => panic!("Expected InvalidCell, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_columns_and_movements() {
        let t = table(
            &["Date", "Plan", "New Customers", "Lost Customers", "Customer ID", "New MRR", "Churned MRR"],
            &[&["2024-01-01", "A", "1", "0", " c-1 ", "100", "-40"]],
        );
        let parsed = parse_records(&t, &ColumnLayout::of(&t)).unwrap();
        let r = &parsed.records[0];
        assert_eq!(r.customer_id.as_deref(), Some("c-1"));
        assert_eq!(r.movements.new_mrr, Some(dec!(100)));
        assert_eq!(r.movements.net(), Some(dec!(60)));
        assert_eq!(MrrMovements::default().net(), None);
        let huge = MrrMovements {
            new_mrr: Some(Decimal::MAX),
            expansion_mrr: Some(dec!(1)),
            ..Default::default()
        };
        assert_eq!(huge.net(), None);
    }
}
