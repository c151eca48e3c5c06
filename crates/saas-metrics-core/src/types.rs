use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Ratios such as LTV:CAC (3.2x)
pub type Multiple = Decimal;

/// Customer counts
pub type Count = u64;

/// A plan identifier as it appears in the Data and Prices tables
pub type PlanId = String;

/// A closed date range covered by a row set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateSpan {
    /// Span of the given dates, `None` when the iterator is empty.
    pub fn of(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        dates.into_iter().fold(None, |span, d| match span {
            None => Some(DateSpan { first: d, last: d }),
            Some(s) => Some(DateSpan {
                first: s.first.min(d),
                last: s.last.max(d),
            }),
        })
    }
}

/// Sum of decimal values; `None` if a partial sum leaves the Decimal range.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// Sum of customer counts, saturating at `Count::MAX`.
pub fn saturating_count(values: impl IntoIterator<Item = Count>) -> Count {
    values.into_iter().fold(0, Count::saturating_add)
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_span_covers_unordered_dates() {
        let d = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        let span = DateSpan::of([d(3), d(1), d(7)]).unwrap();
        assert_eq!(span.first, d(1));
        assert_eq!(span.last, d(7));
        assert!(DateSpan::of(Vec::new()).is_none());
    }

    #[test]
    fn test_sums_stop_at_the_range_edge() {
        use rust_decimal_macros::dec;
        assert_eq!(checked_sum([dec!(1.5), dec!(2)]), Some(dec!(3.5)));
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(saturating_count([3, 4]), 7);
        assert_eq!(saturating_count([Count::MAX, 1]), Count::MAX);
    }
}
