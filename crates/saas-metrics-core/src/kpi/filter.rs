use chrono::Month;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::metrics::pipeline::MetricRow;
use crate::types::PlanId;
use crate::{SaasMetricsError, SaasMetricsResult};

/// Year / month / plan selection over augmented rows. Empty sets select
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    #[serde(default)]
    pub years: Vec<i32>,
    /// Calendar months, 1-12
    #[serde(default)]
    pub months: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanId>,
}

/// Whether KPI tiles follow the active filter or always show the full set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    #[default]
    Filtered,
    All,
}

impl FilterScope {
    pub fn select<'a>(&self, all: &'a [MetricRow], filtered: &'a [MetricRow]) -> &'a [MetricRow] {
        match self {
            FilterScope::Filtered => filtered,
            FilterScope::All => all,
        }
    }
}

impl RowFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.years.is_empty() && self.months.is_empty() && self.plan.is_none()
    }

    pub fn matches(&self, row: &MetricRow) -> bool {
        (self.years.is_empty() || self.years.contains(&row.year))
            && (self.months.is_empty() || self.months.contains(&row.month))
            && self.plan.as_ref().map_or(true, |p| *p == row.plan)
    }

    /// Rows passing the filter, in their original order.
    pub fn apply(&self, rows: &[MetricRow]) -> Vec<MetricRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Read a month given as a number (`3`) or an English name (`March`, `mar`).
pub fn parse_month(text: &str) -> SaasMetricsResult<u32> {
    let text = text.trim();
    if let Ok(n) = text.parse::<u32>() {
        if (1..=12).contains(&n) {
            return Ok(n);
        }
    } else if let Ok(m) = text.parse::<Month>() {
        return Ok(m.number_from_month());
    }
    Err(SaasMetricsError::InvalidInput {
        field: "month".into(),
        reason: format!("'{text}' is not a month number (1-12) or name"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthEntry {
    pub number: u32,
    pub name: String,
}

/// Distinct values available for filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub years: Vec<i32>,
    pub months: Vec<MonthEntry>,
    pub plans: Vec<PlanId>,
}

pub fn available_dimensions(rows: &[MetricRow]) -> Dimensions {
    let years: BTreeSet<i32> = rows.iter().map(|r| r.year).collect();
    let months: BTreeSet<(u32, &str)> = rows
        .iter()
        .map(|r| (r.month, r.month_name.as_str()))
        .collect();
    let plans: BTreeSet<&str> = rows.iter().map(|r| r.plan.as_str()).collect();
    Dimensions {
        years: years.into_iter().collect(),
        months: months
            .into_iter()
            .map(|(number, name)| MonthEntry {
                number,
                name: name.to_string(),
            })
            .collect(),
        plans: plans.into_iter().map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::pipeline::{derive_metrics, DerivationInput};
    use crate::ingest::table::RawTable;

    fn rows() -> Vec<MetricRow> {
        let data = RawTable::new(
            vec!["Date".into(), "Plan".into(), "New Customers".into(), "Lost Customers".into()],
            vec![
                vec!["2023-12-01".into(), "A".into(), "4".into(), "0".into()],
                vec!["2024-01-01".into(), "A".into(), "2".into(), "1".into()],
                vec!["2024-03-01".into(), "B".into(), "3".into(), "0".into()],
            ],
        );
        derive_metrics(&DerivationInput {
            data,
            ..Default::default()
        })
        .unwrap()
        .result
        .rows
    }

    #[test]
    fn test_unrestricted_filter_keeps_all() {
        let all = rows();
        let filter = RowFilter::default();
        assert!(filter.is_unrestricted());
        assert_eq!(filter.apply(&all), all);
    }

    #[test]
    fn test_filter_by_year_month_plan() {
        let all = rows();
        let by_year = RowFilter {
            years: vec![2024],
            ..Default::default()
        };
        assert_eq!(by_year.apply(&all).len(), 2);

        let by_month_plan = RowFilter {
            months: vec![1, 3],
            plan: Some("B".into()),
            ..Default::default()
        };
        let out = by_month_plan.apply(&all);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].plan, "B");
    }

    #[test]
    fn test_scope_selects_source() {
        let all = rows();
        let filtered = &all[..1];
        assert_eq!(FilterScope::All.select(&all, filtered).len(), 3);
        assert_eq!(FilterScope::Filtered.select(&all, filtered).len(), 1);
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("3").unwrap(), 3);
        assert_eq!(parse_month("March").unwrap(), 3);
        assert_eq!(parse_month("dec").unwrap(), 12);
        assert!(parse_month("13").is_err());
        assert!(parse_month("Smarch").is_err());
    }

    #[test]
    fn test_dimensions_sorted_and_distinct() {
        let dims = available_dimensions(&rows());
        assert_eq!(dims.years, vec![2023, 2024]);
        let months: Vec<u32> = dims.months.iter().map(|m| m.number).collect();
        assert_eq!(months, vec![1, 3, 12]);
        assert_eq!(dims.months[0].name, "January");
        assert_eq!(dims.plans, vec!["A", "B"]);
    }
}
