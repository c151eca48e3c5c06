use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::ingest::schema::CohortMode;
use crate::metrics::pipeline::MetricRow;
use crate::types::{
    checked_sum, saturating_count, with_metadata, ComputationOutput, Count, Money,
};
use crate::SaasMetricsResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One cohort (first-seen year) across calendar years. `by_year` is keyed by
/// the calendar year as text so the row flattens into a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort_year: i32,
    #[serde(flatten)]
    pub by_year: BTreeMap<String, Count>,
}

/// Calendar-year rollup used when customers are not identified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyCohort {
    pub year: i32,
    /// Last recorded date in the year
    pub year_end: NaiveDate,
    pub new_customers: Count,
    pub active_end_of_year: Count,
    pub mrr_end_of_year: Money,
    pub ltv_monthly_avg: Option<Money>,
    pub cac_avg: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CohortTable {
    Identified {
        calendar_years: Vec<i32>,
        cohorts: Vec<CohortRow>,
    },
    Aggregate {
        years: Vec<YearlyCohort>,
    },
}

impl CohortTable {
    pub fn is_empty(&self) -> bool {
        match self {
            CohortTable::Identified { cohorts, .. } => cohorts.is_empty(),
            CohortTable::Aggregate { years } => years.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Cohort view of the augmented rows in the given mode.
///
/// Identified mode counts, per (first-seen year, calendar year), the
/// distinct customer-dates with active customers. Aggregate mode rolls each
/// calendar year up to its year-end position and average unit economics.
pub fn build_cohorts(
    rows: &[MetricRow],
    mode: CohortMode,
) -> SaasMetricsResult<ComputationOutput<CohortTable>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let table = match mode {
        CohortMode::Identified => {
            let skipped = rows.iter().filter(|r| r.customer_id.is_none()).count();
            if skipped > 0 {
                warnings.push(format!(
                    "{skipped} row(s) without a customer identifier left out of cohorts."
                ));
            }
            identified_cohorts(rows)
        }
        CohortMode::Aggregate => aggregate_cohorts(rows, &mut warnings),
    };

    if table.is_empty() {
        warnings.push("No rows available for cohort analysis.".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = match mode {
        CohortMode::Identified => serde_json::json!({
            "cohort": "year of the customer's first appearance",
            "cell": "distinct customer-dates with active customers > 0",
        }),
        CohortMode::Aggregate => serde_json::json!({
            "cohort": "calendar year",
            "year_end": "sum across plans at the last recorded date of the year",
            "averages": "mean of defined monthly LTV / CAC values",
        }),
    };

    Ok(with_metadata(
        "Cohort analysis by year",
        &assumptions,
        warnings,
        elapsed,
        table,
    ))
}

fn identified_cohorts(rows: &[MetricRow]) -> CohortTable {
    let identified: Vec<(&str, &MetricRow)> = rows
        .iter()
        .filter_map(|r| r.customer_id.as_deref().map(|id| (id, r)))
        .collect();

    let mut first_seen: BTreeMap<&str, i32> = BTreeMap::new();
    for (id, row) in &identified {
        let year = first_seen.entry(*id).or_insert(row.year);
        *year = (*year).min(row.year);
    }

    let calendar_years: BTreeSet<i32> = identified.iter().map(|(_, r)| r.year).collect();
    let cohort_years: BTreeSet<i32> = first_seen.values().copied().collect();

    let mut active: BTreeMap<(i32, i32), BTreeSet<(&str, NaiveDate)>> = BTreeMap::new();
    for (id, row) in &identified {
        if row.active_customers == 0 {
            continue;
        }
        let cohort = first_seen[id];
        active
            .entry((cohort, row.year))
            .or_default()
            .insert((*id, row.date));
    }

    let cohorts = cohort_years
        .iter()
        .map(|&cohort_year| CohortRow {
            cohort_year,
            by_year: calendar_years
                .iter()
                .map(|&year| {
                    let count = active
                        .get(&(cohort_year, year))
                        .map_or(0, |s| s.len() as Count);
                    (year.to_string(), count)
                })
                .collect(),
        })
        .collect();

    CohortTable::Identified {
        calendar_years: calendar_years.into_iter().collect(),
        cohorts,
    }
}

fn aggregate_cohorts(rows: &[MetricRow], warnings: &mut Vec<String>) -> CohortTable {
    let mut by_year: BTreeMap<i32, Vec<&MetricRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(row);
    }

    let years = by_year
        .into_iter()
        .filter_map(|(year, group)| {
            let year_end = group.iter().map(|r| r.date).max()?;
            let closing: Vec<&&MetricRow> = group.iter().filter(|r| r.date == year_end).collect();
            let mrr_end_of_year = checked_sum(closing.iter().map(|r| r.real_mrr))
                .unwrap_or_else(|| {
                    warnings.push(format!(
                        "Year-end MRR for {year} exceeds the decimal range; reported at the maximum."
                    ));
                    Decimal::MAX
                });
            Some(YearlyCohort {
                year,
                year_end,
                new_customers: saturating_count(group.iter().map(|r| r.new_customers)),
                active_end_of_year: saturating_count(closing.iter().map(|r| r.active_customers)),
                mrr_end_of_year,
                ltv_monthly_avg: mean(group.iter().filter_map(|r| r.ltv_monthly)),
                cac_avg: mean(group.iter().filter_map(|r| r.cac)),
            })
        })
        .collect();

    CohortTable::Aggregate { years }
}

/// Arithmetic mean; `None` for no values or a sum outside the Decimal range.
fn mean(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, n) = values.try_fold((Decimal::ZERO, 0u64), |(s, n), v| {
        Some((s.checked_add(v)?, n + 1))
    })?;
    if n == 0 {
        None
    } else {
        sum.checked_div(Decimal::from(n))
    }
}
