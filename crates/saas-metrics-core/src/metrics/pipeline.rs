use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use super::retention::logo_churn_rate;
use super::revenue::{active_customers, annualize, arpa, recurring_revenue, ARR_MULTIPLIER};
use super::unit_economics::{
    acquisition_cost, lifetime_value, ltv_to_cac, resolve_gross_margin, DEFAULT_GROSS_MARGIN,
};
use crate::ingest::columns::{normalize_columns, Column, REQUIRED_DATA_COLUMNS};
use crate::ingest::records::{parse_records, DroppedRow, MrrMovements, SubscriptionRecord};
use crate::ingest::schema::{CacSource, ColumnLayout, DerivationPlan, MrrSource};
use crate::ingest::table::RawTable;
use crate::pricing::reference::{build_price_reference, PriceMapEntry};
use crate::types::{with_metadata, ComputationOutput, Count, DateSpan, Money, Multiple, PlanId, Rate};
use crate::{SaasMetricsError, SaasMetricsResult};

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Tunables for the derivation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationOptions {
    /// Margin for plans without a Prices entry. Percent scale is accepted.
    #[serde(default = "default_gross_margin")]
    pub default_gross_margin: Rate,
}

fn default_gross_margin() -> Rate {
    DEFAULT_GROSS_MARGIN
}

impl Default for DerivationOptions {
    fn default() -> Self {
        Self {
            default_gross_margin: DEFAULT_GROSS_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivationInput {
    #[serde(alias = "Data")]
    pub data: RawTable,
    #[serde(default, alias = "Prices")]
    pub prices: Option<RawTable>,
    #[serde(default)]
    pub options: DerivationOptions,
}

/// One augmented Data row. Every derived column is filled; undefined ratios
/// are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub plan: PlanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub new_customers: Count,
    pub lost_customers: Count,
    pub active_customers: Count,
    pub real_mrr: Money,
    pub arr: Money,
    pub arpa: Money,
    pub logo_churn_rate: Rate,
    pub gross_margin_used: Rate,
    pub ltv_monthly: Option<Money>,
    pub cac: Option<Money>,
    pub ltv_to_cac: Option<Multiple>,
    #[serde(flatten)]
    pub movements: Option<MrrMovements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_new_mrr: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationOutput {
    pub plan: DerivationPlan,
    pub rows: Vec<MetricRow>,
    pub prices: Vec<PriceMapEntry>,
    pub dropped_rows: Vec<DroppedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<DateSpan>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Turn the Data and Prices sheets into the augmented metric table.
///
/// Order of derivation: active customers, MRR, ARR, ARPA, logo churn, gross
/// margin, LTV, CAC, LTV:CAC. Output rows are sorted by plan then date.
pub fn derive_metrics(
    input: &DerivationInput,
) -> SaasMetricsResult<ComputationOutput<DerivationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // -- Schema --------------------------------------------------------------
    let data = normalize_columns(input.data.clone());
    let prices_sheet = input.prices.clone().map(normalize_columns);

    let layout = ColumnLayout::of(&data);
    layout.require("Data", &REQUIRED_DATA_COLUMNS)?;

    let prices = build_price_reference(prices_sheet.as_ref())?;
    let plan = DerivationPlan::resolve(&layout, &prices);

    // -- Rows ----------------------------------------------------------------
    let parsed = parse_records(&data, &layout)?;
    if !parsed.dropped.is_empty() {
        warnings.push(format!(
            "{} row(s) dropped for an unparseable date or blank plan.",
            parsed.dropped.len()
        ));
    }
    let mut records = parsed.records;
    records.sort_by(|a, b| a.plan.cmp(&b.plan).then(a.date.cmp(&b.date)));

    match plan.mrr_source {
        MrrSource::DefaultZero => {
            warnings.push("No MRR column and no plan prices; MRR defaults to 0.".into())
        }
        MrrSource::PriceTimesActive => {
            let unpriced: BTreeSet<&str> = records
                .iter()
                .filter(|r| prices.price(&r.plan).is_none())
                .map(|r| r.plan.as_str())
                .collect();
            if !unpriced.is_empty() {
                warnings.push(format!(
                    "No price for plan(s) {}; their MRR is 0.",
                    unpriced.into_iter().collect::<Vec<_>>().join(", ")
                ));
            }
        }
        _ => {}
    }
    if !prices.has_margins() {
        warnings.push(format!(
            "No plan gross margins supplied; default margin {} applies to every plan.",
            input.options.default_gross_margin
        ));
    }
    if plan.cac_source == CacSource::Unavailable {
        warnings.push(
            "No CAC or Sales & Marketing Spend column; CAC and LTV:CAC are unavailable.".into(),
        );
    }

    // -- Derivation ----------------------------------------------------------
    let actives = active_customers(&records, plan.active_source);
    let rows: Vec<MetricRow> = records
        .iter()
        .zip(actives)
        .map(|(record, active)| {
            let real_mrr = recurring_revenue(record, active, plan.mrr_source, &prices)
                .ok_or_else(|| {
                    out_of_range(
                        record,
                        plan.mrr_source,
                        prices.price(&record.plan).unwrap_or_default(),
                        format!("price x {active} active customers exceeds the decimal range"),
                    )
                })?;
            let arr = annualize(real_mrr).ok_or_else(|| {
                out_of_range(
                    record,
                    plan.mrr_source,
                    real_mrr,
                    "ARR (MRR x 12) exceeds the decimal range".into(),
                )
            })?;
            let arpa = arpa(real_mrr, active);
            let churn = logo_churn_rate(active, record.new_customers, record.lost_customers);
            let margin =
                resolve_gross_margin(&record.plan, &prices, input.options.default_gross_margin);
            let ltv = lifetime_value(arpa, margin, churn);
            let cac = acquisition_cost(record, plan.cac_source);
            let movements = plan.has_mrr_movements.then(|| record.movements.clone());
            let net_new_mrr = movements.as_ref().and_then(MrrMovements::net);

            Ok(MetricRow {
                date: record.date,
                year: record.date.year(),
                month: record.date.month(),
                month_name: month_name(record.date),
                plan: record.plan.clone(),
                customer_id: record.customer_id.clone(),
                new_customers: record.new_customers,
                lost_customers: record.lost_customers,
                active_customers: active,
                real_mrr,
                arr,
                arpa,
                logo_churn_rate: churn,
                gross_margin_used: margin,
                ltv_monthly: ltv,
                cac,
                ltv_to_cac: ltv_to_cac(ltv, cac),
                movements,
                net_new_mrr,
            })
        })
        .collect::<SaasMetricsResult<_>>()?;

    let zero_churn = rows.iter().filter(|r| r.ltv_monthly.is_none()).count();
    if zero_churn > 0 {
        warnings.push(format!(
            "{zero_churn} row(s) have zero logo churn; LTV is undefined for them."
        ));
    }

    let plan_count = rows.iter().map(|r| r.plan.as_str()).collect::<BTreeSet<_>>().len();
    log::info!(
        "Derived metrics for {} rows across {} plans ({} dropped)",
        rows.len(),
        plan_count,
        parsed.dropped.len()
    );

    let output = DerivationOutput {
        plan,
        span: DateSpan::of(rows.iter().map(|r| r.date)),
        prices: prices.entries(),
        dropped_rows: parsed.dropped,
        rows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "default_gross_margin": input.options.default_gross_margin.to_string(),
        "arr_multiplier": ARR_MULTIPLIER.to_string(),
        "margin_scale": "values above 1 are percentages",
        "ltv_formula": "ARPA * gross margin / monthly logo churn",
        "cac_formula": "Sales & Marketing Spend / New Customers",
    });

    Ok(with_metadata(
        "SaaS subscription metrics (MRR, ARR, ARPA, logo churn, LTV, CAC)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// A revenue figure that cannot be represented, reported against the cell it
/// came from.
fn out_of_range(
    record: &SubscriptionRecord,
    source: MrrSource,
    value: Money,
    reason: String,
) -> SaasMetricsError {
    let column = match source {
        MrrSource::Explicit | MrrSource::DefaultZero => Column::RealMrr,
        MrrSource::CalculatedColumn => Column::CalculatedMrr,
        MrrSource::PriceTimesActive => Column::PriceMrr,
    };
    SaasMetricsError::InvalidCell {
        column: column.header().to_string(),
        line: record.line,
        value: value.to_string(),
        reason,
    }
}

fn month_name(date: NaiveDate) -> String {
    Month::try_from(date.month() as u8)
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}
