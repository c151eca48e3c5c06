use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::metrics::pipeline::MetricRow;
use crate::metrics::revenue::annualize;
use crate::types::{
    checked_sum, saturating_count, with_metadata, ComputationOutput, Count, Money, Multiple,
};
use crate::{SaasMetricsError, SaasMetricsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    /// Latest date in the row subset; every figure below is taken there.
    pub as_of: NaiveDate,
    pub plans_reporting: usize,
    pub active_customers: Count,
    pub total_mrr: Money,
    pub total_arr: Money,
    /// LTV averaged with MRR weights
    pub weighted_ltv: Option<Money>,
    /// CAC averaged with new-customer weights
    pub weighted_cac: Option<Money>,
    pub ltv_to_cac: Option<Multiple>,
}

/// Headline KPIs for a (typically filtered) row subset.
pub fn summarize_kpis(rows: &[MetricRow]) -> SaasMetricsResult<ComputationOutput<KpiSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let as_of = rows
        .iter()
        .map(|r| r.date)
        .max()
        .ok_or_else(|| SaasMetricsError::InsufficientData("No rows match the selection.".into()))?;
    let latest: Vec<&MetricRow> = rows.iter().filter(|r| r.date == as_of).collect();

    let active_customers: Count = saturating_count(latest.iter().map(|r| r.active_customers));
    let total_mrr: Money = checked_sum(latest.iter().map(|r| r.real_mrr)).unwrap_or_else(|| {
        warnings.push(format!(
            "Total MRR on {as_of} exceeds the decimal range; reported at the maximum."
        ));
        Decimal::MAX
    });
    let total_arr: Money = annualize(total_mrr).unwrap_or_else(|| {
        warnings.push(format!(
            "Total ARR on {as_of} exceeds the decimal range; reported at the maximum."
        ));
        Decimal::MAX
    });

    let weighted_ltv = weighted_average(latest.iter().map(|r| (r.ltv_monthly, r.real_mrr)));
    let weighted_cac = weighted_average(
        latest
            .iter()
            .map(|r| (r.cac, Decimal::from(r.new_customers))),
    );
    let ltv_to_cac = match (weighted_ltv, weighted_cac) {
        (Some(l), Some(c)) if c > Decimal::ZERO => l.checked_div(c),
        _ => None,
    };

    if weighted_ltv.is_none() {
        warnings.push(format!(
            "No plan on {as_of} has both a defined LTV and positive MRR, or the weighted sum \
             overflows; weighted LTV unavailable."
        ));
    }
    if weighted_cac.is_none() {
        warnings.push(format!(
            "No plan on {as_of} has both a defined CAC and new customers, or the weighted sum \
             overflows; weighted CAC unavailable."
        ));
    }

    let summary = KpiSummary {
        as_of,
        plans_reporting: latest.len(),
        active_customers,
        total_mrr,
        total_arr,
        weighted_ltv,
        weighted_cac,
        ltv_to_cac,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "as_of": "latest date in the subset",
        "ltv_weights": "MRR at as-of date; plans without LTV excluded",
        "cac_weights": "new customers at as-of date; plans without CAC excluded",
    });

    Ok(with_metadata(
        "SaaS KPI summary (MRR-weighted LTV, acquisition-weighted CAC)",
        &assumptions,
        warnings,
        elapsed,
        summary,
    ))
}

/// Σ(w·v) / Σw over pairs with a value. `None` when no value is present, the
/// weights do not sum to a positive total, or a product or sum leaves the
/// Decimal range.
pub fn weighted_average<I>(pairs: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Option<Decimal>, Decimal)>,
{
    let (numerator, denominator) = pairs
        .into_iter()
        .filter_map(|(value, weight)| value.map(|v| (v, weight)))
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(n, d), (v, w)| {
            Some((n.checked_add(v.checked_mul(w)?)?, d.checked_add(w)?))
        })?;
    if denominator <= Decimal::ZERO {
        return None;
    }
    numerator.checked_div(denominator)
}
