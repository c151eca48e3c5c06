use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

use crate::ingest::records::MrrMovements;
use crate::metrics::pipeline::MetricRow;
use crate::types::{with_metadata, ComputationOutput, Money, PlanId};
use crate::{SaasMetricsError, SaasMetricsResult};

/// One of the MRR movement columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrrComponent {
    New,
    Expansion,
    Churned,
    Downgraded,
}

impl MrrComponent {
    pub const ALL: [MrrComponent; 4] = [
        MrrComponent::New,
        MrrComponent::Expansion,
        MrrComponent::Churned,
        MrrComponent::Downgraded,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New MRR",
            Self::Expansion => "Expansion MRR",
            Self::Churned => "Churned MRR",
            Self::Downgraded => "Downgraded MRR",
        }
    }

    fn value(&self, movements: &MrrMovements) -> Option<Money> {
        match self {
            Self::New => movements.new_mrr,
            Self::Expansion => movements.expansion_mrr,
            Self::Churned => movements.churned_mrr,
            Self::Downgraded => movements.downgraded_mrr,
        }
    }

    /// Contribution to net new MRR; losses subtract by magnitude.
    fn signed(&self, amount: Money) -> Money {
        match self {
            Self::New | Self::Expansion => amount,
            Self::Churned | Self::Downgraded => -amount.abs(),
        }
    }
}

impl FromStr for MrrComponent {
    type Err = SaasMetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let key = key.trim_end_matches("mrr").trim();
        match key {
            "new" => Ok(Self::New),
            "expansion" => Ok(Self::Expansion),
            "churned" | "churn" => Ok(Self::Churned),
            "downgraded" | "downgrade" | "contraction" => Ok(Self::Downgraded),
            _ => Err(SaasMetricsError::InvalidInput {
                field: "component".into(),
                reason: format!("unknown MRR component '{s}'"),
            }),
        }
    }
}

/// Movement totals across plans for one date. Unselected components are
/// `None`, as are selected ones no plan reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetNewMrrPoint {
    pub date: NaiveDate,
    pub new_mrr: Option<Money>,
    pub expansion_mrr: Option<Money>,
    pub churned_mrr: Option<Money>,
    pub downgraded_mrr: Option<Money>,
    pub net_new_mrr: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetNewMrrSeries {
    pub components: Vec<MrrComponent>,
    pub points: Vec<NetNewMrrPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMrrPoint {
    pub date: NaiveDate,
    pub plan: PlanId,
    pub real_mrr: Money,
}

/// Net new MRR per date from the selected movement components.
pub fn net_new_mrr_series(
    rows: &[MetricRow],
    components: &[MrrComponent],
) -> SaasMetricsResult<ComputationOutput<NetNewMrrSeries>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut selected: Vec<MrrComponent> = Vec::new();
    for c in if components.is_empty() { &MrrComponent::ALL[..] } else { components } {
        if !selected.contains(c) {
            selected.push(*c);
        }
    }

    let mut saturated = false;
    let mut by_date: BTreeMap<NaiveDate, [Option<Money>; 4]> = BTreeMap::new();
    for row in rows {
        let Some(movements) = &row.movements else {
            continue;
        };
        let totals = by_date.entry(row.date).or_insert([None; 4]);
        for (slot, component) in MrrComponent::ALL.iter().enumerate() {
            if !selected.contains(component) {
                continue;
            }
            if let Some(amount) = component.value(movements) {
                let running = totals[slot].unwrap_or(Decimal::ZERO);
                totals[slot] = Some(running.checked_add(amount).unwrap_or_else(|| {
                    saturated = true;
                    running.saturating_add(amount)
                }));
            }
        }
    }

    if by_date.is_empty() {
        warnings.push("No MRR movement columns present; nothing to chart.".into());
    }

    let points = by_date
        .into_iter()
        .map(|(date, totals)| {
            let net_new_mrr = MrrComponent::ALL
                .iter()
                .zip(totals.iter())
                .filter_map(|(c, t)| t.map(|amount| c.signed(amount)))
                .fold(Decimal::ZERO, |acc, amount| {
                    acc.checked_add(amount).unwrap_or_else(|| {
                        saturated = true;
                        acc.saturating_add(amount)
                    })
                });
            NetNewMrrPoint {
                date,
                new_mrr: totals[0],
                expansion_mrr: totals[1],
                churned_mrr: totals[2],
                downgraded_mrr: totals[3],
                net_new_mrr,
            }
        })
        .collect();

    if saturated {
        warnings.push(
            "Some MRR movement totals exceed the decimal range; they are reported at the limit."
                .into(),
        );
    }

    let labels: Vec<&str> = selected.iter().map(MrrComponent::label).collect();
    let assumptions = serde_json::json!({
        "components": labels,
        "losses": "churned and downgraded MRR subtract by absolute value",
    });
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Net new MRR by period",
        &assumptions,
        warnings,
        elapsed,
        NetNewMrrSeries {
            components: selected,
            points,
        },
    ))
}

/// MRR per (date, plan), summing duplicate rows. Sums saturate at the
/// Decimal limits.
pub fn mrr_by_plan(rows: &[MetricRow]) -> Vec<PlanMrrPoint> {
    let mut totals: BTreeMap<(NaiveDate, &str), Money> = BTreeMap::new();
    for row in rows {
        let total = totals.entry((row.date, row.plan.as_str())).or_default();
        *total = total.saturating_add(row.real_mrr);
    }
    totals
        .into_iter()
        .map(|((date, plan), real_mrr)| PlanMrrPoint {
            date,
            plan: plan.to_string(),
            real_mrr,
        })
        .collect()
}
