use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::columns::Column;
use crate::ingest::records::parse_amount;
use crate::ingest::schema::ColumnLayout;
use crate::ingest::table::RawTable;
use crate::types::{Money, PlanId, Rate};
use crate::{SaasMetricsError, SaasMetricsResult};

/// Margins above this are read as percentages.
const PERCENT_THRESHOLD: Decimal = dec!(1);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One line of the Prices sheet after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMapEntry {
    pub plan: PlanId,
    /// Monthly list price per customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_mrr: Option<Money>,
    /// Fractional margin (0.8 = 80%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_margin: Option<Rate>,
}

/// Per-plan price and margin lookups. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceReference {
    price_mrr: BTreeMap<PlanId, Money>,
    gross_margin: BTreeMap<PlanId, Rate>,
}

impl PriceReference {
    pub fn from_entries(entries: &[PriceMapEntry]) -> Self {
        let mut reference = PriceReference::default();
        for entry in entries {
            if let Some(price) = entry.price_mrr {
                reference.price_mrr.insert(entry.plan.clone(), price);
            }
            if let Some(margin) = entry.gross_margin {
                reference
                    .gross_margin
                    .insert(entry.plan.clone(), normalize_margin(margin));
            }
        }
        reference
    }

    pub fn price(&self, plan: &str) -> Option<Money> {
        self.price_mrr.get(plan).copied()
    }

    pub fn margin(&self, plan: &str) -> Option<Rate> {
        self.gross_margin.get(plan).copied()
    }

    pub fn has_prices(&self) -> bool {
        !self.price_mrr.is_empty()
    }

    pub fn has_margins(&self) -> bool {
        !self.gross_margin.is_empty()
    }

    pub fn entries(&self) -> Vec<PriceMapEntry> {
        let mut plans: Vec<&PlanId> = self
            .price_mrr
            .keys()
            .chain(self.gross_margin.keys())
            .collect();
        plans.sort();
        plans.dedup();
        plans
            .into_iter()
            .map(|plan| PriceMapEntry {
                plan: plan.clone(),
                price_mrr: self.price(plan),
                gross_margin: self.margin(plan),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scale a margin given either as a fraction (0.45) or a percentage (45)
/// down to a fraction. No clamping happens here.
pub fn normalize_margin(margin: Rate) -> Rate {
    if margin > PERCENT_THRESHOLD {
        margin / dec!(100)
    } else {
        margin
    }
}

/// Build the plan lookups from an already column-normalized Prices sheet.
///
/// An absent or empty sheet, or one without a `Plan` column, yields empty
/// lookups. Later rows for the same plan overwrite earlier ones.
pub fn build_price_reference(prices: Option<&RawTable>) -> SaasMetricsResult<PriceReference> {
    let table = match prices {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(PriceReference::default()),
    };
    let layout = ColumnLayout::of(table);
    let plan_col = match layout.index(Column::Plan) {
        Some(i) => i,
        None => {
            log::debug!("Prices sheet has no Plan column; price lookups left empty");
            return Ok(PriceReference::default());
        }
    };
    let price_col = layout.index(Column::PriceMrr);
    let margin_col = layout.index(Column::GrossMargin);

    let mut entries = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let plan = table.cell(row, plan_col).trim();
        if plan.is_empty() {
            continue;
        }
        let price_mrr = read_optional(table, row, price_col, Column::PriceMrr)?;
        let gross_margin = read_optional(table, row, margin_col, Column::GrossMargin)?;
        if let Some(m) = gross_margin {
            if m > dec!(100) {
                log::warn!(
                    "Gross margin {m} for plan '{plan}' exceeds 100; it is scaled down twice (150 resolves to 0.015)"
                );
            }
        }
        entries.push(PriceMapEntry {
            plan: plan.to_string(),
            price_mrr,
            gross_margin,
        });
    }
    Ok(PriceReference::from_entries(&entries))
}

fn read_optional(
    table: &RawTable,
    row: usize,
    column: Option<usize>,
    name: Column,
) -> SaasMetricsResult<Option<Decimal>> {
    let Some(col) = column else {
        return Ok(None);
    };
    let text = table.cell(row, col);
    parse_amount(text).map_err(|reason| SaasMetricsError::InvalidCell {
        column: name.header().to_string(),
        line: row + 2,
        value: text.to_string(),
        reason,
    })
}
