use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::columns::{normalize_header, Column};
use super::table::RawTable;
use crate::pricing::reference::PriceReference;
use crate::{SaasMetricsError, SaasMetricsResult};

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// Where each canonical column sits in a table. Headers are resolved through
/// [`normalize_header`], so raw spreadsheet spellings are recognised too. The
/// first occurrence of a duplicated column wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnLayout {
    indices: BTreeMap<Column, usize>,
}

impl ColumnLayout {
    pub fn of(table: &RawTable) -> Self {
        let mut indices = BTreeMap::new();
        for (i, header) in table.headers.iter().enumerate() {
            if let Some(column) = Column::from_header(&normalize_header(header)) {
                indices.entry(column).or_insert(i);
            }
        }
        Self { indices }
    }

    pub fn index(&self, column: Column) -> Option<usize> {
        self.indices.get(&column).copied()
    }

    pub fn has(&self, column: Column) -> bool {
        self.indices.contains_key(&column)
    }

    /// Fail with the full list of absent columns, in the order given.
    pub fn require(&self, table: &str, required: &[Column]) -> SaasMetricsResult<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| !self.has(**c))
            .map(|c| c.header().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SaasMetricsError::MissingColumns {
                table: table.to_string(),
                columns: missing,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSource {
    /// `Active Customers` column supplied
    Supplied,
    /// Running new − lost per plan, floored at zero
    CumulativeBackfill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrrSource {
    /// `Real MRR` column supplied
    Explicit,
    /// Copied from `MRR Calculated`
    CalculatedColumn,
    /// Plan list price × active customers
    PriceTimesActive,
    DefaultZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacSource {
    /// `CAC` column supplied per row
    Explicit,
    /// Sales & marketing spend ÷ new customers
    SpendPerAcquisition,
    /// Neither CAC nor spend supplied
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortMode {
    /// Per-customer identifiers present: first-seen-year matrix
    Identified,
    /// Calendar-year rollup of plan rows
    Aggregate,
}

/// Strategies resolved once from the input headers and price sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationPlan {
    pub active_source: ActiveSource,
    pub mrr_source: MrrSource,
    pub cac_source: CacSource,
    pub cohort_mode: CohortMode,
    pub has_mrr_movements: bool,
}

impl DerivationPlan {
    pub fn resolve(layout: &ColumnLayout, prices: &PriceReference) -> Self {
        let active_source = if layout.has(Column::ActiveCustomers) {
            ActiveSource::Supplied
        } else {
            ActiveSource::CumulativeBackfill
        };

        // Active customers always exist by the time MRR is derived (supplied
        // or backfilled), so only the price lookup gates the third branch.
        let mrr_source = if layout.has(Column::RealMrr) {
            MrrSource::Explicit
        } else if layout.has(Column::CalculatedMrr) {
            MrrSource::CalculatedColumn
        } else if prices.has_prices() {
            MrrSource::PriceTimesActive
        } else {
            MrrSource::DefaultZero
        };

        let cac_source = if layout.has(Column::Cac) {
            CacSource::Explicit
        } else if layout.has(Column::SalesMarketingSpend) {
            CacSource::SpendPerAcquisition
        } else {
            CacSource::Unavailable
        };

        let cohort_mode = if layout.has(Column::CustomerId) {
            CohortMode::Identified
        } else {
            CohortMode::Aggregate
        };

        let has_mrr_movements = [
            Column::NewMrr,
            Column::ExpansionMrr,
            Column::ChurnedMrr,
            Column::DowngradedMrr,
        ]
        .iter()
        .any(|c| layout.has(*c));

        let plan = Self {
            active_source,
            mrr_source,
            cac_source,
            cohort_mode,
            has_mrr_movements,
        };
        log::debug!("Resolved derivation plan: {plan:?}");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::reference::PriceMapEntry;
    use rust_decimal_macros::dec;

    fn layout(headers: &[&str]) -> ColumnLayout {
        ColumnLayout::of(&RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            vec![],
        ))
    }

    fn priced() -> PriceReference {
        PriceReference::from_entries(&[PriceMapEntry {
            plan: "A".into(),
            price_mrr: Some(dec!(50)),
            gross_margin: None,
        }])
    }

    #[test]
    fn test_require_reports_all_missing() {
        let l = layout(&["Plan", "Date"]);
        let err = l
            .require("Data", &crate::ingest::columns::REQUIRED_DATA_COLUMNS)
            .unwrap_err();
        match err {
            SaasMetricsError::MissingColumns { table, columns } => {
                assert_eq!(table, "Data");
                assert_eq!(columns, vec!["New Customers", "Lost Customers"]);
            }
            other => panic!("Expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_mrr_source_precedence() {
        let all = layout(&["Real MRR", "MRR Calculated"]);
        assert_eq!(
            DerivationPlan::resolve(&all, &priced()).mrr_source,
            MrrSource::Explicit
        );
        let calc = layout(&["MRR Calculated"]);
        assert_eq!(
            DerivationPlan::resolve(&calc, &priced()).mrr_source,
            MrrSource::CalculatedColumn
        );
        let bare = layout(&["Plan"]);
        assert_eq!(
            DerivationPlan::resolve(&bare, &priced()).mrr_source,
            MrrSource::PriceTimesActive
        );
        assert_eq!(
            DerivationPlan::resolve(&bare, &PriceReference::default()).mrr_source,
            MrrSource::DefaultZero
        );
    }

    #[test]
    fn test_cac_and_cohort_modes() {
        let plan = DerivationPlan::resolve(
            &layout(&["CAC", "Sales & Marketing Spend", "Customer ID"]),
            &PriceReference::default(),
        );
        assert_eq!(plan.cac_source, CacSource::Explicit);
        assert_eq!(plan.cohort_mode, CohortMode::Identified);
        assert_eq!(plan.active_source, ActiveSource::CumulativeBackfill);

        let plan = DerivationPlan::resolve(
            &layout(&["Sales & Marketing Spend", "Active Customers", "Churned MRR"]),
            &PriceReference::default(),
        );
        assert_eq!(plan.cac_source, CacSource::SpendPerAcquisition);
        assert_eq!(plan.cohort_mode, CohortMode::Aggregate);
        assert_eq!(plan.active_source, ActiveSource::Supplied);
        assert!(plan.has_mrr_movements);
    }
}
