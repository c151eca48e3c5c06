use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::ingest::records::SubscriptionRecord;
use crate::ingest::schema::{ActiveSource, MrrSource};
use crate::pricing::reference::PriceReference;
use crate::types::{Count, Money};

/// Months per year for annualising MRR.
pub const ARR_MULTIPLIER: Decimal = dec!(12);

/// Active customers per record, in record order.
///
/// Records must already be ordered by date within each plan. With
/// [`ActiveSource::CumulativeBackfill`] each plan keeps its own unclamped
/// running total of new − lost; only the value reported for a row is
/// floored at zero.
pub fn active_customers(records: &[SubscriptionRecord], source: ActiveSource) -> Vec<Count> {
    match source {
        ActiveSource::Supplied => records
            .iter()
            .map(|r| r.active_customers.unwrap_or(0))
            .collect(),
        ActiveSource::CumulativeBackfill => {
            let mut running: BTreeMap<&str, i128> = BTreeMap::new();
            records
                .iter()
                .map(|r| {
                    let total = running.entry(r.plan.as_str()).or_insert(0);
                    *total += r.new_customers as i128 - r.lost_customers as i128;
                    (*total).clamp(0, Count::MAX as i128) as Count
                })
                .collect()
        }
    }
}

/// Monthly recurring revenue for one record under the resolved source.
///
/// `None` only when price × active leaves the Decimal range.
pub fn recurring_revenue(
    record: &SubscriptionRecord,
    active: Count,
    source: MrrSource,
    prices: &PriceReference,
) -> Option<Money> {
    match source {
        MrrSource::Explicit => Some(record.real_mrr.unwrap_or(Decimal::ZERO)),
        MrrSource::CalculatedColumn => Some(record.calculated_mrr.unwrap_or(Decimal::ZERO)),
        MrrSource::PriceTimesActive => prices
            .price(&record.plan)
            .unwrap_or(Decimal::ZERO)
            .checked_mul(Decimal::from(active)),
        MrrSource::DefaultZero => Some(Decimal::ZERO),
    }
}

/// ARR = MRR × 12, `None` on overflow.
pub fn annualize(mrr: Money) -> Option<Money> {
    mrr.checked_mul(ARR_MULTIPLIER)
}

/// Average revenue per account; zero when there are no active accounts.
pub fn arpa(mrr: Money, active: Count) -> Money {
    if active == 0 {
        Decimal::ZERO
    } else {
        mrr / Decimal::from(active)
    }
}
