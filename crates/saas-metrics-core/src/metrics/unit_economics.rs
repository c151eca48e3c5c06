use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::ingest::records::SubscriptionRecord;
use crate::ingest::schema::CacSource;
use crate::pricing::reference::{normalize_margin, PriceReference};
use crate::types::{Money, Multiple, Rate};

/// Margin applied to plans the Prices sheet does not cover.
pub const DEFAULT_GROSS_MARGIN: Rate = dec!(0.80);

/// Gross margin for a plan: the price-sheet value if present, else the
/// default, scaled to a fraction and clamped to [0, 1].
pub fn resolve_gross_margin(plan: &str, prices: &PriceReference, default_margin: Rate) -> Rate {
    let margin = prices.margin(plan).unwrap_or(default_margin);
    normalize_margin(margin).clamp(Decimal::ZERO, Decimal::ONE)
}

/// Monthly lifetime value: ARPA × margin ÷ churn.
///
/// `None` when churn is zero (no finite lifetime) or the quotient overflows.
pub fn lifetime_value(arpa: Money, gross_margin: Rate, churn: Rate) -> Option<Money> {
    if churn.is_zero() {
        return None;
    }
    arpa.checked_mul(gross_margin)?.checked_div(churn)
}

/// Acquisition cost for one record under the resolved source.
pub fn acquisition_cost(record: &SubscriptionRecord, source: CacSource) -> Option<Money> {
    match source {
        CacSource::Explicit => record.cac,
        CacSource::SpendPerAcquisition => {
            if record.new_customers == 0 {
                return None;
            }
            record
                .sales_marketing_spend?
                .checked_div(Decimal::from(record.new_customers))
        }
        CacSource::Unavailable => None,
    }
}

/// LTV ÷ CAC where both exist and CAC is positive.
pub fn ltv_to_cac(ltv: Option<Money>, cac: Option<Money>) -> Option<Multiple> {
    match (ltv, cac) {
        (Some(l), Some(c)) if c > Decimal::ZERO => l.checked_div(c),
        _ => None,
    }
}
