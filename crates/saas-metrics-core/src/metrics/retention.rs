use rust_decimal::Decimal;

use crate::types::{Count, Rate};

/// Customers at the start of a period, rebuilt from its end-of-period count:
/// `max(active_end − new + lost, 0)`.
pub fn active_at_start(active_end: Count, new_customers: Count, lost_customers: Count) -> Count {
    let start = active_end as i128 - new_customers as i128 + lost_customers as i128;
    start.clamp(0, Count::MAX as i128) as Count
}

/// Logo churn for a period: lost ÷ start-of-period actives, in [0, 1].
/// A period that starts with no customers has zero churn.
pub fn logo_churn_rate(active_end: Count, new_customers: Count, lost_customers: Count) -> Rate {
    let start = active_at_start(active_end, new_customers, lost_customers);
    if start == 0 {
        return Decimal::ZERO;
    }
    let churn = Decimal::from(lost_customers) / Decimal::from(start);
    churn.clamp(Decimal::ZERO, Decimal::ONE)
}
