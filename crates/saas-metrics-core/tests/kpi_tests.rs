use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saas_metrics_core::ingest::table::RawTable;
use saas_metrics_core::kpi::filter::{available_dimensions, FilterScope, RowFilter};
use saas_metrics_core::kpi::net_new::{mrr_by_plan, net_new_mrr_series, MrrComponent};
use saas_metrics_core::kpi::summary::summarize_kpis;
use saas_metrics_core::metrics::pipeline::{derive_metrics, DerivationInput, MetricRow};
use saas_metrics_core::SaasMetricsError;

fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

fn derive(data: RawTable) -> Vec<MetricRow> {
    let input = DerivationInput {
        data,
        ..Default::default()
    };
    derive_metrics(&input).unwrap().result.rows
}

/// Two plans, two months, explicit actives and MRR, spend-based CAC and the
/// default 80% margin.
///
/// Feb A: churn 5/100, ARPA 50, LTV 800, CAC 300.
/// Feb B: churn 10/50, ARPA 20, LTV 80, CAC 200.
fn two_plan_rows() -> Vec<MetricRow> {
    derive(sheet(
        &[
            "Date",
            "Plan",
            "New Customers",
            "Lost Customers",
            "Active Customers",
            "Real MRR (€)",
            "Sales & Marketing Spend (€)",
        ],
        &[
            &["2024-01-31", "A", "10", "0", "100", "5000", "2000"],
            &["2024-02-29", "A", "10", "5", "105", "5250", "3000"],
            &["2024-01-31", "B", "5", "0", "50", "1000", "500"],
            &["2024-02-29", "B", "10", "10", "50", "1000", "2000"],
        ],
    ))
}

// ===========================================================================
// KPI summary
// ===========================================================================

#[test]
fn test_weighted_kpis_at_latest_date() {
    let rows = two_plan_rows();
    let kpis = summarize_kpis(&rows).unwrap().result;

    assert_eq!(kpis.as_of, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert_eq!(kpis.plans_reporting, 2);
    assert_eq!(kpis.active_customers, 155);
    assert_eq!(kpis.total_mrr, dec!(6250));
    assert_eq!(kpis.total_arr, dec!(75000));
    // (800 * 5250 + 80 * 1000) / 6250
    assert_eq!(kpis.weighted_ltv, Some(dec!(684.8)));
    // (300 * 10 + 200 * 10) / 20
    assert_eq!(kpis.weighted_cac, Some(dec!(250)));
    assert_eq!(kpis.ltv_to_cac, Some(dec!(2.7392)));
}

#[test]
fn test_zero_mrr_weights_leave_ltv_undefined() {
    let rows = derive(sheet(
        &["Date", "Plan", "New Customers", "Lost Customers", "Active Customers", "Real MRR"],
        &[
            &["2024-03-31", "A", "1", "2", "10", "0"],
            &["2024-03-31", "B", "0", "1", "5", "0"],
        ],
    ));
    // LTV exists per row (zero ARPA), but the MRR weights sum to zero
    assert!(rows.iter().all(|r| r.ltv_monthly.is_some()));
    let out = summarize_kpis(&rows).unwrap();
    assert_eq!(out.result.weighted_ltv, None);
    assert_eq!(out.result.weighted_cac, None);
    assert_eq!(out.result.ltv_to_cac, None);
    assert!(out.warnings.iter().any(|w| w.contains("weighted LTV unavailable")));
}

#[test]
fn test_huge_mrr_leaves_weighted_ltv_undefined() {
    // Churn 1/2, ARPA 1e15, LTV 1.6e15; LTV x MRR leaves the decimal range
    let rows = derive(sheet(
        &["Date", "Plan", "New Customers", "Lost Customers", "Active Customers", "Real MRR"],
        &[&["2024-03-31", "A", "0", "1", "1", "1000000000000000"]],
    ));
    assert_eq!(rows[0].ltv_monthly, Some(dec!(1600000000000000)));
    let out = summarize_kpis(&rows).unwrap();
    assert_eq!(out.result.total_mrr, dec!(1000000000000000));
    assert_eq!(out.result.weighted_ltv, None);
    assert_eq!(out.result.ltv_to_cac, None);
    assert!(out.warnings.iter().any(|w| w.contains("weighted LTV unavailable")));
}

#[test]
fn test_totals_beyond_decimal_range_saturate_with_warning() {
    let mut rows = two_plan_rows();
    for row in rows.iter_mut() {
        row.real_mrr = Decimal::MAX;
        row.active_customers = u64::MAX;
    }
    let out = summarize_kpis(&rows).unwrap();
    assert_eq!(out.result.total_mrr, Decimal::MAX);
    assert_eq!(out.result.total_arr, Decimal::MAX);
    assert_eq!(out.result.active_customers, u64::MAX);
    assert!(out.warnings.iter().any(|w| w.contains("Total MRR")));
}

#[test]
fn test_empty_subset_is_insufficient_data() {
    let rows = two_plan_rows();
    let filter = RowFilter {
        years: vec![2019],
        ..Default::default()
    };
    let subset = filter.apply(&rows);
    assert!(subset.is_empty());
    assert!(matches!(
        summarize_kpis(&subset),
        Err(SaasMetricsError::InsufficientData(_))
    ));
}

// ===========================================================================
// Filters
// ===========================================================================

#[test]
fn test_filter_by_month_then_summarize() {
    let rows = two_plan_rows();
    let filter = RowFilter {
        years: vec![2024],
        months: vec![1],
        plan: None,
    };
    let subset = filter.apply(&rows);
    assert_eq!(subset.len(), 2);

    let kpis = summarize_kpis(&subset).unwrap().result;
    assert_eq!(kpis.as_of, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    assert_eq!(kpis.total_mrr, dec!(6000));
    // January has no churn on either plan
    assert_eq!(kpis.weighted_ltv, None);
}

#[test]
fn test_filter_by_plan() {
    let rows = two_plan_rows();
    let filter = RowFilter {
        plan: Some("B".into()),
        ..Default::default()
    };
    let kpis = summarize_kpis(&filter.apply(&rows)).unwrap().result;
    assert_eq!(kpis.plans_reporting, 1);
    assert_eq!(kpis.total_mrr, dec!(1000));
    assert_eq!(kpis.weighted_ltv, Some(dec!(80)));
    assert_eq!(kpis.ltv_to_cac, Some(dec!(0.4)));
}

#[test]
fn test_unfiltered_scope_ignores_selection() {
    let rows = two_plan_rows();
    let filter = RowFilter {
        plan: Some("B".into()),
        ..Default::default()
    };
    let filtered = filter.apply(&rows);
    assert_eq!(FilterScope::All.select(&rows, &filtered).len(), 4);
    assert_eq!(FilterScope::Filtered.select(&rows, &filtered).len(), 2);
}

#[test]
fn test_available_dimensions() {
    let dims = available_dimensions(&two_plan_rows());
    assert_eq!(dims.years, vec![2024]);
    assert_eq!(dims.plans, vec!["A".to_string(), "B".to_string()]);
    let months: Vec<(u32, &str)> = dims.months.iter().map(|m| (m.number, m.name.as_str())).collect();
    assert_eq!(months, vec![(1, "January"), (2, "February")]);
}

// ===========================================================================
// Net new MRR
// ===========================================================================

#[test]
fn test_net_new_mrr_sums_plans_per_date() {
    let rows = derive(sheet(
        &[
            "Date",
            "Plan",
            "New Customers",
            "Lost Customers",
            "New MRR",
            "Expansion MRR",
            "Churned MRR",
            "Downgraded MRR",
        ],
        &[
            &["2024-01-31", "A", "3", "0", "300", "50", "0", "0"],
            &["2024-01-31", "B", "1", "1", "100", "", "-80", "20"],
            &["2024-02-29", "A", "0", "1", "0", "10", "100", ""],
        ],
    ));
    let series = net_new_mrr_series(&rows, &[]).unwrap().result;
    assert_eq!(series.components, MrrComponent::ALL.to_vec());
    assert_eq!(series.points.len(), 2);

    let jan = &series.points[0];
    assert_eq!(jan.new_mrr, Some(dec!(400)));
    assert_eq!(jan.churned_mrr, Some(dec!(-80)));
    // 400 + 50 - 80 - 20
    assert_eq!(jan.net_new_mrr, dec!(350));
    // 0 + 10 - 100
    assert_eq!(series.points[1].net_new_mrr, dec!(-90));

    let gains_only =
        net_new_mrr_series(&rows, &[MrrComponent::New, MrrComponent::Expansion]).unwrap();
    assert_eq!(gains_only.result.points[0].net_new_mrr, dec!(450));
    assert_eq!(gains_only.result.points[0].churned_mrr, None);
}

#[test]
fn test_mrr_by_plan_ordered_by_date_then_plan() {
    let points = mrr_by_plan(&two_plan_rows());
    let flat: Vec<(String, rust_decimal::Decimal)> = points
        .iter()
        .map(|p| (format!("{} {}", p.date, p.plan), p.real_mrr))
        .collect();
    assert_eq!(
        flat,
        vec![
            ("2024-01-31 A".to_string(), dec!(5000)),
            ("2024-01-31 B".to_string(), dec!(1000)),
            ("2024-02-29 A".to_string(), dec!(5250)),
            ("2024-02-29 B".to_string(), dec!(1000)),
        ]
    );
}
