use clap::Args;
use serde_json::Value;
use std::time::Instant;

use saas_metrics_core::kpi::filter::{available_dimensions, FilterScope};
use saas_metrics_core::kpi::net_new::{mrr_by_plan, net_new_mrr_series, MrrComponent};
use saas_metrics_core::kpi::summary::summarize_kpis;
use saas_metrics_core::with_metadata;

use super::{prepare, FilterArgs, SourceArgs};

/// Arguments for the augmented metric table
#[derive(Args)]
pub struct DeriveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the KPI summary
#[derive(Args)]
pub struct KpiArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Summarize every row, ignoring the year / month / plan selection
    #[arg(long)]
    pub all_rows: bool,
}

/// Arguments for the net new MRR series
#[derive(Args)]
pub struct NetNewArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Components to include: new, expansion, churned, downgraded (default: all)
    #[arg(long = "component", value_delimiter = ',')]
    pub components: Vec<MrrComponent>,
}

/// Arguments for the filter catalogue
#[derive(Args)]
pub struct DimensionsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run_derive(args: DeriveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let prepared = prepare(&args.source, Some(&args.filter))?;
    let total = prepared.rows().len();
    let filtered = (!prepared.filter.is_unrestricted()).then(|| prepared.filtered_rows());
    let mut output = prepared.output;
    if let Some(rows) = filtered {
        log::info!("Filter kept {} of {} rows", rows.len(), total);
        output.result.rows = rows;
    }
    Ok(serde_json::to_value(output)?)
}

pub fn run_kpis(args: KpiArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let prepared = prepare(&args.source, Some(&args.filter))?;
    let scope = if args.all_rows {
        FilterScope::All
    } else {
        prepared.config.kpi_scope
    };
    let filtered = prepared.filtered_rows();
    let result = summarize_kpis(scope.select(prepared.rows(), &filtered))?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_net_new_mrr(args: NetNewArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let prepared = prepare(&args.source, Some(&args.filter))?;
    let result = net_new_mrr_series(&prepared.filtered_rows(), &args.components)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_mrr_by_plan(args: DeriveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let prepared = prepare(&args.source, Some(&args.filter))?;
    let points = mrr_by_plan(&prepared.filtered_rows());
    let output = with_metadata(
        "MRR by plan",
        &serde_json::json!({ "aggregation": "sum of real MRR per date and plan" }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        serde_json::json!({ "points": points }),
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_dimensions(args: DimensionsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let prepared = prepare(&args.source, None)?;
    let dimensions = available_dimensions(prepared.rows());
    let output = with_metadata(
        "Available years, months and plans",
        &serde_json::json!({ "source": "augmented rows after dropping invalid dates" }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        dimensions,
    );
    Ok(serde_json::to_value(output)?)
}
