use clap::Args;
use serde_json::Value;

use saas_metrics_core::cohort::analysis::build_cohorts;

use super::{prepare, FilterArgs, SourceArgs};

/// Arguments for cohort analysis
#[derive(Args)]
pub struct CohortArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_cohorts(args: CohortArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let prepared = prepare(&args.source, Some(&args.filter))?;
    let mode = prepared.output.result.plan.cohort_mode;
    let result = build_cohorts(&prepared.filtered_rows(), mode)?;
    Ok(serde_json::to_value(result)?)
}
