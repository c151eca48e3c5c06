use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use saas_metrics_core::cohort::analysis::build_cohorts;
use saas_metrics_core::ingest::schema::CohortMode;
use saas_metrics_core::kpi::filter::{FilterScope, RowFilter};
use saas_metrics_core::kpi::net_new::{net_new_mrr_series, MrrComponent};
use saas_metrics_core::kpi::summary::summarize_kpis;
use saas_metrics_core::metrics::pipeline::{derive_metrics, DerivationInput, MetricRow};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Workbook plus an optional row selection, shared by the summary calls.
#[derive(Deserialize)]
struct SelectionRequest {
    #[serde(flatten)]
    workbook: DerivationInput,
    #[serde(default)]
    filter: RowFilter,
    #[serde(default)]
    scope: FilterScope,
    #[serde(default)]
    components: Vec<MrrComponent>,
}

impl SelectionRequest {
    fn parse(input_json: &str) -> NapiResult<Self> {
        serde_json::from_str(input_json).map_err(to_napi_error)
    }

    /// Derived rows, and the subset the filter keeps.
    fn rows(&self) -> NapiResult<(Vec<MetricRow>, Vec<MetricRow>, CohortMode)> {
        let derived = derive_metrics(&self.workbook).map_err(to_napi_error)?;
        let filtered = self.filter.apply(&derived.result.rows);
        Ok((derived.result.rows, filtered, derived.result.plan.cohort_mode))
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

#[napi(js_name = "deriveMetrics")]
pub fn derive(input_json: String) -> NapiResult<String> {
    let input: DerivationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = derive_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[napi]
pub fn kpi_summary(input_json: String) -> NapiResult<String> {
    let request = SelectionRequest::parse(&input_json)?;
    let (all, filtered, _) = request.rows()?;
    let output = summarize_kpis(request.scope.select(&all, &filtered)).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cohorts(input_json: String) -> NapiResult<String> {
    let request = SelectionRequest::parse(&input_json)?;
    let (_, filtered, mode) = request.rows()?;
    let output = build_cohorts(&filtered, mode).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn net_new_mrr(input_json: String) -> NapiResult<String> {
    let request = SelectionRequest::parse(&input_json)?;
    let (_, filtered, _) = request.rows()?;
    let output = net_new_mrr_series(&filtered, &request.components).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
