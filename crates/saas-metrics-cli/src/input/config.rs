use serde::{Deserialize, Serialize};

use saas_metrics_core::kpi::filter::{FilterScope, RowFilter};
use saas_metrics_core::metrics::pipeline::DerivationOptions;

/// Settings file passed with `--config`. Every section is optional; flags on
/// the command line override what is set here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub options: DerivationOptions,
    pub filter: RowFilter,
    pub kpi_scope: FilterScope,
}
