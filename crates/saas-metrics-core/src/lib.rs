pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pricing;
pub mod types;

#[cfg(feature = "kpi")]
pub mod kpi;

#[cfg(feature = "cohort")]
pub mod cohort;

pub use error::SaasMetricsError;
pub use types::*;

/// Standard result type for all saas-metrics operations
pub type SaasMetricsResult<T> = Result<T, SaasMetricsError>;
