pub mod cohorts;
pub mod metrics;

use clap::Args;
use rust_decimal::Decimal;

use saas_metrics_core::kpi::filter::{parse_month, RowFilter};
use saas_metrics_core::metrics::pipeline::{
    derive_metrics, DerivationInput, DerivationOptions, DerivationOutput, MetricRow,
};
use saas_metrics_core::ComputationOutput;

use crate::input;
use crate::input::config::RunConfig;

/// Where the Data / Prices sheets come from
#[derive(Args)]
pub struct SourceArgs {
    /// Path to a JSON workbook `{"data": [...], "prices": [...]}`
    #[arg(long, conflicts_with_all = ["data", "prices"])]
    pub input: Option<String>,

    /// Data sheet (.csv or .json)
    #[arg(long)]
    pub data: Option<String>,

    /// Prices sheet (.csv or .json)
    #[arg(long, requires = "data")]
    pub prices: Option<String>,

    /// Gross margin for plans missing from Prices (0.8 or 80)
    #[arg(long)]
    pub default_margin: Option<Decimal>,

    /// Run settings file (.yaml, .yml or .json)
    #[arg(long)]
    pub config: Option<String>,
}

/// Row selection applied after derivation
#[derive(Args)]
pub struct FilterArgs {
    /// Keep only this year (repeatable)
    #[arg(long = "year")]
    pub years: Vec<i32>,

    /// Keep only this month, as a number or name (repeatable)
    #[arg(long = "month")]
    pub months: Vec<String>,

    /// Keep only this plan
    #[arg(long)]
    pub plan: Option<String>,
}

impl FilterArgs {
    /// Flags replace the matching part of the configured filter.
    pub fn resolve(&self, base: RowFilter) -> Result<RowFilter, Box<dyn std::error::Error>> {
        let mut filter = base;
        if !self.years.is_empty() {
            filter.years = self.years.clone();
        }
        if !self.months.is_empty() {
            filter.months = self
                .months
                .iter()
                .map(|m| parse_month(m))
                .collect::<Result<_, _>>()?;
        }
        if self.plan.is_some() {
            filter.plan = self.plan.clone();
        }
        Ok(filter)
    }
}

/// A derived run plus the selection the command should work on.
pub struct Prepared {
    pub output: ComputationOutput<DerivationOutput>,
    pub config: RunConfig,
    pub filter: RowFilter,
}

impl Prepared {
    pub fn rows(&self) -> &[MetricRow] {
        &self.output.result.rows
    }

    pub fn filtered_rows(&self) -> Vec<MetricRow> {
        self.filter.apply(self.rows())
    }
}

/// Load the sheets and settings, then run the derivation.
pub fn prepare(
    source: &SourceArgs,
    filter: Option<&FilterArgs>,
) -> Result<Prepared, Box<dyn std::error::Error>> {
    let config: RunConfig = match source.config {
        Some(ref path) => input::file::read_structured(path)?,
        None => RunConfig::default(),
    };

    let mut workbook: DerivationInput = if let Some(ref path) = source.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = source.data {
        DerivationInput {
            data: input::file::read_table(path)?,
            prices: source
                .prices
                .as_deref()
                .map(input::file::read_table)
                .transpose()?,
            options: DerivationOptions::default(),
        }
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("--data or --input is required (or pipe a JSON workbook on stdin)".into());
    };

    if source.config.is_some() {
        workbook.options = config.options.clone();
    }
    if let Some(margin) = source.default_margin {
        workbook.options.default_gross_margin = margin;
    }

    let filter = match filter {
        Some(args) => args.resolve(config.filter.clone())?,
        None => config.filter.clone(),
    };

    let output = derive_metrics(&workbook)?;
    Ok(Prepared {
        output,
        config,
        filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_configured_filter() {
        let args = FilterArgs {
            years: vec![],
            months: vec!["March".into(), "4".into()],
            plan: Some("Pro".into()),
        };
        let base = RowFilter {
            years: vec![2023],
            months: vec![1],
            plan: None,
        };
        let filter = args.resolve(base).unwrap();
        assert_eq!(filter.years, vec![2023]);
        assert_eq!(filter.months, vec![3, 4]);
        assert_eq!(filter.plan.as_deref(), Some("Pro"));
    }

    #[test]
    fn test_bad_month_rejected() {
        let args = FilterArgs {
            years: vec![],
            months: vec!["13".into()],
            plan: None,
        };
        assert!(args.resolve(RowFilter::default()).is_err());
    }
}
