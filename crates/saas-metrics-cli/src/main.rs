mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cohorts::CohortArgs;
use commands::metrics::{DeriveArgs, DimensionsArgs, KpiArgs, NetNewArgs};

/// SaaS subscription metrics from plan-level spreadsheets
#[derive(Parser)]
#[command(
    name = "saasm",
    version,
    about = "SaaS subscription metrics from plan-level spreadsheets",
    long_about = "Derives MRR, ARR, ARPA, logo churn, gross margin, LTV, CAC and LTV:CAC \
                  from a Data sheet (plus an optional Prices sheet) with decimal precision, \
                  and builds KPI summaries, net new MRR series and cohort tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the augmented metric table
    Derive(DeriveArgs),
    /// Summarize MRR, ARR, active customers and weighted LTV / CAC
    Kpis(KpiArgs),
    /// Cohort table by first-seen year (or calendar-year rollup)
    Cohorts(CohortArgs),
    /// Net new MRR per period from movement columns
    NetNewMrr(NetNewArgs),
    /// MRR per period and plan
    MrrByPlan(DeriveArgs),
    /// List the years, months and plans present in the data
    Dimensions(DimensionsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Derive(args) => commands::metrics::run_derive(args),
        Commands::Kpis(args) => commands::metrics::run_kpis(args),
        Commands::Cohorts(args) => commands::cohorts::run_cohorts(args),
        Commands::NetNewMrr(args) => commands::metrics::run_net_new_mrr(args),
        Commands::MrrByPlan(args) => commands::metrics::run_mrr_by_plan(args),
        Commands::Dimensions(args) => commands::metrics::run_dimensions(args),
        Commands::Version => {
            println!("saasm {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
