use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use core_types::CustomerStatus;
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

mod commands;
mod telemetry;

/// The main entry point for the SaaS Pulse application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = configuration::load_config(cli.config.as_deref())?;
    let _log_guard = telemetry::init(&config.logging)?;

    // Execute the appropriate command
    let result = commands::run(cli.command, &config).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed.");
    }
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Monthly SaaS metrics from a customer ledger: new customers, MRR, churn and LTV.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (default: config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Print the monthly metrics series.
    Report(ReportArgs),
    /// Print lifetime value per customer and in aggregate.
    Ltv(ReportArgs),
    /// Print the headline dashboard KPIs.
    Summary(ReportArgs),
    /// Manage individual customers.
    #[command(subcommand)]
    Customers(CustomerCommands),
    /// Load customers from a CSV file.
    Import(ImportArgs),
    /// Write customers or metrics to a CSV file.
    #[command(subcommand)]
    Export(ExportCommands),
}

#[derive(Args)]
pub(crate) struct ReportArgs {
    /// Compute as if today were this date (default: today).
    #[arg(long, value_parser = parse_date_arg)]
    pub as_of: Option<NaiveDate>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub(crate) enum CustomerCommands {
    /// List every customer.
    List,
    /// Add a customer.
    Add(AddCustomerArgs),
    /// Remove a customer by id.
    Remove {
        #[arg(long)]
        id: Uuid,
    },
    /// Change a customer's status.
    SetStatus {
        #[arg(long)]
        id: Uuid,
        /// Active or Cancelled (Ativo / Cancelado are accepted too).
        #[arg(long)]
        status: CustomerStatus,
        /// Required when cancelling.
        #[arg(long, value_parser = parse_date_arg)]
        cancel_date: Option<NaiveDate>,
    },
}

#[derive(Args)]
pub(crate) struct AddCustomerArgs {
    #[arg(long)]
    pub name: String,

    /// Signup date, e.g. 2025-01-31 or 31/01/2025.
    #[arg(long, value_parser = parse_date_arg)]
    pub signup_date: NaiveDate,

    /// Monthly plan value, e.g. 1500, 2500.75 or 4.000,00.
    #[arg(long, value_parser = parse_money_arg)]
    pub plan_value: Decimal,

    /// Defaults to Cancelled when a cancel date is given, Active otherwise.
    #[arg(long)]
    pub status: Option<CustomerStatus>,

    #[arg(long, value_parser = parse_date_arg)]
    pub cancel_date: Option<NaiveDate>,
}

#[derive(Args)]
pub(crate) struct ImportArgs {
    /// CSV file with name, signup_date, plan_value, status and cancel_date columns.
    #[arg(long)]
    pub file: PathBuf,

    /// Replace the whole ledger instead of appending to it.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Subcommand)]
pub(crate) enum ExportCommands {
    /// Export the customer ledger.
    Customers {
        #[arg(long)]
        out: PathBuf,
    },
    /// Export the monthly metrics series.
    Metrics {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_parser = parse_date_arg)]
        as_of: Option<NaiveDate>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    metrics::parse_date(value).ok_or_else(|| format!("'{value}' is not a recognized date"))
}

fn parse_money_arg(value: &str) -> Result<Decimal, String> {
    metrics::parse_money(value).ok_or_else(|| format!("'{value}' is not a recognized amount"))
}
