use crate::{AddCustomerArgs, Commands, CustomerCommands, ExportCommands, ImportArgs, ReportArgs};
use anyhow::Context;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use configuration::Config;
use core_types::{CustomerRecord, NewCustomer};
use database::{CustomerRepository, PgCustomerRepository};
use indicatif::{ProgressBar, ProgressStyle};
use metrics::{
    ChurnPolicy, CustomerLtv, DashboardSummary, LtvSummary, MetricsEngine, MonthlyMetric,
    NormalizationReport,
};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;
use web_server::AppState;

/// Dispatches a parsed command.
pub(crate) async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let engine = MetricsEngine::new(ChurnPolicy::with_min_tenure(
        config.metrics.churn_min_tenure_months,
    ));
    let repo = open_repository(config).await?;

    match command {
        Commands::Serve => {
            let addr = config.server.socket_addr()?;
            web_server::run_server(addr, AppState::new(Arc::new(repo), engine)).await
        }
        Commands::Report(args) => handle_report(&repo, engine, args).await,
        Commands::Ltv(args) => handle_ltv(&repo, engine, args).await,
        Commands::Summary(args) => handle_summary(&repo, engine, args).await,
        Commands::Customers(cmd) => handle_customers(&repo, cmd).await,
        Commands::Import(args) => handle_import(&repo, args).await,
        Commands::Export(cmd) => handle_export(&repo, engine, cmd).await,
    }
}

/// Connects to PostgreSQL and brings the schema up to date.
async fn open_repository(config: &Config) -> anyhow::Result<PgCustomerRepository> {
    let pool = database::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    database::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(PgCustomerRepository::new(pool))
}

// ==============================================================================
// Reports
// ==============================================================================

fn today_or(as_of: Option<chrono::NaiveDate>) -> chrono::NaiveDate {
    as_of.unwrap_or_else(metrics::today)
}

async fn handle_report(
    repo: &dyn CustomerRepository,
    engine: MetricsEngine,
    args: ReportArgs,
) -> anyhow::Result<()> {
    let customers = repo.try_load().await?;
    let series = engine.compute_monthly_series_as_of(&customers, today_or(args.as_of));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        println!("{}", monthly_table(&series));
    }
    Ok(())
}

async fn handle_ltv(
    repo: &dyn CustomerRepository,
    engine: MetricsEngine,
    args: ReportArgs,
) -> anyhow::Result<()> {
    let customers = repo.try_load().await?;
    let today = today_or(args.as_of);
    let rows = engine.compute_customer_ltvs_as_of(&customers, today);
    let summary = engine.compute_ltv_summary_as_of(&customers, today);

    if args.json {
        let payload = serde_json::json!({ "summary": summary, "customers": rows });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", ltv_table(&rows));
        println!("{}", ltv_summary_table(&summary));
    }
    Ok(())
}

async fn handle_summary(
    repo: &dyn CustomerRepository,
    engine: MetricsEngine,
    args: ReportArgs,
) -> anyhow::Result<()> {
    let customers = repo.try_load().await?;
    let summary = engine.compute_summary_as_of(&customers, today_or(args.as_of));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary_table(&summary));
    }
    Ok(())
}

// ==============================================================================
// Customer Management
// ==============================================================================

async fn handle_customers(repo: &dyn CustomerRepository, cmd: CustomerCommands) -> anyhow::Result<()> {
    match cmd {
        CustomerCommands::List => {
            let customers = repo.try_load().await?;
            println!("{}", customer_table(&customers));
        }
        CustomerCommands::Add(args) => {
            let customer = add_customer(repo, args).await?;
            println!("Added {} ({})", customer.name, customer.id);
        }
        CustomerCommands::Remove { id } => {
            repo.remove(id).await?;
            println!("Removed {id}");
        }
        CustomerCommands::SetStatus { id, status, cancel_date } => {
            let updated = repo.update_status(id, status, cancel_date).await?;
            println!("{} is now {}", updated.name, updated.status);
        }
    }
    Ok(())
}

async fn add_customer(repo: &dyn CustomerRepository, args: AddCustomerArgs) -> anyhow::Result<CustomerRecord> {
    let customer = CustomerRecord::new(NewCustomer {
        name: args.name,
        signup_date: args.signup_date,
        plan_value: args.plan_value,
        status: args.status,
        cancel_date: args.cancel_date,
    })?;
    repo.insert(&customer).await?;
    Ok(customer)
}

// ==============================================================================
// Import / Export
// ==============================================================================

async fn handle_import(repo: &dyn CustomerRepository, args: ImportArgs) -> anyhow::Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let raw = database::read_raw_customers(file)?;
    let ledger = metrics::normalize_records(raw)?;

    import_customers(repo, &ledger.customers, args.replace).await?;
    println!("{}", normalization_table(&ledger.report));
    Ok(())
}

/// Stores normalized customers in a single transaction, either appending
/// them to the ledger or swapping the whole ledger. A failed append stores
/// nothing, so a retry cannot duplicate rows.
async fn import_customers(
    repo: &dyn CustomerRepository,
    customers: &[CustomerRecord],
    replace: bool,
) -> anyhow::Result<()> {
    if replace {
        repo.replace_all(customers).await?;
        tracing::info!(count = customers.len(), "Ledger replaced from import.");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Appending {} customers...", customers.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    if let Err(e) = repo.insert_many(customers).await {
        spinner.abandon_with_message("Import failed; nothing was stored.");
        return Err(e.into());
    }
    spinner.finish_with_message("Import complete!");

    tracing::info!(count = customers.len(), "Customers appended from import.");
    Ok(())
}

async fn handle_export(
    repo: &dyn CustomerRepository,
    engine: MetricsEngine,
    cmd: ExportCommands,
) -> anyhow::Result<()> {
    let customers = repo.try_load().await?;

    let out = match cmd {
        ExportCommands::Customers { out } => {
            let writer = BufWriter::new(File::create(&out)?);
            database::write_customers(writer, &customers)?;
            out
        }
        ExportCommands::Metrics { out, as_of } => {
            let series = engine.compute_monthly_series_as_of(&customers, today_or(as_of));
            let writer = BufWriter::new(File::create(&out)?);
            database::write_monthly_metrics(writer, &series)?;
            out
        }
    };

    println!("Wrote {}", out.display());
    Ok(())
}

// ==============================================================================
// Table Rendering
// ==============================================================================

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn percent(value: Decimal) -> String {
    format!("{:.1}%", value.round_dp(1))
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn right(text: impl ToString) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn monthly_table(series: &[MonthlyMetric]) -> Table {
    let mut table = new_table(&[
        "Month", "New", "Active", "MRR", "Avg Ticket", "Churned", "Churned MRR",
    ]);
    for row in series {
        table.add_row(vec![
            Cell::new(row.month),
            right(row.new_customers),
            right(row.active_customers),
            right(money(row.mrr)),
            right(money(row.avg_ticket)),
            right(row.churned_customers),
            right(money(row.churned_mrr)),
        ]);
    }
    table
}

fn ltv_table(rows: &[CustomerLtv]) -> Table {
    let mut table = new_table(&["Customer", "Months", "LTV", "Status"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.name),
            right(row.months_active),
            right(money(row.ltv)),
            Cell::new(if row.cancelled { "Cancelled" } else { "Active" }),
        ]);
    }
    table
}

fn ltv_summary_table(summary: &LtvSummary) -> Table {
    let mut table = new_table(&["LTV", "Value"]);
    table.add_row(vec![Cell::new("Customers"), right(summary.customer_count)]);
    table.add_row(vec![Cell::new("Total LTV"), right(money(summary.total_ltv))]);
    table.add_row(vec![Cell::new("Average LTV"), right(money(summary.average_ltv))]);
    table.add_row(vec![Cell::new("Average LTV (active)"), right(money(summary.average_ltv_active))]);
    table.add_row(vec![Cell::new("Average LTV (churned)"), right(money(summary.average_ltv_churned))]);
    table.add_row(vec![Cell::new("Average months active"), right(summary.average_months_active.round_dp(1))]);
    table
}

fn summary_table(summary: &DashboardSummary) -> Table {
    let mut table = new_table(&["KPI", "Value"]);
    table.add_row(vec![Cell::new("Total customers"), right(summary.total_customers)]);
    table.add_row(vec![Cell::new("Active customers"), right(summary.active_customers)]);
    table.add_row(vec![Cell::new("Average monthly MRR"), right(money(summary.avg_monthly_mrr))]);
    table.add_row(vec![
        Cell::new("Average new customers / month"),
        right(summary.avg_monthly_new_customers.round_dp(1)),
    ]);
    table.add_row(vec![Cell::new("Overall churn rate"), right(percent(summary.overall_churn_rate_pct))]);
    if let Some(latest) = &summary.latest {
        table.add_row(vec![Cell::new("Latest month"), right(latest.month)]);
        table.add_row(vec![Cell::new("Latest MRR"), right(money(latest.mrr))]);
        table.add_row(vec![Cell::new("Latest churn rate"), right(percent(summary.latest_churn_rate_pct))]);
    }
    table
}

fn customer_table(customers: &[CustomerRecord]) -> Table {
    let mut table = new_table(&["Id", "Name", "Signup", "Plan", "Status", "Cancelled"]);
    for c in customers {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(&c.name),
            Cell::new(c.signup_date),
            right(money(c.plan_value)),
            Cell::new(c.status),
            Cell::new(c.cancel_date.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    table
}

fn normalization_table(report: &NormalizationReport) -> Table {
    let mut table = new_table(&["Import", "Rows"]);
    table.add_row(vec![Cell::new("Read"), right(report.total_rows)]);
    table.add_row(vec![Cell::new("Imported"), right(report.kept)]);
    table.add_row(vec![Cell::new("Dropped (no signup date)"), right(report.dropped_missing_signup)]);
    table.add_row(vec![Cell::new("Plan value repaired"), right(report.coerced_plan_values)]);
    table.add_row(vec![Cell::new("Cancel date ignored"), right(report.ignored_cancel_dates)]);
    table.add_row(vec![Cell::new("Status derived"), right(report.derived_statuses)]);
    table.add_row(vec![Cell::new("Unnamed"), right(report.unnamed)]);
    table
}
