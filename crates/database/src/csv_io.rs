//! CSV import and export.
//!
//! Imports produce [`RawCustomerRecord`]s only; cleaning them is the job of
//! `metrics::normalize_records`. Exports write the same column names, so an
//! exported ledger can be imported again.

use crate::DbError;
use core_types::CustomerRecord;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use metrics::{MonthlyMetric, RawCustomerRecord};
use serde::Serialize;
use std::io::{Read, Write};

/// Reads customer rows from any CSV source with a header line.
///
/// Columns are matched by name (`name`, `signup_date`, `plan_value`, `status`,
/// `cancel_date`); missing columns and empty cells read as `None`, unknown
/// columns are ignored.
pub fn read_raw_customers<R: Read>(reader: R) -> Result<Vec<RawCustomerRecord>, DbError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawCustomerRecord>() {
        rows.push(result?);
    }

    tracing::debug!(rows = rows.len(), "Read customer rows from CSV.");
    Ok(rows)
}

#[derive(Serialize)]
struct CustomerCsvRow<'a> {
    id: String,
    name: &'a str,
    signup_date: String,
    plan_value: String,
    status: &'static str,
    cancel_date: String,
}

impl<'a> From<&'a CustomerRecord> for CustomerCsvRow<'a> {
    fn from(c: &'a CustomerRecord) -> Self {
        Self {
            id: c.id.to_string(),
            name: &c.name,
            signup_date: c.signup_date.format("%Y-%m-%d").to_string(),
            plan_value: c.plan_value.to_string(),
            status: c.status.as_str(),
            cancel_date: c
                .cancel_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Writes the customer ledger with ISO dates and plain decimal amounts.
pub fn write_customers<W: Write>(writer: W, customers: &[CustomerRecord]) -> Result<(), DbError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for customer in customers {
        wtr.serialize(CustomerCsvRow::from(customer))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[derive(Serialize)]
struct MetricCsvRow {
    month: String,
    new_customers: usize,
    active_customers: usize,
    mrr: String,
    avg_ticket: String,
    churned_customers: usize,
    churned_mrr: String,
}

impl From<&MonthlyMetric> for MetricCsvRow {
    fn from(m: &MonthlyMetric) -> Self {
        Self {
            month: m.month.to_string(),
            new_customers: m.new_customers,
            active_customers: m.active_customers,
            mrr: m.mrr.round_dp(2).to_string(),
            avg_ticket: m.avg_ticket.round_dp(2).to_string(),
            churned_customers: m.churned_customers,
            churned_mrr: m.churned_mrr.round_dp(2).to_string(),
        }
    }
}

/// Writes the monthly series, one row per month, amounts rounded to cents.
pub fn write_monthly_metrics<W: Write>(writer: W, series: &[MonthlyMetric]) -> Result<(), DbError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in series {
        wtr.serialize(MetricCsvRow::from(row))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
