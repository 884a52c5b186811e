//! Cleaning of loosely-typed customer rows (spreadsheets, CSV exports) into
//! validated [`CustomerRecord`]s.
//!
//! Field-level problems are repaired or the row is dropped, and the repairs
//! are counted in a [`NormalizationReport`]. A cancellation dated before the
//! signup is not a formatting problem and is returned as an error instead.

use crate::error::MetricsError;
use chrono::{NaiveDate, NaiveDateTime};
use core_types::{CustomerRecord, CustomerStatus, NewCustomer, PLAN_VALUE_SCALE, max_plan_value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A customer row as it appears in a file: every field is free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCustomerRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub signup_date: Option<String>,
    #[serde(default)]
    pub plan_value: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_date: Option<String>,
}

/// Counts of what the normalization pass had to repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub total_rows: usize,
    pub kept: usize,
    /// Rows without a usable signup date.
    pub dropped_missing_signup: usize,
    /// Plan values that were missing, unparseable, negative or unstorable and became
    /// zero, or that were rounded to cents.
    pub coerced_plan_values: usize,
    /// Cancellation dates that could not be parsed and were ignored.
    pub ignored_cancel_dates: usize,
    /// Rows whose status was missing or unknown and was derived from the cancellation date.
    pub derived_statuses: usize,
    /// Rows without a name that received a placeholder.
    pub unnamed: usize,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_missing_signup == 0
            && self.coerced_plan_values == 0
            && self.ignored_cancel_dates == 0
            && self.derived_statuses == 0
            && self.unnamed == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLedger {
    pub customers: Vec<CustomerRecord>,
    pub report: NormalizationReport,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const MISSING_MARKERS: &[&str] = &["", "nan", "nat", "none", "null"];

/// Parses a calendar date written in any of the formats found in customer files.
///
/// Returns `None` for blanks, null markers and anything unparseable.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if is_missing(value) {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Parses a money amount in either `1,234.56` or `1.234,56` notation.
///
/// Currency prefixes (`R$`, `$`) and spaces are ignored. When both separators
/// appear, the last one is the decimal separator; a lone comma is always a
/// decimal separator.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let value: String = raw
        .trim()
        .trim_start_matches("R$")
        .trim_start_matches('$')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if is_missing(&value) {
        return None;
    }

    let last_comma = value.rfind(',');
    let last_dot = value.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => value.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => value.replace(',', ""),
        (Some(_), None) => value.replace(',', "."),
        (None, Some(_)) if value.matches('.').count() > 1 => value.replace('.', ""),
        _ => value,
    };

    Decimal::from_str(&canonical).ok()
}

/// Converts raw rows into validated records.
///
/// Rows keep their relative order. `row` numbers in errors are 1-based and
/// count data rows only.
pub fn normalize_records(
    rows: impl IntoIterator<Item = RawCustomerRecord>,
) -> Result<NormalizedLedger, MetricsError> {
    let mut report = NormalizationReport::default();
    let mut customers = Vec::new();

    for (index, raw) in rows.into_iter().enumerate() {
        report.total_rows += 1;
        let row = index + 1;

        let Some(signup_date) = raw.signup_date.as_deref().and_then(parse_date) else {
            tracing::debug!(row, signup_date = ?raw.signup_date, "Dropping row without a usable signup date.");
            report.dropped_missing_signup += 1;
            continue;
        };

        let plan_value = match raw.plan_value.as_deref().and_then(parse_money) {
            Some(value) if (!value.is_sign_negative() || value.is_zero()) && value <= max_plan_value() => {
                let cents = value.round_dp(PLAN_VALUE_SCALE);
                if cents != value {
                    tracing::debug!(row, plan_value = %value, "Rounding plan value to cents.");
                    report.coerced_plan_values += 1;
                }
                cents
            }
            other => {
                tracing::debug!(row, plan_value = ?raw.plan_value, parsed = ?other, "Coercing plan value to zero.");
                report.coerced_plan_values += 1;
                Decimal::ZERO
            }
        };

        let mut cancel_date = match raw.cancel_date.as_deref() {
            Some(text) if !is_missing(text.trim()) => {
                let parsed = parse_date(text);
                if parsed.is_none() {
                    tracing::debug!(row, cancel_date = text, "Ignoring unparseable cancellation date.");
                    report.ignored_cancel_dates += 1;
                }
                parsed
            }
            _ => None,
        };

        let status = match raw.status.as_deref().map(CustomerStatus::from_str) {
            Some(Ok(CustomerStatus::Cancelled)) if cancel_date.is_none() => {
                tracing::debug!(row, "Cancelled row without a cancellation date; deriving status.");
                report.derived_statuses += 1;
                None
            }
            Some(Ok(CustomerStatus::Active)) if cancel_date.is_some() => {
                tracing::debug!(row, cancel_date = ?cancel_date, "Active row with a cancellation date; ignoring the date.");
                report.ignored_cancel_dates += 1;
                cancel_date = None;
                Some(CustomerStatus::Active)
            }
            Some(Ok(status)) => Some(status),
            _ => {
                report.derived_statuses += 1;
                None
            }
        };

        let name = match raw.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                report.unnamed += 1;
                format!("Customer {row}")
            }
        };

        let record = CustomerRecord::new(NewCustomer {
            name,
            signup_date,
            plan_value,
            status,
            cancel_date,
        })
        .map_err(|source| MetricsError::Validation { row, source })?;

        customers.push(record);
    }

    report.kept = customers.len();
    if report.is_clean() {
        tracing::debug!(rows = report.total_rows, "Customer rows normalized without repairs.");
    } else {
        tracing::warn!(
            rows = report.total_rows,
            kept = report.kept,
            dropped = report.dropped_missing_signup,
            coerced_plan_values = report.coerced_plan_values,
            ignored_cancel_dates = report.ignored_cancel_dates,
            derived_statuses = report.derived_statuses,
            "Customer rows needed repairs during normalization."
        );
    }

    Ok(NormalizedLedger { customers, report })
}

fn is_missing(value: &str) -> bool {
    MISSING_MARKERS.contains(&value.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::CoreError;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(name: &str, signup: &str, plan: &str, status: &str, cancel: &str) -> RawCustomerRecord {
        let field = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawCustomerRecord {
            name: field(name),
            signup_date: field(signup),
            plan_value: field(plan),
            status: field(status),
            cancel_date: field(cancel),
        }
    }

    #[test]
    fn parses_supported_date_formats() {
        assert_eq!(parse_date("2025-03-29"), Some(date(2025, 3, 29)));
        assert_eq!(parse_date("29/02/2024"), Some(date(2024, 2, 29)));
        assert_eq!(parse_date("2023/12/01"), Some(date(2023, 12, 1)));
        assert_eq!(parse_date("2025-06-23 00:00:00"), Some(date(2025, 6, 23)));
        assert_eq!(parse_date(" 2025-06-23T14:05:09.123 "), Some(date(2025, 6, 23)));
    }

    #[test]
    fn rejects_blank_and_invalid_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("NaT"), None);
        assert_eq!(parse_date("nan"), None);
        assert_eq!(parse_date("29/02/2025"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn parses_money_in_both_notations() {
        assert_eq!(parse_money("4.000,00"), Some(dec!(4000)));
        assert_eq!(parse_money("4,000.00"), Some(dec!(4000)));
        assert_eq!(parse_money("1.500,50"), Some(dec!(1500.50)));
        assert_eq!(parse_money("10.000,25"), Some(dec!(10000.25)));
        assert_eq!(parse_money("1500,5"), Some(dec!(1500.5)));
        assert_eq!(parse_money("500"), Some(dec!(500)));
        assert_eq!(parse_money("2500.75"), Some(dec!(2500.75)));
        assert_eq!(parse_money("R$ 9.000,00"), Some(dec!(9000)));
        assert_eq!(parse_money("1.000.000"), Some(dec!(1000000)));
        assert_eq!(parse_money("-20"), Some(dec!(-20)));
    }

    #[test]
    fn rejects_non_numeric_money() {
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("nan"), None);
    }

    #[test]
    fn clean_rows_pass_through() {
        let ledger = normalize_records(vec![
            raw("Aarna AI", "2025-03-29", "4000", "Ativo", ""),
            raw("Balancer", "23/06/2025", "6.000,00", "Cancelado", "01/08/2025"),
        ])
        .unwrap();

        assert!(ledger.report.is_clean());
        assert_eq!(ledger.report.kept, 2);
        assert_eq!(ledger.customers[0].plan_value, dec!(4000));
        assert_eq!(ledger.customers[0].status, CustomerStatus::Active);
        assert_eq!(ledger.customers[1].signup_date, date(2025, 6, 23));
        assert_eq!(ledger.customers[1].cancel_date, Some(date(2025, 8, 1)));
        assert_eq!(ledger.customers[1].status, CustomerStatus::Cancelled);
    }

    #[test]
    fn drops_rows_without_signup_and_coerces_fields() {
        let ledger = normalize_records(vec![
            raw("No date", "", "100", "Active", ""),
            raw("Bad date", "31/31/2025", "100", "Active", ""),
            raw("Bad plan", "2025-01-10", "free", "Active", ""),
            raw("Negative", "2025-01-11", "-50", "", ""),
            raw("", "2025-01-12", "", "paused", "sometime"),
        ])
        .unwrap();

        let report = ledger.report;
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.kept, 3);
        assert_eq!(report.dropped_missing_signup, 2);
        assert_eq!(report.coerced_plan_values, 3);
        assert_eq!(report.ignored_cancel_dates, 1);
        assert_eq!(report.derived_statuses, 2);
        assert_eq!(report.unnamed, 1);

        assert!(ledger.customers.iter().all(|c| c.plan_value == Decimal::ZERO));
        let unnamed = &ledger.customers[2];
        assert_eq!(unnamed.name, "Customer 5");
        assert_eq!(unnamed.cancel_date, None);
        assert_eq!(unnamed.status, CustomerStatus::Active);
    }

    #[test]
    fn status_and_cancel_date_are_reconciled() {
        let ledger = normalize_records(vec![
            raw("Says cancelled", "2025-01-10", "100", "Cancelado", ""),
            raw("Says active", "2025-01-10", "50", "Ativo", "2025-01-20"),
        ])
        .unwrap();

        assert_eq!(ledger.report.kept, 2);
        assert_eq!(ledger.report.derived_statuses, 1);
        assert_eq!(ledger.report.ignored_cancel_dates, 1);

        let says_cancelled = &ledger.customers[0];
        assert_eq!(says_cancelled.status, CustomerStatus::Active);
        assert_eq!(says_cancelled.cancel_date, None);

        let says_active = &ledger.customers[1];
        assert_eq!(says_active.status, CustomerStatus::Active);
        assert_eq!(says_active.cancel_date, None);
    }

    #[test]
    fn plan_values_are_kept_within_storable_cents() {
        let ledger = normalize_records(vec![
            raw("Sub-cent", "2025-01-10", "49,995", "", ""),
            raw("Huge", "2025-01-10", "1.000.000.000.000", "", ""),
            raw("Exact", "2025-01-10", "49,90", "", ""),
        ])
        .unwrap();

        assert_eq!(ledger.report.coerced_plan_values, 2);
        assert_eq!(ledger.customers[0].plan_value, dec!(50.00));
        assert_eq!(ledger.customers[1].plan_value, Decimal::ZERO);
        assert_eq!(ledger.customers[2].plan_value, dec!(49.90));
    }

    #[test]
    fn cancel_before_signup_is_a_validation_error() {
        let err = normalize_records(vec![
            raw("Fine", "2025-01-01", "10", "Active", ""),
            raw("Backwards", "2025-05-01", "10", "Cancelled", "2025-04-01"),
        ])
        .unwrap_err();

        match err {
            MetricsError::Validation { row, source } => {
                assert_eq!(row, 2);
                assert!(matches!(source, CoreError::CancelBeforeSignup { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let ledger = normalize_records(Vec::new()).unwrap();
        assert!(ledger.customers.is_empty());
        assert_eq!(ledger.report, NormalizationReport::default());
    }
}
