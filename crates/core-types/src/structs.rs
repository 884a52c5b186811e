use crate::enums::CustomerStatus;
use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One customer subscription, as held by the repository and consumed by the
/// metrics engine.
///
/// Constructing a record through [`CustomerRecord::new`] enforces the two
/// input preconditions: a non-negative plan value and a cancellation date that
/// is not before the signup date. The engine relies on both and never checks
/// them again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: Uuid,
    pub name: String,
    pub signup_date: NaiveDate,
    /// The recurring monthly charge.
    pub plan_value: Decimal,
    pub status: CustomerStatus,
    pub cancel_date: Option<NaiveDate>,
}

/// The fields a caller supplies when registering a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub signup_date: NaiveDate,
    pub plan_value: Decimal,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    #[serde(default)]
    pub cancel_date: Option<NaiveDate>,
}

impl CustomerRecord {
    /// Creates a validated record with a fresh id.
    pub fn new(input: NewCustomer) -> Result<Self, CoreError> {
        Self::with_id(Uuid::new_v4(), input)
    }

    /// Creates a validated record with a known id (e.g. one read back from storage).
    pub fn with_id(id: Uuid, input: NewCustomer) -> Result<Self, CoreError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::InvalidInput(
                "name".to_string(),
                "must not be empty".to_string(),
            ));
        }
        check_plan_value(input.plan_value)?;

        // Without an explicit status, the cancellation date decides. An
        // explicit status must agree with it: Active carries no date and
        // Cancelled requires one.
        let (status, cancel_date) = match (input.status, input.cancel_date) {
            (None, Some(date)) => (CustomerStatus::Cancelled, Some(date)),
            (None, None) | (Some(CustomerStatus::Active), _) => (CustomerStatus::Active, None),
            (Some(CustomerStatus::Cancelled), Some(date)) => (CustomerStatus::Cancelled, Some(date)),
            (Some(CustomerStatus::Cancelled), None) => return Err(CoreError::MissingCancelDate),
        };
        check_cancel_date(&name, input.signup_date, cancel_date)?;

        Ok(Self {
            id,
            name,
            signup_date: input.signup_date,
            plan_value: input.plan_value,
            status,
            cancel_date,
        })
    }

    /// Returns a copy with the status changed.
    ///
    /// Cancelling requires a cancellation date; reactivating clears it.
    pub fn with_status(
        &self,
        status: CustomerStatus,
        cancel_date: Option<NaiveDate>,
    ) -> Result<Self, CoreError> {
        let cancel_date = match status {
            CustomerStatus::Active => None,
            CustomerStatus::Cancelled => Some(cancel_date.ok_or(CoreError::MissingCancelDate)?),
        };
        check_cancel_date(&self.name, self.signup_date, cancel_date)?;

        Ok(Self {
            status,
            cancel_date,
            ..self.clone()
        })
    }

    /// Whether the customer had signed up by, and not cancelled by, the end of `day`.
    pub fn is_active_at(&self, day: NaiveDate) -> bool {
        self.signup_date <= day && self.cancel_date.is_none_or(|cancel| cancel > day)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_date.is_some()
    }
}

/// Plan values are stored as `NUMERIC(14, 2)`.
pub const PLAN_VALUE_SCALE: u32 = 2;

/// The largest plan value the store can hold, `999_999_999_999.99`.
pub fn max_plan_value() -> Decimal {
    Decimal::new(99_999_999_999_999, PLAN_VALUE_SCALE)
}

fn check_plan_value(plan_value: Decimal) -> Result<(), CoreError> {
    if plan_value.is_sign_negative() && !plan_value.is_zero() {
        return Err(CoreError::NegativePlanValue(plan_value));
    }
    if plan_value > max_plan_value() {
        return Err(CoreError::PlanValueOutOfRange(plan_value));
    }
    if plan_value.normalize().scale() > PLAN_VALUE_SCALE {
        return Err(CoreError::PlanValuePrecision(plan_value));
    }
    Ok(())
}

fn check_cancel_date(
    name: &str,
    signup_date: NaiveDate,
    cancel_date: Option<NaiveDate>,
) -> Result<(), CoreError> {
    match cancel_date {
        Some(cancel_date) if cancel_date < signup_date => Err(CoreError::CancelBeforeSignup {
            name: name.to_string(),
            signup_date,
            cancel_date,
        }),
        _ => Ok(()),
    }
}
