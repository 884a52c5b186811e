use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Cancellation date {cancel_date} is before signup date {signup_date} for customer '{name}'")]
    CancelBeforeSignup {
        name: String,
        signup_date: NaiveDate,
        cancel_date: NaiveDate,
    },

    #[error("Plan value must not be negative, got {0}")]
    NegativePlanValue(Decimal),

    #[error("Plan value {0} exceeds the largest storable amount")]
    PlanValueOutOfRange(Decimal),

    #[error("Plan value {0} has more than two decimal places")]
    PlanValuePrecision(Decimal),

    #[error("A cancelled customer requires a cancellation date")]
    MissingCancelDate,
}
