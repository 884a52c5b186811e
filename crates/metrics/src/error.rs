use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("Invalid customer record at row {row}: {source}")]
    Validation {
        row: usize,
        #[source]
        source: CoreError,
    },
}
