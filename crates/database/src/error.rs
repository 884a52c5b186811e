use core_types::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("An error occurred while reading or writing CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid customer data: {0}")]
    Validation(#[from] CoreError),

    #[error("Customer {0} was not found.")]
    NotFound(Uuid),

    #[error("Customer {0} already exists.")]
    Duplicate(Uuid),
}
