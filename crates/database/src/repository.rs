use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{CustomerRecord, CustomerStatus};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::postgres::PgPool;
use std::str::FromStr;
use uuid::Uuid;

/// The storage contract the rest of the application depends on.
///
/// Implementations hold validated `CustomerRecord`s only; validation happens
/// before anything reaches the store.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Fetches every known customer, propagating storage errors.
    async fn try_load(&self) -> Result<Vec<CustomerRecord>, DbError>;

    /// Adds a new customer.
    async fn insert(&self, customer: &CustomerRecord) -> Result<(), DbError>;

    /// Adds a batch of new customers. Either every record is stored or none is.
    async fn insert_many(&self, customers: &[CustomerRecord]) -> Result<(), DbError>;

    /// Deletes a customer by id.
    async fn remove(&self, id: Uuid) -> Result<(), DbError>;

    /// Changes a customer's status and cancellation date, returning the updated record.
    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        cancel_date: Option<NaiveDate>,
    ) -> Result<CustomerRecord, DbError>;

    /// Replaces the whole ledger atomically.
    async fn replace_all(&self, customers: &[CustomerRecord]) -> Result<(), DbError>;

    /// Fetches every known customer for the metrics engine.
    ///
    /// Never fails: a storage error is logged and an empty ledger returned, so
    /// the dashboard degrades to zeroed metrics instead of an error page.
    async fn load(&self) -> Vec<CustomerRecord> {
        match self.try_load().await {
            Ok(customers) => customers,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load customers; continuing with an empty ledger.");
                Vec::new()
            }
        }
    }
}

/// This struct represents a row fetched from the `customers` table.
#[derive(Debug, Clone, FromRow)]
struct DbCustomer {
    customer_id: Uuid,
    name: String,
    signup_date: NaiveDate,
    plan_value: Decimal,
    status: String,
    cancel_date: Option<NaiveDate>,
}

impl From<DbCustomer> for CustomerRecord {
    fn from(row: DbCustomer) -> Self {
        // An unknown label is repaired from the cancellation date rather than
        // failing the whole load.
        let status = CustomerStatus::from_str(&row.status).unwrap_or_else(|_| {
            tracing::warn!(customer_id = %row.customer_id, status = %row.status, "Unknown status label in database.");
            if row.cancel_date.is_some() {
                CustomerStatus::Cancelled
            } else {
                CustomerStatus::Active
            }
        });

        CustomerRecord {
            id: row.customer_id,
            name: row.name,
            signup_date: row.signup_date,
            plan_value: row.plan_value,
            status,
            cancel_date: row.cancel_date,
        }
    }
}

/// The `PgCustomerRepository` provides the PostgreSQL-backed customer store.
/// It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    /// Creates a new `PgCustomerRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_customer(&self, id: Uuid) -> Result<CustomerRecord, DbError> {
        let row = sqlx::query_as::<_, DbCustomer>(
            "SELECT customer_id, name, signup_date, plan_value, status, cancel_date FROM customers WHERE customer_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound(id))?;

        Ok(row.into())
    }
}

const INSERT_CUSTOMER: &str = r#"
    INSERT INTO customers (customer_id, name, signup_date, plan_value, status, cancel_date)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn try_load(&self) -> Result<Vec<CustomerRecord>, DbError> {
        let rows = sqlx::query_as::<_, DbCustomer>(
            r#"
            SELECT customer_id, name, signup_date, plan_value, status, cancel_date
            FROM customers
            ORDER BY signup_date ASC, created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rows.len(), "Loaded customers from the database.");
        Ok(rows.into_iter().map(CustomerRecord::from).collect())
    }

    async fn insert(&self, customer: &CustomerRecord) -> Result<(), DbError> {
        sqlx::query(INSERT_CUSTOMER)
            .bind(customer.id)
            .bind(&customer.name)
            .bind(customer.signup_date)
            .bind(customer.plan_value)
            .bind(customer.status.as_str())
            .bind(customer.cancel_date)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
                if duplicate {
                    DbError::Duplicate(customer.id)
                } else {
                    e.into()
                }
            })?;

        tracing::info!(customer_id = %customer.id, name = %customer.name, "Customer added.");
        Ok(())
    }

    async fn insert_many(&self, customers: &[CustomerRecord]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        for customer in customers {
            sqlx::query(INSERT_CUSTOMER)
                .bind(customer.id)
                .bind(&customer.name)
                .bind(customer.signup_date)
                .bind(customer.plan_value)
                .bind(customer.status.as_str())
                .bind(customer.cancel_date)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
                    if duplicate {
                        DbError::Duplicate(customer.id)
                    } else {
                        e.into()
                    }
                })?;
        }

        // Dropping `tx` on an early return rolls the batch back.
        tx.commit().await?;
        tracing::info!(count = customers.len(), "Customers appended.");
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id));
        }

        tracing::info!(customer_id = %id, "Customer removed.");
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        cancel_date: Option<NaiveDate>,
    ) -> Result<CustomerRecord, DbError> {
        let updated = self.fetch_customer(id).await?.with_status(status, cancel_date)?;

        sqlx::query("UPDATE customers SET status = $1, cancel_date = $2 WHERE customer_id = $3")
            .bind(updated.status.as_str())
            .bind(updated.cancel_date)
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!(customer_id = %id, status = %updated.status, "Customer status updated.");
        Ok(updated)
    }

    /// Replaces the table contents within a single transaction for atomicity.
    async fn replace_all(&self, customers: &[CustomerRecord]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM customers").execute(&mut *tx).await?;

        for customer in customers {
            sqlx::query(INSERT_CUSTOMER)
                .bind(customer.id)
                .bind(&customer.name)
                .bind(customer.signup_date)
                .bind(customer.plan_value)
                .bind(customer.status.as_str())
                .bind(customer.cancel_date)
                .execute(&mut *tx) // Note: must use the transaction object `tx` here
                .await?;
        }

        tx.commit().await?;
        tracing::info!(count = customers.len(), "Customer table replaced.");
        Ok(())
    }
}
