use crate::DbError;
use crate::repository::CustomerRepository;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{CustomerRecord, CustomerStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A process-local customer store.
///
/// Nothing survives a restart; used for tests, demos and dry runs of an import.
#[derive(Debug, Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<Vec<CustomerRecord>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: Vec<CustomerRecord>) -> Self {
        Self {
            customers: RwLock::new(customers),
        }
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn try_load(&self) -> Result<Vec<CustomerRecord>, DbError> {
        Ok(self.customers.read().await.clone())
    }

    async fn insert(&self, customer: &CustomerRecord) -> Result<(), DbError> {
        let mut customers = self.customers.write().await;
        if customers.iter().any(|c| c.id == customer.id) {
            return Err(DbError::Duplicate(customer.id));
        }
        customers.push(customer.clone());
        Ok(())
    }

    async fn insert_many(&self, batch: &[CustomerRecord]) -> Result<(), DbError> {
        let mut customers = self.customers.write().await;
        for (i, customer) in batch.iter().enumerate() {
            let clash = customers.iter().chain(&batch[..i]).any(|c| c.id == customer.id);
            if clash {
                return Err(DbError::Duplicate(customer.id));
            }
        }
        customers.extend_from_slice(batch);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), DbError> {
        let mut customers = self.customers.write().await;
        let before = customers.len();
        customers.retain(|c| c.id != id);
        if customers.len() == before {
            return Err(DbError::NotFound(id));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CustomerStatus,
        cancel_date: Option<NaiveDate>,
    ) -> Result<CustomerRecord, DbError> {
        let mut customers = self.customers.write().await;
        let slot = customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DbError::NotFound(id))?;

        let updated = slot.with_status(status, cancel_date)?;
        *slot = updated.clone();
        Ok(updated)
    }

    async fn replace_all(&self, customers: &[CustomerRecord]) -> Result<(), DbError> {
        *self.customers.write().await = customers.to_vec();
        Ok(())
    }
}
