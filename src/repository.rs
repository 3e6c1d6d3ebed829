use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{BankIntegration, NewBankIntegration};

/// Durable storage of integration records.
///
/// Implementations enforce uniqueness of `identity_dni` and report a collision
/// as [`StoreError::DuplicateIdentityDni`].
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<BankIntegration>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<BankIntegration>, StoreError>;

    async fn find_by_identity_dni(&self, dni: &str)
        -> Result<Option<BankIntegration>, StoreError>;

    /// Persists a new record; the store assigns its id.
    async fn insert(
        &self,
        record: NewBankIntegration,
        date_register: NaiveDate,
    ) -> Result<BankIntegration, StoreError>;

    /// Writes `record` under its id, replacing any previous version.
    async fn save(&self, record: BankIntegration) -> Result<BankIntegration, StoreError>;

    /// Hard delete. Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Generates a new opaque record id.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Record store kept in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryIntegrationRepository {
    records: RwLock<HashMap<String, BankIntegration>>,
}

impl InMemoryIntegrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn dni_taken(
        records: &HashMap<String, BankIntegration>,
        dni: &str,
        except_id: Option<&str>,
    ) -> bool {
        records
            .values()
            .any(|r| r.identity_dni == dni && Some(r.id.as_str()) != except_id)
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrationRepository {
    async fn find_all(&self) -> Result<Vec<BankIntegration>, StoreError> {
        let mut records: Vec<BankIntegration> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.date_register
                .cmp(&b.date_register)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_identity_dni(
        &self,
        dni: &str,
    ) -> Result<Option<BankIntegration>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.identity_dni == dni)
            .cloned())
    }

    async fn insert(
        &self,
        record: NewBankIntegration,
        date_register: NaiveDate,
    ) -> Result<BankIntegration, StoreError> {
        let mut records = self.records.write().await;
        if Self::dni_taken(&records, &record.identity_dni, None) {
            return Err(StoreError::DuplicateIdentityDni(record.identity_dni));
        }

        let stored = record.into_record(new_record_id(), date_register);
        records.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn save(&self, record: BankIntegration) -> Result<BankIntegration, StoreError> {
        let mut records = self.records.write().await;
        if Self::dni_taken(&records, &record.identity_dni, Some(&record.id)) {
            return Err(StoreError::DuplicateIdentityDni(record.identity_dni));
        }

        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}
