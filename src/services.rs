use chrono::{Local, NaiveDate};
use std::sync::Arc;

use crate::cache::IntegrationCache;
use crate::errors::{AppError, StoreError};
use crate::models::{BankIntegration, BankIntegrationPatch, NewBankIntegration};
use crate::repository::IntegrationRepository;
use crate::resilience::{GuardError, Operation, Resilience};

/// Business operations on integration records.
///
/// Reads go to the cache first and fall back to the record store; every
/// operation runs under its own circuit breaker and time limit. When a guarded
/// call fails for an infrastructure reason the operation answers with an empty
/// result instead of an error.
pub struct IntegrationService {
    repository: Arc<dyn IntegrationRepository>,
    cache: Arc<dyn IntegrationCache>,
    resilience: Arc<Resilience>,
}

impl IntegrationService {
    pub fn new(
        repository: Arc<dyn IntegrationRepository>,
        cache: Arc<dyn IntegrationCache>,
        resilience: Arc<Resilience>,
    ) -> Self {
        Self {
            repository,
            cache,
            resilience,
        }
    }

    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    /// Lists every record.
    ///
    /// A non-empty cache is returned as-is. An empty cache is filled from the store
    /// one record at a time.
    pub async fn find_all(&self) -> Vec<BankIntegration> {
        tracing::debug!("findAll executed");
        self.resilience
            .guard(Operation::FindAll)
            .call_with(StoreError::is_transient, self.load_all())
            .await
            .unwrap_or_else(|e| fallback(Operation::FindAll, "", &e))
    }

    pub async fn find_by_id(&self, id: &str) -> Option<BankIntegration> {
        tracing::debug!("findById executed {}", id);
        self.resilience
            .guard(Operation::FindById)
            .call_with(StoreError::is_transient, self.load_by_id(id))
            .await
            .unwrap_or_else(|e| fallback(Operation::FindById, id, &e))
    }

    /// Looks a record up by identity document. Never consults the cache.
    pub async fn find_by_identity_dni(&self, dni: &str) -> Option<BankIntegration> {
        tracing::debug!("findByIdentityDni executed {}", dni);
        self.resilience
            .guard(Operation::FindByIdentityDni)
            .call_with(
                StoreError::is_transient,
                self.repository.find_by_identity_dni(dni),
            )
            .await
            .unwrap_or_else(|e| fallback(Operation::FindByIdentityDni, dni, &e))
    }

    /// Stores a new record registered today.
    ///
    /// Returns `Ok(None)` when the store could not be reached and
    /// `Err(AppError::Conflict)` when the identity document is taken.
    pub async fn create(
        &self,
        record: NewBankIntegration,
    ) -> Result<Option<BankIntegration>, AppError> {
        tracing::debug!("create executed {:?}", record);
        let args = record.identity_dni.clone();
        let result = self
            .resilience
            .guard(Operation::Create)
            .call_with(
                StoreError::is_transient,
                self.repository.insert(record, today()),
            )
            .await;

        resolve(Operation::Create, &args, result.map(Some))
    }

    /// Replaces the supplied fields of an existing record.
    ///
    /// `id` and the registration date are kept. Returns `Ok(None)` when the record
    /// does not exist or the store could not be reached.
    pub async fn update(
        &self,
        id: &str,
        patch: BankIntegrationPatch,
    ) -> Result<Option<BankIntegration>, AppError> {
        tracing::debug!("update executed {}:{:?}", id, patch);
        let result = self
            .resilience
            .guard(Operation::Update)
            .call_with(StoreError::is_transient, self.merge_and_save(id, patch))
            .await;

        resolve(Operation::Update, id, result)
    }

    /// Removes a record and evicts it from the cache, returning what was removed.
    pub async fn delete(&self, id: &str) -> Option<BankIntegration> {
        tracing::debug!("delete executed {}", id);
        self.resilience
            .guard(Operation::Delete)
            .call_with(StoreError::is_transient, self.remove(id))
            .await
            .unwrap_or_else(|e| fallback(Operation::Delete, id, &e))
    }

    async fn load_all(&self) -> Result<Vec<BankIntegration>, StoreError> {
        let cached = self.cache.list().await?;
        if !cached.is_empty() {
            tracing::debug!("findAll served {} record(s) from cache", cached.len());
            return Ok(cached);
        }

        let records = self.repository.find_all().await?;
        for record in &records {
            self.cache.put(&record.id, record).await?;
        }
        tracing::debug!("findAll loaded {} record(s) from store", records.len());
        Ok(records)
    }

    async fn load_by_id(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        if let Some(cached) = self.cache.get(id).await? {
            tracing::debug!("Cache hit for {}", id);
            return Ok(Some(cached));
        }

        match self.repository.find_by_id(id).await? {
            Some(record) => {
                self.cache.put(&record.id, &record).await?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn merge_and_save(
        &self,
        id: &str,
        patch: BankIntegrationPatch,
    ) -> Result<Option<BankIntegration>, StoreError> {
        let Some(mut existing) = self.repository.find_by_id(id).await? else {
            return Ok(None);
        };

        existing.apply(patch);
        let saved = self.repository.save(existing).await?;
        self.cache.put(&saved.id, &saved).await?;
        Ok(Some(saved))
    }

    async fn remove(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        let Some(existing) = self.repository.find_by_id(id).await? else {
            return Ok(None);
        };

        self.repository.delete(id).await?;
        self.cache.invalidate(id).await?;
        Ok(Some(existing))
    }
}

/// Registration date stamped on new records.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Substitute result for a guarded call that produced nothing.
fn fallback<T: Default>(operation: Operation, args: &str, err: &GuardError<StoreError>) -> T {
    tracing::warn!(
        "Fallback for {}({}) after failure: {}",
        operation.name(),
        args,
        err
    );
    T::default()
}

/// Business errors go back to the caller; anything else takes the fallback.
fn resolve<T: Default>(
    operation: Operation,
    args: &str,
    result: Result<T, GuardError<StoreError>>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(GuardError::Inner(StoreError::DuplicateIdentityDni(dni))) => Err(AppError::Conflict(
            format!("Identity document {} is already registered", dni),
        )),
        Err(e) => Ok(fallback(operation, args, &e)),
    }
}
