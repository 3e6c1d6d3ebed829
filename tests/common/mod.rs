//! Shared test doubles and builders.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_bank_integration::cache::{IntegrationCache, MokaIntegrationCache};
use rust_bank_integration::config::{CacheConfig, Config, ResilienceConfig};
use rust_bank_integration::errors::StoreError;
use rust_bank_integration::handlers::AppState;
use rust_bank_integration::models::{BankIntegration, NewBankIntegration};
use rust_bank_integration::repository::{InMemoryIntegrationRepository, IntegrationRepository};
use rust_bank_integration::resilience::Resilience;
use rust_bank_integration::services::IntegrationService;

/// Record store double: counts calls per method and can fail or stall on demand.
#[derive(Default)]
pub struct InstrumentedRepository {
    inner: InMemoryIntegrationRepository,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl InstrumentedRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of times `method` reached the store.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn enter(&self, method: &'static str) -> Result<(), StoreError> {
        *self.calls.lock().entry(method).or_insert(0) += 1;

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} refused", method)));
        }
        Ok(())
    }
}

#[async_trait]
impl IntegrationRepository for InstrumentedRepository {
    async fn find_all(&self) -> Result<Vec<BankIntegration>, StoreError> {
        self.enter("find_all").await?;
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        self.enter("find_by_id").await?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_identity_dni(
        &self,
        dni: &str,
    ) -> Result<Option<BankIntegration>, StoreError> {
        self.enter("find_by_identity_dni").await?;
        self.inner.find_by_identity_dni(dni).await
    }

    async fn insert(
        &self,
        record: NewBankIntegration,
        date_register: NaiveDate,
    ) -> Result<BankIntegration, StoreError> {
        self.enter("insert").await?;
        self.inner.insert(record, date_register).await
    }

    async fn save(&self, record: BankIntegration) -> Result<BankIntegration, StoreError> {
        self.enter("save").await?;
        self.inner.save(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.enter("delete").await?;
        self.inner.delete(id).await
    }
}

/// Breakers that open after 3 consecutive failures for 100ms, 200ms time limit.
pub fn resilience_config() -> ResilienceConfig {
    ResilienceConfig {
        failure_threshold: 3,
        failure_rate: 0.5,
        minimum_calls: 10_000,
        window: Duration::from_secs(30),
        open_duration: Duration::from_millis(100),
        max_open_duration: Duration::from_millis(100),
        time_limit: Duration::from_millis(200),
    }
}

pub struct Harness {
    pub repository: Arc<InstrumentedRepository>,
    pub cache: Arc<MokaIntegrationCache>,
    pub service: IntegrationService,
}

pub fn harness() -> Harness {
    harness_with(resilience_config())
}

pub fn harness_with(config: ResilienceConfig) -> Harness {
    let repository = InstrumentedRepository::new();
    let cache = Arc::new(MokaIntegrationCache::new(&CacheConfig::default()));
    let service = IntegrationService::new(
        repository.clone(),
        cache.clone() as Arc<dyn IntegrationCache>,
        Arc::new(Resilience::new(&config)),
    );
    Harness {
        repository,
        cache,
        service,
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        port: 9081,
        public_base_url: "http://register:9081".to_string(),
        cache: CacheConfig::default(),
        resilience: resilience_config(),
    }
}

/// Application state over an instrumented in-memory store.
pub fn app_state() -> (Arc<AppState>, Arc<InstrumentedRepository>) {
    let Harness {
        repository,
        service,
        ..
    } = harness();
    let state = Arc::new(AppState {
        config: test_config(),
        service,
    });
    (state, repository)
}

pub fn new_record(dni: &str) -> NewBankIntegration {
    NewBankIntegration {
        identity_dni: dni.to_string(),
        account_number: "ACC-1".to_string(),
        account_type: "SAVINGS".to_string(),
        balance: "100.00".parse::<BigDecimal>().unwrap(),
    }
}
