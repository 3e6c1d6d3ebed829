/// Service behaviour against an instrumented record store
/// Covers cache-then-store reads, write semantics and the resilience guards
mod common;

use bigdecimal::BigDecimal;
use common::{harness, harness_with, new_record, resilience_config};
use rust_bank_integration::cache::IntegrationCache;
use rust_bank_integration::circuit_breaker::CircuitState;
use rust_bank_integration::config::ResilienceConfig;
use rust_bank_integration::errors::AppError;
use rust_bank_integration::models::BankIntegrationPatch;
use rust_bank_integration::resilience::Operation;
use rust_bank_integration::services::today;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_create_stamps_today_and_cold_read_matches() {
    let h = harness();

    let created = h
        .service
        .create(new_record("12345678"))
        .await
        .unwrap()
        .expect("record should be stored");
    assert!(!created.id.is_empty());
    assert_eq!(created.date_register, today());

    // Create does not write through
    assert!(h.cache.get(&created.id).await.unwrap().is_none());

    let read = h.service.find_by_id(&created.id).await.unwrap();
    assert_eq!(read.account_number, "ACC-1");
    assert_eq!(read.account_type, "SAVINGS");
    assert_eq!(read.balance, "100".parse::<BigDecimal>().unwrap());
}

#[tokio::test]
async fn test_find_by_id_populates_cache_on_miss() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();

    assert!(h.service.find_by_id(&created.id).await.is_some());
    assert_eq!(h.repository.calls("find_by_id"), 1);

    // Second read is served from the cache
    assert!(h.service.find_by_id(&created.id).await.is_some());
    assert_eq!(h.repository.calls("find_by_id"), 1);
    assert!(h.cache.get(&created.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_find_by_id_full_miss_is_none() {
    let h = harness();

    assert!(h.service.find_by_id("does-not-exist").await.is_none());
    assert!(h.cache.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_identity_dni_bypasses_cache() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();

    for _ in 0..2 {
        let found = h.service.find_by_identity_dni("12345678").await.unwrap();
        assert_eq!(found.id, created.id);
    }
    assert_eq!(h.repository.calls("find_by_identity_dni"), 2);
    assert!(h.service.find_by_identity_dni("00000000").await.is_none());
}

#[tokio::test]
async fn test_find_all_warms_cache_then_serves_it() {
    let h = harness();
    let first = h.service.create(new_record("11111111")).await.unwrap().unwrap();

    assert_eq!(h.service.find_all().await.len(), 1);
    assert_eq!(h.repository.calls("find_all"), 1);
    assert_eq!(h.cache.get(&first.id).await.unwrap().map(|r| r.id), Some(first.id));

    // A non-empty cache is taken as complete: records created afterwards are not
    // listed until they are cached
    let second = h.service.create(new_record("22222222")).await.unwrap().unwrap();
    assert_eq!(h.service.find_all().await.len(), 1);
    assert_eq!(h.repository.calls("find_all"), 1);

    h.service.find_by_id(&second.id).await.unwrap();
    assert_eq!(h.service.find_all().await.len(), 2);
}

#[tokio::test]
async fn test_find_all_empty_store() {
    let h = harness();

    assert!(h.service.find_all().await.is_empty());
    assert!(h.service.find_all().await.is_empty());
    // Empty cache means the store is consulted every time
    assert_eq!(h.repository.calls("find_all"), 2);
}

#[tokio::test]
async fn test_update_preserves_id_and_date_and_refreshes_cache() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();
    h.service.find_by_id(&created.id).await.unwrap();

    let updated = h
        .service
        .update(
            &created.id,
            BankIntegrationPatch {
                account_number: Some("ACC-2".to_string()),
                balance: Some("50.00".parse().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("record exists");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.date_register, created.date_register);
    assert_eq!(updated.account_number, "ACC-2");
    assert_eq!(updated.account_type, "SAVINGS");
    assert_eq!(updated.identity_dni, "12345678");
    assert_eq!(updated.balance, "50".parse::<BigDecimal>().unwrap());

    let cached = h.cache.get(&created.id).await.unwrap().unwrap();
    assert_eq!(cached.account_number, "ACC-2");
    let read = h.service.find_by_id(&created.id).await.unwrap();
    assert_eq!(read.balance, "50".parse::<BigDecimal>().unwrap());
}

#[tokio::test]
async fn test_update_missing_record_is_none() {
    let h = harness();

    let result = h
        .service
        .update("missing", BankIntegrationPatch::default())
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(h.repository.calls("save"), 0);
}

#[tokio::test]
async fn test_delete_twice_and_evicts_cache() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();
    h.service.find_by_id(&created.id).await.unwrap();
    assert!(h.cache.get(&created.id).await.unwrap().is_some());

    let removed = h.service.delete(&created.id).await.expect("first delete removes");
    assert_eq!(removed.id, created.id);
    assert!(h.service.delete(&created.id).await.is_none());

    assert!(h.cache.get(&created.id).await.unwrap().is_none());
    assert!(h.service.find_by_id(&created.id).await.is_none());
}

#[tokio::test]
async fn test_duplicate_identity_dni_is_a_conflict() {
    let h = harness();
    h.service.create(new_record("12345678")).await.unwrap().unwrap();

    for _ in 0..5 {
        let result = h.service.create(new_record("12345678")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    // Business errors never open the breaker
    assert_eq!(
        h.service.resilience().guard(Operation::Create).state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_update_to_taken_identity_dni_is_a_conflict() {
    let h = harness();
    h.service.create(new_record("11111111")).await.unwrap().unwrap();
    let second = h.service.create(new_record("22222222")).await.unwrap().unwrap();

    let result = h
        .service
        .update(
            &second.id,
            BankIntegrationPatch {
                identity_dni: Some("11111111".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_store_failures_fall_back_to_empty_results() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();
    h.repository.set_failing(true);

    assert!(h.service.find_all().await.is_empty());
    assert!(h.service.find_by_id(&created.id).await.is_none());
    assert!(h.service.find_by_identity_dni("12345678").await.is_none());
    assert!(h.service.create(new_record("87654321")).await.unwrap().is_none());
    assert!(h
        .service
        .update(&created.id, BankIntegrationPatch::default())
        .await
        .unwrap()
        .is_none());
    assert!(h.service.delete(&created.id).await.is_none());
}

#[tokio::test]
async fn test_breaker_short_circuits_then_admits_trial() {
    let h = harness();
    let created = h.service.create(new_record("12345678")).await.unwrap().unwrap();
    h.repository.set_failing(true);

    for _ in 0..3 {
        assert!(h.service.find_by_id(&created.id).await.is_none());
    }
    assert_eq!(h.repository.calls("find_by_id"), 3);
    let guard = h.service.resilience().guard(Operation::FindById);
    assert_eq!(guard.state(), CircuitState::Open);

    // Open: the store is not touched
    assert!(h.service.find_by_id(&created.id).await.is_none());
    assert_eq!(h.repository.calls("find_by_id"), 3);

    // Other operations have their own breaker
    assert_eq!(
        h.service.resilience().guard(Operation::FindAll).state(),
        CircuitState::Closed
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    h.repository.set_failing(false);

    let trial = h.service.find_by_id(&created.id).await;
    assert_eq!(trial.map(|r| r.id), Some(created.id));
    assert_eq!(h.repository.calls("find_by_id"), 4);
    assert_eq!(guard.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_failed_trial_reopens_breaker() {
    let h = harness();
    h.repository.set_failing(true);

    for _ in 0..3 {
        h.service.find_by_identity_dni("12345678").await;
    }
    let guard = h.service.resilience().guard(Operation::FindByIdentityDni);
    assert_eq!(guard.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.service.find_by_identity_dni("12345678").await.is_none());
    assert_eq!(h.repository.calls("find_by_identity_dni"), 4);
    assert_eq!(guard.state(), CircuitState::Open);

    // Still open: no further store calls
    h.service.find_by_identity_dni("12345678").await;
    assert_eq!(h.repository.calls("find_by_identity_dni"), 4);
}

#[tokio::test]
async fn test_slow_store_times_out_to_fallback() {
    let h = harness();
    h.service.create(new_record("12345678")).await.unwrap().unwrap();
    h.repository.set_delay(Duration::from_millis(1_000));

    let started = Instant::now();
    assert!(h.service.find_all().await.is_empty());
    assert!(started.elapsed() < Duration::from_millis(900));

    // Timeouts count toward the breaker
    h.service.find_all().await;
    h.service.find_all().await;
    assert_eq!(
        h.service.resilience().guard(Operation::FindAll).state(),
        CircuitState::Open
    );
    assert_eq!(h.repository.calls("find_all"), 3);
}

#[tokio::test]
async fn test_breaker_opens_on_failure_rate() {
    let h = harness_with(ResilienceConfig {
        failure_rate: 0.5,
        minimum_calls: 4,
        window: Duration::from_secs(1),
        ..resilience_config()
    });
    // The success rate is only judged once a full window has been observed
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    // Never more than one failure in a row, threshold is 3
    for failing in [true, false, false] {
        h.repository.set_failing(failing);
        h.service.find_by_identity_dni("12345678").await;
    }
    let guard = h.service.resilience().guard(Operation::FindByIdentityDni);
    assert_eq!(guard.state(), CircuitState::Closed);

    h.repository.set_failing(true);
    h.service.find_by_identity_dni("12345678").await;
    assert_eq!(guard.state(), CircuitState::Open);
    assert_eq!(h.repository.calls("find_by_identity_dni"), 4);

    h.repository.set_failing(false);
    assert!(h.service.find_by_identity_dni("12345678").await.is_none());
    assert_eq!(h.repository.calls("find_by_identity_dni"), 4);
}
