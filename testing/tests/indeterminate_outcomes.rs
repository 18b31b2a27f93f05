//! Store failures during registration.
//!
//! A timed-out or dropped conditional update is reported as `Indeterminate`
//! and never guessed at. Resolving it with a status read, then retrying,
//! must not admit the caller twice.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use admission_core::{
    AdmissionEngine, AdmissionError, AdmissionStatus, AdmissionStore, CallerId, EngineConfig,
    NewResource, RegistrationOutcome, ResourceId, ResourceMetadata, StoreError,
};
use admission_testing::{AdmitFault, FaultyStore, InMemoryAdmissionStore, test_clock};
use std::sync::Arc;
use std::time::Duration;

async fn setup(capacity: i64) -> (FaultyStore, AdmissionEngine, ResourceId) {
    let store = FaultyStore::new(Arc::new(InMemoryAdmissionStore::new()));
    let engine = AdmissionEngine::new(Arc::new(store.clone()), Arc::new(test_clock()));
    let record = engine
        .create_record(NewResource::new(capacity, ResourceMetadata::default()))
        .await
        .unwrap();
    (store, engine, record.resource_id)
}

#[tokio::test]
async fn timeout_before_apply_is_indeterminate_and_not_admitted() {
    let (store, engine, resource_id) = setup(1).await;
    let caller = CallerId::new();

    store.push_fault(AdmitFault::FailBefore(StoreError::Timeout));
    let outcome = engine.register(resource_id, caller).await.unwrap();

    assert_eq!(outcome, RegistrationOutcome::Indeterminate);
    assert_eq!(store.reads(), 0, "no disambiguation read after an unknown outcome");
    assert_eq!(
        engine.admission_status(resource_id, caller).await.unwrap(),
        AdmissionStatus::NotAdmitted
    );

    // The write never happened, so a retry takes the seat.
    assert_eq!(
        engine.register(resource_id, caller).await.unwrap(),
        RegistrationOutcome::Admitted
    );
}

#[tokio::test]
async fn lost_acknowledgement_resolves_to_already_admitted() {
    let (store, engine, resource_id) = setup(3).await;
    let caller = CallerId::new();

    store.push_fault(AdmitFault::FailAfter(StoreError::Transport(
        "connection reset by peer".into(),
    )));
    let outcome = engine.register(resource_id, caller).await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::Indeterminate);

    assert_eq!(
        engine.admission_status(resource_id, caller).await.unwrap(),
        AdmissionStatus::Admitted
    );

    // A blind retry is still safe.
    assert_eq!(
        engine.register(resource_id, caller).await.unwrap(),
        RegistrationOutcome::AlreadyAdmitted
    );

    let record = engine.get_record(resource_id).await.unwrap().unwrap();
    assert_eq!(record.admitted_count, 1);
    assert!(record.check_invariants().is_empty());
}

#[tokio::test]
async fn unavailable_store_surfaces_as_error() {
    let (store, engine, resource_id) = setup(1).await;

    store.push_fault(AdmitFault::FailBefore(StoreError::Unavailable(
        "pool timed out".into(),
    )));
    let err = engine
        .register(resource_id, CallerId::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AdmissionError::Store(StoreError::Unavailable("pool timed out".into()))
    );
}

#[tokio::test]
async fn database_error_is_never_reported_as_an_outcome() {
    let (store, engine, resource_id) = setup(1).await;

    store.push_fault(AdmitFault::FailBefore(StoreError::Database(
        "deadlock detected".into(),
    )));
    let result = engine.register(resource_id, CallerId::new()).await;

    assert!(matches!(
        result,
        Err(AdmissionError::Store(StoreError::Database(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_store_is_bounded_by_engine_timeout() {
    let slow = InMemoryAdmissionStore::new().with_latency(Duration::from_secs(30));
    let record = admission_core::AdmissionRecord::new(
        ResourceId::new(),
        admission_core::Capacity::new(1).unwrap(),
        ResourceMetadata::default(),
        chrono::Utc::now(),
    );
    let resource_id = record.resource_id;
    slow.insert(record).await.unwrap();

    let engine = AdmissionEngine::with_config(
        Arc::new(slow.clone()),
        Arc::new(test_clock()),
        EngineConfig {
            store_timeout: Duration::from_millis(100),
        },
    );

    let outcome = engine.register(resource_id, CallerId::new()).await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::Indeterminate);
}

#[tokio::test]
async fn queued_faults_apply_in_order_then_pass_through() {
    let (store, engine, resource_id) = setup(3).await;
    let (first, second, third) = (CallerId::new(), CallerId::new(), CallerId::new());

    store.push_fault(AdmitFault::FailBefore(StoreError::Timeout));
    store.push_fault(AdmitFault::FailAfter(StoreError::Transport("reset".into())));

    // First queued fault: nothing written.
    assert_eq!(
        engine.register(resource_id, first).await.unwrap(),
        RegistrationOutcome::Indeterminate
    );
    // Second queued fault: written, acknowledgement lost.
    assert_eq!(
        engine.register(resource_id, second).await.unwrap(),
        RegistrationOutcome::Indeterminate
    );
    // Queue drained: plain pass-through.
    assert_eq!(
        engine.register(resource_id, third).await.unwrap(),
        RegistrationOutcome::Admitted
    );

    let record = engine.get_record(resource_id).await.unwrap().unwrap();
    assert!(!record.contains(&first));
    assert!(record.contains(&second));
    assert!(record.contains(&third));
}
