//! The harness must catch a store that is not atomic.
//!
//! `ReadThenWriteStore` checks the predicate on one snapshot and writes on a
//! later one, leaving a window between them. Driven through the engine, it
//! lets several callers take the last seat; the harness has to notice.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use admission_core::{
    AdmissionEngine, AdmissionRecord, AdmissionStore, CallerId, ConditionalUpdate, ResourceId,
    StoreFuture,
};
use admission_testing::{ConcurrencyHarness, HarnessConfig, HarnessViolation, test_clock};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct ReadThenWriteStore {
    records: std::sync::Mutex<std::collections::HashMap<ResourceId, AdmissionRecord>>,
}

impl AdmissionStore for ReadThenWriteStore {
    fn insert(&self, record: AdmissionRecord) -> StoreFuture<'_, ()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.resource_id, record);
        Box::pin(async { Ok(()) })
    }

    fn get(&self, resource_id: ResourceId) -> StoreFuture<'_, Option<AdmissionRecord>> {
        let snapshot = self.records.lock().unwrap().get(&resource_id).cloned();
        Box::pin(async move { Ok(snapshot) })
    }

    fn try_admit(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> StoreFuture<'_, ConditionalUpdate> {
        Box::pin(async move {
            let snapshot = self.records.lock().unwrap().get(&resource_id).cloned();
            let Some(mut record) = snapshot else {
                return Ok(ConditionalUpdate::NotMatched);
            };
            if !record.try_admit(caller_id) {
                return Ok(ConditionalUpdate::NotMatched);
            }

            // The race window.
            tokio::time::sleep(Duration::from_millis(5)).await;

            let mut records = self.records.lock().unwrap();
            let stored = records.get_mut(&resource_id).unwrap();
            stored.admitted.push(caller_id);
            stored.admitted_count = record.admitted_count;
            Ok(ConditionalUpdate::Matched)
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<AdmissionRecord>> {
        let records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        Box::pin(async move { Ok(records) })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn harness_detects_overbooking_by_a_non_atomic_store() {
    let engine = AdmissionEngine::new(
        Arc::new(ReadThenWriteStore::default()),
        Arc::new(test_clock()),
    );

    let report = ConcurrencyHarness::new(engine, HarnessConfig::new(1, 50))
        .run()
        .await
        .expect("harness run");

    let violations = report.verify().expect_err("a racy store must be caught");
    assert!(
        violations.iter().any(|v| matches!(
            v,
            HarnessViolation::AdmissionCount { expected: 1, actual } if *actual > 1
        )),
        "expected an admission count violation, got {violations:?}"
    );
    assert!(
        violations
            .iter()
            .any(|v| matches!(v, HarnessViolation::Record(_))),
        "expected the final record to be inconsistent, got {violations:?}"
    );
}
