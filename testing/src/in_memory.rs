//! In-memory admission store.
//!
//! The conditional update runs under one write-lock acquisition of the record
//! map, which plays the part of a database's single-row atomicity. The lock
//! belongs to the store; the engine still holds none.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use admission_core::{
    AdmissionRecord, AdmissionStore, CallerId, ConditionalUpdate, ResourceId, StoreError,
    StoreFuture,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// In-memory admission store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use admission_testing::InMemoryAdmissionStore;
///
/// let store = InMemoryAdmissionStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryAdmissionStore {
    records: Arc<RwLock<HashMap<ResourceId, AdmissionRecord>>>,
    latency: Duration,
}

impl InMemoryAdmissionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a network round trip before every operation.
    ///
    /// The delay is spent outside the lock, so concurrent callers genuinely
    /// interleave before reaching the atomic step.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Synchronous snapshot of one record, for assertions.
    #[must_use]
    pub fn snapshot(&self, resource_id: ResourceId) -> Option<AdmissionRecord> {
        self.records.read().unwrap().get(&resource_id).cloned()
    }

    async fn round_trip(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl AdmissionStore for InMemoryAdmissionStore {
    fn insert(&self, record: AdmissionRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.round_trip().await;
            let mut records = self.records.write().unwrap();
            if records.contains_key(&record.resource_id) {
                return Err(StoreError::DuplicateResource(record.resource_id));
            }
            records.insert(record.resource_id, record);
            Ok(())
        })
    }

    fn get(&self, resource_id: ResourceId) -> StoreFuture<'_, Option<AdmissionRecord>> {
        Box::pin(async move {
            self.round_trip().await;
            Ok(self.records.read().unwrap().get(&resource_id).cloned())
        })
    }

    fn try_admit(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> StoreFuture<'_, ConditionalUpdate> {
        Box::pin(async move {
            self.round_trip().await;
            let mut records = self.records.write().unwrap();
            let matched = records
                .get_mut(&resource_id)
                .is_some_and(|record| record.try_admit(caller_id));
            Ok(if matched {
                ConditionalUpdate::Matched
            } else {
                ConditionalUpdate::NotMatched
            })
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<AdmissionRecord>> {
        Box::pin(async move {
            self.round_trip().await;
            let mut records: Vec<_> = self.records.read().unwrap().values().cloned().collect();
            records.sort_by_key(|r| {
                (r.metadata.starts_at.is_none(), r.metadata.starts_at, r.created_at)
            });
            Ok(records)
        })
    }
}
