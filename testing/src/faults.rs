//! Fault injection for the conditional update.
//!
//! [`FaultyStore`] wraps another store and lets a test script what the next
//! `try_admit` calls do: fail before reaching the inner store, or reach it,
//! apply the mutation, and then lose the acknowledgement. The second mode is
//! how a real connection drop after commit looks to the engine.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use admission_core::{
    AdmissionRecord, AdmissionStore, CallerId, ConditionalUpdate, ResourceId, StoreError,
    StoreFuture,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted behaviour for one `try_admit` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmitFault {
    /// Fail without touching the inner store.
    FailBefore(StoreError),
    /// Forward to the inner store, then report this error instead of its answer.
    FailAfter(StoreError),
}

/// Store wrapper that injects scripted failures into `try_admit`.
///
/// Reads, inserts, and listings pass straight through. Calls with no
/// scripted fault also pass through.
#[derive(Clone)]
pub struct FaultyStore {
    inner: Arc<dyn AdmissionStore>,
    faults: Arc<Mutex<VecDeque<AdmitFault>>>,
    reads: Arc<AtomicUsize>,
}

impl FaultyStore {
    /// Wrap `inner` with no faults scripted.
    #[must_use]
    pub fn new(inner: Arc<dyn AdmissionStore>) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(VecDeque::new())),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a fault; queued faults are consumed in FIFO order, one per `try_admit` call.
    pub fn push_fault(&self, fault: AdmitFault) {
        self.faults.lock().unwrap().push_back(fault);
    }

    /// Number of `get` calls forwarded so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AdmissionStore for FaultyStore {
    fn insert(&self, record: AdmissionRecord) -> StoreFuture<'_, ()> {
        self.inner.insert(record)
    }

    fn get(&self, resource_id: ResourceId) -> StoreFuture<'_, Option<AdmissionRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(resource_id)
    }

    fn try_admit(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> StoreFuture<'_, ConditionalUpdate> {
        let fault = self.faults.lock().unwrap().pop_front();
        Box::pin(async move {
            match fault {
                None => self.inner.try_admit(resource_id, caller_id).await,
                Some(AdmitFault::FailBefore(error)) => Err(error),
                Some(AdmitFault::FailAfter(error)) => {
                    self.inner.try_admit(resource_id, caller_id).await?;
                    Err(error)
                }
            }
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<AdmissionRecord>> {
        self.inner.list()
    }
}
