//! Backing store contract for admission records.
//!
//! The engine owns no locks. Every guarantee about overbooking and duplicate
//! admission rests on one primitive the store must provide:
//! [`AdmissionStore::try_admit`], a conditional update that checks
//! "caller not admitted AND count below capacity" and, only if both hold,
//! increments the count and appends the caller, as a single indivisible step
//! with respect to every other mutation of the same record.
//!
//! # Implementations
//!
//! - `PostgresAdmissionStore` (in `admission-postgres`): single-row conditional `UPDATE`
//! - `InMemoryAdmissionStore` (in `admission-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` rather than using `async fn` so the
//! engine can hold an `Arc<dyn AdmissionStore>`.

use crate::record::{AdmissionRecord, CallerId, ResourceId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Result of a conditional update.
///
/// A store can only say whether the condition held. It cannot say which
/// conjunct failed; that is the engine's disambiguation read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionalUpdate {
    /// The condition held and the mutation was applied.
    Matched,
    /// No record satisfied the condition; nothing changed.
    NotMatched,
}

/// Errors reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store gave up on the operation after it was issued.
    ///
    /// The mutation may or may not have been applied.
    #[error("Store operation timed out")]
    Timeout,

    /// The connection failed after the request may have reached the store.
    ///
    /// The mutation may or may not have been applied.
    #[error("Store transport error: {0}")]
    Transport(String),

    /// The request never reached the store (pool exhausted, connection refused).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to a valid record.
    #[error("Corrupt admission record: {0}")]
    Corrupt(String),

    /// A record with this identity already exists.
    #[error("Admission record already exists: {0}")]
    DuplicateResource(ResourceId),
}

impl StoreError {
    /// Whether the failed operation may still have taken effect.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

/// Durable, concurrently accessed storage of admission records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; any number of tasks, in any number of
/// processes, may call them concurrently against the same record.
pub trait AdmissionStore: Send + Sync {
    /// Insert a freshly created record.
    ///
    /// # Errors
    ///
    /// - `DuplicateResource` if the identity is already taken
    /// - any connection or database error
    fn insert(&self, record: AdmissionRecord) -> StoreFuture<'_, ()>;

    /// Read a consistent snapshot of one record.
    ///
    /// Returns `None` when no record exists. The snapshot may be stale by the
    /// time the caller looks at it.
    ///
    /// # Errors
    ///
    /// Any connection or database error, or `Corrupt` for an unreadable row.
    fn get(&self, resource_id: ResourceId) -> StoreFuture<'_, Option<AdmissionRecord>>;

    /// Atomically admit `caller_id` if it is not yet admitted and capacity remains.
    ///
    /// Predicate: `caller_id ∉ admitted AND admitted_count < capacity`.
    /// Mutation: `admitted_count += 1; admitted.push(caller_id)`.
    ///
    /// Check and mutation must be one indivisible operation on the record. A
    /// missing record reports `NotMatched`.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Transport` when the outcome is unknown; any other variant
    /// when the mutation certainly did not happen.
    fn try_admit(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> StoreFuture<'_, ConditionalUpdate>;

    /// List every record, ordered by `starts_at` (unscheduled last), then `created_at`.
    ///
    /// # Errors
    ///
    /// Any connection or database error.
    fn list(&self) -> StoreFuture<'_, Vec<AdmissionRecord>>;
}
