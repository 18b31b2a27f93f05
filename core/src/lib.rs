//! # Admission Core
//!
//! Capacity-bounded concurrent admission.
//!
//! A resource (an event) declares a fixed capacity. Many independent callers
//! race to register for it. This crate decides which of them get in, with two
//! guarantees that hold under any amount of contention:
//!
//! - never more admissions than capacity
//! - never the same caller twice
//!
//! No in-process lock is used. Both guarantees come from a single atomic
//! conditional update provided by the backing store (see [`store`]).
//!
//! ## Modules
//!
//! - [`record`]: the admission record, identifiers, and invariant checks
//! - [`store`]: the backing store contract
//! - [`engine`]: registration, record creation, and reads
//! - [`error`]: engine errors
//! - [`environment`]: injected clock
//!
//! ## Example
//!
//! ```ignore
//! use admission_core::{AdmissionEngine, NewResource, ResourceMetadata, CallerId};
//!
//! let engine = AdmissionEngine::new(store, Arc::new(SystemClock));
//! let record = engine.create_record(NewResource::new(5, ResourceMetadata::default())).await?;
//!
//! match engine.register(record.resource_id, CallerId::new()).await? {
//!     RegistrationOutcome::Admitted => { /* seat taken */ }
//!     RegistrationOutcome::CapacityExhausted => { /* sold out */ }
//!     RegistrationOutcome::AlreadyAdmitted => { /* already in */ }
//!     RegistrationOutcome::ResourceNotFound => { /* no such event */ }
//!     RegistrationOutcome::Indeterminate => { /* check admission_status */ }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod environment;
pub mod error;
pub mod record;
pub mod store;

pub use engine::{AdmissionEngine, AdmissionStatus, EngineConfig, RegistrationOutcome};
pub use environment::{Clock, SystemClock};
pub use error::AdmissionError;
pub use record::{
    AdmissionRecord, CallerId, Capacity, InvariantViolation, NewResource, ResourceId,
    ResourceMetadata,
};
pub use store::{AdmissionStore, ConditionalUpdate, StoreError, StoreFuture};
