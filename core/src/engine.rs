//! The capacity-bounded admission engine.
//!
//! [`AdmissionEngine::register`] decides whether one caller is admitted to one
//! resource. It issues exactly one atomic conditional update against the store
//! and, only when that update does not match, one follow-up read to tell a
//! duplicate apart from a full resource.
//!
//! # Why no lock
//!
//! Any read-decide-write sequence admits more than `capacity` callers when
//! several of them race for the last seat, unless an external lock serializes
//! them. The engine instead pushes check and mutation into the store's single
//! conditional update, so the store is the serialization point and the engine
//! can run in any number of tasks and processes at once.
//!
//! # Disambiguation
//!
//! A conditional update reports only match / no match. After a no-match the
//! engine reads the record once:
//!
//! ```text
//! try_admit ──Matched──────────────────────────────▶ Admitted
//!     │
//!     ├─NotMatched─▶ get ──None──────────────────────▶ ResourceNotFound
//!     │                 ├─caller ∈ admitted──────────▶ AlreadyAdmitted
//!     │                 └─otherwise──────────────────▶ CapacityExhausted
//!     │
//!     └─Timeout / Transport──────────────────────────▶ Indeterminate
//! ```
//!
//! The read happens after the failed write and may observe a newer record, so
//! the reported reason is a best-effort diagnostic. It never changes the
//! admission decision, which the conditional update already made.

use crate::environment::Clock;
use crate::error::{AdmissionError, Result};
use crate::record::{AdmissionRecord, CallerId, Capacity, NewResource, ResourceId};
use crate::store::{AdmissionStore, ConditionalUpdate, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on each store round trip.
    ///
    /// When the conditional update exceeds it, the registration is reported as
    /// [`RegistrationOutcome::Indeterminate`].
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Terminal result of one registration attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// The caller took a seat during this call.
    Admitted,
    /// The caller already held a seat; nothing changed.
    AlreadyAdmitted,
    /// No seat was left for this caller.
    CapacityExhausted,
    /// No record exists for the resource.
    ResourceNotFound,
    /// The conditional update timed out or lost its connection.
    ///
    /// The seat may or may not have been taken. Resolve it with
    /// [`AdmissionEngine::admission_status`] before re-registering.
    Indeterminate,
}

impl RegistrationOutcome {
    /// Stable lowercase name, used for metric labels and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::AlreadyAdmitted => "already_admitted",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::ResourceNotFound => "resource_not_found",
            Self::Indeterminate => "indeterminate",
        }
    }

    /// Whether the call itself admitted the caller.
    #[must_use]
    pub const fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

impl fmt::Display for RegistrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a specific caller currently holds a seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    /// The caller is in the admitted list.
    Admitted,
    /// The caller is not in the admitted list.
    NotAdmitted,
    /// No record exists for the resource.
    ResourceNotFound,
}

/// Admission engine.
///
/// Cheap to clone; holds no mutable state of its own.
#[derive(Clone)]
pub struct AdmissionEngine {
    store: Arc<dyn AdmissionStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl fmt::Debug for AdmissionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdmissionEngine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn AdmissionStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn AdmissionStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attempt to admit `caller_id` to `resource_id`.
    ///
    /// Performs one conditional update and, if it does not match, one
    /// disambiguation read. Never retries.
    ///
    /// Re-issuing the call for the same caller is always safe: a caller who
    /// already holds a seat gets [`RegistrationOutcome::AlreadyAdmitted`].
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] for store failures that are neither a
    /// timeout nor a transport failure of the conditional update, including any
    /// failure of the disambiguation read.
    pub async fn register(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> Result<RegistrationOutcome> {
        let started = Instant::now();
        debug!(resource_id = %resource_id, caller_id = %caller_id, "Registration attempt");

        let outcome = match self.bounded(self.store.try_admit(resource_id, caller_id)).await {
            Ok(ConditionalUpdate::Matched) => RegistrationOutcome::Admitted,
            Ok(ConditionalUpdate::NotMatched) => {
                self.classify_rejection(resource_id, caller_id).await?
            }
            Err(error) if error.is_indeterminate() => {
                warn!(
                    resource_id = %resource_id,
                    caller_id = %caller_id,
                    error = %error,
                    "Conditional update outcome unknown"
                );
                RegistrationOutcome::Indeterminate
            }
            Err(error) => {
                store_error("try_admit", &error);
                return Err(error.into());
            }
        };

        metrics::counter!("admission.register.total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("admission.register.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if outcome.is_admitted() {
            info!(resource_id = %resource_id, caller_id = %caller_id, "Caller admitted");
        } else {
            debug!(
                resource_id = %resource_id,
                caller_id = %caller_id,
                outcome = %outcome,
                "Caller not admitted"
            );
        }

        Ok(outcome)
    }

    /// Classify a non-matching conditional update with one read.
    async fn classify_rejection(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> Result<RegistrationOutcome> {
        let snapshot = self
            .bounded(self.store.get(resource_id))
            .await
            .inspect_err(|error| store_error("disambiguate", error))?;

        Ok(match snapshot {
            None => RegistrationOutcome::ResourceNotFound,
            Some(record) if record.contains(&caller_id) => RegistrationOutcome::AlreadyAdmitted,
            Some(_) => RegistrationOutcome::CapacityExhausted,
        })
    }

    /// Create a new, empty admission record.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCapacity`] when `capacity <= 0` or too large;
    ///   nothing is written
    /// - [`AdmissionError::Store`] when the insert fails
    pub async fn create_record(&self, request: NewResource) -> Result<AdmissionRecord> {
        let capacity = Capacity::new(request.capacity).ok_or(AdmissionError::InvalidCapacity {
            capacity: request.capacity,
        })?;

        let record = AdmissionRecord::new(
            ResourceId::new(),
            capacity,
            request.metadata,
            self.clock.now(),
        );

        self.bounded(self.store.insert(record.clone()))
            .await
            .inspect_err(|error| store_error("insert", error))?;

        metrics::counter!("admission.records.created").increment(1);
        info!(
            resource_id = %record.resource_id,
            capacity = %record.capacity,
            title = %record.metadata.title,
            "Admission record created"
        );

        Ok(record)
    }

    /// Read a snapshot of one record.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] when the read fails.
    pub async fn get_record(&self, resource_id: ResourceId) -> Result<Option<AdmissionRecord>> {
        self.bounded(self.store.get(resource_id))
            .await
            .inspect_err(|error| store_error("get", error))
            .map_err(AdmissionError::from)
    }

    /// List every record, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] when the read fails.
    pub async fn list_records(&self) -> Result<Vec<AdmissionRecord>> {
        self.bounded(self.store.list())
            .await
            .inspect_err(|error| store_error("list", error))
            .map_err(AdmissionError::from)
    }

    /// Callers admitted to one resource, in admission order.
    ///
    /// Returns `None` when the resource does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] when the read fails.
    pub async fn list_admitted(&self, resource_id: ResourceId) -> Result<Option<Vec<CallerId>>> {
        Ok(self
            .get_record(resource_id)
            .await?
            .map(|record| record.admitted))
    }

    /// Whether `caller_id` currently holds a seat.
    ///
    /// This is the read to issue after an
    /// [`Indeterminate`](RegistrationOutcome::Indeterminate) registration.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] when the read fails.
    pub async fn admission_status(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> Result<AdmissionStatus> {
        Ok(match self.get_record(resource_id).await? {
            None => AdmissionStatus::ResourceNotFound,
            Some(record) if record.contains(&caller_id) => AdmissionStatus::Admitted,
            Some(_) => AdmissionStatus::NotAdmitted,
        })
    }

    /// Bound a store round trip by the configured timeout.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        tokio::time::timeout(self.config.store_timeout, operation)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

fn store_error(operation: &'static str, error: &StoreError) {
    metrics::counter!("admission.store.errors", "operation" => operation).increment(1);
    warn!(operation, error = %error, "Admission store error");
}
