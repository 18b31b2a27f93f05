//! Concurrency harness: the acceptance oracle for the admission engine.
//!
//! The harness creates one record, releases a crowd of simulated callers at
//! it at the same instant, and checks the aggregate result against the
//! admission invariants:
//!
//! - exactly `min(open seats, new distinct callers)` calls return `Admitted`
//! - the final record is neither overbooked nor inconsistent
//! - no caller is admitted twice
//! - every rejection carries the reason the final state implies
//!
//! # Example
//!
//! ```ignore
//! let harness = ConcurrencyHarness::new(engine, HarnessConfig::new(5, 20));
//! let report = harness.run().await?;
//! report.verify().expect("admission invariants hold");
//! ```

use admission_core::{
    AdmissionEngine, AdmissionError, AdmissionRecord, CallerId, InvariantViolation, NewResource,
    RegistrationOutcome, ResourceId, ResourceMetadata,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Barrier;
use tracing::info;

/// Harness parameters.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Capacity of the record under test
    pub capacity: i64,
    /// Number of distinct simulated callers
    pub callers: usize,
    /// How many concurrent `register` calls each caller issues
    pub attempts_per_caller: usize,
    /// Metadata for the record under test
    pub metadata: ResourceMetadata,
}

impl HarnessConfig {
    /// `callers` distinct callers, one attempt each, against `capacity` seats.
    #[must_use]
    pub fn new(capacity: i64, callers: usize) -> Self {
        Self {
            capacity,
            callers,
            attempts_per_caller: 1,
            metadata: ResourceMetadata {
                title: "Concurrency harness".to_string(),
                description: format!("{callers} callers racing for {capacity} seats"),
                ..ResourceMetadata::default()
            },
        }
    }

    /// Have every caller race itself with `attempts` concurrent calls.
    #[must_use]
    pub const fn attempts_per_caller(mut self, attempts: usize) -> Self {
        self.attempts_per_caller = attempts;
        self
    }
}

/// Errors that stop the harness before it can judge anything.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The record under test could not be created or re-read.
    #[error("Harness setup failed: {0}")]
    Setup(#[from] AdmissionError),

    /// The record under test does not exist, or vanished before the final read.
    #[error("Record {0} missing")]
    RecordMissing(ResourceId),

    /// A caller task panicked or was cancelled.
    #[error("Caller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One `register` call and what it returned.
#[derive(Clone, Debug)]
pub struct Attempt {
    /// Who called
    pub caller_id: CallerId,
    /// What the engine said
    pub result: Result<RegistrationOutcome, AdmissionError>,
}

/// Something the run did that the invariants forbid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessViolation {
    /// Wrong number of `Admitted` outcomes.
    AdmissionCount {
        /// `min(open seats, new distinct callers)`
        expected: usize,
        /// Observed
        actual: usize,
    },
    /// The final record breaks a record invariant.
    Record(InvariantViolation),
    /// One caller got `Admitted` more than once.
    AdmittedTwice(CallerId),
    /// A caller got `Admitted` but is not in the final record.
    AdmissionLost(CallerId),
    /// A caller is in the final record without ever getting `Admitted`.
    UnreportedAdmission(CallerId),
    /// A rejection whose reason contradicts the final record.
    WrongReason {
        /// Who called
        caller_id: CallerId,
        /// What the engine said
        outcome: RegistrationOutcome,
    },
    /// A call ended in an error.
    Failed {
        /// Who called
        caller_id: CallerId,
        /// The error, rendered
        error: String,
    },
}

impl fmt::Display for HarnessViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdmissionCount { expected, actual } => {
                write!(f, "expected {expected} admissions, got {actual}")
            }
            Self::Record(violation) => write!(f, "final record: {violation}"),
            Self::AdmittedTwice(caller) => write!(f, "caller {caller} admitted twice"),
            Self::AdmissionLost(caller) => {
                write!(f, "caller {caller} was told Admitted but is not in the record")
            }
            Self::UnreportedAdmission(caller) => {
                write!(f, "caller {caller} is in the record but was never told Admitted")
            }
            Self::WrongReason { caller_id, outcome } => {
                write!(f, "caller {caller_id} got {outcome}, which the final record contradicts")
            }
            Self::Failed { caller_id, error } => write!(f, "caller {caller_id} failed: {error}"),
        }
    }
}

/// Everything a run produced.
#[derive(Clone, Debug)]
pub struct HarnessReport {
    /// Record under test
    pub resource_id: ResourceId,
    /// Its capacity
    pub capacity: u32,
    /// Distinct callers released
    pub distinct_callers: usize,
    /// Members the record already had when the callers were released
    pub initial_admitted: Vec<CallerId>,
    /// Every call, in spawn order
    pub attempts: Vec<Attempt>,
    /// Record as read after every call returned
    pub final_record: AdmissionRecord,
    /// Wall time from release to the last return
    pub elapsed: Duration,
}

impl HarnessReport {
    /// Calls that returned `outcome`.
    #[must_use]
    pub fn count(&self, outcome: RegistrationOutcome) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.result, Ok(o) if o == outcome))
            .count()
    }

    /// Calls that returned an error.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.attempts.iter().filter(|a| a.result.is_err()).count()
    }

    /// Distinct callers released that were not already members.
    #[must_use]
    pub fn new_callers(&self) -> usize {
        let initial: HashSet<&CallerId> = self.initial_admitted.iter().collect();
        self.attempts
            .iter()
            .map(|a| &a.caller_id)
            .filter(|caller| !initial.contains(caller))
            .collect::<HashSet<_>>()
            .len()
    }

    /// `min(open seats, new distinct callers)`, seats counted before the run.
    #[must_use]
    pub fn expected_admissions(&self) -> usize {
        let open = usize::try_from(self.capacity)
            .unwrap_or(usize::MAX)
            .saturating_sub(self.initial_admitted.len());
        open.min(self.new_callers())
    }

    /// Judge the run.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn verify(&self) -> Result<(), Vec<HarnessViolation>> {
        let mut violations: Vec<HarnessViolation> = self
            .final_record
            .check_invariants()
            .into_iter()
            .map(HarnessViolation::Record)
            .collect();

        let admitted = self.count(RegistrationOutcome::Admitted);
        if admitted != self.expected_admissions() {
            violations.push(HarnessViolation::AdmissionCount {
                expected: self.expected_admissions(),
                actual: admitted,
            });
        }

        let mut admissions: HashMap<CallerId, usize> = HashMap::new();
        for attempt in &self.attempts {
            if matches!(attempt.result, Ok(RegistrationOutcome::Admitted)) {
                *admissions.entry(attempt.caller_id).or_default() += 1;
            }
        }

        let members: HashSet<CallerId> = self.final_record.admitted.iter().copied().collect();
        let initial: HashSet<CallerId> = self.initial_admitted.iter().copied().collect();

        let mut twice: Vec<_> = admissions
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(caller, _)| *caller)
            .collect();
        twice.sort();
        violations.extend(twice.into_iter().map(HarnessViolation::AdmittedTwice));

        let mut lost: Vec<_> = admissions
            .keys()
            .filter(|caller| !members.contains(*caller))
            .copied()
            .collect();
        lost.sort();
        violations.extend(lost.into_iter().map(HarnessViolation::AdmissionLost));

        violations.extend(
            self.final_record
                .admitted
                .iter()
                .filter(|caller| !admissions.contains_key(*caller) && !initial.contains(*caller))
                .map(|caller| HarnessViolation::UnreportedAdmission(*caller)),
        );

        for attempt in &self.attempts {
            let caller_id = attempt.caller_id;
            match &attempt.result {
                Ok(RegistrationOutcome::Admitted) => {}
                Ok(RegistrationOutcome::AlreadyAdmitted) if members.contains(&caller_id) => {}
                Ok(RegistrationOutcome::CapacityExhausted)
                    if !members.contains(&caller_id) && self.final_record.is_full() => {}
                Ok(outcome) => violations.push(HarnessViolation::WrongReason {
                    caller_id,
                    outcome: *outcome,
                }),
                Err(error) => violations.push(HarnessViolation::Failed {
                    caller_id,
                    error: error.to_string(),
                }),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl fmt::Display for HarnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resource          : {}", self.resource_id)?;
        writeln!(f, "Capacity          : {}", self.capacity)?;
        writeln!(f, "Distinct callers  : {}", self.distinct_callers)?;
        writeln!(f, "Total attempts    : {}", self.attempts.len())?;
        for outcome in [
            RegistrationOutcome::Admitted,
            RegistrationOutcome::AlreadyAdmitted,
            RegistrationOutcome::CapacityExhausted,
            RegistrationOutcome::ResourceNotFound,
            RegistrationOutcome::Indeterminate,
        ] {
            writeln!(f, "  {:<16}: {}", outcome.as_str(), self.count(outcome))?;
        }
        writeln!(f, "  {:<16}: {}", "errors", self.errors())?;
        writeln!(f, "Time taken        : {:?}", self.elapsed)?;
        write!(
            f,
            "Final state       : admitted_count={} members={}",
            self.final_record.admitted_count,
            self.final_record.admitted.len()
        )
    }
}

/// Drives concurrent callers against one record.
#[derive(Clone, Debug)]
pub struct ConcurrencyHarness {
    engine: AdmissionEngine,
    config: HarnessConfig,
}

impl ConcurrencyHarness {
    /// Create a harness over `engine`.
    #[must_use]
    pub const fn new(engine: AdmissionEngine, config: HarnessConfig) -> Self {
        Self { engine, config }
    }

    /// Create a fresh record and race every configured caller against it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the record cannot be created or re-read,
    /// or a caller task panics. Registration errors are recorded in the
    /// report, not returned.
    pub async fn run(&self) -> Result<HarnessReport, HarnessError> {
        let record = self
            .engine
            .create_record(NewResource::new(
                self.config.capacity,
                self.config.metadata.clone(),
            ))
            .await?;

        let callers: Vec<CallerId> = (0..self.config.callers).map(|_| CallerId::new()).collect();
        self.run_against(record.resource_id, &callers).await
    }

    /// Race `callers` (each repeated `attempts_per_caller` times) against an
    /// existing record.
    ///
    /// The record is read before the callers are released, so members it
    /// already has count against its capacity and are not expected to be
    /// reported as `Admitted` by this run.
    ///
    /// # Errors
    ///
    /// See [`ConcurrencyHarness::run`].
    pub async fn run_against(
        &self,
        resource_id: ResourceId,
        callers: &[CallerId],
    ) -> Result<HarnessReport, HarnessError> {
        let initial_admitted = self
            .engine
            .get_record(resource_id)
            .await?
            .ok_or(HarnessError::RecordMissing(resource_id))?
            .admitted;

        let attempts: Vec<CallerId> = callers
            .iter()
            .flat_map(|caller| std::iter::repeat_n(*caller, self.config.attempts_per_caller))
            .collect();

        info!(
            resource_id = %resource_id,
            callers = callers.len(),
            attempts = attempts.len(),
            "Releasing concurrent callers"
        );

        // Every task parks on the barrier; the last arrival releases them all.
        let barrier = Arc::new(Barrier::new(attempts.len() + 1));
        let handles: Vec<_> = attempts
            .into_iter()
            .map(|caller_id| {
                let engine = self.engine.clone();
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    Attempt {
                        caller_id,
                        result: engine.register(resource_id, caller_id).await,
                    }
                })
            })
            .collect();

        barrier.wait().await;
        let started = Instant::now();
        let attempts = futures::future::join_all(handles)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        let elapsed = started.elapsed();

        let final_record = self
            .engine
            .get_record(resource_id)
            .await?
            .ok_or(HarnessError::RecordMissing(resource_id))?;

        let distinct_callers = callers.iter().collect::<HashSet<_>>().len();

        Ok(HarnessReport {
            resource_id,
            capacity: final_record.capacity.get(),
            distinct_callers,
            initial_admitted,
            attempts,
            final_record,
            elapsed,
        })
    }
}
