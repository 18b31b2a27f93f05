//! Admission records and their identifiers.
//!
//! An [`AdmissionRecord`] is the durable state unit for one capacity-bounded
//! resource: its fixed capacity, the number of callers admitted so far, and the
//! callers themselves in admission order.
//!
//! # Invariants
//!
//! Every record observed through a store must satisfy:
//!
//! - `admitted_count <= capacity`
//! - `admitted_count == admitted.len()`
//! - no caller appears in `admitted` more than once
//! - a caller, once admitted, stays admitted
//!
//! [`AdmissionRecord::check_invariants`] reports the first three; the last one is
//! a property of the store contract (nothing in scope removes a member).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Largest capacity a record may declare.
///
/// Bounded by the signed 32-bit column the Postgres adapter stores it in.
pub const MAX_CAPACITY: u32 = i32::MAX as u32;

/// Unique identifier for an admission record (one per resource).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Creates a new random `ResourceId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ResourceId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque identity of a caller competing for admission.
///
/// Only equality matters to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(Uuid);

impl CallerId {
    /// Creates a new random `CallerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CallerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CallerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Validated capacity of a resource: always in `1..=MAX_CAPACITY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Capacity(u32);

impl Capacity {
    /// Validate a requested capacity.
    ///
    /// Returns `None` for zero, negative, or oversized values.
    #[must_use]
    pub fn new(requested: i64) -> Option<Self> {
        u32::try_from(requested)
            .ok()
            .filter(|c| (1..=MAX_CAPACITY).contains(c))
            .map(Self)
    }

    /// Get the capacity as a number of admissions.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Capacity {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
            .ok_or_else(|| format!("capacity must be between 1 and {MAX_CAPACITY}, got {value}"))
    }
}

impl From<Capacity> for u32 {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive fields carried alongside the counter.
///
/// The engine never reads these; they are stored and returned for the
/// surrounding service (listing, display).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Display title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Organizer of the event, if known
    #[serde(default)]
    pub organizer_id: Option<Uuid>,
    /// Scheduled start
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// Scheduled end
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

/// Request to create a new admission record.
///
/// `capacity` is left unvalidated here so that the engine can reject it with a
/// precise error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    /// Requested capacity (must be positive)
    pub capacity: i64,
    /// Descriptive fields
    #[serde(flatten)]
    pub metadata: ResourceMetadata,
}

impl NewResource {
    /// Create a request with the given capacity and metadata.
    #[must_use]
    pub const fn new(capacity: i64, metadata: ResourceMetadata) -> Self {
        Self { capacity, metadata }
    }
}

/// Which record invariant a snapshot breaks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// More callers admitted than the declared capacity.
    Overbooked {
        /// Admitted count found
        admitted_count: u32,
        /// Declared capacity
        capacity: u32,
    },
    /// Counter and membership list disagree.
    CountMismatch {
        /// Admitted count found
        admitted_count: u32,
        /// Number of entries in the membership list
        members: usize,
    },
    /// The same caller appears more than once.
    DuplicateMember(CallerId),
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbooked {
                admitted_count,
                capacity,
            } => write!(f, "overbooked: admitted_count={admitted_count} capacity={capacity}"),
            Self::CountMismatch {
                admitted_count,
                members,
            } => write!(f, "count mismatch: admitted_count={admitted_count} members={members}"),
            Self::DuplicateMember(caller) => write!(f, "caller {caller} admitted more than once"),
        }
    }
}

/// Durable admission state for one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    /// Resource identity, immutable
    pub resource_id: ResourceId,
    /// Declared capacity, immutable
    pub capacity: Capacity,
    /// Number of callers admitted
    pub admitted_count: u32,
    /// Admitted callers in admission order
    pub admitted: Vec<CallerId>,
    /// Descriptive fields
    #[serde(flatten)]
    pub metadata: ResourceMetadata,
    /// Creation timestamp, set once
    pub created_at: DateTime<Utc>,
}

impl AdmissionRecord {
    /// Create an empty record.
    #[must_use]
    pub const fn new(
        resource_id: ResourceId,
        capacity: Capacity,
        metadata: ResourceMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_id,
            capacity,
            admitted_count: 0,
            admitted: Vec::new(),
            metadata,
            created_at,
        }
    }

    /// Whether `caller` is among the admitted callers.
    #[must_use]
    pub fn contains(&self, caller: &CallerId) -> bool {
        self.admitted.contains(caller)
    }

    /// Seats still open.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.get().saturating_sub(self.admitted_count)
    }

    /// Whether no seats remain.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.admitted_count >= self.capacity.get()
    }

    /// Apply the admission predicate and mutation to this snapshot.
    ///
    /// Returns `true` and admits `caller` only if it is not already admitted and
    /// the record is below capacity; otherwise leaves the record untouched.
    ///
    /// This is the in-process form of the store's conditional update. A store
    /// must run it while holding exclusive access to the record.
    pub fn try_admit(&mut self, caller: CallerId) -> bool {
        if self.is_full() || self.contains(&caller) {
            return false;
        }
        self.admitted_count += 1;
        self.admitted.push(caller);
        true
    }

    /// Check the count, membership, and uniqueness invariants.
    ///
    /// Returns every violation found (empty when the record is sound).
    #[must_use]
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        if self.admitted_count > self.capacity.get() {
            violations.push(InvariantViolation::Overbooked {
                admitted_count: self.admitted_count,
                capacity: self.capacity.get(),
            });
        }

        if usize::try_from(self.admitted_count).ok() != Some(self.admitted.len()) {
            violations.push(InvariantViolation::CountMismatch {
                admitted_count: self.admitted_count,
                members: self.admitted.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.admitted.len());
        for caller in &self.admitted {
            if !seen.insert(*caller) {
                violations.push(InvariantViolation::DuplicateMember(*caller));
            }
        }

        violations
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(capacity: i64) -> AdmissionRecord {
        AdmissionRecord::new(
            ResourceId::new(),
            Capacity::new(capacity).unwrap(),
            ResourceMetadata::default(),
            Utc::now(),
        )
    }

    #[test]
    fn capacity_rejects_non_positive_and_oversized() {
        assert!(Capacity::new(0).is_none());
        assert!(Capacity::new(-3).is_none());
        assert!(Capacity::new(i64::from(MAX_CAPACITY) + 1).is_none());
        assert_eq!(Capacity::new(1).map(Capacity::get), Some(1));
        assert_eq!(Capacity::new(i64::from(MAX_CAPACITY)).map(Capacity::get), Some(MAX_CAPACITY));
    }

    #[test]
    fn capacity_deserialize_validates() {
        assert!(serde_json::from_str::<Capacity>("0").is_err());
        assert_eq!(serde_json::from_str::<Capacity>("5").unwrap().get(), 5);
    }

    #[test]
    fn try_admit_fills_to_capacity() {
        let mut rec = record(2);
        assert!(rec.try_admit(CallerId::new()));
        assert!(rec.try_admit(CallerId::new()));
        assert!(!rec.try_admit(CallerId::new()));
        assert_eq!(rec.admitted_count, 2);
        assert_eq!(rec.remaining(), 0);
        assert!(rec.is_full());
        assert!(rec.check_invariants().is_empty());
    }

    #[test]
    fn try_admit_rejects_duplicate_caller() {
        let mut rec = record(5);
        let caller = CallerId::new();
        assert!(rec.try_admit(caller));
        assert!(!rec.try_admit(caller));
        assert_eq!(rec.admitted, vec![caller]);
        assert_eq!(rec.admitted_count, 1);
    }

    #[test]
    fn check_invariants_reports_every_violation() {
        let mut rec = record(1);
        let caller = CallerId::new();
        rec.admitted = vec![caller, caller];
        rec.admitted_count = 3;

        let violations = rec.check_invariants();
        assert!(violations.contains(&InvariantViolation::Overbooked {
            admitted_count: 3,
            capacity: 1
        }));
        assert!(violations.contains(&InvariantViolation::CountMismatch {
            admitted_count: 3,
            members: 2
        }));
        assert!(violations.contains(&InvariantViolation::DuplicateMember(caller)));
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = ResourceId::new();
        let parsed: ResourceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CallerId>().is_err());
    }
}
