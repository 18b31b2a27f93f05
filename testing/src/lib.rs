//! # Admission Testing
//!
//! Testing utilities for the admission engine.
//!
//! This crate provides:
//! - [`InMemoryAdmissionStore`]: a store whose conditional update is atomic
//!   under a single lock acquisition
//! - [`FaultyStore`]: scripted timeouts and lost acknowledgements
//! - [`ConcurrencyHarness`]: races many callers at one record and judges the result
//! - [`properties`]: proptest strategies for call sequences
//! - [`mocks`]: deterministic clock
//!
//! ## Example
//!
//! ```ignore
//! use admission_testing::{ConcurrencyHarness, HarnessConfig, InMemoryAdmissionStore, test_clock};
//!
//! #[tokio::test]
//! async fn five_seats_twenty_callers() {
//!     let store = Arc::new(InMemoryAdmissionStore::new());
//!     let engine = AdmissionEngine::new(store, Arc::new(test_clock()));
//!     let harness = ConcurrencyHarness::new(engine, HarnessConfig::new(5, 20));
//!     let report = harness.run().await.unwrap();
//!     assert!(report.verify().is_ok());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod harness;
pub mod in_memory;

/// Mock implementations of environment traits.
pub mod mocks {
    use admission_core::environment::Clock;
    use chrono::{DateTime, TimeZone, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use admission_testing::mocks::FixedClock;
    /// use admission_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Capacities worth exercising: tiny, where the last seat is contested.
    pub fn capacity() -> impl Strategy<Value = i64> {
        1_i64..=8
    }

    /// A sequence of registrations, each naming one of `callers` callers by index.
    ///
    /// Indices repeat, so the same caller shows up several times.
    pub fn call_sequence(callers: usize, max_len: usize) -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0..callers.max(1), 0..=max_len)
    }
}

pub use faults::{AdmitFault, FaultyStore};
pub use harness::{
    Attempt, ConcurrencyHarness, HarnessConfig, HarnessError, HarnessReport, HarnessViolation,
};
pub use in_memory::InMemoryAdmissionStore;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::environment::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
