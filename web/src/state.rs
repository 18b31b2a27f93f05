//! Application state for Axum handlers.

use admission_core::AdmissionEngine;

/// State shared across all HTTP handlers.
///
/// Cloning is cheap: the engine holds its store behind an `Arc`.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Admission engine every handler goes through
    pub engine: AdmissionEngine,
}

impl AppState {
    /// Create application state around an engine.
    #[must_use]
    pub const fn new(engine: AdmissionEngine) -> Self {
        Self { engine }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Required for Axum
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
