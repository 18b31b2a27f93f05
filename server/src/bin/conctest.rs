//! Concurrency stress test.
//!
//! Creates one record with `CONCTEST_CAPACITY` seats, releases
//! `CONCTEST_CALLERS` callers at it at the same instant, prints what happened,
//! and exits non-zero if any admission invariant was broken.
//!
//! ```text
//! CONCTEST_BACKEND=postgres DATABASE_URL=postgres://localhost/admission cargo run --bin conctest
//! CONCTEST_BACKEND=memory CONCTEST_CAPACITY=5 CONCTEST_CALLERS=500 cargo run --bin conctest
//! ```

use admission_core::{AdmissionEngine, AdmissionStore, RegistrationOutcome, SystemClock};
use admission_postgres::PostgresAdmissionStore;
use admission_server::{Backend, Config, telemetry};
use admission_testing::{ConcurrencyHarness, HarnessConfig, InMemoryAdmissionStore};
use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    telemetry::init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let params = config.conctest;

    let store: Arc<dyn AdmissionStore> = match params.backend {
        Backend::Postgres => {
            let store = PostgresAdmissionStore::connect(&config.postgres())
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            Arc::new(store)
        }
        Backend::Memory => Arc::new(InMemoryAdmissionStore::new()),
    };

    let engine = AdmissionEngine::with_config(store, Arc::new(SystemClock), config.engine());
    let mut harness_config = HarnessConfig::new(params.capacity, params.callers);
    harness_config.metadata.title = format!("Capacity-{} stress test", params.capacity);

    println!("═══════════════════════════════════════════");
    println!("  Event admission concurrency stress test");
    println!("═══════════════════════════════════════════");
    println!("Backend           : {}", params.backend);

    let report = ConcurrencyHarness::new(engine, harness_config)
        .run()
        .await
        .context("Harness run failed")?;

    println!("{report}");

    for attempt in &report.attempts {
        if let Err(e) = &attempt.result {
            println!("  caller {}  error: {e}", attempt.caller_id);
        }
    }

    match report.verify() {
        Ok(()) => {
            println!(
                "\nPASS: {} of {} callers admitted, no overbooking, no duplicates",
                report.count(RegistrationOutcome::Admitted),
                report.distinct_callers
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(violations) => {
            println!("\nFAIL: {} violation(s)", violations.len());
            for violation in &violations {
                println!("  - {violation}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
