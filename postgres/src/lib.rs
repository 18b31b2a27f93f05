//! `PostgreSQL` admission store.
//!
//! Implements [`AdmissionStore`] on one table, `admission_records`, with one row
//! per resource. The admission counter and the member list live in the same row
//! (`admitted_count INTEGER`, `admitted_ids UUID[]`), so the conditional update is
//! a single `UPDATE ... WHERE` statement:
//!
//! ```sql
//! UPDATE admission_records
//! SET admitted_count = admitted_count + 1,
//!     admitted_ids = array_append(admitted_ids, $2)
//! WHERE resource_id = $1
//!   AND admitted_count < capacity
//!   AND NOT ($2 = ANY(admitted_ids))
//! ```
//!
//! Row-level locking makes concurrent updates of the same row serialize, and
//! under READ COMMITTED a blocked update re-evaluates its `WHERE` clause against
//! the row version that won. Exactly one statement can take the last seat.
//!
//! # Example
//!
//! ```ignore
//! use admission_postgres::{PostgresAdmissionStore, PostgresConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PostgresConfig::new("postgres://localhost/admission");
//!     let store = PostgresAdmissionStore::connect(&config).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;

pub use config::PostgresConfig;

use admission_core::{
    AdmissionRecord, AdmissionStore, CallerId, Capacity, ConditionalUpdate, ResourceId,
    ResourceMetadata, StoreError, StoreFuture,
};
use chrono::{DateTime, Utc};
use error::{is_unique_violation, map_sqlx_error};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Instant;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r"
    SELECT resource_id, capacity, admitted_count, admitted_ids,
           title, description, organizer_id, starts_at, ends_at, created_at
    FROM admission_records
";

/// `PostgreSQL`-backed [`AdmissionStore`].
#[derive(Clone, Debug)]
pub struct PostgresAdmissionStore {
    pool: PgPool,
}

impl PostgresAdmissionStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the URL is invalid or the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect(&PostgresConfig::new(database_url)).await
    }

    /// Connect using explicit pool and session settings.
    ///
    /// Every pooled session gets `statement_timeout` from `config`, so a stuck
    /// conditional update is cancelled server-side instead of holding its row lock.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the URL is invalid or the database is unreachable.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let statement_timeout = config.statement_timeout.as_millis().to_string();
        let options = config
            .url
            .parse::<PgConnectOptions>()
            .map_err(|e| StoreError::Unavailable(format!("Invalid database URL: {e}")))?
            .options([("statement_timeout", statement_timeout.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            statement_timeout_ms = %statement_timeout,
            "Connected to admission database"
        );

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AdmissionRow {
    resource_id: Uuid,
    capacity: i32,
    admitted_count: i32,
    admitted_ids: Vec<Uuid>,
    title: String,
    description: String,
    organizer_id: Option<Uuid>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdmissionRow> for AdmissionRecord {
    type Error = StoreError;

    fn try_from(row: AdmissionRow) -> Result<Self, Self::Error> {
        let capacity = Capacity::new(i64::from(row.capacity)).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "record {} has capacity {}",
                row.resource_id, row.capacity
            ))
        })?;
        let admitted_count = u32::try_from(row.admitted_count).map_err(|_| {
            StoreError::Corrupt(format!(
                "record {} has admitted_count {}",
                row.resource_id, row.admitted_count
            ))
        })?;

        Ok(Self {
            resource_id: ResourceId::from_uuid(row.resource_id),
            capacity,
            admitted_count,
            admitted: row.admitted_ids.into_iter().map(CallerId::from_uuid).collect(),
            metadata: ResourceMetadata {
                title: row.title,
                description: row.description,
                organizer_id: row.organizer_id,
                starts_at: row.starts_at,
                ends_at: row.ends_at,
            },
            created_at: row.created_at,
        })
    }
}

fn record_query_duration(operation: &'static str, started: Instant) {
    metrics::histogram!("admission.postgres.query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

impl AdmissionStore for PostgresAdmissionStore {
    fn insert(&self, record: AdmissionRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let started = Instant::now();
            let capacity = i32::try_from(record.capacity.get()).map_err(|_| {
                StoreError::Corrupt(format!("capacity {} out of range", record.capacity.get()))
            })?;
            let admitted_count = i32::try_from(record.admitted_count).map_err(|_| {
                StoreError::Corrupt(format!(
                    "admitted_count {} out of range",
                    record.admitted_count
                ))
            })?;
            let admitted_ids: Vec<Uuid> = record.admitted.iter().map(|id| *id.as_uuid()).collect();

            sqlx::query(
                r"
                INSERT INTO admission_records
                    (resource_id, capacity, admitted_count, admitted_ids,
                     title, description, organizer_id, starts_at, ends_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(record.resource_id.as_uuid())
            .bind(capacity)
            .bind(admitted_count)
            .bind(&admitted_ids)
            .bind(&record.metadata.title)
            .bind(&record.metadata.description)
            .bind(record.metadata.organizer_id)
            .bind(record.metadata.starts_at)
            .bind(record.metadata.ends_at)
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateResource(record.resource_id)
                } else {
                    map_sqlx_error(e)
                }
            })?;

            record_query_duration("insert", started);
            Ok(())
        })
    }

    fn get(&self, resource_id: ResourceId) -> StoreFuture<'_, Option<AdmissionRecord>> {
        Box::pin(async move {
            let started = Instant::now();
            let query = format!("{SELECT_COLUMNS} WHERE resource_id = $1");
            let row: Option<AdmissionRow> = sqlx::query_as(&query)
                .bind(resource_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            record_query_duration("get", started);
            row.map(AdmissionRecord::try_from).transpose()
        })
    }

    fn try_admit(
        &self,
        resource_id: ResourceId,
        caller_id: CallerId,
    ) -> StoreFuture<'_, ConditionalUpdate> {
        Box::pin(async move {
            let started = Instant::now();
            let result = sqlx::query(
                r"
                UPDATE admission_records
                SET admitted_count = admitted_count + 1,
                    admitted_ids = array_append(admitted_ids, $2)
                WHERE resource_id = $1
                  AND admitted_count < capacity
                  AND NOT ($2 = ANY(admitted_ids))
                ",
            )
            .bind(resource_id.as_uuid())
            .bind(caller_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            record_query_duration("try_admit", started);

            match result.rows_affected() {
                0 => Ok(ConditionalUpdate::NotMatched),
                1 => Ok(ConditionalUpdate::Matched),
                n => Err(StoreError::Corrupt(format!(
                    "conditional update touched {n} rows for {resource_id}"
                ))),
            }
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<AdmissionRecord>> {
        Box::pin(async move {
            let started = Instant::now();
            let query =
                format!("{SELECT_COLUMNS} ORDER BY starts_at ASC NULLS LAST, created_at ASC");
            let rows: Vec<AdmissionRow> = sqlx::query_as(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            record_query_duration("list", started);
            rows.into_iter().map(AdmissionRecord::try_from).collect()
        })
    }
}
