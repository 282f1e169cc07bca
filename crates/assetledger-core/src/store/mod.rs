//! Relational persistence (C1).
//!
//! A thin layer over `sqlx::PgPool`: one repository module per entity, each
//! exposing plain `async fn`s that take a connection/transaction handle and
//! return `Result<T, StoreError>`. Grounded in the repository-function
//! style of a sibling system's Postgres-backed cloud module — one function
//! per operation, parameterized queries throughout, no query built from
//! interpolated request data.

pub mod models;

pub mod asset_items;
pub mod asset_models;
pub mod audit;
pub mod employees;
pub mod loans;
pub mod stock_items;
pub mod users;

use std::future::Future;
use std::pin::Pin;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::StoreError;

/// A boxed, connection-borrowing future. Closures passed to
/// [`in_transaction`]/[`in_transaction_with_retry`] must return one of
/// these rather than an `async move` block directly — the block captures
/// `&mut PgConnection` by reference, and a bare `Fn(&mut PgConnection) ->
/// Fut` bound cannot express a `Fut` whose type depends on the borrow's
/// lifetime without boxing.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Offset+limit pagination, clamped to a hard upper bound so a single
/// request can never force the store to materialize an unbounded result
/// set.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

/// Hard upper bound on `Page::limit`, matching the ceiling named for list
/// endpoints.
pub const MAX_PAGE_SIZE: u32 = 200;

impl Page {
    /// Build a page, clamping `limit` to `[1, MAX_PAGE_SIZE]`.
    #[must_use]
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(50, 0)
    }
}

/// A validated sort field plus direction. Constructed only via
/// [`SortSpec::parse`], which checks the requested field against a
/// per-entity allow-list — sort fields are never taken from the request as
/// a raw string into SQL, since that was a documented prior
/// sort-injection bug in the source this system was modeled on.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: &'static str,
    pub descending: bool,
}

impl SortSpec {
    /// Parse a requested sort field against `allowed`, returning the
    /// allow-listed `&'static str` (never the caller-provided string) on a
    /// match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSort`] if `requested` is not in
    /// `allowed`.
    pub fn parse(
        requested: &str,
        descending: bool,
        allowed: &'static [&'static str],
    ) -> Result<Self, StoreError> {
        allowed
            .iter()
            .find(|candidate| **candidate == requested)
            .map(|field| Self {
                field,
                descending,
            })
            .ok_or(StoreError::InvalidSort)
    }
}

/// Isolation level for [`in_transaction`]. `Serializable` is mandatory for
/// any mutation that touches stock counts or asset-item status; everything
/// else may use `ReadCommitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// The Postgres SQLSTATE for a serialization failure under SERIALIZABLE
/// isolation.
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Run `f` inside a single transaction at the requested isolation level,
/// committing on success and rolling back on error.
///
/// This is the only sanctioned way to touch stock or asset-item status:
/// every caller in `crate::loans` and `crate::stock` goes through here
/// rather than issuing bare pool queries, so the audit write and the
/// business write always share one commit.
///
/// # Errors
///
/// Returns whatever `f` returns, or [`StoreError::Database`] if the
/// transaction itself cannot begin or commit.
pub async fn in_transaction<T, F>(
    pool: &PgPool,
    isolation: IsolationLevel,
    f: F,
) -> Result<T, StoreError>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, StoreError>>,
{
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    if isolation == IsolationLevel::Serializable {
        sqlx::query(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.as_sql()
        ))
        .execute(&mut *tx)
        .await?;
    }

    let result = f(&mut tx).await;

    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            // rollback is implicit on drop; explicit here for clarity at
            // the call site when reading a trace
            tx.rollback().await?;
            Err(e)
        }
    }
}

/// Returns true if `err` is a Postgres serialization failure
/// (`SQLSTATE 40001`), the signal that a `Serializable` transaction should
/// be retried.
#[must_use]
pub fn is_serialization_failure(err: &StoreError) -> bool {
    match err {
        StoreError::Database(sqlx::Error::Database(db_err)) => {
            db_err.code().as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE)
        }
        _ => false,
    }
}

/// Bounded retry count for [`in_transaction_with_retry`], per the stock
/// reservation design (C10): past this many serialization failures the
/// conflict surfaces to the caller instead of retrying forever.
const MAX_SERIALIZATION_RETRIES: u32 = 3;
const RETRY_BACKOFF_MIN_MS: u64 = 5;
const RETRY_BACKOFF_MAX_MS: u64 = 25;

/// Like [`in_transaction`], but on a `SERIALIZABLE` serialization failure
/// retries the whole transaction up to [`MAX_SERIALIZATION_RETRIES`] times
/// with a few milliseconds of jittered backoff between attempts. Past that,
/// returns `StoreError::Conflict("stock contention, retry")`.
///
/// Used by any operation that mutates stock counts or asset-item status —
/// `crate::loans::LoanEngine` calls this instead of `in_transaction` for
/// every state-changing operation.
///
/// # Errors
///
/// Returns whatever `f` returns, or the bounded-retry conflict above.
pub async fn in_transaction_with_retry<T, F>(
    pool: &PgPool,
    isolation: IsolationLevel,
    mut f: F,
) -> Result<T, StoreError>
where
    F: for<'c> FnMut(&'c mut PgConnection) -> BoxFuture<'c, Result<T, StoreError>>,
{
    use rand::Rng;

    let mut attempt = 0;
    loop {
        match in_transaction(pool, isolation, |conn| f(conn)).await {
            Ok(value) => return Ok(value),
            Err(e) if is_serialization_failure(&e) && attempt < MAX_SERIALIZATION_RETRIES => {
                attempt += 1;
                let backoff_ms =
                    rand::thread_rng().gen_range(RETRY_BACKOFF_MIN_MS..=RETRY_BACKOFF_MAX_MS);
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }
            Err(e) if is_serialization_failure(&e) => {
                return Err(StoreError::Conflict("stock contention, retry".to_owned()));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pre-check that `value` is not already in use for `column` on `table`,
/// used before writes where the caller wants a clean `{field, message}`
/// error instead of a raw constraint-violation bubbling up from the
/// database.
///
/// # Errors
///
/// Returns [`StoreError::UniqueViolation`] if a row already exists with
/// that value (excluding `excluding_id` if given).
pub async fn validate_unique(
    conn: &mut PgConnection,
    table: &str,
    column: &'static str,
    value: &str,
    excluding_id: Option<uuid::Uuid>,
) -> Result<(), StoreError> {
    let exists: bool = match excluding_id {
        Some(id) => {
            sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = $1 AND id <> $2)"
            ))
            .bind(value)
            .bind(id)
            .fetch_one(conn)
            .await?
        }
        None => {
            sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = $1)"
            ))
            .bind(value)
            .fetch_one(conn)
            .await?
        }
    };

    if exists {
        Err(StoreError::UniqueViolation { field: column })
    } else {
        Ok(())
    }
}
