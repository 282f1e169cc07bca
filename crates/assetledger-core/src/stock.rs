//! Stock reservation (C10) — the one place parallelism is observable to
//! end users. Two managers creating loans against the same consumable row
//! must never overdraw it.
//!
//! The row-level primitives (`reserve_in_tx`/`release_in_tx`) are single
//! conditional `UPDATE`s meant to run inside a caller-owned transaction —
//! `crate::loans::LoanEngine` calls these directly from within its own
//! `SERIALIZABLE` block. The bounded retry-with-jittered-backoff on a
//! Postgres serialization failure (`SQLSTATE 40001`) lives one level up, in
//! `store::in_transaction_with_retry`, since what actually gets retried is
//! the whole transaction, not just this one row update. `reserve`/`release`
//! below are pool-level convenience wrappers around that retry for callers
//! that only need to touch stock and nothing else.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StockError;
use crate::store::{self, IsolationLevel};

/// Reserve `requested` units of the stock row, incrementing `loaned`. Must
/// run inside the caller's own transaction.
///
/// # Errors
///
/// Returns [`StockError::Insufficient`] if the row does not have enough
/// free quantity.
pub async fn reserve_in_tx(
    conn: &mut sqlx::PgConnection,
    stock_item_id: Uuid,
    requested: i64,
) -> Result<(), StockError> {
    let updated = store::stock_items::reserve(conn, stock_item_id, requested).await?;
    match updated {
        Some(_) => Ok(()),
        None => {
            let current = store::stock_items::find_by_id(conn, stock_item_id).await;
            let available = current.ok().map_or(0, |s| s.quantity - s.loaned);
            Err(StockError::Insufficient {
                requested,
                available,
            })
        }
    }
}

/// Release `quantity` previously-reserved units back onto the stock row.
/// Must run inside the caller's own transaction.
///
/// # Errors
///
/// Returns [`StockError::Store`] on a database failure.
pub async fn release_in_tx(
    conn: &mut sqlx::PgConnection,
    stock_item_id: Uuid,
    quantity: i64,
) -> Result<(), StockError> {
    store::stock_items::release(conn, stock_item_id, quantity).await?;
    Ok(())
}

/// Reserve `quantity` units in its own `SERIALIZABLE` transaction, retrying
/// on serialization conflict. For callers that only need to touch stock —
/// the loan engine instead reserves inline as part of a larger transaction.
///
/// # Errors
///
/// Returns [`StockError::Insufficient`] if the row does not have enough
/// free quantity, or [`StockError::Contention`] if every retry still hit a
/// serialization conflict.
pub async fn reserve(pool: &PgPool, stock_item_id: Uuid, quantity: i64) -> Result<(), StockError> {
    store::in_transaction_with_retry(pool, IsolationLevel::Serializable, |conn| {
        let conn = &mut *conn;
        Box::pin(async move {
            reserve_in_tx(conn, stock_item_id, quantity)
                .await
                .map_err(store_err_or_conflict)
        })
    })
    .await
    .map_err(stock_err_from_store)
}

/// Release `quantity` units in its own `SERIALIZABLE` transaction, retrying
/// on serialization conflict.
///
/// # Errors
///
/// Returns [`StockError::Contention`] if every retry still hit a
/// serialization conflict.
pub async fn release(pool: &PgPool, stock_item_id: Uuid, quantity: i64) -> Result<(), StockError> {
    store::in_transaction_with_retry(pool, IsolationLevel::Serializable, |conn| {
        let conn = &mut *conn;
        Box::pin(async move {
            release_in_tx(conn, stock_item_id, quantity)
                .await
                .map_err(store_err_or_conflict)
        })
    })
    .await
    .map_err(stock_err_from_store)
}

fn store_err_or_conflict(err: StockError) -> crate::error::StoreError {
    match err {
        StockError::Store(e) => e,
        StockError::Insufficient { requested, available } => crate::error::StoreError::Conflict(
            format!("insufficient stock: requested {requested}, available {available}"),
        ),
        StockError::Contention => {
            crate::error::StoreError::Conflict("stock contention, retry".to_owned())
        }
    }
}

fn stock_err_from_store(err: crate::error::StoreError) -> StockError {
    match &err {
        crate::error::StoreError::Conflict(msg) if msg == "stock contention, retry" => {
            StockError::Contention
        }
        _ => StockError::Store(err),
    }
}

#[cfg(test)]
mod tests {
    // `stock::reserve`/`release` require a live Postgres pool, so the
    // meaningful concurrency test (S1 under parallel load) lives in the
    // server crate's integration tests against a real database.
}
