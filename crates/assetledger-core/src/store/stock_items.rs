//! Stock item repository.
//!
//! `reserve`/`release` are the row-level primitives invariant S1 rests on.
//! Both are single `UPDATE` statements with the quantity check baked into
//! the `WHERE` clause, so the read-then-write that the stock reservation
//! design describes collapses into one round trip guarded by the
//! surrounding `SERIALIZABLE` transaction plus the table's own `CHECK
//! (loaned >= 0 AND loaned <= quantity)` as the backstop.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::Page;
use super::models::StockItem;

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn create(conn: &mut PgConnection, asset_model_id: Uuid) -> Result<StockItem, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "INSERT INTO stock_items (asset_model_id, quantity, loaned)
         VALUES ($1, 0, 0)
         RETURNING id, asset_model_id, quantity, loaned, created_at, updated_at",
    )
    .bind(asset_model_id)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such stock item exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<StockItem, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "SELECT id, asset_model_id, quantity, loaned, created_at, updated_at
         FROM stock_items WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "stock item",
    })
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such stock item exists.
pub async fn find_by_asset_model(
    conn: &mut PgConnection,
    asset_model_id: Uuid,
) -> Result<StockItem, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "SELECT id, asset_model_id, quantity, loaned, created_at, updated_at
         FROM stock_items WHERE asset_model_id = $1",
    )
    .bind(asset_model_id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "stock item",
    })
}

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(conn: &mut PgConnection, page: Page) -> Result<Vec<StockItem>, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "SELECT id, asset_model_id, quantity, loaned, created_at, updated_at
         FROM stock_items
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(i64::from(page.limit))
    .bind(i64::from(page.offset))
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}

/// Reserve `requested` units: `loaned += requested`, only if
/// `quantity - loaned >= requested`. Returns `Ok(None)` (not an error) if
/// the guard fails — the caller turns that into
/// `StockError::Insufficient`.
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn reserve(
    conn: &mut PgConnection,
    id: Uuid,
    requested: i64,
) -> Result<Option<StockItem>, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "UPDATE stock_items
         SET loaned = loaned + $2, updated_at = now()
         WHERE id = $1 AND quantity - loaned >= $2
         RETURNING id, asset_model_id, quantity, loaned, created_at, updated_at",
    )
    .bind(id)
    .bind(requested)
    .fetch_optional(conn)
    .await
    .map_err(StoreError::from)
}

/// Release `quantity` previously-reserved units: `loaned -= quantity`,
/// floored at zero by the table's own `CHECK` constraint (a release should
/// never be called for more than was reserved, but the constraint is the
/// backstop if application logic is ever wrong).
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such stock item exists.
pub async fn release(
    conn: &mut PgConnection,
    id: Uuid,
    quantity: i64,
) -> Result<StockItem, StoreError> {
    sqlx::query_as::<_, StockItem>(
        "UPDATE stock_items
         SET loaned = loaned - $2, updated_at = now()
         WHERE id = $1
         RETURNING id, asset_model_id, quantity, loaned, created_at, updated_at",
    )
    .bind(id)
    .bind(quantity)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "stock item",
    })
}
