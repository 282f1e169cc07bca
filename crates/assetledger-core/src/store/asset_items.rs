//! Asset item repository.
//!
//! Status transitions (`IN_STOCK` ↔ `LENT`) are the mechanism behind
//! invariants A1/A2 and must always run inside the same `SERIALIZABLE`
//! transaction as the loan line that causes them — see
//! `transition_status_if`, which does a conditional `UPDATE ... WHERE
//! status = $expected` so two concurrent loans racing on the same asset
//! item cannot both succeed.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::Page;
use super::models::{AssetItem, AssetItemStatus};

/// # Errors
///
/// Returns [`StoreError::UniqueViolation`] if `asset_tag` is set and
/// already in use.
pub async fn create(
    conn: &mut PgConnection,
    asset_model_id: Uuid,
    asset_tag: Option<&str>,
    serial: Option<&str>,
) -> Result<AssetItem, StoreError> {
    if let Some(tag) = asset_tag {
        super::validate_unique(conn, "asset_items", "asset_tag", tag, None).await?;
    }

    sqlx::query_as::<_, AssetItem>(
        "INSERT INTO asset_items (asset_model_id, asset_tag, serial, status)
         VALUES ($1, $2, $3, $4)
         RETURNING id, asset_model_id, asset_tag, serial, status, created_at, updated_at",
    )
    .bind(asset_model_id)
    .bind(asset_tag)
    .bind(serial)
    .bind(AssetItemStatus::InStock.as_db_str())
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such asset item exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<AssetItem, StoreError> {
    sqlx::query_as::<_, AssetItem>(
        "SELECT id, asset_model_id, asset_tag, serial, status, created_at, updated_at
         FROM asset_items WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "asset item",
    })
}

/// Lock the row `FOR UPDATE` within the caller's transaction, so the read
/// of `status` that informs a transition decision is not racing a
/// concurrent transaction's write.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such asset item exists.
pub async fn find_by_id_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<AssetItem, StoreError> {
    sqlx::query_as::<_, AssetItem>(
        "SELECT id, asset_model_id, asset_tag, serial, status, created_at, updated_at
         FROM asset_items WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "asset item",
    })
}

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(conn: &mut PgConnection, page: Page) -> Result<Vec<AssetItem>, StoreError> {
    sqlx::query_as::<_, AssetItem>(
        "SELECT id, asset_model_id, asset_tag, serial, status, created_at, updated_at
         FROM asset_items
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(i64::from(page.limit))
    .bind(i64::from(page.offset))
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}

/// Transition an asset item's status, conditioned on its current status
/// matching `expected`. Returns `Ok(None)` (not an error) if the row's
/// current status does not match — callers turn that into the "already
/// lent" / "not available" conflict named for the loan engine.
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn transition_status_if(
    conn: &mut PgConnection,
    id: Uuid,
    expected: AssetItemStatus,
    next: AssetItemStatus,
) -> Result<Option<AssetItem>, StoreError> {
    sqlx::query_as::<_, AssetItem>(
        "UPDATE asset_items
         SET status = $3, updated_at = now()
         WHERE id = $1 AND status = $2
         RETURNING id, asset_model_id, asset_tag, serial, status, created_at, updated_at",
    )
    .bind(id)
    .bind(expected.as_db_str())
    .bind(next.as_db_str())
    .fetch_optional(conn)
    .await
    .map_err(StoreError::from)
}
