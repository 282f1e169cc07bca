//! Asset model repository. A model is a template (`type`, `brand`,
//! `model-name`) that parents both `AssetItem`s and `StockItem`s.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::Page;
use super::models::AssetModel;

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn create(
    conn: &mut PgConnection,
    asset_type: &str,
    brand: &str,
    model_name: &str,
) -> Result<AssetModel, StoreError> {
    sqlx::query_as::<_, AssetModel>(
        "INSERT INTO asset_models (asset_type, brand, model_name)
         VALUES ($1, $2, $3)
         RETURNING id, asset_type, brand, model_name, created_at",
    )
    .bind(asset_type)
    .bind(brand)
    .bind(model_name)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such asset model exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<AssetModel, StoreError> {
    sqlx::query_as::<_, AssetModel>(
        "SELECT id, asset_type, brand, model_name, created_at FROM asset_models WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "asset model",
    })
}

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(conn: &mut PgConnection, page: Page) -> Result<Vec<AssetModel>, StoreError> {
    sqlx::query_as::<_, AssetModel>(
        "SELECT id, asset_type, brand, model_name, created_at
         FROM asset_models
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(i64::from(page.limit))
    .bind(i64::from(page.offset))
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}
