//! `/asset-items` — individually tracked units. A shared pool: any
//! MANAGER or ADMIN may act on any asset item, per the ownership table's
//! "asset-item" row.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz;
use assetledger_core::store::asset_items;
use assetledger_core::store::models::{AssetItem, AuditAction};
use assetledger_core::store::Page;
use assetledger_core::validate::validate_request;

use crate::error::AppError;
use crate::middleware::{RequestIdentity, RequestMeta};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssetItemRequest {
    pub asset_model_id: Uuid,
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssetItemList {
    pub items: Vec<AssetItem>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<AssetItemList>, AppError> {
    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = asset_items::find_many(&mut conn, page).await?;
    Ok(Json(AssetItemList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetItem>, AppError> {
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let item = asset_items::find_by_id(&mut conn, id).await?;
    Ok(Json(item))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<AssetItemRequest>,
) -> Result<Json<AssetItem>, AppError> {
    authz::owns_asset_item(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let item = asset_items::create(
        &mut conn,
        body.asset_model_id,
        body.asset_tag.as_deref(),
        body.serial.as_deref(),
    )
    .await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Create,
        "asset_item",
        item.id,
        None,
        Some(serde_json::to_value(&item).unwrap_or_default()),
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(Json(item))
}
