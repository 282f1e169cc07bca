//! `/stock-items` — consumable counts keyed by asset model. A shared pool,
//! same write/read gate as `/asset-items`; quantity is only ever changed
//! through the loan engine's reservation path (C10), never directly by a
//! client, so this route only exposes creation of the zeroed row and reads.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz;
use assetledger_core::store::stock_items;
use assetledger_core::store::models::{AuditAction, StockItem};
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
pub struct StockItemRequest {
    pub asset_model_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StockItemList {
    pub items: Vec<StockItem>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<StockItemList>, AppError> {
    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = stock_items::find_many(&mut conn, page).await?;
    Ok(Json(StockItemList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<StockItem>, AppError> {
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let item = stock_items::find_by_id(&mut conn, id).await?;
    Ok(Json(item))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<StockItemRequest>,
) -> Result<Json<StockItem>, AppError> {
    authz::require_manager_or_admin(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let item = stock_items::create(&mut conn, body.asset_model_id).await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Create,
        "stock_item",
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
