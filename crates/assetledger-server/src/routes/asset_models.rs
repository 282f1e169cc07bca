//! `/asset-models` — the template entity parenting both `AssetItem`s and
//! `StockItem`s. Writes are MANAGER+; reads are open to any authenticated
//! role.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz;
use assetledger_core::store::asset_models;
use assetledger_core::store::models::{AssetModel, AuditAction};
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
pub struct AssetModelRequest {
    #[validate(length(min = 1, message = "asset type is required"))]
    pub asset_type: String,
    #[validate(length(min = 1, message = "brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "model name is required"))]
    pub model_name: String,
}

#[derive(Debug, Serialize)]
pub struct AssetModelList {
    pub items: Vec<AssetModel>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<AssetModelList>, AppError> {
    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = asset_models::find_many(&mut conn, page).await?;
    Ok(Json(AssetModelList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetModel>, AppError> {
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let model = asset_models::find_by_id(&mut conn, id).await?;
    Ok(Json(model))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<AssetModelRequest>,
) -> Result<Json<AssetModel>, AppError> {
    authz::require_manager_or_admin(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let model = asset_models::create(&mut conn, &body.asset_type, &body.brand, &body.model_name).await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Create,
        "asset_model",
        model.id,
        None,
        Some(serde_json::to_value(&model).unwrap_or_default()),
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(Json(model))
}
