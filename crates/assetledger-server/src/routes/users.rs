//! `/users` — ADMIN-only account listing and role promotion.
//!
//! Registration is public (`routes::auth::register`); this module is the
//! only place a user's role changes after bootstrap. Not named in the
//! spec's HTTP table directly, but required by the bootstrap scenario it
//! does name: the first registrant is ADMIN, everyone else is MANAGER, and
//! an ADMIN must have some way to promote/demote afterward.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz;
use assetledger_core::store::models::{AuditAction, UserView};
use assetledger_core::store::users;
use assetledger_core::validate::validate_request;

use crate::error::AppError;
use crate::middleware::{RequestIdentity, RequestMeta};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_one).patch(update_role))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub items: Vec<UserView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleChangeRequest {
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

fn validate_role(role: &str) -> Result<(), validator::ValidationError> {
    match role {
        "ADMIN" | "MANAGER" | "READER" => Ok(()),
        _ => {
            let mut err = validator::ValidationError::new("invalid_role");
            err.message = Some("role must be one of ADMIN, MANAGER, READER".into());
            Err(err)
        }
    }
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<UserList>, AppError> {
    authz::require_admin(&identity)?;

    let page = assetledger_core::store::Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = users::find_many(&mut conn, page)
        .await?
        .iter()
        .map(UserView::from)
        .collect();
    Ok(Json(UserList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AppError> {
    authz::owns_user_account(&identity, id)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let user = users::find_by_id(&mut conn, id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleChangeRequest>,
) -> Result<Json<UserView>, AppError> {
    authz::require_admin(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let existing = users::find_by_id(&mut conn, id).await?;
    let updated = users::update_role(&mut conn, id, &body.role).await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::RoleChange,
        "user",
        id,
        Some(serde_json::json!({ "role": existing.role })),
        Some(serde_json::json!({ "role": updated.role })),
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(Json(UserView::from(&updated)))
}

