//! `GET /audit` — ADMIN-only paginated view of the append-only audit log.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use assetledger_core::audit;
use assetledger_core::authz;
use assetledger_core::store::audit::AuditFilter;
use assetledger_core::store::models::AuditEntry;
use assetledger_core::store::Page;

use crate::error::AppError;
use crate::middleware::RequestIdentity;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub actor_user_id: Option<Uuid>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AuditList {
    pub items: Vec<AuditEntry>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<AuditList>, AppError> {
    authz::require_admin(&identity)?;

    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let filter = AuditFilter {
        actor_user_id: q.actor_user_id,
        entity_type: q.entity_type,
        entity_id: q.entity_id,
    };

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = audit::list(&mut conn, page, &filter).await?;
    Ok(Json(AuditList { items }))
}
