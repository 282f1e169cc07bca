//! `/employees` — CRUD gated MANAGER+ for writes, any authenticated role
//! for reads; the ownership gate additionally restricts non-ADMIN callers
//! on a single resource to the employee's own managing user.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz::{self, Role};
use assetledger_core::store::employees::{self, SORTABLE_FIELDS};
use assetledger_core::store::models::{AuditAction, Employee};
use assetledger_core::store::{Page, SortSpec};
use assetledger_core::validate::validate_request;

use crate::error::AppError;
use crate::middleware::{RequestIdentity, RequestMeta};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update).delete(delete))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub desc: bool,
}

fn default_sort() -> String {
    "created_at".to_owned()
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmployeeRequest {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub department: Option<String>,
    pub manager_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeList {
    pub items: Vec<Employee>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(_identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<EmployeeList>, AppError> {
    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let sort = SortSpec::parse(&q.sort, q.desc, SORTABLE_FIELDS)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let items = employees::find_many(&mut conn, page, sort).await?;
    Ok(Json(EmployeeList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Employee>, AppError> {
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let employee = find_with_ownership(&mut conn, &identity, id).await?;
    Ok(Json(employee))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<EmployeeRequest>,
) -> Result<Json<Employee>, AppError> {
    authz::require_manager_or_admin(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let employee = employees::create(
        &mut conn,
        &body.first_name,
        &body.last_name,
        body.email.as_deref(),
        body.department.as_deref(),
        body.manager_user_id,
    )
    .await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Create,
        "employee",
        employee.id,
        None,
        Some(serde_json::to_value(&employee).unwrap_or_default()),
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(Json(employee))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
    Json(body): Json<EmployeeRequest>,
) -> Result<Json<Employee>, AppError> {
    authz::require_manager_or_admin(&identity)?;
    validate_request(&body)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let existing = find_with_ownership(&mut conn, &identity, id).await?;

    let updated = employees::update(
        &mut conn,
        id,
        &body.first_name,
        &body.last_name,
        body.email.as_deref(),
        body.department.as_deref(),
        body.manager_user_id,
    )
    .await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Update,
        "employee",
        id,
        Some(serde_json::to_value(&existing).unwrap_or_default()),
        Some(serde_json::to_value(&updated).unwrap_or_default()),
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(Json(updated))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    authz::require_manager_or_admin(&identity)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let existing = find_with_ownership(&mut conn, &identity, id).await?;

    employees::delete(&mut conn, id).await?;

    audit::record(
        &mut conn,
        identity.user_id,
        AuditAction::Delete,
        "employee",
        id,
        Some(serde_json::to_value(&existing).unwrap_or_default()),
        None,
        &RequestContext {
            ip: meta.ip,
            user_agent: meta.user_agent,
        },
    )
    .await?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Shared lookup + ownership check: non-ADMIN callers may only see/act on
/// employees they manage. Resource-not-found and forbidden collapse to the
/// same generic message for non-ADMIN callers, per the ownership gate's
/// no-existence-oracle rule.
async fn find_with_ownership(
    conn: &mut sqlx::PgConnection,
    identity: &assetledger_core::authz::Identity,
    id: Uuid,
) -> Result<Employee, AppError> {
    let employee = employees::find_by_id(conn, id).await;
    match (employee, identity.role) {
        (Ok(employee), _) => authz::owns_employee(identity, employee.manager_user_id)
            .map(|()| employee)
            .map_err(|_| AppError::Forbidden),
        (Err(_), Role::Admin) => Err(AppError::NotFound),
        (Err(_), _) => Err(AppError::Forbidden),
    }
}
