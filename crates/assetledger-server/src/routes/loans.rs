//! `/loans` — the state machine driven by [`LoanEngine`]. Every mutation
//! here is MANAGER+ at the role gate and creator-only at the ownership
//! gate (ADMIN always passes, per `authz::owns_loan`); the engine itself
//! owns the invariant bookkeeping and the audit trail for each step, so
//! these handlers only gate, translate the request body, and call it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use assetledger_core::audit::RequestContext;
use assetledger_core::authz;
use assetledger_core::loans::{LineSpec, SignatureKind};
use assetledger_core::store::models::{Loan, LoanWithLines};
use assetledger_core::store::Page;
use assetledger_core::validate::validate_request;

use crate::error::AppError;
use crate::middleware::{RequestIdentity, RequestMeta};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).delete(soft_delete))
        .route("/{id}/lines", post(add_line))
        .route("/{id}/lines/{line_id}", axum::routing::delete(remove_line))
        .route("/{id}/pickup-signature", post(pickup_signature))
        .route("/{id}/return-signature", post(return_signature))
        .route("/{id}/close", post(close))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSpecRequest {
    pub asset_item_id: Option<Uuid>,
    pub asset_model_id: Option<Uuid>,
    pub quantity: Option<i64>,
}

impl LineSpecRequest {
    fn into_line_spec(self) -> Result<LineSpec, AppError> {
        match (self.asset_item_id, self.asset_model_id, self.quantity) {
            (Some(asset_item_id), None, None) => Ok(LineSpec::Asset { asset_item_id }),
            (None, Some(asset_model_id), Some(quantity)) if quantity >= 1 => {
                Ok(LineSpec::Stock {
                    asset_model_id,
                    quantity,
                })
            }
            _ => Err(AppError::Validation(vec![assetledger_core::error::FieldError {
                field: "lines".to_owned(),
                message: "each line must be exactly one of {assetItemId} or {assetModelId, quantity >= 1}".to_owned(),
            }])),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub employee_id: Uuid,
    #[serde(default)]
    #[validate(custom(function = "assetledger_core::validate::validate_bulk_size"))]
    pub lines: Vec<LineSpecRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    #[serde(flatten)]
    pub line: LineSpecRequest,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    #[validate(length(min = 1, message = "signature reference is required"))]
    pub signature_url: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoanList {
    pub items: Vec<Loan>,
}

fn request_context(meta: RequestMeta) -> RequestContext {
    RequestContext {
        ip: meta.ip,
        user_agent: meta.user_agent,
    }
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Query(q): Query<ListQuery>,
) -> Result<Json<LoanList>, AppError> {
    let include_deleted = q.include_deleted && authz::require_admin(&identity).is_ok();
    let page = Page::new(q.limit.unwrap_or(50), q.offset.unwrap_or(0));
    let items = state.loans.list(page, include_deleted).await?;
    Ok(Json(LoanList { items }))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanWithLines>, AppError> {
    let loan = find_with_ownership(&state, &identity, id).await?;
    Ok(Json(loan))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<CreateLoanRequest>,
) -> Result<(StatusCode, Json<LoanWithLines>), AppError> {
    authz::require_manager_or_admin(&identity)?;
    validate_request(&body)?;

    let lines = body
        .lines
        .into_iter()
        .map(LineSpecRequest::into_line_spec)
        .collect::<Result<Vec<_>, _>>()?;

    let ctx = request_context(meta);
    let loan = state
        .loans
        .create(&identity, body.employee_id, lines, &ctx)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

async fn add_line(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddLineRequest>,
) -> Result<Json<assetledger_core::store::models::LoanLine>, AppError> {
    authz::require_manager_or_admin(&identity)?;
    check_ownership(&state, &identity, id).await?;

    let spec = body.line.into_line_spec()?;
    let ctx = request_context(meta);
    let line = state.loans.add_line(&identity, id, spec, &ctx).await?;
    Ok(Json(line))
}

async fn remove_line(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    authz::require_manager_or_admin(&identity)?;
    check_ownership(&state, &identity, id).await?;

    let ctx = request_context(meta);
    state.loans.remove_line(&identity, id, line_id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pickup_signature(
    state: State<Arc<AppState>>,
    identity: Extension<RequestIdentity>,
    meta: Extension<RequestMeta>,
    path: Path<Uuid>,
    body: Json<SignatureRequest>,
) -> Result<StatusCode, AppError> {
    sign(state, identity, meta, path, body, SignatureKind::Pickup).await
}

async fn return_signature(
    state: State<Arc<AppState>>,
    identity: Extension<RequestIdentity>,
    meta: Extension<RequestMeta>,
    path: Path<Uuid>,
    body: Json<SignatureRequest>,
) -> Result<StatusCode, AppError> {
    sign(state, identity, meta, path, body, SignatureKind::Return).await
}

async fn sign(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
    Json(body): Json<SignatureRequest>,
    kind: SignatureKind,
) -> Result<StatusCode, AppError> {
    authz::require_manager_or_admin(&identity)?;
    check_ownership(&state, &identity, id).await?;
    validate_request(&body)?;

    let ctx = request_context(meta);
    state
        .loans
        .sign(&identity, id, kind, &body.signature_url, body.signed_at, &ctx)
        .await?;
    Ok(StatusCode::OK)
}

async fn close(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    authz::require_manager_or_admin(&identity)?;
    check_ownership(&state, &identity, id).await?;

    let ctx = request_context(meta);
    state.loans.close(&identity, id, &ctx).await?;
    Ok(StatusCode::OK)
}

async fn soft_delete(
    State(state): State<Arc<AppState>>,
    Extension(RequestIdentity(identity)): Extension<RequestIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    authz::require_manager_or_admin(&identity)?;
    check_ownership(&state, &identity, id).await?;

    let ctx = request_context(meta);
    state.loans.soft_delete(&identity, id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Shared lookup + ownership check, collapsing not-found and forbidden for
/// non-ADMIN per the ownership gate's no-existence-oracle rule.
async fn find_with_ownership(
    state: &AppState,
    identity: &assetledger_core::authz::Identity,
    id: Uuid,
) -> Result<LoanWithLines, AppError> {
    match state.loans.get(id).await {
        Ok(loan) => authz::owns_loan(identity, loan.loan.created_by)
            .map(|()| loan)
            .map_err(|_| AppError::Forbidden),
        Err(_) if identity.role == authz::Role::Admin => Err(AppError::NotFound),
        Err(_) => Err(AppError::Forbidden),
    }
}

async fn check_ownership(
    state: &AppState,
    identity: &assetledger_core::authz::Identity,
    id: Uuid,
) -> Result<(), AppError> {
    find_with_ownership(state, identity, id).await.map(|_| ())
}
