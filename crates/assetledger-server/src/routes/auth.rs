//! `/auth/*` — registration, login, refresh rotation, logout.
//!
//! The first user to register becomes ADMIN (bootstrap scenario named in
//! the seed end-to-end scenarios); every user after that defaults to
//! MANAGER. There is no public endpoint to mint an ADMIN after bootstrap —
//! promotion is a `PATCH /users/:id/role` operation gated ADMIN-only (see
//! `routes::users`).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use assetledger_core::audit::{self, RequestContext};
use assetledger_core::authz::Role;
use assetledger_core::store::models::{AuditAction, UserView};
use assetledger_core::store::users;
use assetledger_core::validate::validate_request;
use assetledger_core::password;

use crate::error::AppError;
use crate::middleware::{self, AUTH_TIER};
use crate::state::AppState;

const REFRESH_COOKIE_NAME: &str = "refreshToken";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserView,
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    validate_request(&body)?;

    let client_ip = middleware::client_ip_from_headers(&headers);
    middleware::rate_limit(AUTH_TIER, &state, &client_ip).await?;

    let hash = password::hash_if_policy_compliant(&body.password)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let existing_users = users::count(&mut conn).await?;
    let role = if existing_users == 0 {
        Role::Admin
    } else {
        Role::Manager
    };

    let user = users::create(&mut conn, &body.email, &hash, role_db_str(role)).await?;

    let ctx = RequestContext {
        ip: Some(client_ip),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };
    audit::record(
        &mut conn,
        user.id,
        AuditAction::Create,
        "user",
        user.id,
        None,
        Some(serde_json::json!({ "email": user.email, "role": role_db_str(role) })),
        &ctx,
    )
    .await?;

    let pair = state.tokens.issue_pair(user.id, role)?;
    let jar = jar.add(refresh_cookie(&state, &pair.refresh));

    Ok((
        jar,
        Json(AuthResponse {
            access_token: pair.access,
            user: UserView::from(&user),
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    validate_request(&body)?;

    let client_ip = middleware::client_ip_from_headers(&headers);
    middleware::rate_limit(AUTH_TIER, &state, &client_ip).await?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let user = users::find_by_email(&mut conn, &body.email)
        .await
        .map_err(|_| AppError::Unauthorized)?;

    let verified = password::verify(&body.password, &user.password_hash)?;
    if !verified {
        return Err(AppError::Unauthorized);
    }

    let role = user.role_enum();
    let pair = state.tokens.issue_pair(user.id, role)?;

    let ctx = RequestContext {
        ip: Some(client_ip),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };
    audit::record(
        &mut conn,
        user.id,
        AuditAction::Login,
        "user",
        user.id,
        None,
        None,
        &ctx,
    )
    .await?;

    let jar = jar.add(refresh_cookie(&state, &pair.refresh));
    Ok((
        jar,
        Json(AuthResponse {
            access_token: pair.access,
            user: UserView::from(&user),
        }),
    ))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let client_ip = middleware::client_ip_from_headers(&headers);
    middleware::rate_limit(AUTH_TIER, &state, &client_ip).await?;

    let cookie = jar.get(REFRESH_COOKIE_NAME).ok_or(AppError::Unauthorized)?;
    let claims = state
        .tokens
        .verify_refresh(cookie.value())
        .await
        .map_err(|_| AppError::Unauthorized)?;

    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let user = users::find_by_id(&mut conn, claims.sub)
        .await
        .map_err(|_| AppError::Unauthorized)?;

    let role = user.role_enum();
    let pair = state.tokens.issue_pair(user.id, role)?;

    // Open question resolved in DESIGN.md: old refresh token is revoked on
    // rotation.
    state.tokens.revoke(cookie.value(), &claims).await?;

    let jar = jar.add(refresh_cookie(&state, &pair.refresh));
    Ok((
        jar,
        Json(AuthResponse {
            access_token: pair.access,
            user: UserView::from(&user),
        }),
    ))
}

/// `/auth/logout` is mounted alongside the rest of `/auth/*` ahead of
/// `auth_middleware` (registration/login/refresh all need to run before an
/// identity exists), so this handler verifies the bearer token itself
/// rather than pulling a `RequestIdentity`/`RequestMeta` extension neither
/// of which `auth_middleware` had a chance to insert.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<CookieJar, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state
        .tokens
        .verify_access(token)
        .await
        .map_err(|_| AppError::Unauthorized)?;
    state.tokens.revoke(token, &claims).await?;

    if let Some(refresh_cookie) = jar.get(REFRESH_COOKIE_NAME) {
        if let Ok(refresh_claims) = state.tokens.verify_refresh(refresh_cookie.value()).await {
            let _ = state.tokens.revoke(refresh_cookie.value(), &refresh_claims).await;
        }
    }

    let client_ip = middleware::client_ip_from_headers(&headers);
    let mut conn = state.pool.acquire().await.map_err(assetledger_core::error::StoreError::from)?;
    let ctx = RequestContext {
        ip: Some(client_ip),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };
    audit::record(
        &mut conn,
        claims.sub,
        AuditAction::Logout,
        "user",
        claims.sub,
        None,
        None,
        &ctx,
    )
    .await?;

    Ok(jar.remove(Cookie::from(REFRESH_COOKIE_NAME)))
}

fn refresh_cookie(state: &AppState, token: &str) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token.to_owned()))
        .http_only(true)
        .secure(!state.config.dev_mode)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

fn role_db_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "ADMIN",
        Role::Manager => "MANAGER",
        Role::Reader => "READER",
    }
}
