//! HTTP error types for `AssetLedger`.
//!
//! Maps every per-module domain error into the response envelope and the
//! status-code taxonomy at the HTTP boundary: one enum, one `IntoResponse`
//! impl, a `From<...>` ladder per upstream error type. Internal errors are
//! logged at the point `IntoResponse` runs rather than at the call site,
//! so every 500 is guaranteed to leave a server-side trace regardless of
//! which handler produced it.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use assetledger_core::error::{
    AuditError, AuthzError, FieldError, LoanError, PasswordError, StockError, StoreError,
    TokenError, ValidationError,
};
use assetledger_storage::CacheError;

/// Application-level error returned from HTTP handlers, one variant per
/// row of the error taxonomy.
#[derive(Debug)]
pub enum AppError {
    Validation(Vec<FieldError>),
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict(String),
    RateLimited,
    Unavailable(String),
    Timeout,
    Internal(String),
}

/// The stable response envelope: `{ success, data?, error?, details? }`.
/// Error responses carry `success: false`, a generic `error` message, and
/// an optional `details` array for field-level validation failures.
#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            Self::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "request failed validation".to_owned(),
                Some(fields),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_owned(),
                None,
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "insufficient permission".to_owned(),
                None,
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded, try again later".to_owned(),
                None,
            ),
            Self::Unavailable(msg) => {
                tracing::warn!(reason = %msg, "dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service temporarily unavailable".to_owned(),
                    None,
                )
            }
            Self::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "request exceeded the deadline".to_owned(),
                None,
            ),
            Self::Internal(msg) => {
                let correlation_id = uuid::Uuid::new_v4();
                tracing::error!(%correlation_id, reason = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                    None,
                )
            }
        };

        let body = ErrorEnvelope {
            success: false,
            error: message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound,
            StoreError::UniqueViolation { field } => {
                Self::Conflict(format!("{field} is already in use"))
            }
            StoreError::ForeignKeyViolation { detail } => Self::Conflict(detail),
            StoreError::InvalidSort => Self::Validation(vec![FieldError {
                field: "sort".to_owned(),
                message: "requested sort field is not allowed for this resource".to_owned(),
            }]),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::Database(ref db_err) => match db_err {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                    Self::Unavailable(db_err.to_string())
                }
                _ => Self::Internal(err.to_string()),
            },
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::Expired | TokenError::Revoked => Self::Unauthorized,
            TokenError::Cache(e) => Self::Unavailable(e.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::PolicyViolation(violations) => Self::Validation(
                violations
                    .into_iter()
                    .map(|v| FieldError {
                        field: "password".to_owned(),
                        message: v.message.to_owned(),
                    })
                    .collect(),
            ),
            PasswordError::HashFailure(_) | PasswordError::MalformedHash => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => Self::Unauthorized,
            AuthzError::InsufficientRole | AuthzError::NotOwner => Self::Forbidden,
        }
    }
}

impl From<LoanError> for AppError {
    fn from(err: LoanError) -> Self {
        match err {
            LoanError::Conflict(msg) => Self::Conflict(msg),
            LoanError::NotFound => Self::NotFound,
            LoanError::Stock(e) => Self::from(e),
            LoanError::Store(e) => Self::from(e),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                requested,
                available,
            } => Self::Conflict(format!(
                "insufficient stock: requested {requested}, available {available}"
            )),
            StockError::Contention => Self::Conflict("stock contention, retry".to_owned()),
            StockError::Store(e) => Self::from(e),
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Store(e) => Self::from(e),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.fields)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        Self::Unavailable(err.to_string())
    }
}
