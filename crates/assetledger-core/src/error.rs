//! Per-module error types.
//!
//! Each module in this crate owns its own error enum; nothing here knows
//! about HTTP. `assetledger-server::error::AppError` is the only place these
//! get mapped onto status codes.

/// Errors raised by the store layer (`crate::store`).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no {entity} found for the given lookup")]
    NotFound { entity: &'static str },

    #[error("{field} is already in use")]
    UniqueViolation { field: &'static str },

    #[error("foreign key constraint violated: {detail}")]
    ForeignKeyViolation { detail: String },

    #[error("requested sort field is not allowed for this resource")]
    InvalidSort,

    #[error("{0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by `crate::password`.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password does not meet policy requirements")]
    PolicyViolation(Vec<PolicyViolation>),

    #[error("failed to hash password: {0}")]
    HashFailure(String),

    #[error("stored password hash is malformed")]
    MalformedHash,
}

/// One failing clause of the password policy, named for field-level error
/// reporting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PolicyViolation {
    pub rule: &'static str,
    pub message: &'static str,
}

/// Errors raised by `crate::token`.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed or has an invalid signature")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("cache backend error while checking revocation: {0}")]
    Cache(#[from] assetledger_storage::CacheError),
}

/// Errors raised by `crate::authz`.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("no authenticated identity on this request")]
    Unauthenticated,

    #[error("identity's role is not permitted to perform this action")]
    InsufficientRole,

    #[error("identity does not own or manage the target resource")]
    NotOwner,
}

/// Errors raised by `crate::loans`.
#[derive(Debug, thiserror::Error)]
pub enum LoanError {
    #[error("loan invariant violated: {0}")]
    Conflict(String),

    #[error("loan not found")]
    NotFound,

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by `crate::stock`.
#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    Insufficient { requested: i64, available: i64 },

    #[error("stock contention, retry")]
    Contention,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by `crate::audit`.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by `crate::validate`.
#[derive(Debug, thiserror::Error)]
#[error("request failed validation")]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

/// One `{field, message}` validation failure, matching the response envelope
/// `details` shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}
