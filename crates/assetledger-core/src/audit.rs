//! Audit log (C8).
//!
//! `record` takes the caller's own `&mut PgConnection` — always the
//! in-flight transaction of the business mutation it documents, never a
//! fresh connection off the pool. That is the whole point: if the business
//! write rolls back, so does the audit entry, because they are the same
//! transaction. Read access is ADMIN-only and enforced at the handler
//! layer, not here.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AuditError;
use crate::store::audit::{self, AuditFilter};
use crate::store::models::{AuditAction, AuditEntry};
use crate::store::Page;

/// Context carried alongside every audit entry: who made the request, and
/// from where.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Insert one audit entry inside the caller's transaction.
///
/// # Errors
///
/// Returns [`AuditError::Store`] on a database failure, which the caller
/// should propagate so the whole transaction rolls back — a failed audit
/// write must not silently let the business mutation commit.
#[allow(clippy::too_many_arguments)]
pub async fn record(
    conn: &mut PgConnection,
    actor_user_id: Uuid,
    action: AuditAction,
    entity_type: &str,
    entity_id: Uuid,
    old_values: Option<serde_json::Value>,
    new_values: Option<serde_json::Value>,
    ctx: &RequestContext,
) -> Result<AuditEntry, AuditError> {
    audit::insert(
        conn,
        actor_user_id,
        action.as_db_str(),
        entity_type,
        entity_id,
        old_values,
        new_values,
        ctx.ip.as_deref(),
        ctx.user_agent.as_deref(),
    )
    .await
    .map_err(AuditError::from)
}

/// Read the audit log, newest first. ADMIN-only; the caller must have
/// already run the role gate.
///
/// # Errors
///
/// Returns [`AuditError::Store`] on a database failure.
pub async fn list(
    conn: &mut PgConnection,
    page: Page,
    filter: &AuditFilter,
) -> Result<Vec<AuditEntry>, AuditError> {
    audit::find_many(conn, page, filter).await.map_err(AuditError::from)
}
