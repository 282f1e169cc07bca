//! Audit entry repository. Append-only: there is no update or delete here
//! by design.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::Page;
use super::models::AuditEntry;

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    conn: &mut PgConnection,
    actor_user_id: Uuid,
    action: &str,
    entity_type: &str,
    entity_id: Uuid,
    old_values: Option<serde_json::Value>,
    new_values: Option<serde_json::Value>,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AuditEntry, StoreError> {
    sqlx::query_as::<_, AuditEntry>(
        "INSERT INTO audit_entries
             (actor_user_id, action, entity_type, entity_id, old_values, new_values, ip, user_agent)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, actor_user_id, action, entity_type, entity_id,
                   old_values, new_values, ip, user_agent, created_at",
    )
    .bind(actor_user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(old_values)
    .bind(new_values)
    .bind(ip)
    .bind(user_agent)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// Filters for the ADMIN-only paginated audit view.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_user_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

/// List audit entries newest-first, optionally filtered by actor,
/// entity-type, or entity-id.
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(
    conn: &mut PgConnection,
    page: Page,
    filter: &AuditFilter,
) -> Result<Vec<AuditEntry>, StoreError> {
    sqlx::query_as::<_, AuditEntry>(
        "SELECT id, actor_user_id, action, entity_type, entity_id,
                old_values, new_values, ip, user_agent, created_at
         FROM audit_entries
         WHERE ($1::uuid IS NULL OR actor_user_id = $1)
           AND ($2::text IS NULL OR entity_type = $2)
           AND ($3::uuid IS NULL OR entity_id = $3)
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(filter.actor_user_id)
    .bind(filter.entity_type.as_deref())
    .bind(filter.entity_id)
    .bind(i64::from(page.limit))
    .bind(i64::from(page.offset))
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}
