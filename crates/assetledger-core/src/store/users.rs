//! User repository.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::models::User;
use super::validate_unique;
use super::Page;

/// Count users, used at registration time to decide whether the new user
/// becomes ADMIN (the first user) or MANAGER (every user after).
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn count(conn: &mut PgConnection) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Create a user. Callers must hash the password and resolve the role
/// before calling this; the store does not enforce policy.
///
/// # Errors
///
/// Returns [`StoreError::UniqueViolation`] if `email` is already taken.
pub async fn create(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
    role: &str,
) -> Result<User, StoreError> {
    validate_unique(conn, "users", "email", email, None).await?;

    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, role)
         VALUES ($1, $2, $3)
         RETURNING id, email, password_hash, role, created_at, updated_at",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// Find a user by id.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such user exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role, created_at, updated_at
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "user" })
}

/// Find a user by email.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such user exists.
pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role, created_at, updated_at
         FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "user" })
}

/// List users, paginated, newest-first.
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(conn: &mut PgConnection, page: Page) -> Result<Vec<User>, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role, created_at, updated_at
         FROM users
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(i64::from(page.limit))
    .bind(i64::from(page.offset))
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}

/// Update a user's role.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such user exists.
pub async fn update_role(conn: &mut PgConnection, id: Uuid, role: &str) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET role = $2, updated_at = now()
         WHERE id = $1
         RETURNING id, email, password_hash, role, created_at, updated_at",
    )
    .bind(id)
    .bind(role)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "user" })
}
