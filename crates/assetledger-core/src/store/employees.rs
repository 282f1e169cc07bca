//! Employee repository.
//!
//! Invariant L1 (an employee referenced by any loan, including soft-deleted
//! ones, cannot be deleted) is enforced here with an explicit existence
//! check rather than relying solely on the foreign key, so the failure
//! surfaces as a clean [`StoreError::ForeignKeyViolation`]-shaped `conflict`
//! instead of a raw constraint error bubbling out of the database.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::models::Employee;
use super::{Page, SortSpec, validate_unique};

pub const SORTABLE_FIELDS: &[&str] = &["last_name", "created_at", "department"];

/// # Errors
///
/// Returns [`StoreError::UniqueViolation`] if `email` is set and already in
/// use by another employee.
pub async fn create(
    conn: &mut PgConnection,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
    department: Option<&str>,
    manager_user_id: Option<Uuid>,
) -> Result<Employee, StoreError> {
    if let Some(email) = email {
        validate_unique(conn, "employees", "email", email, None).await?;
    }

    sqlx::query_as::<_, Employee>(
        "INSERT INTO employees (first_name, last_name, email, department, manager_user_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, first_name, last_name, email, department, manager_user_id,
                   created_at, updated_at",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(department)
    .bind(manager_user_id)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such employee exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Employee, StoreError> {
    sqlx::query_as::<_, Employee>(
        "SELECT id, first_name, last_name, email, department, manager_user_id,
                created_at, updated_at
         FROM employees WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "employee" })
}

/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(
    conn: &mut PgConnection,
    page: Page,
    sort: SortSpec,
) -> Result<Vec<Employee>, StoreError> {
    let direction = if sort.descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT id, first_name, last_name, email, department, manager_user_id,
                created_at, updated_at
         FROM employees
         ORDER BY {} {direction}
         LIMIT $1 OFFSET $2",
        sort.field
    );

    sqlx::query_as::<_, Employee>(&sql)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(conn)
        .await
        .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such employee exists, or
/// [`StoreError::UniqueViolation`] if the new email collides.
pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
    department: Option<&str>,
    manager_user_id: Option<Uuid>,
) -> Result<Employee, StoreError> {
    if let Some(email) = email {
        validate_unique(conn, "employees", "email", email, Some(id)).await?;
    }

    sqlx::query_as::<_, Employee>(
        "UPDATE employees
         SET first_name = $2, last_name = $3, email = $4, department = $5,
             manager_user_id = $6, updated_at = now()
         WHERE id = $1
         RETURNING id, first_name, last_name, email, department, manager_user_id,
                   created_at, updated_at",
    )
    .bind(id)
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(department)
    .bind(manager_user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "employee" })
}

/// Delete an employee, failing with `conflict` (L1) if any loan, including
/// soft-deleted ones, still references it.
///
/// # Errors
///
/// Returns [`StoreError::ForeignKeyViolation`] if any loan references the
/// employee, or [`StoreError::NotFound`] if it does not exist.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), StoreError> {
    let referenced: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM loans WHERE employee_id = $1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    if referenced {
        return Err(StoreError::ForeignKeyViolation {
            detail: "employee is referenced by at least one loan".to_owned(),
        });
    }

    let result = sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { entity: "employee" });
    }
    Ok(())
}
