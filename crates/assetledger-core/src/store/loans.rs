//! Loan and loan-line repository. The state machine itself lives in
//! `crate::loans::LoanEngine`; this module only persists rows.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::StoreError;

use super::Page;
use super::models::{Loan, LoanLine};

pub async fn create(
    conn: &mut PgConnection,
    employee_id: Uuid,
    created_by: Uuid,
) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "INSERT INTO loans (employee_id, status, opened_at, created_by)
         VALUES ($1, 'OPEN', now(), $2)
         RETURNING id, employee_id, status, opened_at, closed_at,
                   pickup_signature_url, pickup_signed_at,
                   return_signature_url, return_signed_at,
                   created_by, deleted_at, deleted_by",
    )
    .bind(employee_id)
    .bind(created_by)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such loan exists.
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "SELECT id, employee_id, status, opened_at, closed_at,
                pickup_signature_url, pickup_signed_at,
                return_signature_url, return_signed_at,
                created_by, deleted_at, deleted_by
         FROM loans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}

/// Same as [`find_by_id`] but locks the row, for callers about to mutate
/// loan state inside a transaction.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such loan exists.
pub async fn find_by_id_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "SELECT id, employee_id, status, opened_at, closed_at,
                pickup_signature_url, pickup_signed_at,
                return_signature_url, return_signed_at,
                created_by, deleted_at, deleted_by
         FROM loans WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}

/// List loans, excluding soft-deleted ones unless `include_deleted` (ADMIN
/// only at the handler layer).
///
/// # Errors
///
/// Returns [`StoreError::Database`] on a connection failure.
pub async fn find_many(
    conn: &mut PgConnection,
    page: Page,
    include_deleted: bool,
) -> Result<Vec<Loan>, StoreError> {
    let sql = if include_deleted {
        "SELECT id, employee_id, status, opened_at, closed_at,
                pickup_signature_url, pickup_signed_at,
                return_signature_url, return_signed_at,
                created_by, deleted_at, deleted_by
         FROM loans
         ORDER BY opened_at DESC
         LIMIT $1 OFFSET $2"
    } else {
        "SELECT id, employee_id, status, opened_at, closed_at,
                pickup_signature_url, pickup_signed_at,
                return_signature_url, return_signed_at,
                created_by, deleted_at, deleted_by
         FROM loans
         WHERE deleted_at IS NULL
         ORDER BY opened_at DESC
         LIMIT $1 OFFSET $2"
    };

    sqlx::query_as::<_, Loan>(sql)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(conn)
        .await
        .map_err(StoreError::from)
}

pub async fn find_lines(conn: &mut PgConnection, loan_id: Uuid) -> Result<Vec<LoanLine>, StoreError> {
    sqlx::query_as::<_, LoanLine>(
        "SELECT id, loan_id, asset_item_id, stock_item_id, quantity, added_at
         FROM loan_lines WHERE loan_id = $1 ORDER BY added_at ASC",
    )
    .bind(loan_id)
    .fetch_all(conn)
    .await
    .map_err(StoreError::from)
}

/// Insert an asset-item line. `asset_item_id XOR stock_item_id` is also
/// enforced at the database level by a `CHECK (num_nonnulls(...) = 1)`
/// constraint; the engine only ever calls one of these two constructors so
/// that constraint should never actually fire.
pub async fn insert_asset_line(
    conn: &mut PgConnection,
    loan_id: Uuid,
    asset_item_id: Uuid,
) -> Result<LoanLine, StoreError> {
    sqlx::query_as::<_, LoanLine>(
        "INSERT INTO loan_lines (loan_id, asset_item_id, added_at)
         VALUES ($1, $2, now())
         RETURNING id, loan_id, asset_item_id, stock_item_id, quantity, added_at",
    )
    .bind(loan_id)
    .bind(asset_item_id)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

pub async fn insert_stock_line(
    conn: &mut PgConnection,
    loan_id: Uuid,
    stock_item_id: Uuid,
    quantity: i64,
) -> Result<LoanLine, StoreError> {
    sqlx::query_as::<_, LoanLine>(
        "INSERT INTO loan_lines (loan_id, stock_item_id, quantity, added_at)
         VALUES ($1, $2, $3, now())
         RETURNING id, loan_id, asset_item_id, stock_item_id, quantity, added_at",
    )
    .bind(loan_id)
    .bind(stock_item_id)
    .bind(quantity)
    .fetch_one(conn)
    .await
    .map_err(StoreError::from)
}

/// # Errors
///
/// Returns [`StoreError::NotFound`] if no such line exists on that loan.
pub async fn find_line(
    conn: &mut PgConnection,
    loan_id: Uuid,
    line_id: Uuid,
) -> Result<LoanLine, StoreError> {
    sqlx::query_as::<_, LoanLine>(
        "SELECT id, loan_id, asset_item_id, stock_item_id, quantity, added_at
         FROM loan_lines WHERE id = $1 AND loan_id = $2",
    )
    .bind(line_id)
    .bind(loan_id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan line" })
}

pub async fn delete_line(conn: &mut PgConnection, line_id: Uuid) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM loan_lines WHERE id = $1")
        .bind(line_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_pickup_signature(
    conn: &mut PgConnection,
    id: Uuid,
    url: &str,
    signed_at: DateTime<Utc>,
) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "UPDATE loans SET pickup_signature_url = $2, pickup_signed_at = $3
         WHERE id = $1
         RETURNING id, employee_id, status, opened_at, closed_at,
                   pickup_signature_url, pickup_signed_at,
                   return_signature_url, return_signed_at,
                   created_by, deleted_at, deleted_by",
    )
    .bind(id)
    .bind(url)
    .bind(signed_at)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}

pub async fn set_return_signature(
    conn: &mut PgConnection,
    id: Uuid,
    url: &str,
    signed_at: DateTime<Utc>,
) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "UPDATE loans SET return_signature_url = $2, return_signed_at = $3
         WHERE id = $1
         RETURNING id, employee_id, status, opened_at, closed_at,
                   pickup_signature_url, pickup_signed_at,
                   return_signature_url, return_signed_at,
                   created_by, deleted_at, deleted_by",
    )
    .bind(id)
    .bind(url)
    .bind(signed_at)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}

pub async fn close(conn: &mut PgConnection, id: Uuid) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "UPDATE loans SET status = 'CLOSED', closed_at = now()
         WHERE id = $1
         RETURNING id, employee_id, status, opened_at, closed_at,
                   pickup_signature_url, pickup_signed_at,
                   return_signature_url, return_signed_at,
                   created_by, deleted_at, deleted_by",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}

pub async fn soft_delete(
    conn: &mut PgConnection,
    id: Uuid,
    deleted_by: Uuid,
) -> Result<Loan, StoreError> {
    sqlx::query_as::<_, Loan>(
        "UPDATE loans SET deleted_at = now(), deleted_by = $2
         WHERE id = $1
         RETURNING id, employee_id, status, opened_at, closed_at,
                   pickup_signature_url, pickup_signed_at,
                   return_signature_url, return_signed_at,
                   created_by, deleted_at, deleted_by",
    )
    .bind(id)
    .bind(deleted_by)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "loan" })
}
