//! Loan engine (C9) — the state machine linking employees, unique assets,
//! and consumable stock. This is the only place cross-entity invariants
//! (A1, A2, L2, S1) are established; every transition runs inside one
//! `SERIALIZABLE` transaction via `store::in_transaction_with_retry`, so a
//! serialization conflict with a concurrent loan is retried rather than
//! surfaced straight to the caller.
//!
//! Line specs are a tagged enum rather than a struct with two optional
//! fields, so invariant L2 (exactly one of asset-item/stock-item) is
//! enforced at construction instead of by runtime validation of an
//! ambiguous shape.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, RequestContext};
use crate::authz::{Identity, Role};
use crate::error::{LoanError, StoreError};
use crate::store::models::{AssetItemStatus, AuditAction, LoanLine, LoanWithLines};
use crate::store::{self, IsolationLevel};

/// One requested line item on loan creation or `add_line`. Exactly one of
/// the two shapes — enforced by the enum itself, not by a later check.
#[derive(Debug, Clone)]
pub enum LineSpec {
    Asset { asset_item_id: Uuid },
    Stock { asset_model_id: Uuid, quantity: i64 },
}

/// Orchestrates the loan lifecycle. Holds a pool directly — every
/// operation opens and commits its own transaction, matching the "one
/// transaction per request maximum" resource policy.
#[derive(Clone)]
pub struct LoanEngine {
    pool: PgPool,
}

impl LoanEngine {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new OPEN loan for `employee_id` with an initial (possibly
    /// empty) set of lines. The whole operation is one `SERIALIZABLE`
    /// transaction: asset-item lines flip `IN_STOCK` → `LENT` (failing
    /// "already lent"/"not available" per A1/A2 if the row is not
    /// `IN_STOCK`), consumable lines reserve stock (S1).
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Conflict`] if any line violates A1/A2/S1,
    /// [`LoanError::Store`] for lookup/database failures.
    pub async fn create(
        &self,
        identity: &Identity,
        employee_id: Uuid,
        lines: Vec<LineSpec>,
        ctx: &RequestContext,
    ) -> Result<LoanWithLines, LoanError> {
        let pool = self.pool.clone();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let lines = lines.clone();
            let identity = *identity;
            let ctx = ctx.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::create(conn, employee_id, identity.user_id).await?;

                audit::record(
                    conn,
                    identity.user_id,
                    AuditAction::Create,
                    "loan",
                    loan.id,
                    None,
                    Some(serde_json::json!({ "employeeId": employee_id, "status": "OPEN" })),
                    &ctx,
                )
                .await
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

                for spec in lines {
                    add_line_in_tx(conn, loan.id, spec).await?;
                }

                let persisted_lines = store::loans::find_lines(conn, loan.id).await?;
                Ok(LoanWithLines {
                    loan,
                    lines: persisted_lines,
                })
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Add a line to an OPEN, undeleted loan. Same invariants as `create`.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Conflict`] if the loan is not OPEN, or if the
    /// line violates A1/A2/S1.
    pub async fn add_line(
        &self,
        identity: &Identity,
        loan_id: Uuid,
        spec: LineSpec,
        ctx: &RequestContext,
    ) -> Result<LoanLine, LoanError> {
        let pool = self.pool.clone();
        let identity = *identity;
        let ctx = ctx.clone();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let ctx = ctx.clone();
            let spec = spec.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::find_by_id_for_update(conn, loan_id).await?;
                if !loan.is_open() {
                    return Err(StoreError::Conflict("loan is not open".to_owned()));
                }

                let line = add_line_in_tx(conn, loan_id, spec).await?;

                audit::record(
                    conn,
                    identity.user_id,
                    AuditAction::Update,
                    "loan",
                    loan_id,
                    None,
                    Some(serde_json::json!({ "addedLine": line.id })),
                    &ctx,
                )
                .await
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

                Ok(line)
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Remove a line from an OPEN loan, reversing its status/stock effect.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Conflict`] if the loan is not OPEN, or
    /// [`LoanError::NotFound`] if the line does not belong to the loan.
    pub async fn remove_line(
        &self,
        identity: &Identity,
        loan_id: Uuid,
        line_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), LoanError> {
        let pool = self.pool.clone();
        let identity = *identity;
        let ctx = ctx.clone();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let ctx = ctx.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::find_by_id_for_update(conn, loan_id).await?;
                if !loan.is_open() {
                    return Err(StoreError::Conflict("loan is not open".to_owned()));
                }

                let line = store::loans::find_line(conn, loan_id, line_id).await?;
                reverse_line_effect(conn, &line).await?;
                store::loans::delete_line(conn, line_id).await?;

                audit::record(
                    conn,
                    identity.user_id,
                    AuditAction::Update,
                    "loan",
                    loan_id,
                    Some(serde_json::json!({ "removedLine": line_id })),
                    None,
                    &ctx,
                )
                .await
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

                Ok(())
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Attach a pickup or return signature reference. Rejects if the loan
    /// is not OPEN or the signature is already present, unless `override_as_admin`
    /// is set, in which case a `ROLE_OVERRIDE` audit entry is recorded
    /// alongside the normal update entry.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Conflict`] if the loan is not OPEN or the
    /// signature slot is already filled and no override applies.
    pub async fn sign(
        &self,
        identity: &Identity,
        loan_id: Uuid,
        kind: SignatureKind,
        signature_url: &str,
        signed_at: DateTime<Utc>,
        ctx: &RequestContext,
    ) -> Result<(), LoanError> {
        let pool = self.pool.clone();
        let identity = *identity;
        let ctx = ctx.clone();
        let signature_url = signature_url.to_owned();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let ctx = ctx.clone();
            let signature_url = signature_url.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::find_by_id_for_update(conn, loan_id).await?;
                if !loan.is_open() {
                    return Err(StoreError::Conflict("loan is not open".to_owned()));
                }

                let already_present = match kind {
                    SignatureKind::Pickup => loan.pickup_signed_at.is_some(),
                    SignatureKind::Return => loan.return_signed_at.is_some(),
                };
                let is_override = already_present && identity.role == Role::Admin;
                if already_present && !is_override {
                    return Err(StoreError::Conflict("signature already present".to_owned()));
                }

                match kind {
                    SignatureKind::Pickup => {
                        store::loans::set_pickup_signature(conn, loan_id, &signature_url, signed_at)
                            .await?;
                    }
                    SignatureKind::Return => {
                        store::loans::set_return_signature(conn, loan_id, &signature_url, signed_at)
                            .await?;
                    }
                }

                if is_override {
                    audit::record(
                        conn,
                        identity.user_id,
                        AuditAction::RoleOverride,
                        "loan",
                        loan_id,
                        None,
                        Some(serde_json::json!({ "signature": kind.as_str() })),
                        &ctx,
                    )
                    .await
                    .map_err(|e| StoreError::Conflict(e.to_string()))?;
                } else {
                    audit::record(
                        conn,
                        identity.user_id,
                        AuditAction::Update,
                        "loan",
                        loan_id,
                        None,
                        Some(serde_json::json!({ "signature": kind.as_str() })),
                        &ctx,
                    )
                    .await
                    .map_err(|e| StoreError::Conflict(e.to_string()))?;
                }

                Ok(())
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Close an OPEN loan: requires both signatures and at least one line.
    /// For every asset-item line, `AssetItem.status ← IN_STOCK`; for every
    /// stock line, decrements `loaned` by the line's quantity (S1).
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Conflict`] if the loan is not OPEN, is missing
    /// a signature, or has no lines.
    pub async fn close(
        &self,
        identity: &Identity,
        loan_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), LoanError> {
        let pool = self.pool.clone();
        let identity = *identity;
        let ctx = ctx.clone();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let ctx = ctx.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::find_by_id_for_update(conn, loan_id).await?;
                if !loan.is_open() {
                    return Err(StoreError::Conflict("loan is not open".to_owned()));
                }
                if loan.pickup_signed_at.is_none() || loan.return_signed_at.is_none() {
                    return Err(StoreError::Conflict(
                        "both signatures are required to close a loan".to_owned(),
                    ));
                }

                let lines = store::loans::find_lines(conn, loan_id).await?;
                if lines.is_empty() {
                    return Err(StoreError::Conflict(
                        "a loan with no lines cannot be closed".to_owned(),
                    ));
                }

                for line in &lines {
                    reverse_line_effect(conn, line).await?;
                }

                store::loans::close(conn, loan_id).await?;

                audit::record(
                    conn,
                    identity.user_id,
                    AuditAction::Update,
                    "loan",
                    loan_id,
                    Some(serde_json::json!({ "status": "OPEN" })),
                    Some(serde_json::json!({ "status": "CLOSED" })),
                    &ctx,
                )
                .await
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

                Ok(())
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Soft-delete a loan. In the same transaction, reverses the effects
    /// of any un-closed lines exactly as `close` would, so A1/A2/S1 hold
    /// across the soft delete.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::NotFound`] if the loan does not exist, or
    /// [`LoanError::Conflict`] if it was already soft-deleted (its lines'
    /// effects were already reversed once; reversing them again would
    /// double-release stock and drive `loaned` negative).
    pub async fn soft_delete(
        &self,
        identity: &Identity,
        loan_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), LoanError> {
        let pool = self.pool.clone();
        let identity = *identity;
        let ctx = ctx.clone();
        store::in_transaction_with_retry(&pool, IsolationLevel::Serializable, move |conn| {
            let ctx = ctx.clone();
            let conn = &mut *conn;
            Box::pin(async move {
                let loan = store::loans::find_by_id_for_update(conn, loan_id).await?;

                if loan.deleted_at.is_some() {
                    return Err(StoreError::Conflict("loan is already deleted".to_owned()));
                }

                if loan.status == "OPEN" {
                    let lines = store::loans::find_lines(conn, loan_id).await?;
                    for line in &lines {
                        reverse_line_effect(conn, line).await?;
                    }
                }

                store::loans::soft_delete(conn, loan_id, identity.user_id).await?;

                audit::record(
                    conn,
                    identity.user_id,
                    AuditAction::Delete,
                    "loan",
                    loan_id,
                    None,
                    None,
                    &ctx,
                )
                .await
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

                Ok(())
            })
        })
        .await
        .map_err(loan_error_from_store)
    }

    /// Fetch a loan with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::NotFound`] if the loan does not exist.
    pub async fn get(&self, loan_id: Uuid) -> Result<LoanWithLines, LoanError> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let loan = store::loans::find_by_id(&mut conn, loan_id)
            .await
            .map_err(loan_error_from_store)?;
        let lines = store::loans::find_lines(&mut conn, loan_id)
            .await
            .map_err(loan_error_from_store)?;
        Ok(LoanWithLines { loan, lines })
    }

    /// List loans, paginated, newest-first; soft-deleted loans are
    /// excluded unless `include_deleted` (ADMIN-only at the route layer).
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Store`] on a database failure.
    pub async fn list(
        &self,
        page: store::Page,
        include_deleted: bool,
    ) -> Result<Vec<crate::store::models::Loan>, LoanError> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        store::loans::find_many(&mut conn, page, include_deleted)
            .await
            .map_err(LoanError::from)
    }
}

/// Which signature slot an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Pickup,
    Return,
}

impl SignatureKind {
    fn as_str(self) -> &'static str {
        match self {
            SignatureKind::Pickup => "pickup",
            SignatureKind::Return => "return",
        }
    }
}

async fn add_line_in_tx(
    conn: &mut sqlx::PgConnection,
    loan_id: Uuid,
    spec: LineSpec,
) -> Result<LoanLine, StoreError> {
    match spec {
        LineSpec::Asset { asset_item_id } => {
            let transitioned = store::asset_items::transition_status_if(
                conn,
                asset_item_id,
                AssetItemStatus::InStock,
                AssetItemStatus::Lent,
            )
            .await?;
            if transitioned.is_none() {
                return Err(StoreError::Conflict(
                    "asset item is already lent or unavailable".to_owned(),
                ));
            }
            store::loans::insert_asset_line(conn, loan_id, asset_item_id).await
        }
        LineSpec::Stock {
            asset_model_id,
            quantity,
        } => {
            let stock_item = store::stock_items::find_by_asset_model(conn, asset_model_id).await?;
            let reserved =
                store::stock_items::reserve(conn, stock_item.id, quantity).await?;
            if reserved.is_none() {
                return Err(StoreError::Conflict(
                    "insufficient stock for requested quantity".to_owned(),
                ));
            }
            store::loans::insert_stock_line(conn, loan_id, stock_item.id, quantity).await
        }
    }
}

async fn reverse_line_effect(
    conn: &mut sqlx::PgConnection,
    line: &LoanLine,
) -> Result<(), StoreError> {
    if let Some(asset_item_id) = line.asset_item_id {
        store::asset_items::transition_status_if(
            conn,
            asset_item_id,
            AssetItemStatus::Lent,
            AssetItemStatus::InStock,
        )
        .await?;
    } else if let Some(stock_item_id) = line.stock_item_id {
        let quantity = line.quantity.unwrap_or(0);
        store::stock_items::release(conn, stock_item_id, quantity).await?;
    }
    Ok(())
}

fn loan_error_from_store(err: StoreError) -> LoanError {
    match err {
        StoreError::NotFound { .. } => LoanError::NotFound,
        StoreError::Conflict(msg) => LoanError::Conflict(msg),
        other => LoanError::Store(other),
    }
}
