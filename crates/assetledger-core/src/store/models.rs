//! Persisted entity shapes, one `sqlx::FromRow` struct per table.
//!
//! IDs are `Uuid` v4; timestamps are `DateTime<Utc>`. `User::password_hash`
//! is deliberately excluded from `Serialize` — it must never cross a
//! process boundary, by design named in the password module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::authz::Role;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[sqlx(rename = "password_hash")]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-facing projection of [`User`] — no password hash, ever.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            role: u.role.clone(),
            created_at: u.created_at,
        }
    }
}

impl User {
    #[must_use]
    pub fn role_enum(&self) -> Role {
        match self.role.as_str() {
            "ADMIN" => Role::Admin,
            "MANAGER" => Role::Manager,
            _ => Role::Reader,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub manager_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssetModel {
    pub id: Uuid,
    #[sqlx(rename = "asset_type")]
    pub asset_type: String,
    pub brand: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssetItem {
    pub id: Uuid,
    pub asset_model_id: Uuid,
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The three statuses an `AssetItem` may hold. `IN_STOCK`/`LENT` are the
/// two the loan engine transitions between; `BROKEN`/`REPAIR` are set out
/// of band (no operation in this crate produces them, but the store must
/// still round-trip them without rejecting the row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetItemStatus {
    InStock,
    Lent,
    Broken,
    Repair,
}

impl AssetItemStatus {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            AssetItemStatus::InStock => "IN_STOCK",
            AssetItemStatus::Lent => "LENT",
            AssetItemStatus::Broken => "BROKEN",
            AssetItemStatus::Repair => "REPAIR",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockItem {
    pub id: Uuid,
    pub asset_model_id: Uuid,
    pub quantity: i64,
    pub loaned: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pickup_signature_url: Option<String>,
    pub pickup_signed_at: Option<DateTime<Utc>>,
    pub return_signature_url: Option<String>,
    pub return_signed_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Loan {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == "OPEN" && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoanLine {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub asset_item_id: Option<Uuid>,
    pub stock_item_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub added_at: DateTime<Utc>,
}

/// A loan with its lines attached — the shape returned by the loan engine's
/// read operations.
#[derive(Debug, Clone, Serialize)]
pub struct LoanWithLines {
    #[serde(flatten)]
    pub loan: Loan,
    pub lines: Vec<LoanLine>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_user_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Actions recorded in the audit log, matching the enum named for
/// `AuditEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    RoleChange,
    RoleOverride,
}

impl AuditAction {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::RoleChange => "ROLE_CHANGE",
            AuditAction::RoleOverride => "ROLE_OVERRIDE",
        }
    }
}
