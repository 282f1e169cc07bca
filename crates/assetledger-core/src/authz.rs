//! Role gate (C6) and ownership gate (C7).
//!
//! Both gates are pure functions of an explicit [`Identity`] value threaded
//! through handler signatures — no ambient `req.user` lookup. The role gate
//! takes an explicit allowed-role set rather than a minimum rank: ADMIN,
//! MANAGER, and READER only form a total order by convention, and named
//! helpers (`require_admin`, `require_manager_or_admin`) are built on the
//! same set check rather than a rank comparison.
//!
//! Ownership lookups always hit the store, never the cache — a stale
//! "allowed" from a cache is a correctness bug here, not just a staleness
//! nuisance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthzError;

/// The three roles. `READER` cannot reach any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    Reader,
}

/// The authenticated caller's identity, attached to the request by the auth
/// gate and passed explicitly to every handler and domain function that
/// needs it.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub token_issued_at: chrono::DateTime<chrono::Utc>,
}

/// Assert `identity`'s role is one of `allowed`. Generic denial message by
/// design — do not leak which roles would have worked.
///
/// # Errors
///
/// Returns [`AuthzError::InsufficientRole`] if `identity.role` is not in
/// `allowed`.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole)
    }
}

/// Require ADMIN.
///
/// # Errors
///
/// See [`require_role`].
pub fn require_admin(identity: &Identity) -> Result<(), AuthzError> {
    require_role(identity, &[Role::Admin])
}

/// Require MANAGER or ADMIN.
///
/// # Errors
///
/// See [`require_role`].
pub fn require_manager_or_admin(identity: &Identity) -> Result<(), AuthzError> {
    require_role(identity, &[Role::Admin, Role::Manager])
}

/// Ownership gate for an employee resource: ADMIN always passes; otherwise
/// the identity must be the employee's managing user.
///
/// # Errors
///
/// Returns [`AuthzError::NotOwner`] for a non-ADMIN, non-managing caller.
pub fn owns_employee(identity: &Identity, manager_user_id: Option<Uuid>) -> Result<(), AuthzError> {
    if identity.role == Role::Admin {
        return Ok(());
    }
    if manager_user_id == Some(identity.user_id) {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

/// Ownership gate for a loan resource: ADMIN always passes; otherwise the
/// identity must be the loan's creator.
///
/// # Errors
///
/// Returns [`AuthzError::NotOwner`] for a non-ADMIN, non-creating caller.
pub fn owns_loan(identity: &Identity, created_by: Uuid) -> Result<(), AuthzError> {
    if identity.role == Role::Admin || identity.user_id == created_by {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

/// Ownership gate for a user account resource: ADMIN always passes;
/// otherwise the identity must be the target account itself.
///
/// # Errors
///
/// Returns [`AuthzError::NotOwner`] for a non-ADMIN caller acting on
/// someone else's account.
pub fn owns_user_account(identity: &Identity, target_user_id: Uuid) -> Result<(), AuthzError> {
    if identity.role == Role::Admin || identity.user_id == target_user_id {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

/// Asset items are a shared pool: any MANAGER or ADMIN may act on any of
/// them. This exists mainly to document the rule at the same call sites as
/// the other ownership helpers, rather than special-casing asset routes.
///
/// # Errors
///
/// Returns [`AuthzError::InsufficientRole`] for READER.
pub fn owns_asset_item(identity: &Identity) -> Result<(), AuthzError> {
    require_manager_or_admin(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
            token_issued_at: Utc::now(),
        }
    }

    #[test]
    fn reader_cannot_pass_manager_gate() {
        let id = identity(Role::Reader);
        assert!(require_manager_or_admin(&id).is_err());
    }

    #[test]
    fn admin_bypasses_employee_ownership() {
        let id = identity(Role::Admin);
        assert!(owns_employee(&id, Some(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn manager_must_match_employee_manager_id() {
        let id = identity(Role::Manager);
        assert!(owns_employee(&id, Some(id.user_id)).is_ok());
        assert!(owns_employee(&id, Some(Uuid::new_v4())).is_err());
        assert!(owns_employee(&id, None).is_err());
    }

    #[test]
    fn loan_ownership_matches_creator() {
        let id = identity(Role::Manager);
        assert!(owns_loan(&id, id.user_id).is_ok());
        assert!(owns_loan(&id, Uuid::new_v4()).is_err());
    }
}
