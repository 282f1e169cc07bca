//! Password hashing and policy enforcement (C3).
//!
//! Hashes are Argon2id in PHC string format. Verification runs through
//! `argon2::PasswordVerifier`, which compares the recomputed hash in
//! constant time. Hashes must never be logged or serialized back to a
//! client — `crate::store::models::User` keeps `password_hash` out of its
//! `Serialize` impl for exactly this reason.

use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::{Argon2, Params, PasswordHash};

use crate::error::{PasswordError, PolicyViolation};

const MIN_LENGTH: usize = 8;
const MAX_LENGTH: usize = 128;
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>?/|~";

/// Raised `m_cost` over the crate default so a single hash takes roughly
/// 100ms on a contemporary core, per the work-factor target.
fn params() -> Params {
    Params::new(19_456, 2, 1, None).unwrap_or_default()
}

/// Hash a plaintext password. Returns the PHC string form, ready to persist.
///
/// # Errors
///
/// Returns [`PasswordError::HashFailure`] if the underlying KDF fails (out
/// of memory, invalid params).
pub fn hash(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params());
    let digest = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashFailure(e.to_string()))?;
    Ok(digest.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Always takes the same code path regardless of where the mismatch
/// occurs, so verification time does not leak where the password diverges.
///
/// # Errors
///
/// Returns [`PasswordError::MalformedHash`] if `stored_hash` is not a valid
/// PHC string.
pub fn verify(plaintext: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordError::MalformedHash)?;
    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/// Check a candidate password against the password policy, returning every
/// violated clause rather than short-circuiting on the first.
#[must_use]
pub fn check_policy(plaintext: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    if plaintext.len() < MIN_LENGTH || plaintext.len() > MAX_LENGTH {
        violations.push(PolicyViolation {
            rule: "length",
            message: "password must be between 8 and 128 characters",
        });
    }
    if !plaintext.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PolicyViolation {
            rule: "uppercase",
            message: "password must contain at least one uppercase letter",
        });
    }
    if !plaintext.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PolicyViolation {
            rule: "lowercase",
            message: "password must contain at least one lowercase letter",
        });
    }
    if !plaintext.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation {
            rule: "digit",
            message: "password must contain at least one digit",
        });
    }
    if !plaintext.chars().any(|c| SYMBOLS.contains(c)) {
        violations.push(PolicyViolation {
            rule: "symbol",
            message: "password must contain at least one symbol",
        });
    }

    violations
}

/// Hash a plaintext password after confirming it satisfies the policy.
///
/// # Errors
///
/// Returns [`PasswordError::PolicyViolation`] listing every failing clause,
/// or [`PasswordError::HashFailure`] if hashing itself fails.
pub fn hash_if_policy_compliant(plaintext: &str) -> Result<String, PasswordError> {
    let violations = check_policy(plaintext);
    if !violations.is_empty() {
        return Err(PasswordError::PolicyViolation(violations));
    }
    hash(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_password_passes_every_clause() {
        let candidate = "Passw0rd!";
        assert!(check_policy(candidate).is_empty());
    }

    #[test]
    fn weak_password_lists_missing_clauses() {
        let violations = check_policy("passw0rd");
        let rules: Vec<_> = violations.iter().map(|v| v.rule).collect();
        assert!(rules.contains(&"uppercase"));
        assert!(rules.contains(&"symbol"));
        assert!(!rules.contains(&"digit"));
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let digest = hash("Passw0rd!").unwrap();
        assert!(verify("Passw0rd!", &digest).unwrap());
        assert!(!verify("WrongPass1!", &digest).unwrap());
    }

    #[test]
    fn malformed_hash_is_reported_not_panicked() {
        let result = verify("whatever", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::MalformedHash)));
    }

    #[test]
    fn hash_if_policy_compliant_rejects_weak_password() {
        let result = hash_if_policy_compliant("weak");
        assert!(matches!(result, Err(PasswordError::PolicyViolation(_))));
    }
}
