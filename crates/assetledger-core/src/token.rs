//! Access/refresh token issuance and verification (C4).
//!
//! Tokens are `HS256` JWTs carrying only `subject`, `role`, `issued-at`, and
//! `expires-at` — no PII. Access and refresh tokens are signed with distinct
//! secrets so a leaked access-token secret cannot be used to forge refresh
//! tokens. Revocation is layered on top via the KV cache (C2): the token
//! itself never becomes invalid on its own, it is only rejected if the
//! cache says so, which is why every verify path treats a cache error the
//! same as "not revoked" (fail open, per the blacklist's documented
//! availability tradeoff).

use std::sync::Arc;
use std::time::Duration;

use assetledger_storage::CacheBackend;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::Role;
use crate::error::TokenError;

const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Claims embedded in both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub role: Role,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expires-at, seconds since epoch.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_else(Utc::now)
    }
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Mints, verifies, and revokes access/refresh tokens.
///
/// Cheap to clone: the signing keys are owned, the cache handle is an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    cache: Arc<dyn CacheBackend>,
}

impl TokenService {
    #[must_use]
    pub fn new(access_secret: &str, refresh_secret: &str, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            cache,
        }
    }

    /// Issue a fresh access/refresh pair for the given user.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] only if JWT encoding itself fails,
    /// which does not happen for well-formed claims with a valid key.
    pub fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access = self.encode_token(
            &self.access_encoding,
            user_id,
            role,
            now,
            ACCESS_TOKEN_TTL,
        )?;
        let refresh = self.encode_token(
            &self.refresh_encoding,
            user_id,
            role,
            now,
            REFRESH_TOKEN_TTL,
        )?;
        Ok(TokenPair { access, refresh })
    }

    fn encode_token(
        &self,
        key: &EncodingKey,
        user_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            role,
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp() + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        };
        encode(&Header::default(), &claims, key).map_err(|_| TokenError::Invalid)
    }

    /// Verify an access token: signature, expiry, individual revocation,
    /// and the holder's global-invalidation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`]/[`TokenError::Expired`] on a bad or
    /// stale signature, [`TokenError::Revoked`] if the token or the user's
    /// tokens issued before a revocation point were invalidated.
    pub async fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(&self.access_decoding, token)?;
        self.check_revocation(token, &claims).await?;
        Ok(claims)
    }

    /// Verify a refresh token using the refresh-specific signing key.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TokenService::verify_access`].
    pub async fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(&self.refresh_decoding, token)?;
        self.check_revocation(token, &claims).await?;
        Ok(claims)
    }

    fn decode(&self, key: &DecodingKey, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    async fn check_revocation(&self, token: &str, claims: &Claims) -> Result<(), TokenError> {
        let token_key = format!("revoked:token:{token}");
        match self.cache.get(&token_key).await {
            Ok(Some(_)) => return Err(TokenError::Revoked),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cache unavailable during revocation check, failing open"),
        }

        let user_key = format!("revoked:user:{}", claims.sub);
        match self.cache.get(&user_key).await {
            Ok(Some(bytes)) => {
                if let Ok(invalidated_at) = std::str::from_utf8(&bytes)
                    .unwrap_or_default()
                    .parse::<i64>()
                {
                    if invalidated_at > claims.iat {
                        return Err(TokenError::Revoked);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cache unavailable during global invalidation check, failing open"),
        }

        Ok(())
    }

    /// Revoke a single token: writes `revoked:token:<token>` with TTL equal
    /// to its remaining lifetime, floored to 1 second. A token that has
    /// already expired (remaining ≤ 0) is a no-op — there is nothing left
    /// to revoke.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Cache`] if the cache write fails. Callers at
    /// the logout endpoint should still clear client-side cookies even if
    /// this fails; the token will fall out of validity on its own at
    /// `exp`.
    pub async fn revoke(&self, token: &str, claims: &Claims) -> Result<(), TokenError> {
        let now = Utc::now().timestamp();
        let remaining = claims.exp - now;
        if remaining <= 0 {
            return Ok(());
        }
        let ttl = Duration::from_secs(u64::try_from(remaining).unwrap_or(1).max(1));
        let key = format!("revoked:token:{token}");
        self.cache.set(&key, b"revoked", ttl).await?;
        Ok(())
    }

    /// Invalidate every token issued to `user_id` before now. Writes
    /// `revoked:user:<id>` = current timestamp, TTL = max refresh lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Cache`] if the cache write fails.
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<(), TokenError> {
        let key = format!("revoked:user:{user_id}");
        let now = Utc::now().timestamp().to_string();
        self.cache.set(&key, now.as_bytes(), REFRESH_TOKEN_TTL).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetledger_storage::MemoryCacheBackend;

    fn service() -> TokenService {
        TokenService::new(
            "access-secret-for-tests",
            "refresh-secret-for-tests",
            Arc::new(MemoryCacheBackend::new()),
        )
    }

    #[tokio::test]
    async fn issue_and_verify_roundtrip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let pair = svc.issue_pair(user_id, Role::Manager).unwrap();

        let claims = svc.verify_access(&pair.access).await.unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Manager);
    }

    #[tokio::test]
    async fn access_and_refresh_use_distinct_keys() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4(), Role::Reader).unwrap();

        // an access token is not a valid refresh token and vice versa
        assert!(svc.verify_refresh(&pair.access).await.is_err());
        assert!(svc.verify_access(&pair.refresh).await.is_err());
    }

    #[tokio::test]
    async fn revoked_token_fails_verification() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4(), Role::Admin).unwrap();
        let claims = svc.verify_access(&pair.access).await.unwrap();

        svc.revoke(&pair.access, &claims).await.unwrap();

        let result = svc.verify_access(&pair.access).await;
        assert!(matches!(result, Err(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn invalidate_user_rejects_tokens_issued_before_it() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let pair = svc.issue_pair(user_id, Role::Manager).unwrap();

        // ensure the invalidation timestamp strictly exceeds iat
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        svc.invalidate_user(user_id).await.unwrap();

        let result = svc.verify_access(&pair.access).await;
        assert!(matches!(result, Err(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn tokens_issued_after_invalidation_remain_valid() {
        let svc = service();
        let user_id = Uuid::new_v4();
        svc.invalidate_user(user_id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let pair = svc.issue_pair(user_id, Role::Manager).unwrap();
        assert!(svc.verify_access(&pair.access).await.is_ok());
    }
}
