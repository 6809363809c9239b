//! Login, bearer tokens and identity resolution.
//!
//! A successful login rotates the account's single bearer token, so a
//! stolen token dies the next time the real owner signs in. Login is
//! throttled per mobile number; a throttled attempt is indistinguishable
//! from a busy backend on the wire.

use chrono::{DateTime, Duration, Utc};
use portal_core::{Identity, ServiceError, new_id, now_rfc3339};
use portal_sql::Value;

use crate::model::{User, user::normalize_mobile};
use super::AccountsService;
use super::user::{USER_COLUMNS, map_sql_err, user_from_row, verify_password};

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

fn new_token() -> String {
    // Two v4 UUIDs give 64 hex chars and plenty of entropy.
    format!("{}{}", new_id(), new_id())
}

impl AccountsService {
    /// Authenticate by mobile and password, rotating the bearer token.
    ///
    /// Wrong password and unknown mobile return the same Unauthorized so
    /// the login form cannot be used to probe for accounts.
    pub fn login(&self, mobile: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let mobile = normalize_mobile(mobile)
            .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".into()))?;

        if !self.limiter.allow(&mobile) {
            tracing::warn!(mobile, "login throttled");
            return Err(ServiceError::Unavailable(
                "too many login attempts, try again shortly".into(),
            ));
        }

        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE mobile = ?1",
            USER_COLUMNS
        );
        let rows = self
            .sql
            .query(&sql, &[Value::Text(mobile.clone())])
            .map_err(map_sql_err)?;

        let row = match rows.first() {
            Some(row) => row,
            None => {
                // Burn comparable time so a missing account is not faster
                // than a wrong password.
                let _ = super::user::hash_password(password);
                return Err(ServiceError::Unauthorized("invalid credentials".into()));
            }
        };

        let hash = row.get_str("password_hash").unwrap_or_default();
        if !verify_password(password, hash) {
            return Err(ServiceError::Unauthorized("invalid credentials".into()));
        }

        let user = user_from_row(row)?;
        if !user.active {
            return Err(ServiceError::Unauthorized("account is disabled".into()));
        }

        let token = new_token();
        let expires = (Utc::now() + Duration::seconds(self.config.token_ttl_secs)).to_rfc3339();
        self.sql
            .exec(
                "UPDATE users SET token = ?1, token_expire_at = ?2, update_at = ?3 WHERE id = ?4",
                &[
                    Value::Text(token.clone()),
                    Value::Text(expires),
                    Value::Text(now_rfc3339()),
                    Value::Text(user.id.clone()),
                ],
            )
            .map_err(map_sql_err)?;

        self.limiter.reset(&mobile);
        Ok(LoginOutcome { token, user })
    }

    /// Resolve a bearer token to an identity. Expired, revoked and
    /// deactivated tokens all resolve to the same Unauthorized.
    pub fn resolve_token(&self, token: &str) -> Result<Identity, ServiceError> {
        if token.is_empty() {
            return Err(ServiceError::Unauthorized("missing token".into()));
        }

        let sql = format!(
            "SELECT {}, token_expire_at FROM users WHERE token = ?1",
            USER_COLUMNS
        );
        let rows = self
            .sql
            .query(&sql, &[Value::Text(token.to_string())])
            .map_err(map_sql_err)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::Unauthorized("invalid token".into()))?;

        let user = user_from_row(row)?;
        if !user.active {
            return Err(ServiceError::Unauthorized("account is disabled".into()));
        }

        let expired = row
            .get_str("token_expire_at")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|exp| exp < Utc::now())
            .unwrap_or(true);
        if expired {
            return Err(ServiceError::Unauthorized("token expired".into()));
        }

        Ok(Identity {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Revoke the current token for a user.
    pub fn logout(&self, user_id: &str) -> Result<(), ServiceError> {
        self.sql
            .exec(
                "UPDATE users SET token = NULL, token_expire_at = NULL, update_at = ?1
                 WHERE id = ?2",
                &[Value::Text(now_rfc3339()), Value::Text(user_id.to_string())],
            )
            .map_err(map_sql_err)?;
        Ok(())
    }
}
