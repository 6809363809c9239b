//! Account CRUD and the admin bootstrap.

use portal_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339, role};
use portal_sql::{Row, SQLError, Value};

use crate::model::{CreateUser, User, user::normalize_mobile};
use super::AccountsService;

pub(crate) const USER_COLUMNS: &str =
    "id, mobile, company, gst, role, active, create_at, update_at";

/// Hash a plain password with argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against an argon2id hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub(crate) fn map_sql_err(e: SQLError) -> ServiceError {
    let msg = e.to_string();
    if e.is_transient() {
        ServiceError::Unavailable(msg)
    } else if msg.contains("UNIQUE constraint") {
        ServiceError::Conflict(msg)
    } else {
        ServiceError::Storage(msg)
    }
}

pub(crate) fn user_from_row(row: &Row) -> Result<User, ServiceError> {
    Ok(User {
        id: row
            .get_str("id")
            .ok_or_else(|| ServiceError::Internal("missing id column".into()))?
            .to_string(),
        mobile: row.get_str("mobile").unwrap_or_default().to_string(),
        company: row.get_str("company").unwrap_or_default().to_string(),
        gst: row.get_str("gst").map(String::from),
        role: row.get_str("role").unwrap_or(role::CUSTOMER).to_string(),
        active: row.get_i64("active").unwrap_or(1) != 0,
        create_at: row.get_str("create_at").map(String::from),
        update_at: row.get_str("update_at").map(String::from),
    })
}

impl AccountsService {
    /// Create a customer account. Mobile and GST collisions surface as
    /// Conflict straight from the storage layer.
    pub fn create_user(&self, input: CreateUser) -> Result<User, ServiceError> {
        let mobile = normalize_mobile(&input.mobile)
            .ok_or_else(|| ServiceError::Validation("invalid mobile number".into()))?;
        if input.password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        let gst = match input.gst.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(g) => Some(g.to_uppercase()),
        };

        let id = new_id();
        let now = now_rfc3339();
        let password_hash = hash_password(&input.password)?;

        self.sql
            .exec(
                "INSERT INTO users (id, mobile, password_hash, company, gst, role, active, create_at, update_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
                &[
                    Value::Text(id.clone()),
                    Value::Text(mobile.clone()),
                    Value::Text(password_hash),
                    Value::Text(input.company.trim().to_string()),
                    gst.clone().map(Value::Text).unwrap_or(Value::Null),
                    Value::Text(role::CUSTOMER.to_string()),
                    Value::Text(now.clone()),
                ],
            )
            .map_err(map_sql_err)
            .map_err(|e| match e {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict("an account with this mobile or GST already exists".into())
                }
                other => other,
            })?;

        Ok(User {
            id,
            mobile,
            company: input.company.trim().to_string(),
            gst,
            role: role::CUSTOMER.to_string(),
            active: true,
            create_at: Some(now.clone()),
            update_at: Some(now),
        })
    }

    pub fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let rows = self
            .sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(map_sql_err)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("user '{}' not found", id)))?;
        user_from_row(row)
    }

    pub fn list_users(&self, params: &ListParams) -> Result<ListResult<User>, ServiceError> {
        let limit = params.limit.min(500);
        let total = self
            .sql
            .query("SELECT COUNT(*) as cnt FROM users", &[])
            .map_err(map_sql_err)?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let sql = format!(
            "SELECT {} FROM users ORDER BY create_at DESC, mobile LIMIT ?1 OFFSET ?2",
            USER_COLUMNS
        );
        let rows = self
            .sql
            .query(
                &sql,
                &[
                    Value::Integer(limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
            .map_err(map_sql_err)?;

        let mut items = Vec::new();
        for row in &rows {
            items.push(user_from_row(row)?);
        }
        Ok(ListResult { items, total })
    }

    /// Activate or deactivate an account. Deactivation also revokes the
    /// current token. The admin account cannot be deactivated.
    pub fn set_user_active(&self, id: &str, active: bool) -> Result<User, ServiceError> {
        let user = self.get_user(id)?;
        if user.role == role::ADMIN && !active {
            return Err(ServiceError::Conflict(
                "the administrator account cannot be deactivated".into(),
            ));
        }

        let now = now_rfc3339();
        if active {
            self.sql.exec(
                "UPDATE users SET active = 1, update_at = ?1 WHERE id = ?2",
                &[Value::Text(now), Value::Text(id.to_string())],
            )
        } else {
            self.sql.exec(
                "UPDATE users SET active = 0, token = NULL, token_expire_at = NULL,
                 update_at = ?1 WHERE id = ?2",
                &[Value::Text(now), Value::Text(id.to_string())],
            )
        }
        .map_err(map_sql_err)?;

        self.get_user(id)
    }

    pub fn update_user_profile(
        &self,
        id: &str,
        company: Option<&str>,
        gst: Option<&str>,
    ) -> Result<User, ServiceError> {
        let current = self.get_user(id)?;
        let company = company
            .map(|c| c.trim().to_string())
            .unwrap_or(current.company);
        let gst = match gst.map(str::trim) {
            Some("") => None,
            Some(g) => Some(g.to_uppercase()),
            None => current.gst,
        };

        let now = now_rfc3339();
        self.sql
            .exec(
                "UPDATE users SET company = ?1, gst = ?2, update_at = ?3 WHERE id = ?4",
                &[
                    Value::Text(company),
                    gst.map(Value::Text).unwrap_or(Value::Null),
                    Value::Text(now),
                    Value::Text(id.to_string()),
                ],
            )
            .map_err(map_sql_err)?;
        self.get_user(id)
    }

    /// Seed or refresh the administrator account from configuration.
    /// Idempotent across restarts; the password is re-hashed every call so
    /// a config change takes effect on the next start.
    pub fn ensure_admin(&self, mobile: &str, password: &str) -> Result<User, ServiceError> {
        let mobile = normalize_mobile(mobile)
            .ok_or_else(|| ServiceError::Validation("invalid admin mobile number".into()))?;
        let password_hash = hash_password(password)?;
        let now = now_rfc3339();

        let existing = self
            .sql
            .query(
                "SELECT id FROM users WHERE role = ?1",
                &[Value::Text(role::ADMIN.to_string())],
            )
            .map_err(map_sql_err)?;

        if let Some(id) = existing.first().and_then(|r| r.get_str("id")) {
            let id = id.to_string();
            self.sql
                .exec(
                    "UPDATE users SET mobile = ?1, password_hash = ?2, active = 1, update_at = ?3
                     WHERE id = ?4",
                    &[
                        Value::Text(mobile),
                        Value::Text(password_hash),
                        Value::Text(now),
                        Value::Text(id.clone()),
                    ],
                )
                .map_err(map_sql_err)?;
            return self.get_user(&id);
        }

        let id = new_id();
        self.sql
            .exec(
                "INSERT INTO users (id, mobile, password_hash, company, role, active, create_at, update_at)
                 VALUES (?1, ?2, ?3, '', ?4, 1, ?5, ?5)",
                &[
                    Value::Text(id.clone()),
                    Value::Text(mobile),
                    Value::Text(password_hash),
                    Value::Text(role::ADMIN.to_string()),
                    Value::Text(now),
                ],
            )
            .map_err(map_sql_err)?;
        self.get_user(&id)
    }

    /// Whether this account may register serials: it must exist, be
    /// active, and be a customer account.
    pub fn is_eligible_to_register(&self, user_id: &str) -> Result<bool, ServiceError> {
        match self.get_user(user_id) {
            Ok(user) => Ok(user.active && user.role == role::CUSTOMER),
            Err(ServiceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
