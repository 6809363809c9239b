pub mod auth;
pub mod rate_limit;
pub mod schema;
pub mod user;

use std::sync::Arc;

use portal_core::ServiceError;
use portal_sql::SQLStore;

use rate_limit::{Clock, LoginRateLimiter, SystemClock};

/// Policy knobs for the accounts module.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Bearer token lifetime in seconds. Default 30 days.
    pub token_ttl_secs: i64,
    /// Login throttle: attempts allowed per identifier per window.
    pub login_max_attempts: u32,
    /// Login throttle window in seconds.
    pub login_window_secs: u64,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 30 * 24 * 3600,
            login_max_attempts: 5,
            login_window_secs: 60,
        }
    }
}

/// Accounts service — signup, login with bearer tokens, and account
/// administration.
pub struct AccountsService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) config: AccountsConfig,
    pub(crate) limiter: LoginRateLimiter,
}

impl AccountsService {
    pub fn new(sql: Arc<dyn SQLStore>, config: AccountsConfig) -> Result<Self, ServiceError> {
        Self::with_clock(sql, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        sql: Arc<dyn SQLStore>,
        config: AccountsConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        let limiter = LoginRateLimiter::new(
            config.login_max_attempts,
            config.login_window_secs,
            clock,
        );
        Ok(Self {
            sql,
            config,
            limiter,
        })
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use portal_sql::SqliteStore;

    pub fn service() -> AccountsService {
        let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        AccountsService::new(sql, AccountsConfig::default()).unwrap()
    }

    pub fn service_with_clock(clock: Arc<dyn Clock>) -> AccountsService {
        let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        AccountsService::with_clock(sql, AccountsConfig::default(), clock).unwrap()
    }
}
