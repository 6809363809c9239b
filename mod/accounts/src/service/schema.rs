use portal_core::ServiceError;
use portal_sql::SQLStore;

/// Account storage. Uniqueness on mobile and gst lives here so races on
/// signup resolve in the storage layer.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        mobile TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        company TEXT NOT NULL DEFAULT '',
        gst TEXT UNIQUE,
        role TEXT NOT NULL DEFAULT 'CUSTOMER',
        active INTEGER NOT NULL DEFAULT 1,
        token TEXT,
        token_expire_at TEXT,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_token ON users(token)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
