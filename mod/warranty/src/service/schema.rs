use portal_core::ServiceError;
use portal_sql::SQLStore;

/// SQL DDL statements to initialize the warranty database schema.
///
/// The `serials` table is the ledger: uniqueness lives in the storage layer
/// (UNIQUE on the normalized serial), and claim/release are row-level
/// conditional updates against the `status` column. `audit_log` is
/// append-only.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS serials (
        id TEXT PRIMARY KEY,
        serial TEXT NOT NULL UNIQUE,
        product_id TEXT NOT NULL,
        owner_id TEXT,
        status TEXT NOT NULL DEFAULT 'AVAILABLE',
        registered_at TEXT,
        evidence TEXT,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        actor TEXT NOT NULL,
        action TEXT NOT NULL,
        target_type TEXT NOT NULL,
        target_id TEXT NOT NULL,
        detail TEXT,
        create_at TEXT NOT NULL
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_serials_product ON serials(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_serials_status ON serials(status)",
    "CREATE INDEX IF NOT EXISTS idx_serials_owner ON serials(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_create_at ON audit_log(create_at)",
    "CREATE INDEX IF NOT EXISTS idx_audit_target ON audit_log(target_type, target_id)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
