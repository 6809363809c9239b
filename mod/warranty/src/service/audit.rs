//! Append-only audit trail.
//!
//! Recording is fire-and-forget: a failed append is retried once after a
//! short pause, then dropped with a warning. Audit writes must never fail
//! the business operation they describe.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use portal_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use portal_sql::{Row, SQLStore, Value};

use crate::model::AuditEntry;
use super::WarrantyService;
use super::ledger::with_retry;

const APPEND_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Handle for appending audit entries. Cheap to clone.
#[derive(Clone)]
pub struct AuditSink {
    sql: Arc<dyn SQLStore>,
}

impl AuditSink {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self { sql }
    }

    /// Append an entry. Never returns an error: one retry, then the entry
    /// is dropped and logged.
    pub fn record(
        &self,
        actor: &str,
        action: &str,
        target_type: &str,
        target_id: &str,
        detail: serde_json::Value,
    ) {
        let entry = AuditEntry {
            id: new_id(),
            actor: actor.to_string(),
            action: action.to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            detail,
            create_at: now_rfc3339(),
        };

        if let Err(first) = self.append(&entry) {
            thread::sleep(APPEND_RETRY_BACKOFF);
            if let Err(second) = self.append(&entry) {
                tracing::warn!(
                    action = entry.action,
                    target_id = entry.target_id,
                    first_error = %first,
                    error = %second,
                    "dropping audit entry after retry"
                );
            }
        }
    }

    fn append(&self, entry: &AuditEntry) -> Result<(), portal_sql::SQLError> {
        let detail = entry.detail.to_string();
        self.sql.exec(
            "INSERT INTO audit_log (id, actor, action, target_type, target_id, detail, create_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            &[
                Value::Text(entry.id.clone()),
                Value::Text(entry.actor.clone()),
                Value::Text(entry.action.clone()),
                Value::Text(entry.target_type.clone()),
                Value::Text(entry.target_id.clone()),
                Value::Text(detail),
                Value::Text(entry.create_at.clone()),
            ],
        )?;
        Ok(())
    }
}

fn entry_from_row(row: &Row) -> Result<AuditEntry, ServiceError> {
    let detail = match row.get_str("detail") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ServiceError::Internal(format!("malformed audit detail: {}", e)))?,
        None => serde_json::Value::Null,
    };
    Ok(AuditEntry {
        id: row
            .get_str("id")
            .ok_or_else(|| ServiceError::Internal("missing id column".into()))?
            .to_string(),
        actor: row.get_str("actor").unwrap_or_default().to_string(),
        action: row.get_str("action").unwrap_or_default().to_string(),
        target_type: row.get_str("target_type").unwrap_or_default().to_string(),
        target_id: row.get_str("target_id").unwrap_or_default().to_string(),
        detail,
        create_at: row.get_str("create_at").unwrap_or_default().to_string(),
    })
}

impl WarrantyService {
    /// Read back the audit trail, newest first, optionally scoped to a
    /// target.
    pub fn list_audit_entries(
        &self,
        params: &ListParams,
        target_type: Option<&str>,
        target_id: Option<&str>,
    ) -> Result<ListResult<AuditEntry>, ServiceError> {
        let limit = params.limit.min(500);

        let mut where_clauses = Vec::new();
        let mut bind = Vec::new();
        if let Some(tt) = target_type {
            bind.push(Value::Text(tt.to_string()));
            where_clauses.push(format!("target_type = ?{}", bind.len()));
        }
        if let Some(tid) = target_id {
            bind.push(Value::Text(tid.to_string()));
            where_clauses.push(format!("target_id = ?{}", bind.len()));
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM audit_log{}", where_sql);
        let total = with_retry(|| self.sql.query(&count_sql, &bind))?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        bind.push(Value::Integer(limit as i64));
        let limit_idx = bind.len();
        bind.push(Value::Integer(params.offset as i64));
        let offset_idx = bind.len();

        let sql = format!(
            "SELECT id, actor, action, target_type, target_id, detail, create_at
             FROM audit_log{} ORDER BY create_at DESC, id LIMIT ?{} OFFSET ?{}",
            where_sql, limit_idx, offset_idx,
        );
        let rows = with_retry(|| self.sql.query(&sql, &bind))?;

        let mut items = Vec::new();
        for row in &rows {
            items.push(entry_from_row(row)?);
        }
        Ok(ListResult { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action;
    use crate::service::testutil::service;
    use serde_json::json;

    #[test]
    fn record_then_list() {
        let (_dir, svc) = service();
        svc.audit_sink().record(
            "u1",
            action::REGISTER_SERIAL,
            "serial",
            "SN-1",
            json!({"productId": "p1"}),
        );

        let entries = svc
            .list_audit_entries(&ListParams::default(), None, None)
            .unwrap();
        assert_eq!(entries.total, 1);
        let e = &entries.items[0];
        assert_eq!(e.actor, "u1");
        assert_eq!(e.action, action::REGISTER_SERIAL);
        assert_eq!(e.detail["productId"], "p1");
    }

    #[test]
    fn list_scoped_to_target() {
        let (_dir, svc) = service();
        let sink = svc.audit_sink();
        sink.record("u1", action::REGISTER_SERIAL, "serial", "SN-1", json!({}));
        sink.record("u1", action::DISASSOCIATE_SERIAL, "serial", "SN-1", json!({}));
        sink.record("admin", action::CREATE_PRODUCT, "product", "p1", json!({}));

        let scoped = svc
            .list_audit_entries(&ListParams::default(), Some("serial"), Some("SN-1"))
            .unwrap();
        assert_eq!(scoped.total, 2);

        let products = svc
            .list_audit_entries(&ListParams::default(), Some("product"), None)
            .unwrap();
        assert_eq!(products.total, 1);
    }

    /// A sink over a store with no audit table must not panic or error.
    #[test]
    fn failed_append_is_swallowed() {
        use portal_sql::SqliteStore;
        use std::sync::Arc;

        let bare = Arc::new(SqliteStore::open_in_memory().unwrap());
        let sink = AuditSink::new(bare);
        sink.record("u1", action::REGISTER_SERIAL, "serial", "SN-1", json!({}));
    }
}
