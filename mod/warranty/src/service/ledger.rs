//! Serial ledger store — durable claim state for every serial number.
//!
//! The single correctness rule: claim and release are one conditional
//! UPDATE each, with the current status in the WHERE clause; the affected
//! row count is the sole source of truth. A read-then-write sequence here
//! would reintroduce the double-registration race.

use std::thread;
use std::time::Duration;

use portal_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use portal_sql::{Row, SQLError, Value};

use crate::model::{SerialRecord, SerialStatus};
use super::WarrantyService;

/// Bounded retry for transient lock contention inside the store.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Per-product ledger counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialCounts {
    /// All records for the product.
    pub uploaded: i64,
    /// Records with status REGISTERED.
    pub assigned: i64,
}

/// Query filters for listing serial records.
#[derive(Debug, Default)]
pub struct SerialFilters {
    pub product_id: Option<String>,
    pub status: Option<SerialStatus>,
    pub owner_id: Option<String>,
    /// Case-insensitive substring match on the serial number.
    pub search: Option<String>,
}

const SERIAL_COLUMNS: &str =
    "id, serial, product_id, owner_id, status, registered_at, evidence, create_at, update_at";

/// Run a storage operation, retrying on Busy with a fixed backoff.
/// Terminal errors (uniqueness, malformed SQL) pass through untouched.
pub(crate) fn with_retry<T>(
    mut op: impl FnMut() -> Result<T, SQLError>,
) -> Result<T, ServiceError> {
    let mut last = None;
    for attempt in 0..RETRY_ATTEMPTS {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() => {
                tracing::debug!(attempt, error = %e, "ledger store busy, retrying");
                last = Some(e);
                if attempt + 1 < RETRY_ATTEMPTS {
                    thread::sleep(RETRY_BACKOFF);
                }
            }
            Err(e) => return Err(map_sql_err(e)),
        }
    }
    Err(ServiceError::Unavailable(format!(
        "storage busy after {} attempts: {}",
        RETRY_ATTEMPTS,
        last.map(|e| e.to_string()).unwrap_or_default(),
    )))
}

/// Map a terminal SQL error to the service taxonomy.
fn map_sql_err(e: SQLError) -> ServiceError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        ServiceError::Conflict(msg)
    } else {
        ServiceError::Storage(msg)
    }
}

pub(crate) fn record_from_row(row: &Row) -> Result<SerialRecord, ServiceError> {
    let status_str = row
        .get_str("status")
        .ok_or_else(|| ServiceError::Internal("missing status column".into()))?;
    let status = SerialStatus::parse(status_str)
        .ok_or_else(|| ServiceError::Internal(format!("unknown serial status: {}", status_str)))?;

    Ok(SerialRecord {
        id: row
            .get_str("id")
            .ok_or_else(|| ServiceError::Internal("missing id column".into()))?
            .to_string(),
        serial: row
            .get_str("serial")
            .ok_or_else(|| ServiceError::Internal("missing serial column".into()))?
            .to_string(),
        product_id: row
            .get_str("product_id")
            .ok_or_else(|| ServiceError::Internal("missing product_id column".into()))?
            .to_string(),
        owner_id: row.get_str("owner_id").map(String::from),
        status,
        registered_at: row.get_str("registered_at").map(String::from),
        evidence: row.get_str("evidence").map(String::from),
        create_at: row.get_str("create_at").map(String::from),
        update_at: row.get_str("update_at").map(String::from),
    })
}

impl WarrantyService {
    /// Insert a new serial as AVAILABLE. The serial must already be
    /// normalized; a duplicate (anywhere in the ledger) is a Conflict.
    pub fn insert_available(
        &self,
        serial: &str,
        product_id: &str,
    ) -> Result<SerialRecord, ServiceError> {
        let id = new_id();
        let now = now_rfc3339();

        with_retry(|| {
            self.sql.exec(
                "INSERT INTO serials (id, serial, product_id, status, create_at, update_at)
                 VALUES (?1, ?2, ?3, 'AVAILABLE', ?4, ?4)",
                &[
                    Value::Text(id.clone()),
                    Value::Text(serial.to_string()),
                    Value::Text(product_id.to_string()),
                    Value::Text(now.clone()),
                ],
            )
        })
        .map_err(|e| match e {
            ServiceError::Conflict(_) => {
                ServiceError::Conflict(format!("serial '{}' already exists", serial))
            }
            other => other,
        })?;

        Ok(SerialRecord {
            id,
            serial: serial.to_string(),
            product_id: product_id.to_string(),
            owner_id: None,
            status: SerialStatus::Available,
            registered_at: None,
            evidence: None,
            create_at: Some(now.clone()),
            update_at: Some(now),
        })
    }

    /// Look up a serial record by its normalized serial number.
    pub fn lookup_by_serial(&self, serial: &str) -> Result<SerialRecord, ServiceError> {
        let sql = format!("SELECT {} FROM serials WHERE serial = ?1", SERIAL_COLUMNS);
        let rows = with_retry(|| self.sql.query(&sql, &[Value::Text(serial.to_string())]))?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("serial '{}' not found", serial)))?;
        record_from_row(row)
    }

    /// Claim a serial for an owner: AVAILABLE → REGISTERED.
    ///
    /// Exactly one of N concurrent claims for the same serial succeeds;
    /// the rest observe a Conflict. A zero affected-row count is
    /// disambiguated into NotFound vs Conflict by a follow-up lookup.
    pub fn claim(
        &self,
        serial: &str,
        owner_id: &str,
        evidence: &str,
    ) -> Result<SerialRecord, ServiceError> {
        let now = now_rfc3339();
        let affected = with_retry(|| {
            self.sql.exec(
                "UPDATE serials
                 SET status = 'REGISTERED', owner_id = ?1, registered_at = ?2,
                     evidence = ?3, update_at = ?2
                 WHERE serial = ?4 AND status = 'AVAILABLE'",
                &[
                    Value::Text(owner_id.to_string()),
                    Value::Text(now.clone()),
                    Value::Text(evidence.to_string()),
                    Value::Text(serial.to_string()),
                ],
            )
        })?;

        if affected == 0 {
            // Lost the race or the serial never existed.
            return match self.lookup_by_serial(serial) {
                Ok(_) => Err(ServiceError::Conflict(format!(
                    "serial '{}' is already registered",
                    serial
                ))),
                Err(e) => Err(e),
            };
        }

        self.lookup_by_serial(serial)
    }

    /// Release a serial: REGISTERED → AVAILABLE, clearing owner,
    /// timestamp and evidence together.
    pub fn release(&self, serial: &str) -> Result<SerialRecord, ServiceError> {
        let now = now_rfc3339();
        let affected = with_retry(|| {
            self.sql.exec(
                "UPDATE serials
                 SET status = 'AVAILABLE', owner_id = NULL, registered_at = NULL,
                     evidence = NULL, update_at = ?1
                 WHERE serial = ?2 AND status = 'REGISTERED'",
                &[Value::Text(now.clone()), Value::Text(serial.to_string())],
            )
        })?;

        if affected == 0 {
            return match self.lookup_by_serial(serial) {
                Ok(_) => Err(ServiceError::Conflict(format!(
                    "serial '{}' is not currently registered",
                    serial
                ))),
                Err(e) => Err(e),
            };
        }

        self.lookup_by_serial(serial)
    }

    /// Per-product uploaded/assigned counts.
    pub fn counts_by_product(&self, product_id: &str) -> Result<SerialCounts, ServiceError> {
        let params = &[Value::Text(product_id.to_string())];

        let uploaded = with_retry(|| {
            self.sql.query(
                "SELECT COUNT(*) as cnt FROM serials WHERE product_id = ?1",
                params,
            )
        })?
        .first()
        .and_then(|r| r.get_i64("cnt"))
        .unwrap_or(0);

        let assigned = with_retry(|| {
            self.sql.query(
                "SELECT COUNT(*) as cnt FROM serials
                 WHERE product_id = ?1 AND status = 'REGISTERED'",
                params,
            )
        })?
        .first()
        .and_then(|r| r.get_i64("cnt"))
        .unwrap_or(0);

        Ok(SerialCounts { uploaded, assigned })
    }

    /// List serial records with optional filters and pagination.
    pub fn list_serials(
        &self,
        params: &ListParams,
        filters: &SerialFilters,
    ) -> Result<ListResult<SerialRecord>, ServiceError> {
        let limit = params.limit.min(500);

        let mut where_clauses = Vec::new();
        let mut bind = Vec::new();
        if let Some(ref p) = filters.product_id {
            bind.push(Value::Text(p.clone()));
            where_clauses.push(format!("product_id = ?{}", bind.len()));
        }
        if let Some(s) = filters.status {
            bind.push(Value::Text(s.as_str().to_string()));
            where_clauses.push(format!("status = ?{}", bind.len()));
        }
        if let Some(ref o) = filters.owner_id {
            bind.push(Value::Text(o.clone()));
            where_clauses.push(format!("owner_id = ?{}", bind.len()));
        }
        if let Some(ref q) = filters.search {
            // Serials are stored uppercased, so uppercasing the needle
            // makes LIKE effectively case-insensitive.
            bind.push(Value::Text(format!("%{}%", q.trim().to_uppercase())));
            where_clauses.push(format!("serial LIKE ?{}", bind.len()));
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM serials{}", where_sql);
        let total = with_retry(|| self.sql.query(&count_sql, &bind))?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        bind.push(Value::Integer(limit as i64));
        let limit_idx = bind.len();
        bind.push(Value::Integer(params.offset as i64));
        let offset_idx = bind.len();

        let sql = format!(
            "SELECT {} FROM serials{} ORDER BY create_at DESC, serial LIMIT ?{} OFFSET ?{}",
            SERIAL_COLUMNS, where_sql, limit_idx, offset_idx,
        );
        let rows = with_retry(|| self.sql.query(&sql, &bind))?;

        let mut items = Vec::new();
        for row in &rows {
            items.push(record_from_row(row)?);
        }
        Ok(ListResult { items, total })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::service::testutil::service;
    use portal_sql::{SQLStore, SqliteStore};

    #[test]
    fn insert_then_duplicate_is_conflict() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let err = svc.insert_available("SN-1", "p2").unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let (_dir, svc) = service();
        let err = svc.lookup_by_serial("NOPE").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn claim_release_roundtrip_preserves_invariants() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();

        let claimed = svc.claim("SN-1", "u1", "bills/u1.pdf").unwrap();
        assert_eq!(claimed.status, SerialStatus::Registered);
        assert_eq!(claimed.owner_id.as_deref(), Some("u1"));
        assert!(claimed.registered_at.is_some());
        assert_eq!(claimed.evidence.as_deref(), Some("bills/u1.pdf"));

        let released = svc.release("SN-1").unwrap();
        assert_eq!(released.status, SerialStatus::Available);
        assert!(released.owner_id.is_none());
        assert!(released.registered_at.is_none());
        assert!(released.evidence.is_none());

        // Claimable again by a different user.
        let again = svc.claim("SN-1", "u2", "bills/u2.pdf").unwrap();
        assert_eq!(again.owner_id.as_deref(), Some("u2"));
    }

    #[test]
    fn second_claim_is_conflict_not_server_error() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        svc.claim("SN-1", "u1", "bills/a.pdf").unwrap();
        let err = svc.claim("SN-1", "u2", "bills/b.pdf").unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn concurrent_claims_admit_exactly_one_winner() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || {
                    svc.claim("SN-1", &format!("u{}", i), "bills/x.pdf").is_ok()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        let record = svc.lookup_by_serial("SN-1").unwrap();
        assert_eq!(record.status, SerialStatus::Registered);
        assert!(record.owner_id.is_some());
    }

    #[test]
    fn claim_unknown_serial_is_not_found() {
        let (_dir, svc) = service();
        let err = svc.claim("GHOST", "u1", "bills/a.pdf").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn release_of_available_serial_is_conflict() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let err = svc.release("SN-1").unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn counts_track_claims() {
        let (_dir, svc) = service();
        svc.insert_available("A1", "p1").unwrap();
        svc.insert_available("A2", "p1").unwrap();
        svc.insert_available("B1", "p2").unwrap();
        svc.claim("A1", "u1", "bills/a.pdf").unwrap();

        let counts = svc.counts_by_product("p1").unwrap();
        assert_eq!(counts, SerialCounts { uploaded: 2, assigned: 1 });
        let other = svc.counts_by_product("p2").unwrap();
        assert_eq!(other, SerialCounts { uploaded: 1, assigned: 0 });
    }

    #[test]
    fn list_serials_filters_by_status_and_owner() {
        let (_dir, svc) = service();
        svc.insert_available("A1", "p1").unwrap();
        svc.insert_available("A2", "p1").unwrap();
        svc.claim("A2", "u1", "bills/a.pdf").unwrap();

        let registered = svc
            .list_serials(
                &ListParams::default(),
                &SerialFilters {
                    status: Some(SerialStatus::Registered),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(registered.total, 1);
        assert_eq!(registered.items[0].serial, "A2");

        let mine = svc
            .list_serials(
                &ListParams::default(),
                &SerialFilters {
                    owner_id: Some("u1".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(mine.total, 1);
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let (_dir, svc) = service();
        svc.insert_available("ABC-100", "p1").unwrap();
        svc.insert_available("ABC-200", "p1").unwrap();
        svc.insert_available("XYZ-100", "p1").unwrap();

        let hits = svc
            .list_serials(
                &ListParams::default(),
                &SerialFilters {
                    search: Some("abc".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(hits.total, 2);

        let exact = svc
            .list_serials(
                &ListParams::default(),
                &SerialFilters {
                    search: Some("-100".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(exact.total, 2);
    }

    /// A store that reports Busy for the first `failures` exec calls,
    /// then delegates to a real in-memory store.
    struct FlakyStore {
        inner: SqliteStore,
        failures: AtomicU32,
    }

    impl SQLStore for FlakyStore {
        fn query(
            &self,
            sql: &str,
            params: &[Value],
        ) -> Result<Vec<portal_sql::Row>, portal_sql::SQLError> {
            self.inner.query(sql, params)
        }

        fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, portal_sql::SQLError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(portal_sql::SQLError::Busy("database is locked".into()));
            }
            self.inner.exec(sql, params)
        }
    }

    fn flaky_service(failures: u32) -> (tempfile::TempDir, super::super::WarrantyService) {
        use crate::directory::AllowAll;
        use crate::service::{WarrantyConfig, WarrantyService};
        use portal_blob::FileStore;

        let dir = tempfile::tempdir().unwrap();
        let inner = SqliteStore::open_in_memory().unwrap();
        let store = Arc::new(FlakyStore { inner, failures: AtomicU32::new(0) });
        let sql: Arc<dyn SQLStore> = store.clone();
        let blob: Arc<dyn portal_blob::BlobStore> =
            Arc::new(FileStore::open(dir.path()).unwrap());
        let svc =
            WarrantyService::new(sql, blob, Arc::new(AllowAll), WarrantyConfig::default())
                .unwrap();
        // Arm the failure counter only after schema init and fixtures.
        svc.insert_available("SN-1", "p1").unwrap();
        store.failures.store(failures, Ordering::SeqCst);
        (dir, svc)
    }

    #[test]
    fn transient_contention_is_retried() {
        let (_dir, svc) = flaky_service(2);
        // Two Busy responses, third attempt lands.
        let claimed = svc.claim("SN-1", "u1", "bills/a.pdf").unwrap();
        assert_eq!(claimed.owner_id.as_deref(), Some("u1"));
    }

    #[test]
    fn exhausted_retries_surface_unavailable() {
        let (_dir, svc) = flaky_service(10);
        let err = svc.claim("SN-1", "u1", "bills/a.pdf").unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
