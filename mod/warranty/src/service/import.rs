//! Bulk serial import — reconciles an uploaded batch against the ledger.
//!
//! The batch is normalized and deduplicated in memory, checked against the
//! ledger in chunked IN-list queries, then inserted in chunked multi-row
//! statements. Each insert chunk is atomic; if one fails mid-batch the
//! chunk is replayed row by row so a single bad serial cannot sink its
//! neighbours. Re-importing the same file is a no-op reported as
//! duplicates, never an error.

use std::collections::HashSet;

use portal_core::{ServiceError, new_id, now_rfc3339};
use portal_sql::Value;
use serde::Serialize;
use serde_json::json;

use crate::model::{action, normalize_serial};
use super::WarrantyService;
use super::ledger::with_retry;

/// Parameter budget for the existence pre-check.
const EXISTS_CHUNK: usize = 200;
/// Rows per multi-row INSERT.
const INSERT_CHUNK: usize = 100;
/// Upper bound on a single batch.
pub const MAX_IMPORT_ROWS: usize = 50_000;

/// A row the import could not accept.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRejection {
    /// The raw input, as submitted.
    pub input: String,
    pub reason: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialImportReport {
    pub added_count: usize,
    /// Serials already present, in the ledger or earlier in the batch.
    pub duplicates: Vec<String>,
    pub errors: Vec<ImportRejection>,
}

/// Extract serial numbers from an uploaded CSV. Accepts either a bare
/// one-column file or a file with a header row containing a `serial`
/// column.
pub fn parse_serial_csv(bytes: &[u8]) -> Result<Vec<String>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut column = 0;
    let mut out = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| ServiceError::Validation(format!("malformed CSV: {}", e)))?;
        if i == 0 {
            // Header detection: a cell literally named "serial" picks the column.
            if let Some(idx) = record
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case("serial"))
            {
                column = idx;
                continue;
            }
        }
        if let Some(cell) = record.get(column) {
            if !cell.trim().is_empty() {
                out.push(cell.to_string());
            }
        }
    }
    Ok(out)
}

impl WarrantyService {
    /// Import a batch of serials for a product. Partial success is the
    /// normal outcome; the report says exactly what happened to each row.
    pub fn import_serials(
        &self,
        actor: &str,
        product_id: &str,
        raw_serials: Vec<String>,
    ) -> Result<SerialImportReport, ServiceError> {
        if raw_serials.len() > MAX_IMPORT_ROWS {
            return Err(ServiceError::Validation(format!(
                "import batch exceeds {} rows",
                MAX_IMPORT_ROWS
            )));
        }
        // The product must exist before serials can hang off it.
        self.get_product(product_id)?;

        let mut report = SerialImportReport {
            added_count: 0,
            duplicates: Vec::new(),
            errors: Vec::new(),
        };

        // Normalize and collapse within-batch repeats.
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for raw in raw_serials {
            match normalize_serial(&raw) {
                Some(serial) => {
                    if seen.insert(serial.clone()) {
                        candidates.push(serial);
                    } else {
                        report.duplicates.push(serial);
                    }
                }
                None => report.errors.push(ImportRejection {
                    input: raw,
                    reason: "invalid serial number".into(),
                }),
            }
        }

        // Pre-check against the ledger so the common duplicate case never
        // reaches the insert path.
        let mut fresh = Vec::new();
        for chunk in candidates.chunks(EXISTS_CHUNK) {
            let existing = self.existing_serials(chunk)?;
            for serial in chunk {
                if existing.contains(serial) {
                    report.duplicates.push(serial.clone());
                } else {
                    fresh.push(serial.clone());
                }
            }
        }

        for chunk in fresh.chunks(INSERT_CHUNK) {
            match self.insert_chunk(chunk, product_id) {
                Ok(()) => report.added_count += chunk.len(),
                // A chunk can fail if a concurrent import landed one of its
                // serials first. Replay row by row to salvage the rest.
                Err(_) => {
                    for serial in chunk {
                        match self.insert_available(serial, product_id) {
                            Ok(_) => report.added_count += 1,
                            Err(ServiceError::Conflict(_)) => {
                                report.duplicates.push(serial.clone())
                            }
                            Err(e) => report.errors.push(ImportRejection {
                                input: serial.clone(),
                                reason: e.to_string(),
                            }),
                        }
                    }
                }
            }
        }

        self.audit.record(
            actor,
            action::IMPORT_SERIALS,
            "product",
            product_id,
            json!({
                "added": report.added_count,
                "duplicates": report.duplicates.len(),
                "errors": report.errors.len(),
            }),
        );
        Ok(report)
    }

    fn existing_serials(&self, serials: &[String]) -> Result<HashSet<String>, ServiceError> {
        let placeholders: Vec<String> =
            (1..=serials.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT serial FROM serials WHERE serial IN ({})",
            placeholders.join(", ")
        );
        let params: Vec<Value> = serials.iter().map(|s| Value::Text(s.clone())).collect();
        let rows = with_retry(|| self.sql.query(&sql, &params))?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("serial").map(String::from))
            .collect())
    }

    /// One atomic multi-row insert.
    fn insert_chunk(&self, serials: &[String], product_id: &str) -> Result<(), ServiceError> {
        let now = now_rfc3339();
        let mut values = Vec::new();
        let mut params = Vec::new();
        for serial in serials {
            let base = params.len();
            params.push(Value::Text(new_id()));
            params.push(Value::Text(serial.clone()));
            params.push(Value::Text(product_id.to_string()));
            params.push(Value::Text(now.clone()));
            values.push(format!(
                "(?{}, ?{}, ?{}, 'AVAILABLE', ?{}, ?{})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 4,
            ));
        }
        let sql = format!(
            "INSERT INTO serials (id, serial, product_id, status, create_at, update_at) VALUES {}",
            values.join(", ")
        );
        with_retry(|| self.sql.exec(&sql, &params)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::service;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn import_reports_each_outcome() {
        let (_dir, svc) = service();
        let p = svc.create_product("admin", "Router X", "").unwrap();
        svc.insert_available("SN-OLD", &p.id).unwrap();

        let report = svc
            .import_serials(
                "admin",
                &p.id,
                strings(&["sn-new", "SN-OLD", "sn-new", "", "SN-2"]),
            )
            .unwrap();

        assert_eq!(report.added_count, 2); // SN-NEW, SN-2
        assert_eq!(report.duplicates, vec!["SN-NEW".to_string(), "SN-OLD".to_string()]);
        assert_eq!(report.errors.len(), 1); // the empty row
    }

    #[test]
    fn reimport_is_idempotent() {
        let (_dir, svc) = service();
        let p = svc.create_product("admin", "Router X", "").unwrap();
        let batch = strings(&["A1", "A2", "A3"]);

        let first = svc.import_serials("admin", &p.id, batch.clone()).unwrap();
        assert_eq!(first.added_count, 3);

        let second = svc.import_serials("admin", &p.id, batch).unwrap();
        assert_eq!(second.added_count, 0);
        assert_eq!(second.duplicates.len(), 3);
        assert!(second.errors.is_empty());

        let counts = svc.counts_by_product(&p.id).unwrap();
        assert_eq!(counts.uploaded, 3);
    }

    #[test]
    fn duplicate_across_products_is_rejected() {
        let (_dir, svc) = service();
        let p1 = svc.create_product("admin", "Router X", "").unwrap();
        let p2 = svc.create_product("admin", "Router Y", "").unwrap();
        svc.import_serials("admin", &p1.id, strings(&["SHARED"])).unwrap();

        let report = svc
            .import_serials("admin", &p2.id, strings(&["shared"]))
            .unwrap();
        assert_eq!(report.added_count, 0);
        assert_eq!(report.duplicates, vec!["SHARED".to_string()]);
    }

    #[test]
    fn unknown_product_is_not_found() {
        let (_dir, svc) = service();
        let err = svc
            .import_serials("admin", "ghost", strings(&["A1"]))
            .unwrap_err();
        assert!(matches!(err, portal_core::ServiceError::NotFound(_)));
    }

    #[test]
    fn empty_batch_is_a_valid_empty_result() {
        let (_dir, svc) = service();
        let p = svc.create_product("admin", "Router X", "").unwrap();
        let report = svc.import_serials("admin", &p.id, Vec::new()).unwrap();
        assert_eq!(report.added_count, 0);
        assert!(report.duplicates.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn large_batch_spans_chunks() {
        let (_dir, svc) = service();
        let p = svc.create_product("admin", "Router X", "").unwrap();
        let batch: Vec<String> = (0..350).map(|i| format!("SN-{:05}", i)).collect();
        let report = svc.import_serials("admin", &p.id, batch).unwrap();
        assert_eq!(report.added_count, 350);
        assert_eq!(svc.counts_by_product(&p.id).unwrap().uploaded, 350);
    }

    #[test]
    fn csv_with_header_row() {
        let data = b"serial,model\nSN-1,X\nSN-2,X\n";
        let serials = parse_serial_csv(data).unwrap();
        assert_eq!(serials, vec!["SN-1".to_string(), "SN-2".to_string()]);
    }

    #[test]
    fn csv_without_header_row() {
        let data = b"SN-1\nSN-2\n\nSN-3\n";
        let serials = parse_serial_csv(data).unwrap();
        assert_eq!(
            serials,
            vec!["SN-1".to_string(), "SN-2".to_string(), "SN-3".to_string()]
        );
    }
}
