//! Registration engine — the customer-facing claim and the admin-facing
//! disassociation, with bill evidence handled evidence-first.
//!
//! The bill is written to the blob store before the ledger claim, so a
//! registered serial always has its evidence on disk. If the claim then
//! fails, the just-written blob is deleted again (compensation); a failed
//! compensation is only logged, it does not change the caller's outcome.

use portal_core::{ListParams, ListResult, ServiceError, new_id};
use serde_json::json;

use crate::model::{SerialRecord, SerialStatus, action, normalize_serial};
use super::WarrantyService;
use super::ledger::SerialFilters;

/// Bill file accepted as proof of purchase.
const ALLOWED_EVIDENCE_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Maximum accepted bill size, 10 MiB.
pub const MAX_EVIDENCE_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded bill, as received from the transport layer.
pub struct EvidenceUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

fn evidence_extension(filename: &str) -> Result<&str, ServiceError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e)
        .unwrap_or("")
        .to_ascii_lowercase();
    ALLOWED_EVIDENCE_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "unsupported bill file type '{}', expected one of: {}",
                ext,
                ALLOWED_EVIDENCE_EXTENSIONS.join(", ")
            ))
        })
}

impl WarrantyService {
    /// Register a serial to a user, attaching the uploaded bill.
    ///
    /// At most one registration per serial: concurrent attempts race on a
    /// single conditional update in the ledger and all but one observe a
    /// Conflict.
    pub fn register_serial(
        &self,
        user_id: &str,
        raw_serial: &str,
        evidence: EvidenceUpload,
    ) -> Result<SerialRecord, ServiceError> {
        let serial = normalize_serial(raw_serial)
            .ok_or_else(|| ServiceError::Validation("invalid serial number".into()))?;

        if !self.directory.is_eligible_to_register(user_id)? {
            return Err(ServiceError::PermissionDenied(
                "account is not permitted to register products".into(),
            ));
        }

        if evidence.bytes.is_empty() {
            return Err(ServiceError::Validation("bill file is empty".into()));
        }
        if evidence.bytes.len() > MAX_EVIDENCE_BYTES {
            return Err(ServiceError::Validation("bill file is too large".into()));
        }
        let ext = evidence_extension(&evidence.filename)?;

        let key = format!(
            "bills/{}_{}_{}.{}",
            user_id,
            chrono::Utc::now().timestamp_millis(),
            &new_id()[..8],
            ext,
        );
        self.blob
            .put(&key, &evidence.bytes)
            .map_err(|e| ServiceError::Storage(format!("storing bill failed: {}", e)))?;

        let record = match self.claim(&serial, user_id, &key) {
            Ok(record) => record,
            Err(e) => {
                // The claim did not go through; take the orphan blob back out.
                if let Err(del) = self.blob.delete(&key) {
                    tracing::warn!(key, error = %del, "failed to remove unclaimed bill");
                }
                return Err(e);
            }
        };

        self.audit.record(
            user_id,
            action::REGISTER_SERIAL,
            "serial",
            &serial,
            json!({ "productId": record.product_id, "evidence": key }),
        );
        Ok(record)
    }

    /// Disassociate a registered serial (admin operation). The serial
    /// returns to AVAILABLE; the bill file is retained unless configured
    /// otherwise.
    pub fn disassociate_serial(
        &self,
        actor: &str,
        raw_serial: &str,
    ) -> Result<SerialRecord, ServiceError> {
        let serial = normalize_serial(raw_serial)
            .ok_or_else(|| ServiceError::Validation("invalid serial number".into()))?;

        // Capture the evidence reference before release clears it.
        let before = self.lookup_by_serial(&serial)?;
        let record = self.release(&serial)?;

        if self.config.delete_evidence_on_release {
            if let Some(key) = before.evidence.as_deref() {
                if let Err(e) = self.blob.delete(key) {
                    tracing::warn!(key, error = %e, "failed to remove released bill");
                }
            }
        }

        self.audit.record(
            actor,
            action::DISASSOCIATE_SERIAL,
            "serial",
            &serial,
            json!({
                "previousOwner": before.owner_id,
                "evidenceDeleted": self.config.delete_evidence_on_release,
            }),
        );
        Ok(record)
    }

    /// Registrations owned by the given user, newest first.
    pub fn list_registrations_for_owner(
        &self,
        owner_id: &str,
        params: &ListParams,
    ) -> Result<ListResult<SerialRecord>, ServiceError> {
        self.list_serials(
            params,
            &SerialFilters {
                owner_id: Some(owner_id.to_string()),
                status: Some(SerialStatus::Registered),
                ..Default::default()
            },
        )
    }

    /// Fetch the stored bill for a serial. Callers enforce access control.
    pub fn evidence_for_serial(&self, raw_serial: &str) -> Result<(String, Vec<u8>), ServiceError> {
        let serial = normalize_serial(raw_serial)
            .ok_or_else(|| ServiceError::Validation("invalid serial number".into()))?;
        let record = self.lookup_by_serial(&serial)?;
        let key = record
            .evidence
            .ok_or_else(|| ServiceError::NotFound("no bill on file for this serial".into()))?;
        let bytes = self
            .blob
            .get(&key)
            .map_err(|e| ServiceError::Storage(format!("reading bill failed: {}", e)))?
            .ok_or_else(|| ServiceError::NotFound("bill file is missing".into()))?;
        Ok((key, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserDirectory;
    use crate::service::testutil::{service, service_with_directory};
    use std::sync::Arc;

    fn bill() -> EvidenceUpload {
        EvidenceUpload {
            filename: "invoice.pdf".into(),
            bytes: b"%PDF-1.4 test".to_vec(),
        }
    }

    #[test]
    fn register_stores_bill_and_claims() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();

        let record = svc.register_serial("u1", " sn-1 ", bill()).unwrap();
        assert_eq!(record.serial, "SN-1");
        assert_eq!(record.owner_id.as_deref(), Some("u1"));

        let key = record.evidence.unwrap();
        assert!(svc.blob.exists(&key).unwrap());

        let (_, bytes) = svc.evidence_for_serial("SN-1").unwrap();
        assert_eq!(bytes, b"%PDF-1.4 test");
    }

    #[test]
    fn failed_claim_leaves_no_orphan_bill() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        svc.register_serial("u1", "SN-1", bill()).unwrap();

        let err = svc.register_serial("u2", "SN-1", bill()).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Only the winner's bill remains on disk.
        let record = svc.lookup_by_serial("SN-1").unwrap();
        assert_eq!(record.owner_id.as_deref(), Some("u1"));
        let bills = svc
            .list_serials(&ListParams::default(), &SerialFilters::default())
            .unwrap()
            .items
            .into_iter()
            .filter_map(|r| r.evidence)
            .count();
        assert_eq!(bills, 1);
    }

    #[test]
    fn concurrent_registrations_leave_one_winner_and_one_bill() {
        use std::thread;

        let (dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || {
                    svc.register_serial(&format!("u{}", i), "SN-1", bill()).is_ok()
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

        // Losers compensate their blob writes; one bill file remains.
        let bills = std::fs::read_dir(dir.path().join("bills")).unwrap().count();
        assert_eq!(bills, 1);
    }

    #[test]
    fn audit_failure_does_not_block_registration() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        svc.sql.exec("DROP TABLE audit_log", &[]).unwrap();

        let record = svc.register_serial("u1", "SN-1", bill()).unwrap();
        assert_eq!(record.status, SerialStatus::Registered);
        assert_eq!(
            svc.lookup_by_serial("SN-1").unwrap().owner_id.as_deref(),
            Some("u1")
        );
    }

    #[test]
    fn unknown_serial_register_is_not_found() {
        let (_dir, svc) = service();
        let err = svc.register_serial("u1", "GHOST", bill()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn ineligible_user_is_denied_before_any_write() {
        struct DenyAll;
        impl UserDirectory for DenyAll {
            fn is_eligible_to_register(&self, _: &str) -> Result<bool, ServiceError> {
                Ok(false)
            }
            fn contact_info(
                &self,
                _: &str,
            ) -> Result<Option<crate::directory::OwnerContact>, ServiceError> {
                Ok(None)
            }
        }

        let (_dir, svc) = service_with_directory(Arc::new(DenyAll));
        svc.insert_available("SN-1", "p1").unwrap();
        let err = svc.register_serial("u1", "SN-1", bill()).unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
        assert_eq!(
            svc.lookup_by_serial("SN-1").unwrap().status,
            SerialStatus::Available
        );
    }

    #[test]
    fn rejects_unsupported_bill_type() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let err = svc
            .register_serial(
                "u1",
                "SN-1",
                EvidenceUpload {
                    filename: "bill.exe".into(),
                    bytes: vec![1, 2, 3],
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn disassociate_retains_bill_by_default() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        let record = svc.register_serial("u1", "SN-1", bill()).unwrap();
        let key = record.evidence.unwrap();

        let released = svc.disassociate_serial("admin", "SN-1").unwrap();
        assert_eq!(released.status, SerialStatus::Available);
        assert!(released.evidence.is_none());
        // Retention default: the file stays for audit continuity.
        assert!(svc.blob.exists(&key).unwrap());
    }

    #[test]
    fn disassociate_can_delete_bill_when_configured() {
        use crate::directory::AllowAll;
        use crate::service::{WarrantyConfig, WarrantyService};
        use portal_blob::{BlobStore, FileStore};
        use portal_sql::{SQLStore, SqliteStore};

        let dir = tempfile::tempdir().unwrap();
        let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let blob: Arc<dyn BlobStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let svc = WarrantyService::new(
            sql,
            blob,
            Arc::new(AllowAll),
            WarrantyConfig {
                delete_evidence_on_release: true,
            },
        )
        .unwrap();

        svc.insert_available("SN-1", "p1").unwrap();
        let record = svc.register_serial("u1", "SN-1", bill()).unwrap();
        let key = record.evidence.unwrap();
        svc.disassociate_serial("admin", "SN-1").unwrap();
        assert!(!svc.blob.exists(&key).unwrap());
    }

    #[test]
    fn list_registrations_scopes_to_owner() {
        let (_dir, svc) = service();
        svc.insert_available("SN-1", "p1").unwrap();
        svc.insert_available("SN-2", "p1").unwrap();
        svc.register_serial("u1", "SN-1", bill()).unwrap();
        svc.register_serial("u2", "SN-2", bill()).unwrap();

        let mine = svc
            .list_registrations_for_owner("u1", &ListParams::default())
            .unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.items[0].serial, "SN-1");
    }
}
