pub mod audit;
pub mod export;
pub mod import;
pub mod inventory;
pub mod ledger;
pub mod product;
pub mod registration;
pub mod schema;

use std::sync::Arc;

use portal_blob::BlobStore;
use portal_core::ServiceError;
use portal_sql::SQLStore;

use crate::directory::UserDirectory;
use audit::AuditSink;

/// Policy knobs for the warranty module.
#[derive(Debug, Clone)]
pub struct WarrantyConfig {
    /// Whether a disassociated serial's bill file is deleted. The default
    /// retains it for audit continuity.
    pub delete_evidence_on_release: bool,
}

impl Default for WarrantyConfig {
    fn default() -> Self {
        Self {
            delete_evidence_on_release: false,
        }
    }
}

/// Warranty service — the serial ledger, registration engine, bulk import
/// reconciler and inventory reads, plus the product catalog they hang off.
///
/// All operations are synchronous and safe to call from many request
/// workers concurrently; claim/release correctness comes from conditional
/// updates in the storage layer, not from in-process locking.
pub struct WarrantyService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) blob: Arc<dyn BlobStore>,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) audit: AuditSink,
    pub(crate) config: WarrantyConfig,
}

impl WarrantyService {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        directory: Arc<dyn UserDirectory>,
        config: WarrantyConfig,
    ) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        let audit = AuditSink::new(Arc::clone(&sql));
        Ok(Self {
            sql,
            blob,
            directory,
            audit,
            config,
        })
    }

    /// The audit sink, for reuse by other components of the same deployment.
    pub fn audit_sink(&self) -> &AuditSink {
        &self.audit
    }
}
