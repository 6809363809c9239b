pub mod api;
pub mod directory;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use portal_core::Module;

use service::WarrantyService;

/// Warranty module — serial ledger, product registration and inventory.
pub struct WarrantyModule {
    service: Arc<WarrantyService>,
}

impl WarrantyModule {
    pub fn new(service: WarrantyService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// The underlying service, for wiring at startup.
    pub fn service(&self) -> Arc<WarrantyService> {
        self.service.clone()
    }
}

impl Module for WarrantyModule {
    fn name(&self) -> &str {
        "warranty"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
