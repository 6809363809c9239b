pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use portal_core::Module;

use service::AccountsService;

/// Accounts module — signup, login and account administration.
pub struct AccountsModule {
    service: Arc<AccountsService>,
}

impl AccountsModule {
    pub fn new(service: AccountsService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// The underlying service, for wiring at startup.
    pub fn service(&self) -> Arc<AccountsService> {
        self.service.clone()
    }
}

impl Module for AccountsModule {
    fn name(&self) -> &str {
        "accounts"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
