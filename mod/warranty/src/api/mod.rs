pub mod audit;
pub mod export;
pub mod products;
pub mod serials;

use std::sync::Arc;

use axum::Router;

use portal_core::{Identity, ServiceError};

use crate::service::WarrantyService;

/// Shared application state.
pub type AppState = Arc<WarrantyService>;

/// Build the warranty API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/warranty/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(serials::routes())
        .merge(products::routes())
        .merge(audit::routes())
        .merge(export::routes())
}

/// Admin gate for handlers. The identity comes from the auth middleware.
pub(crate) fn require_admin(identity: &Identity) -> Result<(), ServiceError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "administrator access required".into(),
        ))
    }
}
