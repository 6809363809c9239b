pub mod session;
pub mod users;

use std::sync::Arc;

use axum::Router;

use portal_core::{Identity, ServiceError};

use crate::service::AccountsService;

/// Shared application state.
pub type AppState = Arc<AccountsService>;

/// Build the accounts API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/accounts/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(session::routes())
        .merge(users::routes())
}

pub(crate) fn require_admin(identity: &Identity) -> Result<(), ServiceError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "administrator access required".into(),
        ))
    }
}
