//! Bearer-token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it through the
//! accounts service, and stores the resulting Identity in request
//! extensions for downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use portal_accounts::service::AccountsService;
use portal_core::ServiceError;

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Arc<AccountsService>,
}

/// Endpoints reachable without a token.
fn is_public_path(path: &str) -> bool {
    matches!(path, "/health" | "/version")
        || path == "/accounts/v1/login"
        || path == "/accounts/v1/signup"
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let path = request.uri().path();
    if is_public_path(path) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization token".into()))?;

    let identity = state.accounts.resolve_token(token)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/accounts/v1/login"));
        assert!(is_public_path("/accounts/v1/signup"));
        assert!(!is_public_path("/accounts/v1/me"));
        assert!(!is_public_path("/warranty/v1/registrations"));
    }
}
