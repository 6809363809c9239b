use axum::{
    Extension, Router,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use portal_core::{Identity, ServiceError};

use super::{AppState, require_admin};

pub fn routes() -> Router<AppState> {
    Router::new().route("/registrations/@export", get(export_csv))
}

async fn export_csv(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, ServiceError> {
    require_admin(&identity)?;
    let csv_bytes = svc.export_registrations_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"registrations.csv\"",
            ),
        ],
        Body::from(csv_bytes),
    )
        .into_response())
}
