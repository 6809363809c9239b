use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use portal_core::{Identity, ListParams, ListResult, ServiceError};

use crate::model::AuditEntry;
use super::{AppState, require_admin};

pub fn routes() -> Router<AppState> {
    Router::new().route("/audit", get(list_audit))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    target_type: Option<String>,
    target_id: Option<String>,
}

async fn list_audit(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(q): Query<AuditQuery>,
) -> Result<Json<ListResult<AuditEntry>>, ServiceError> {
    require_admin(&identity)?;
    let mut params = ListParams::default();
    if let Some(limit) = q.limit {
        params.limit = limit;
    }
    params.offset = q.offset.unwrap_or(0);
    Ok(Json(svc.list_audit_entries(
        &params,
        q.target_type.as_deref(),
        q.target_id.as_deref(),
    )?))
}
