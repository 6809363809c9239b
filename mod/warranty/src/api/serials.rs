use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum::Extension;
use serde::Deserialize;

use portal_core::{Identity, ListParams, ListResult, ServiceError};

use crate::model::{SerialRecord, SerialStatus, normalize_serial};
use crate::service::import::{SerialImportReport, parse_serial_csv};
use crate::service::ledger::SerialFilters;
use crate::service::registration::EvidenceUpload;
use super::{AppState, require_admin};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/serials", get(list_serials))
        .route("/serials/@import", post(import_serials))
        .route("/serials/{serial}", get(get_serial))
        .route("/serials/{serial}/@disassociate", post(disassociate))
        .route("/serials/{serial}/bill", get(download_bill))
        .route("/registrations", get(my_registrations))
        .route("/registrations/@register", post(register))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerialListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    product_id: Option<String>,
    status: Option<String>,
    owner_id: Option<String>,
    search: Option<String>,
}

async fn list_serials(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(q): Query<SerialListQuery>,
) -> Result<Json<ListResult<SerialRecord>>, ServiceError> {
    require_admin(&identity)?;
    let status = match q.status.as_deref() {
        Some(raw) => Some(
            SerialStatus::parse(raw)
                .ok_or_else(|| ServiceError::Validation(format!("unknown status '{}'", raw)))?,
        ),
        None => None,
    };
    let mut params = ListParams::default();
    if let Some(limit) = q.limit {
        params.limit = limit;
    }
    params.offset = q.offset.unwrap_or(0);

    let result = svc.list_serials(
        &params,
        &SerialFilters {
            product_id: q.product_id,
            status,
            owner_id: q.owner_id,
            search: q.search,
        },
    )?;
    Ok(Json(result))
}

async fn get_serial(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(serial): Path<String>,
) -> Result<Json<SerialRecord>, ServiceError> {
    require_admin(&identity)?;
    let serial = normalize_serial(&serial)
        .ok_or_else(|| ServiceError::Validation("invalid serial number".into()))?;
    Ok(Json(svc.lookup_by_serial(&serial)?))
}

async fn disassociate(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(serial): Path<String>,
) -> Result<Json<SerialRecord>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.disassociate_serial(&identity.user_id, &serial)?))
}

async fn my_registrations(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(q): Query<SerialListQuery>,
) -> Result<Json<ListResult<SerialRecord>>, ServiceError> {
    let mut params = ListParams::default();
    if let Some(limit) = q.limit {
        params.limit = limit;
    }
    params.offset = q.offset.unwrap_or(0);
    Ok(Json(
        svc.list_registrations_for_owner(&identity.user_id, &params)?,
    ))
}

/// Multipart form: `serial` text field plus a `bill` file field.
async fn register(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<SerialRecord>, ServiceError> {
    let mut serial = None;
    let mut evidence = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("malformed upload: {}", e)))?
    {
        match field.name() {
            Some("serial") => {
                serial = Some(field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("malformed serial field: {}", e))
                })?);
            }
            Some("bill") => {
                let filename = field.file_name().unwrap_or("bill").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::Validation(format!("malformed bill upload: {}", e))
                })?;
                evidence = Some(EvidenceUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let serial =
        serial.ok_or_else(|| ServiceError::Validation("missing serial field".into()))?;
    let evidence =
        evidence.ok_or_else(|| ServiceError::Validation("missing bill file".into()))?;

    Ok(Json(svc.register_serial(
        &identity.user_id,
        &serial,
        evidence,
    )?))
}

/// Multipart form: `productId` text field plus a CSV `file` field.
async fn import_serials(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<SerialImportReport>, ServiceError> {
    require_admin(&identity)?;

    let mut product_id = None;
    let mut csv_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("malformed upload: {}", e)))?
    {
        match field.name() {
            Some("productId") => {
                product_id = Some(field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("malformed productId field: {}", e))
                })?);
            }
            Some("file") => {
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::Validation(format!("malformed CSV upload: {}", e))
                })?;
                csv_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let product_id =
        product_id.ok_or_else(|| ServiceError::Validation("missing productId field".into()))?;
    let csv_bytes =
        csv_bytes.ok_or_else(|| ServiceError::Validation("missing CSV file".into()))?;

    let serials = parse_serial_csv(&csv_bytes)?;
    Ok(Json(svc.import_serials(
        &identity.user_id,
        &product_id,
        serials,
    )?))
}

/// Stream the stored bill back. Owners see their own bills; admins any.
async fn download_bill(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(serial): Path<String>,
) -> Result<Response, ServiceError> {
    let serial = normalize_serial(&serial)
        .ok_or_else(|| ServiceError::Validation("invalid serial number".into()))?;
    let record = svc.lookup_by_serial(&serial)?;
    let owns_it = record.owner_id.as_deref() == Some(identity.user_id.as_str());
    if !identity.is_admin() && !owns_it {
        return Err(ServiceError::PermissionDenied(
            "not your registration".into(),
        ));
    }

    let (key, bytes) = svc.evidence_for_serial(&serial)?;
    let content_type = match key.rsplit_once('.').map(|(_, e)| e) {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from(bytes),
    )
        .into_response())
}
