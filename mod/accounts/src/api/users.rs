use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use portal_core::{Identity, ListParams, ListResult, ServiceError};

use crate::model::User;
use super::{AppState, require_admin};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).put(update_user))
}

#[derive(Deserialize)]
struct UserListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_users(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(q): Query<UserListQuery>,
) -> Result<Json<ListResult<User>>, ServiceError> {
    require_admin(&identity)?;
    let mut params = ListParams::default();
    if let Some(limit) = q.limit {
        params.limit = limit;
    }
    params.offset = q.offset.unwrap_or(0);
    Ok(Json(svc.list_users(&params)?))
}

async fn get_user(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    if !identity.is_admin() && identity.user_id != id {
        return Err(ServiceError::PermissionDenied("not your account".into()));
    }
    Ok(Json(svc.get_user(&id)?))
}

#[derive(Deserialize)]
struct UpdateUserBody {
    company: Option<String>,
    gst: Option<String>,
    /// Admin only.
    active: Option<bool>,
}

async fn update_user(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<User>, ServiceError> {
    if !identity.is_admin() && identity.user_id != id {
        return Err(ServiceError::PermissionDenied("not your account".into()));
    }
    if body.active.is_some() {
        require_admin(&identity)?;
    }

    let mut user = svc.update_user_profile(&id, body.company.as_deref(), body.gst.as_deref())?;
    if let Some(active) = body.active {
        user = svc.set_user_active(&id, active)?;
    }
    Ok(Json(user))
}
