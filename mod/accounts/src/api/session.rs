use axum::{Extension, Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use portal_core::{Identity, ServiceError};

use crate::model::{CreateUser, User};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", axum::routing::get(me))
}

async fn signup(
    State(svc): State<AppState>,
    Json(body): Json<CreateUser>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(svc.create_user(body)?))
}

#[derive(Deserialize)]
struct LoginBody {
    mobile: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user: User,
}

async fn login(
    State(svc): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let outcome = svc.login(&body.mobile, &body.password)?;
    Ok(Json(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    }))
}

async fn logout(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.logout(&identity.user_id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn me(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(svc.get_user(&identity.user_id)?))
}
