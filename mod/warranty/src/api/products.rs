use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use portal_core::{Identity, ListParams, ListResult, ServiceError};

use crate::model::Product;
use crate::service::inventory::{InventorySummary, ProductInventory};
use super::{AppState, require_admin};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/inventory", get(product_inventory))
        .route("/inventory", get(inventory))
        .route("/inventory/summary", get(inventory_summary))
}

#[derive(Deserialize)]
struct ProductListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    all: Option<bool>,
}

async fn list_products(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(q): Query<ProductListQuery>,
) -> Result<Json<ListResult<Product>>, ServiceError> {
    // Customers only see active products; admins may ask for everything.
    let active_only = !(identity.is_admin() && q.all.unwrap_or(false));
    let mut params = ListParams::default();
    if let Some(limit) = q.limit {
        params.limit = limit;
    }
    params.offset = q.offset.unwrap_or(0);
    Ok(Json(svc.list_products(&params, active_only)?))
}

#[derive(Deserialize)]
struct CreateProductBody {
    name: String,
    #[serde(default)]
    description: String,
}

async fn create_product(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateProductBody>,
) -> Result<Json<Product>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.create_product(
        &identity.user_id,
        &body.name,
        &body.description,
    )?))
}

async fn get_product(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ServiceError> {
    Ok(Json(svc.get_product(&id)?))
}

#[derive(Deserialize)]
struct UpdateProductBody {
    name: Option<String>,
    description: Option<String>,
    active: Option<bool>,
}

async fn update_product(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductBody>,
) -> Result<Json<Product>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.update_product(
        &identity.user_id,
        &id,
        body.name.as_deref(),
        body.description.as_deref(),
        body.active,
    )?))
}

async fn delete_product(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    require_admin(&identity)?;
    svc.delete_product(&identity.user_id, &id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn product_inventory(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ProductInventory>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.product_inventory(&id)?))
}

async fn inventory(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ProductInventory>>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.inventory()?))
}

async fn inventory_summary(
    State(svc): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<InventorySummary>, ServiceError> {
    require_admin(&identity)?;
    Ok(Json(svc.inventory_summary()?))
}
