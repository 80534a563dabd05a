use super::ApiJson;
use crate::access::{Caller, Capability};
use crate::error::ApiError;
use crate::model::{
    ExpenseCategory, Fertilizer, Field, InventoryItem, Product, ProductCategory, Season, User,
    Well,
};
use crate::services::catalog::{self, Resource};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(resource::<Field>("/fields"))
        .merge(resource::<Well>("/wells"))
        .merge(resource::<Season>("/seasons"))
        .merge(resource::<Product>("/products"))
        .merge(resource::<ProductCategory>("/categories"))
        .merge(resource::<InventoryItem>("/inventory"))
        .merge(resource::<Fertilizer>("/fertilizers"))
        .merge(resource::<ExpenseCategory>("/expense-categories"))
        .merge(resource::<User>("/users"))
        .route("/inventory/subcategories", get(inventory_subcategories))
        .route("/inventory/mine", get(my_inventory))
        .route("/fields/{id}/products", get(field_products))
}

/// List, create, get, replace and delete under `base`.
fn resource<R: Resource + Serialize>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(list::<R>).post(create::<R>))
        .route(
            &format!("{base}/{{id}}"),
            get(show::<R>).put(update::<R>).delete(remove::<R>),
        )
}

async fn list<R: Resource + Serialize>(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<R>>, ApiError> {
    caller.require(R::READ)?;
    Ok(Json(catalog::list::<R>(&state).await?))
}

async fn show<R: Resource + Serialize>(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<R>, ApiError> {
    caller.require(R::READ)?;
    Ok(Json(catalog::get::<R>(&state, &id).await?))
}

async fn create<R: Resource + Serialize>(
    caller: Caller,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<R::Input>,
) -> Result<(StatusCode, Json<R>), ApiError> {
    caller.require(R::WRITE)?;
    let document = catalog::create::<R>(&state, input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn update<R: Resource + Serialize>(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<R::Input>,
) -> Result<Json<R>, ApiError> {
    caller.require(R::WRITE)?;
    Ok(Json(catalog::update::<R>(&state, &id, input).await?))
}

async fn remove<R: Resource + Serialize>(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    caller.require(R::WRITE)?;
    catalog::delete::<R>(&state, &id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct SubcategoryQuery {
    category: Option<String>,
}

async fn inventory_subcategories(
    caller: Caller,
    State(state): State<AppState>,
    Query(query): Query<SubcategoryQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    caller.require(Capability::ViewAssets)?;
    let subcategories =
        catalog::inventory_subcategories(&state, query.category.as_deref()).await?;
    Ok(Json(subcategories))
}

async fn my_inventory(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    caller.require(Capability::ViewAssets)?;
    Ok(Json(catalog::inventory_for(&state, &caller).await?))
}

async fn field_products(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    caller.require(Capability::ViewCatalog)?;
    Ok(Json(catalog::field_products(&state, &id).await?))
}
