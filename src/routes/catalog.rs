use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::{
        CreateStoreItemRequest, CreateStoreRequest, StoreItemList, StoreItemView,
        UpdateStoreItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Store,
    response::ApiResponse,
    routes::params::ItemQuery,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route(
            "/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
}

pub fn stores_router() -> Router<AppState> {
    Router::new().route("/mine", get(get_my_store).post(create_store))
}

#[utoipa::path(
    get,
    path = "/api/items",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Product name filter")
    ),
    responses(
        (status = 200, description = "List active listings", body = ApiResponse<StoreItemList>)
    ),
    tag = "Catalog"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ApiResponse<StoreItemList>>> {
    let resp = catalog_service::list_items(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Store item ID")),
    responses(
        (status = 200, description = "Listing detail", body = ApiResponse<StoreItemView>),
        (status = 404, description = "Not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<StoreItemView>>> {
    let resp = catalog_service::get_item(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/items",
    request_body = CreateStoreItemRequest,
    responses(
        (status = 201, description = "List an item for sale", body = ApiResponse<StoreItemView>),
        (status = 403, description = "Not a seller"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStoreItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<StoreItemView>>)> {
    let resp = catalog_service::create_item(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Store item ID")),
    request_body = UpdateStoreItemRequest,
    responses(
        (status = 200, description = "Update own listing", body = ApiResponse<StoreItemView>),
        (status = 404, description = "Not found or not owned"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStoreItemRequest>,
) -> AppResult<Json<ApiResponse<StoreItemView>>> {
    let resp = catalog_service::update_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Store item ID")),
    responses(
        (status = 200, description = "Soft-delete own listing", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found or not owned"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_item(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/stores/mine",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Create own store", body = ApiResponse<Store>),
        (status = 409, description = "Store already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stores"
)]
pub async fn create_store(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStoreRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Store>>)> {
    let resp = catalog_service::create_store(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/stores/mine",
    responses(
        (status = 200, description = "Own store", body = ApiResponse<Store>),
        (status = 404, description = "No store yet"),
    ),
    security(("bearer_auth" = [])),
    tag = "Stores"
)]
pub async fn get_my_store(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Store>>> {
    let resp = catalog_service::get_my_store(&state, &user).await?;
    Ok(Json(resp))
}
