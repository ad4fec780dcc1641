use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{
        CreateStoreItemRequest, CreateStoreRequest, StoreItemList, StoreItemView,
        UpdateStoreItemRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller},
    models::Store,
    response::{ApiResponse, Meta},
    routes::params::ItemQuery,
    state::AppState,
};

const ITEM_VIEW_COLUMNS: &str = r#"
    si.id, si.store_id, si.product_id, p.name AS product_name,
    p.description AS product_description, si.price, si.discount_price,
    si.stock, si.is_active
"#;

pub async fn create_store(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStoreRequest,
) -> AppResult<ApiResponse<Store>> {
    ensure_seller(user)?;

    let store: Option<Store> = sqlx::query_as(
        r#"
        INSERT INTO stores (id, seller_id, name, description)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (seller_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .fetch_optional(&state.pool)
    .await?;

    let store = store.ok_or_else(|| AppError::conflict("Seller already has a store."))?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "store_create",
        Some("stores"),
        Some(serde_json::json!({ "store_id": store.id })),
    )
    .await;

    Ok(ApiResponse::success("Store created", store, None))
}

pub async fn get_my_store(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Store>> {
    ensure_seller(user)?;

    let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE seller_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;

    let store = store.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", store, Some(Meta::empty())))
}

pub async fn list_items(
    state: &AppState,
    query: ItemQuery,
) -> AppResult<ApiResponse<StoreItemList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let pattern = query
        .q
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let items: Vec<StoreItemView> = sqlx::query_as(&format!(
        r#"
        SELECT {ITEM_VIEW_COLUMNS}
        FROM store_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.is_deleted = FALSE AND si.is_active = TRUE
          AND ($1::text IS NULL OR p.name ILIKE $1)
        ORDER BY si.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    ))
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM store_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.is_deleted = FALSE AND si.is_active = TRUE
          AND ($1::text IS NULL OR p.name ILIKE $1)
        "#,
    )
    .bind(&pattern)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", StoreItemList { items }, Some(meta)))
}

pub async fn get_item(state: &AppState, id: Uuid) -> AppResult<ApiResponse<StoreItemView>> {
    let item: Option<StoreItemView> = sqlx::query_as(&format!(
        r#"
        SELECT {ITEM_VIEW_COLUMNS}
        FROM store_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.id = $1 AND si.is_deleted = FALSE
        "#,
    ))
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    let item = item.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", item, Some(Meta::empty())))
}

pub async fn create_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStoreItemRequest,
) -> AppResult<ApiResponse<StoreItemView>> {
    ensure_seller(user)?;

    if payload.price < 0 || payload.discount_price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }

    let store: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM stores WHERE seller_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    let (store_id,) = store
        .ok_or_else(|| AppError::BadRequest("Create a store before listing items.".to_string()))?;

    let mut tx = state.pool.begin().await?;

    let (product_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO products (id, name, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&payload.product_name)
    .bind(&payload.product_description)
    .fetch_one(&mut *tx)
    .await?;

    let (item_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO store_items (id, store_id, product_id, stock, price, discount_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(store_id)
    .bind(product_id)
    .bind(payload.stock)
    .bind(payload.price)
    .bind(payload.discount_price)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "item_create",
        Some("store_items"),
        Some(serde_json::json!({ "store_item_id": item_id })),
    )
    .await;

    let view = fetch_item_view(state, item_id).await?;
    Ok(ApiResponse::success("Item listed", view, None))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateStoreItemRequest,
) -> AppResult<ApiResponse<StoreItemView>> {
    ensure_seller(user)?;

    let result = sqlx::query(
        r#"
        UPDATE store_items si
        SET price = COALESCE($3, si.price),
            discount_price = COALESCE($4, si.discount_price),
            stock = COALESCE($5, si.stock),
            is_active = COALESCE($6, si.is_active),
            updated_at = NOW()
        FROM stores s
        WHERE si.id = $1 AND si.store_id = s.id AND s.seller_id = $2
          AND si.is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.price)
    .bind(payload.discount_price)
    .bind(payload.stock)
    .bind(payload.is_active)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    let view = fetch_item_view(state, id).await?;
    Ok(ApiResponse::success("Item updated", view, Some(Meta::empty())))
}

/// Tombstone a listing. Reads everywhere else filter it out; the row (and
/// the order history referencing it) stays.
pub async fn delete_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_seller(user)?;

    let result = sqlx::query(
        r#"
        UPDATE store_items si
        SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
        FROM stores s
        WHERE si.id = $1 AND si.store_id = s.id AND s.seller_id = $2
          AND si.is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "item_delete",
        Some("store_items"),
        Some(serde_json::json!({ "store_item_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Item removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn fetch_item_view(state: &AppState, id: Uuid) -> AppResult<StoreItemView> {
    let view: StoreItemView = sqlx::query_as(&format!(
        r#"
        SELECT {ITEM_VIEW_COLUMNS}
        FROM store_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.id = $1
        "#,
    ))
    .bind(id)
    .fetch_one(&state.pool)
    .await?;
    Ok(view)
}
