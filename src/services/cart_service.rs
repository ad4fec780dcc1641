use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{
        AddToCartRequest, ApplyDiscountRequest, CartItemView, CartView, UpdateQuantityRequest,
    },
    error::{AppError, AppResult},
    inventory,
    middleware::auth::AuthUser,
    models::{Cart, effective_price, floored_total},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Fetch (lazily creating) the user's cart row. One round trip; the upsert
/// makes RETURNING yield the row whether it existed or not.
async fn ensure_cart<'a, E>(executor: E, user_id: Uuid) -> Result<Cart, sqlx::Error>
where
    E: sqlx::PgExecutor<'a>,
{
    sqlx::query_as::<_, Cart>(
        r#"
        INSERT INTO carts (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_one(executor)
    .await
}

#[derive(FromRow)]
struct CartLineRow {
    id: Uuid,
    store_item_id: Uuid,
    product_id: Uuid,
    product_name: String,
    price: i64,
    discount_price: i64,
    quantity: i32,
}

async fn load_cart_view(state: &AppState, cart: &Cart) -> AppResult<CartView> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id, ci.store_item_id, si.product_id, p.name AS product_name,
               si.price, si.discount_price, ci.quantity
        FROM cart_items ci
        JOIN store_items si ON si.id = ci.store_item_id
        JOIN products p ON p.id = si.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at ASC
        "#,
    )
    .bind(cart.id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<CartItemView> = rows
        .into_iter()
        .map(|row| {
            let unit_price = effective_price(row.price, row.discount_price);
            CartItemView {
                id: row.id,
                store_item_id: row.store_item_id,
                product_id: row.product_id,
                product_name: row.product_name,
                unit_price,
                quantity: row.quantity,
                total_price: unit_price * row.quantity as i64,
            }
        })
        .collect();

    let subtotal: i64 = items.iter().map(|i| i.total_price).sum();

    Ok(CartView {
        id: cart.id,
        items,
        subtotal,
        total_discount: cart.total_discount,
        total_price: floored_total(subtotal, cart.total_discount),
    })
}

/// Reload the authoritative snapshot after a mutation. The entry was just
/// invalidated and stays empty: priming it here can race a concurrent
/// mutation by the same user and pin that mutation's effect out of the
/// cache until the TTL expires. The next read repopulates instead.
async fn reload_view(state: &AppState, user_id: Uuid) -> AppResult<CartView> {
    let cart = ensure_cart(&state.pool, user_id).await?;
    load_cart_view(state, &cart).await
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    if let Some(view) = state.cart_cache.get(user.user_id).await {
        return Ok(ApiResponse::success("OK", view, Some(Meta::empty())));
    }

    let view = reload_view(state, user.user_id).await?;
    state.cart_cache.put(user.user_id, view.clone()).await;
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let cart = ensure_cart(&mut *tx, user.user_id).await?;

    let item = inventory::lock_item(&mut tx, payload.store_item_id)
        .await?
        .filter(|i| i.is_active)
        .ok_or(AppError::NotFound)?;

    if item.stock <= 0 {
        return Err(AppError::BadRequest("Item is out of stock.".to_string()));
    }

    let existing: Option<(i32,)> = sqlx::query_as(
        "SELECT quantity FROM cart_items WHERE cart_id = $1 AND store_item_id = $2",
    )
    .bind(cart.id)
    .bind(item.id)
    .fetch_optional(&mut *tx)
    .await?;

    let requested = existing.map_or(0, |(q,)| q) + payload.quantity;
    if requested > item.stock {
        return Err(AppError::InsufficientStock {
            item: None,
            available: item.stock as i64,
        });
    }

    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, store_item_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, store_item_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart.id)
    .bind(item.id)
    .bind(payload.quantity)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    state.cart_cache.invalidate(user.user_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "store_item_id": payload.store_item_id,
            "quantity": payload.quantity,
        })),
    )
    .await;

    let view = reload_view(state, user.user_id).await?;
    Ok(ApiResponse::success("Item added to cart", view, None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let line: Option<(Uuid, Uuid)> = sqlx::query_as(
        r#"
        SELECT ci.id, ci.store_item_id
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        WHERE ci.id = $1 AND c.user_id = $2
        "#,
    )
    .bind(payload.cart_item_id)
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (line_id, store_item_id) = line.ok_or(AppError::NotFound)?;

    if payload.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(line_id)
            .execute(&mut *tx)
            .await?;
    } else {
        let item = inventory::lock_item(&mut tx, store_item_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if payload.quantity > item.stock {
            return Err(AppError::InsufficientStock {
                item: None,
                available: item.stock as i64,
            });
        }

        sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(line_id)
            .bind(payload.quantity)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    state.cart_cache.invalidate(user.user_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({
            "cart_item_id": payload.cart_item_id,
            "quantity": payload.quantity,
        })),
    )
    .await;

    let view = reload_view(state, user.user_id).await?;
    Ok(ApiResponse::success("Cart updated", view, None))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    cart_item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let result = sqlx::query(
        r#"
        DELETE FROM cart_items ci
        USING carts c
        WHERE ci.id = $1 AND ci.cart_id = c.id AND c.user_id = $2
        "#,
    )
    .bind(cart_item_id)
    .bind(user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    state.cart_cache.invalidate(user.user_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "cart_item_id": cart_item_id })),
    )
    .await;

    let view = reload_view(state, user.user_id).await?;
    Ok(ApiResponse::success("Removed from cart", view, None))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let mut tx = state.pool.begin().await?;

    let cart = ensure_cart(&mut *tx, user.user_id).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE carts SET total_discount = 0 WHERE id = $1")
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.cart_cache.invalidate(user.user_id).await;

    let view = reload_view(state, user.user_id).await?;
    Ok(ApiResponse::success("Cart cleared", view, None))
}

pub async fn apply_discount(
    state: &AppState,
    user: &AuthUser,
    payload: ApplyDiscountRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.discount_value < 0 {
        return Err(AppError::BadRequest(
            "discount must not be negative".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let cart = ensure_cart(&mut *tx, user.user_id).await?;

    // Absolute value, deliberately unbounded: totals floor at zero instead.
    sqlx::query("UPDATE carts SET total_discount = $2 WHERE id = $1")
        .bind(cart.id)
        .bind(payload.discount_value)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.cart_cache.invalidate(user.user_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_discount",
        Some("carts"),
        Some(serde_json::json!({ "discount_value": payload.discount_value })),
    )
    .await;

    let view = reload_view(state, user.user_id).await?;
    Ok(ApiResponse::success("Discount applied", view, None))
}
