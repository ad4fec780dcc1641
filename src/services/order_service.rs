use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, CheckoutResponse, OrderItemView, OrderList, OrderView},
    error::{AppError, AppResult},
    inventory,
    middleware::auth::AuthUser,
    models::{Address, Cart, Order, Payment, floored_total},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

#[derive(FromRow)]
struct CartLine {
    store_item_id: Uuid,
    quantity: i32,
}

/// Convert the caller's cart into an immutable order with reserved stock
/// and a pending payment. All of it commits or none of it does.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let mut tx = state.pool.begin().await?;

    // Serialize concurrent checkouts for the same user on the cart row.
    let cart: Option<Cart> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 FOR UPDATE")
        .bind(user.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let cart = cart.ok_or_else(|| AppError::BadRequest("Cart is empty.".to_string()))?;

    // Ascending item id fixes a global lock order across all checkouts,
    // so requests sharing items cannot deadlock each other.
    let lines: Vec<CartLine> = sqlx::query_as(
        "SELECT store_item_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY store_item_id ASC",
    )
    .bind(cart.id)
    .fetch_all(&mut *tx)
    .await?;

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty.".to_string()));
    }

    let address: Option<Address> = sqlx::query_as(
        r#"
        SELECT id, user_id, label, line1, line2, city, state, country, postal_code, is_default, created_at
        FROM addresses
        WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(payload.address_id)
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let address = address.ok_or_else(|| AppError::BadRequest("Address not found.".to_string()))?;

    // Lock every referenced listing and validate stock before writing
    // anything. A single shortfall aborts the whole checkout.
    let mut locked = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = inventory::lock_item(&mut tx, line.store_item_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("Cart contains an item that is no longer available.".to_string())
            })?;

        if line.quantity > item.stock {
            return Err(AppError::InsufficientStock {
                item: Some(item.product_name),
                available: item.stock as i64,
            });
        }
        locked.push((line, item));
    }

    let subtotal: i64 = locked
        .iter()
        .map(|(line, item)| item.effective_price() * line.quantity as i64)
        .sum();
    let total = floored_total(subtotal, cart.total_discount);

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (id, customer_id, address_id, status, total_price, total_discount)
        VALUES ($1, $2, $3, 'pending', $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(address.id)
    .bind(total)
    .bind(cart.total_discount)
    .fetch_one(&mut *tx)
    .await?;

    let mut item_views = Vec::with_capacity(locked.len());
    for (line, item) in &locked {
        let unit_price = item.effective_price();
        let order_item_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, store_item_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_item_id)
        .bind(order.id)
        .bind(item.id)
        .bind(line.quantity)
        .bind(unit_price)
        .execute(&mut *tx)
        .await?;

        inventory::reserve(&mut tx, item, line.quantity).await?;

        item_views.push(OrderItemView {
            id: order_item_id,
            store_item_id: item.id,
            product_name: item.product_name.clone(),
            price: unit_price,
            quantity: line.quantity,
            total_price: unit_price * line.quantity as i64,
        });
    }

    let payment: Payment = sqlx::query_as(
        r#"
        INSERT INTO payments (id, order_id, status, amount, fee)
        VALUES ($1, $2, 'pending', $3, 0)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order.id)
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

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

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total })),
    )
    .await;

    let response = CheckoutResponse {
        order: OrderView {
            id: order.id,
            customer_id: order.customer_id,
            address,
            status: order.status,
            total_price: order.total_price,
            total_discount: order.total_discount,
            items: item_views,
        },
        payment,
    };

    Ok(ApiResponse::success(
        "Checkout complete",
        response,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let direction = query.sort_order.unwrap_or(SortOrder::Desc).as_sql();

    let items: Vec<Order> = sqlx::query_as(&format!(
        r#"
        SELECT * FROM orders
        WHERE customer_id = $1 AND ($2::order_status IS NULL OR status = $2)
        ORDER BY created_at {direction}
        LIMIT $3 OFFSET $4
        "#,
    ))
    .bind(user.user_id)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND ($2::order_status IS NULL OR status = $2)",
    )
    .bind(user.user_id)
    .bind(query.status)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderView>> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND customer_id = $2")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(&state.pool)
            .await?;
    let order = order.ok_or(AppError::NotFound)?;

    let view = load_order_view(state, order).await?;
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid,
    store_item_id: Uuid,
    product_name: String,
    price: i64,
    quantity: i32,
}

pub(crate) async fn load_order_view(state: &AppState, order: Order) -> AppResult<OrderView> {
    // Historical orders keep rendering their address even after the owner
    // tombstones it.
    let address: Address = sqlx::query_as(
        r#"
        SELECT id, user_id, label, line1, line2, city, state, country, postal_code, is_default, created_at
        FROM addresses
        WHERE id = $1
        "#,
    )
    .bind(order.address_id)
    .fetch_one(&state.pool)
    .await?;

    let rows: Vec<OrderItemRow> = sqlx::query_as(
        r#"
        SELECT oi.id, oi.store_item_id, p.name AS product_name, oi.price, oi.quantity
        FROM order_items oi
        JOIN store_items si ON si.id = oi.store_item_id
        JOIN products p ON p.id = si.product_id
        WHERE oi.order_id = $1
        ORDER BY oi.created_at ASC
        "#,
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| OrderItemView {
            id: row.id,
            store_item_id: row.store_item_id,
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
            total_price: row.price * row.quantity as i64,
        })
        .collect();

    Ok(OrderView {
        id: order.id,
        customer_id: order.customer_id,
        address,
        status: order.status,
        total_price: order.total_price,
        total_discount: order.total_discount,
        items,
    })
}
