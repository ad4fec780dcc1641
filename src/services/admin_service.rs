use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    inventory,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;

    let (page, limit, offset) = query.pagination.normalize();

    let items: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE ($1::order_status IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)")
            .bind(query.status)
            .fetch_one(&state.pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

#[derive(FromRow)]
struct RestockLine {
    store_item_id: Uuid,
    quantity: i32,
}

/// Operator-driven order transition. Cancelling an order returns its
/// reserved stock to the listings.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let mut tx = state.pool.begin().await?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
    let order = order.ok_or(AppError::NotFound)?;

    if order.status == OrderStatus::Cancelled {
        return Err(AppError::conflict("Order is already cancelled."));
    }
    if order.status == payload.status {
        return Err(AppError::conflict("Order already has that status."));
    }

    if payload.status == OrderStatus::Cancelled {
        // Same global lock order as checkout: ascending item id.
        let lines: Vec<RestockLine> = sqlx::query_as(
            "SELECT store_item_id, quantity FROM order_items WHERE order_id = $1 ORDER BY store_item_id ASC",
        )
        .bind(order.id)
        .fetch_all(&mut *tx)
        .await?;

        for line in &lines {
            inventory::release(&mut tx, line.store_item_id, line.quantity).await?;
        }
    }

    let order: Order = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(payload.status)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": payload.status })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}
