mod support;

use storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest, orders::UpdateOrderStatusRequest},
    error::AppError,
    models::{OrderStatus, Role},
    services::{admin_service, cart_service, order_service},
};

const NO_GATEWAY: &str = "http://127.0.0.1:1";

#[tokio::test]
async fn cancelling_an_order_restores_stock() -> anyhow::Result<()> {
    let Some(state) = support::setup_state(NO_GATEWAY).await? else {
        return Ok(());
    };

    let customer = support::create_user(&state.pool, Role::Customer).await?;
    let admin = support::create_user(&state.pool, Role::Admin).await?;
    let address_id = support::create_address(&state.pool, customer.user_id).await?;
    let item_id = support::create_listing(&state.pool, "Restockable", 25_000, 0, 10).await?;

    cart_service::add_item(
        &state,
        &customer,
        AddToCartRequest {
            store_item_id: item_id,
            quantity: 4,
        },
    )
    .await?;
    let resp = order_service::checkout(&state, &customer, CheckoutRequest { address_id }).await?;
    let order = resp.data.unwrap().order;
    assert_eq!(support::item_stock(&state.pool, item_id).await?, 6);

    let updated = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await?;
    assert_eq!(updated.data.unwrap().status, OrderStatus::Cancelled);
    assert_eq!(support::item_stock(&state.pool, item_id).await?, 10);

    // A cancelled order is final.
    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }), "{err:?}");

    Ok(())
}

#[tokio::test]
async fn order_status_updates_are_admin_only() -> anyhow::Result<()> {
    let Some(state) = support::setup_state(NO_GATEWAY).await? else {
        return Ok(());
    };

    let customer = support::create_user(&state.pool, Role::Customer).await?;
    let address_id = support::create_address(&state.pool, customer.user_id).await?;
    let item_id = support::create_listing(&state.pool, "Guarded", 15_000, 0, 3).await?;

    cart_service::add_item(
        &state,
        &customer,
        AddToCartRequest {
            store_item_id: item_id,
            quantity: 1,
        },
    )
    .await?;
    let resp = order_service::checkout(&state, &customer, CheckoutRequest { address_id }).await?;
    let order = resp.data.unwrap().order;

    let err = admin_service::update_order_status(
        &state,
        &customer,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden), "{err:?}");

    Ok(())
}
