mod support;

use axum::http::StatusCode;
use httpmock::prelude::*;
use storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest, payments::VerifyCallbackParams},
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Payment, PaymentStatus, Role},
    services::{cart_service, order_service, payment_service},
    state::AppState,
};
use uuid::Uuid;

const REQUEST_PATH: &str = "/pg/v4/payment/request.json";
const VERIFY_PATH: &str = "/pg/v4/payment/verify.json";

/// Run the storefront flow up to a pending payment of `price * quantity`.
async fn checkout_pending_payment(
    state: &AppState,
    price: i64,
    quantity: i32,
) -> anyhow::Result<(AuthUser, Payment)> {
    let user = support::create_user(&state.pool, Role::Customer).await?;
    let address_id = support::create_address(&state.pool, user.user_id).await?;
    let item_id = support::create_listing(&state.pool, "Payable Item", price, 0, 100).await?;

    cart_service::add_item(
        state,
        &user,
        AddToCartRequest {
            store_item_id: item_id,
            quantity,
        },
    )
    .await?;
    let resp = order_service::checkout(state, &user, CheckoutRequest { address_id }).await?;
    let payment = resp.data.unwrap().payment;

    Ok((user, payment))
}

async fn fetch_payment(state: &AppState, id: Uuid) -> anyhow::Result<Payment> {
    let payment: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(payment)
}

#[tokio::test]
async fn start_is_idempotent_and_calls_the_provider_once() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    let request_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A10001"},"errors":[]}"#);
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 50_000, 1).await?;

    let (status, resp) = payment_service::start_payment(&state, &user, payment.id).await?;
    assert_eq!(status, StatusCode::CREATED);
    let started = resp.data.unwrap();
    assert_eq!(started.authority, "A10001");
    assert!(started.payment_url.ends_with("/StartPay/A10001"));
    assert_eq!(started.amount, 50_000);

    // Replay returns the stored authority without another provider call.
    let (status, resp) = payment_service::start_payment(&state, &user, payment.id).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.message, "Payment already started");
    assert_eq!(resp.data.unwrap().authority, "A10001");

    request_mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn verify_success_settles_payment_and_advances_order() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A20001"},"errors":[]}"#);
        })
        .await;
    let verify_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"ref_id":20012345,"card_pan":"6274****1234"}}"#);
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 75_000, 2).await?;
    payment_service::start_payment(&state, &user, payment.id).await?;

    let resp = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "OK".into(),
            authority: Some("A20001".into()),
        },
    )
    .await?;
    let verified = resp.data.unwrap();
    assert_eq!(verified.ref_id, "20012345");

    let settled = fetch_payment(&state, payment.id).await?;
    assert_eq!(settled.status, PaymentStatus::Success);
    assert_eq!(settled.transaction_id.as_deref(), Some("20012345"));
    assert_eq!(settled.card_pan.as_deref(), Some("6274****1234"));

    let (order_status,): (OrderStatus,) =
        sqlx::query_as("SELECT status FROM orders WHERE id = $1")
            .bind(payment.order_id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(order_status, OrderStatus::Processing);

    // A duplicate callback gets the idempotent conflict with the same
    // settlement reference, and no second provider round trip.
    let err = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "OK".into(),
            authority: Some("A20001".into()),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::Conflict { ref_id, .. } => assert_eq!(ref_id.as_deref(), Some("20012345")),
        other => panic!("unexpected error: {other:?}"),
    }

    verify_mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn cancelled_callback_fails_payment_without_provider_call() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A30001"},"errors":[]}"#);
        })
        .await;
    let verify_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"ref_id":1}}"#);
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 40_000, 1).await?;
    payment_service::start_payment(&state, &user, payment.id).await?;

    let err = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "NOK".into(),
            authority: Some("A30001".into()),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Payment was cancelled by the user."),
        other => panic!("unexpected error: {other:?}"),
    }

    let settled = fetch_payment(&state, payment.id).await?;
    assert_eq!(settled.status, PaymentStatus::Failed);

    verify_mock.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn start_below_provider_minimum_is_rejected() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    let request_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A40001"},"errors":[]}"#);
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 500, 1).await?;

    let err = payment_service::start_payment(&state, &user, payment.id)
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Amount must be at least 1000 minor units."),
        other => panic!("unexpected error: {other:?}"),
    }

    request_mock.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn provider_decline_fails_the_payment() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A50001"},"errors":[]}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":-51,"message":"session expired"}}"#);
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 60_000, 1).await?;
    payment_service::start_payment(&state, &user, payment.id).await?;

    let err = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "OK".into(),
            authority: Some("A50001".into()),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::BadRequest(msg) => {
            assert!(msg.starts_with("Payment verification failed:"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let settled = fetch_payment(&state, payment.id).await?;
    assert_eq!(settled.status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn unreadable_provider_response_leaves_payment_pending() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    server
        .mock_async(|when, then| {
            when.method(POST).path(REQUEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A60001"},"errors":[]}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(502).body("<html>bad gateway</html>");
        })
        .await;

    let (user, payment) = checkout_pending_payment(&state, 80_000, 1).await?;
    payment_service::start_payment(&state, &user, payment.id).await?;

    let err = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "OK".into(),
            authority: Some("A60001".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)), "{err:?}");

    // Still pending, so a later callback can retry the verification.
    let settled = fetch_payment(&state, payment.id).await?;
    assert_eq!(settled.status, PaymentStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn verify_before_start_is_rejected() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let Some(state) = support::setup_state(&server.base_url()).await? else {
        return Ok(());
    };

    let (_user, payment) = checkout_pending_payment(&state, 30_000, 1).await?;

    let err = payment_service::verify_payment(
        &state,
        payment.id,
        VerifyCallbackParams {
            status: "OK".into(),
            authority: None,
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Payment has not been started."),
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}
