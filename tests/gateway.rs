mod support;

use httpmock::prelude::*;
use storefront_api::gateway::{GatewayClient, GatewayError};

#[tokio::test]
async fn request_payment_extracts_the_authority() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pg/v4/payment/request.json")
                .json_body_partial(r#"{"merchant_id":"test-merchant","amount":150000}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"authority":"A000123","fee":0},"errors":[]}"#);
        })
        .await;

    let client = GatewayClient::new(support::gateway_config(&server.base_url()))?;
    let started = client.request_payment(150_000, "Order test").await?;

    assert_eq!(started.authority, "A000123");
    assert_eq!(
        client.redirect_url(&started.authority),
        format!("{}/StartPay/A000123", server.base_url())
    );
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn verify_payment_accepts_numeric_ref_id() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pg/v4/payment/verify.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":{"code":100,"ref_id":20098765,"card_pan":"5022****0000"}}"#);
        })
        .await;

    let client = GatewayClient::new(support::gateway_config(&server.base_url()))?;
    let verified = client.verify_payment(150_000, "A000123").await?;

    assert_eq!(verified.ref_id, "20098765");
    assert_eq!(verified.card_pan.as_deref(), Some("5022****0000"));
    Ok(())
}

#[tokio::test]
async fn structured_decline_is_definitive_over_the_wire() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pg/v4/payment/verify.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data":[],"errors":{"code":-53,"message":"authority mismatch"}}"#);
        })
        .await;

    let client = GatewayClient::new(support::gateway_config(&server.base_url()))?;
    let err = client.verify_payment(150_000, "A000123").await.unwrap_err();

    assert!(err.is_definitive());
    match err {
        GatewayError::Declined { code, .. } => assert_eq!(code, -53),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn html_error_page_is_retryable() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pg/v4/payment/request.json");
            then.status(503).body("<html>maintenance</html>");
        })
        .await;

    let client = GatewayClient::new(support::gateway_config(&server.base_url()))?;
    let err = client.request_payment(150_000, "Order test").await.unwrap_err();

    assert!(!err.is_definitive());
    assert!(matches!(err, GatewayError::InvalidResponse(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() -> anyhow::Result<()> {
    // Nothing listens on this port.
    let client = GatewayClient::new(support::gateway_config("http://127.0.0.1:9"))?;
    let err = client.request_payment(150_000, "Order test").await.unwrap_err();

    assert!(!err.is_definitive());
    assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
    Ok(())
}
