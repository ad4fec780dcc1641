use axum::http::StatusCode;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{StartPaymentResponse, VerifyCallbackParams, VerifyResponse},
    error::{AppError, AppResult},
    events::AppEvent,
    gateway,
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, Payment, PaymentStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Begin the provider round trip for a pending payment.
///
/// Idempotent: once an authority token is stored, replays return the same
/// redirect URL without another provider call. Returns the HTTP status the
/// route should use (201 for a fresh start, 200 for a replay).
pub async fn start_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
) -> AppResult<(StatusCode, ApiResponse<StartPaymentResponse>)> {
    let mut tx = state.pool.begin().await?;

    let payment: Option<Payment> =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
    let payment = payment.ok_or(AppError::NotFound)?;

    // Ownership check doubles as existence hiding: foreign payments 404.
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND customer_id = $2")
            .bind(payment.order_id)
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let order = order.ok_or(AppError::NotFound)?;

    if payment.status.is_terminal() {
        return Err(AppError::Conflict {
            message: "Payment already resolved.".to_string(),
            ref_id: payment.transaction_id,
        });
    }

    if let Some(authority) = payment.reference_id {
        let response = StartPaymentResponse {
            payment_url: state.gateway.redirect_url(&authority),
            authority,
            amount: payment.amount,
        };
        return Ok((
            StatusCode::OK,
            ApiResponse::success("Payment already started", response, Some(Meta::empty())),
        ));
    }

    let min = state.config.gateway.min_amount;
    if payment.amount < min {
        return Err(AppError::BadRequest(format!(
            "Amount must be at least {min} minor units."
        )));
    }

    let description = format!("Order {}", order.id);
    let started = state
        .gateway
        .request_payment(payment.amount, &description)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))?;

    sqlx::query("UPDATE payments SET reference_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(payment.id)
        .bind(&started.authority)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_start",
        Some("payments"),
        Some(serde_json::json!({
            "payment_id": payment.id,
            "authority": started.authority,
        })),
    )
    .await;

    let response = StartPaymentResponse {
        payment_url: state.gateway.redirect_url(&started.authority),
        authority: started.authority,
        amount: payment.amount,
    };
    Ok((
        StatusCode::CREATED,
        ApiResponse::success("Payment started", response, Some(Meta::empty())),
    ))
}

/// Settle a started payment from the provider callback.
///
/// The payment row stays locked across the outbound verify call so a
/// duplicate callback blocks until the first resolution commits, then
/// observes the terminal state and gets the idempotent 409.
pub async fn verify_payment(
    state: &AppState,
    payment_id: Uuid,
    params: VerifyCallbackParams,
) -> AppResult<ApiResponse<VerifyResponse>> {
    let mut tx = state.pool.begin().await?;

    let payment: Option<Payment> =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
    let payment = payment.ok_or(AppError::NotFound)?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(payment.order_id)
        .fetch_one(&mut *tx)
        .await?;

    match payment.status {
        PaymentStatus::Success => {
            return Err(AppError::Conflict {
                message: "Payment already verified.".to_string(),
                ref_id: payment.transaction_id,
            });
        }
        PaymentStatus::Failed => {
            return Err(AppError::conflict("Payment already failed."));
        }
        PaymentStatus::Pending => {}
    }

    let authority = payment
        .reference_id
        .clone()
        .ok_or_else(|| AppError::BadRequest("Payment has not been started.".to_string()))?;

    // A non-OK callback flag is the payer backing out at the provider;
    // definitive, no verify call needed.
    if params.status != gateway::CALLBACK_OK {
        mark_failed(&mut tx, payment.id).await?;
        tx.commit().await?;

        audit::record(
            &state.pool,
            None,
            "payment_cancelled",
            Some("payments"),
            Some(serde_json::json!({ "payment_id": payment.id })),
        )
        .await;

        return Err(AppError::BadRequest(
            "Payment was cancelled by the user.".to_string(),
        ));
    }

    match state.gateway.verify_payment(payment.amount, &authority).await {
        Ok(verified) => {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = 'success', transaction_id = $2, card_pan = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(payment.id)
            .bind(&verified.ref_id)
            .bind(&verified.card_pan)
            .execute(&mut *tx)
            .await?;

            // Cancelled/delivered orders keep their status; settlement of
            // such an order is an operator problem, not a state rewind.
            if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Delivered) {
                sqlx::query(
                    "UPDATE orders SET status = 'processing', updated_at = NOW() WHERE id = $1",
                )
                .bind(order.id)
                .execute(&mut *tx)
                .await?;
            }

            let (customer_email,): (String,) =
                sqlx::query_as("SELECT email FROM users WHERE id = $1")
                    .bind(order.customer_id)
                    .fetch_one(&mut *tx)
                    .await?;

            tx.commit().await?;

            state.events.emit(AppEvent::PaymentVerified {
                payment_id: payment.id,
                order_id: order.id,
                customer_email,
                amount: payment.amount,
                transaction_id: verified.ref_id.clone(),
            });

            audit::record(
                &state.pool,
                Some(order.customer_id),
                "payment_verified",
                Some("payments"),
                Some(serde_json::json!({
                    "payment_id": payment.id,
                    "ref_id": verified.ref_id,
                })),
            )
            .await;

            Ok(ApiResponse::success(
                "Payment verified",
                VerifyResponse {
                    detail: "Payment verified successfully.".to_string(),
                    ref_id: verified.ref_id,
                },
                Some(Meta::empty()),
            ))
        }
        Err(err) if err.is_definitive() => {
            mark_failed(&mut tx, payment.id).await?;
            tx.commit().await?;

            audit::record(
                &state.pool,
                None,
                "payment_declined",
                Some("payments"),
                Some(serde_json::json!({
                    "payment_id": payment.id,
                    "error": err.to_string(),
                })),
            )
            .await;

            Err(AppError::BadRequest(format!(
                "Payment verification failed: {err}"
            )))
        }
        // Transport or parse trouble: roll back and leave the payment
        // pending. Inferring failure here could contradict money that
        // already moved at the provider.
        Err(err) => Err(AppError::Gateway(err.to_string())),
    }
}

async fn mark_failed(tx: &mut Transaction<'_, Postgres>, payment_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1")
        .bind(payment_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
