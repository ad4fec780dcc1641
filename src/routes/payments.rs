use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{StartPaymentResponse, VerifyCallbackParams, VerifyResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/start", post(start_payment))
        .route("/{id}/verify", get(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/start",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 201, description = "Payment started, redirect URL returned", body = ApiResponse<StartPaymentResponse>),
        (status = 200, description = "Payment already started, same redirect URL replayed", body = ApiResponse<StartPaymentResponse>),
        (status = 409, description = "Payment already resolved"),
        (status = 502, description = "Gateway unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn start_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<StartPaymentResponse>>)> {
    let (status, resp) = payment_service::start_payment(&state, &user, id).await?;
    Ok((status, Json(resp)))
}

/// Gateway callback. The provider redirects the customer's browser here,
/// so this endpoint carries no bearer token.
#[utoipa::path(
    get,
    path = "/api/payments/{id}/verify",
    params(
        ("id" = Uuid, Path, description = "Payment ID"),
        ("Status" = String, Query, description = "Gateway callback status, OK on approval"),
        ("Authority" = Option<String>, Query, description = "Gateway reference")
    ),
    responses(
        (status = 200, description = "Payment verified", body = ApiResponse<VerifyResponse>),
        (status = 400, description = "Cancelled or declined"),
        (status = 409, description = "Already verified"),
        (status = 502, description = "Gateway unavailable, payment left pending"),
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<VerifyCallbackParams>,
) -> AppResult<Json<ApiResponse<VerifyResponse>>> {
    let resp = payment_service::verify_payment(&state, id, params).await?;
    Ok(Json(resp))
}
