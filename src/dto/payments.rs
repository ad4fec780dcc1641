use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct StartPaymentResponse {
    pub payment_url: String,
    pub authority: String,
    pub amount: i64,
}

/// Query string the provider appends when redirecting back to us.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCallbackParams {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Authority")]
    pub authority: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub detail: String,
    pub ref_id: String,
}
