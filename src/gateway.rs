use serde::Serialize;
use thiserror::Error;

use crate::config::GatewayConfig;

/// Callback status flag the provider sends when the payer completed the
/// redirect flow.
pub const CALLBACK_OK: &str = "OK";

/// Response code the provider uses for a successful request/verify call.
const CODE_OK: i64 = 100;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider could not be reached or timed out. Retryable; the
    /// caller must not change payment state based on it.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something we could not interpret.
    /// Treated like a transport error: retryable, no state change.
    #[error("gateway returned an invalid response: {0}")]
    InvalidResponse(String),

    /// A definitive, structured rejection from the provider.
    #[error("gateway declined (code {code}): {raw}")]
    Declined { code: i64, raw: String },
}

impl GatewayError {
    /// Only a definitive provider answer may drive a `Failed` transition.
    pub fn is_definitive(&self) -> bool {
        matches!(self, GatewayError::Declined { .. })
    }
}

#[derive(Debug)]
pub struct StartedPayment {
    pub authority: String,
}

#[derive(Debug)]
pub struct VerifiedPayment {
    pub ref_id: String,
    pub card_pan: Option<String>,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    callback_url: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    authority: &'a str,
}

/// HTTP client for the settlement provider's request/verify endpoints.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Where the payer is redirected to after a successful start.
    pub fn redirect_url(&self, authority: &str) -> String {
        format!("{}/StartPay/{}", self.config.start_pay_base, authority)
    }

    /// Pre-authorize a payment with the provider and obtain an authority
    /// token.
    pub async fn request_payment(
        &self,
        amount: i64,
        description: &str,
    ) -> Result<StartedPayment, GatewayError> {
        let body = RequestBody {
            merchant_id: &self.config.merchant_id,
            amount,
            callback_url: &self.config.callback_url,
            description,
        };

        let resp = self
            .http
            .post(&self.config.request_endpoint)
            .json(&body)
            .send()
            .await?;
        let text = resp.text().await?;

        let data = interpret_response(&text)?;
        let authority = data
            .pointer("/authority")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse(truncate(&text)))?
            .to_string();
        Ok(StartedPayment { authority })
    }

    /// Confirm settlement of a started payment. Must only be called with
    /// the provider's "OK" callback in hand.
    pub async fn verify_payment(
        &self,
        amount: i64,
        authority: &str,
    ) -> Result<VerifiedPayment, GatewayError> {
        let body = VerifyBody {
            merchant_id: &self.config.merchant_id,
            amount,
            authority,
        };

        let resp = self
            .http
            .post(&self.config.verify_endpoint)
            .json(&body)
            .send()
            .await?;
        let text = resp.text().await?;

        let data = interpret_response(&text)?;
        let ref_id = match data.pointer("/ref_id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(GatewayError::InvalidResponse(truncate(&text))),
        };
        let card_pan = data
            .pointer("/card_pan")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(VerifiedPayment { ref_id, card_pan })
    }
}

/// Classify a provider response body.
///
/// `{"data": {"code": 100, ...}}` is success; a structured non-100 code
/// (in `data` or in the `errors` object) is a definitive decline; anything
/// else is an invalid response and retryable.
fn interpret_response(body: &str) -> Result<serde_json::Value, GatewayError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|_| GatewayError::InvalidResponse(truncate(body)))?;

    if let Some(code) = value.pointer("/data/code").and_then(|v| v.as_i64()) {
        if code == CODE_OK {
            return Ok(value.pointer("/data").cloned().unwrap_or_default());
        }
        return Err(GatewayError::Declined {
            code,
            raw: truncate(body),
        });
    }

    if let Some(code) = value.pointer("/errors/code").and_then(|v| v.as_i64()) {
        return Err(GatewayError::Declined {
            code,
            raw: truncate(body),
        });
    }

    Err(GatewayError::InvalidResponse(truncate(body)))
}

fn truncate(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Provider error pages can be localized; byte 512 may fall inside a
    // multibyte character, so back up to the nearest boundary.
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(base: &str) -> GatewayConfig {
        GatewayConfig {
            merchant_id: "test-merchant".into(),
            request_endpoint: format!("{base}/pg/v4/payment/request.json"),
            verify_endpoint: format!("{base}/pg/v4/payment/verify.json"),
            start_pay_base: base.to_string(),
            callback_url: "http://localhost/api/payments".into(),
            min_amount: 1000,
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn interprets_success_envelope() {
        let data =
            interpret_response(r#"{"data":{"code":100,"authority":"A0001"},"errors":[]}"#)
                .unwrap();
        assert_eq!(data.pointer("/authority").unwrap().as_str(), Some("A0001"));
    }

    #[test]
    fn structured_decline_is_definitive() {
        let err = interpret_response(r#"{"data":{"code":-51,"message":"cancelled"}}"#)
            .unwrap_err();
        assert!(err.is_definitive());
        match err {
            GatewayError::Declined { code, .. } => assert_eq!(code, -51),
            other => panic!("unexpected error: {other:?}"),
        }

        let err =
            interpret_response(r#"{"data":[],"errors":{"code":-9,"message":"bad merchant"}}"#)
                .unwrap_err();
        assert!(err.is_definitive());
    }

    #[test]
    fn garbage_body_is_retryable() {
        let err = interpret_response("<html>bad gateway</html>").unwrap_err();
        assert!(!err.is_definitive());

        let err = interpret_response(r#"{"unexpected":"shape"}"#).unwrap_err();
        assert!(!err.is_definitive());
    }

    #[test]
    fn oversized_multibyte_body_truncates_on_a_char_boundary() {
        // 511 ASCII bytes followed by a two-byte character puts byte 512
        // mid-character.
        let body = format!("{}é", "x".repeat(511));
        let err = interpret_response(&body).unwrap_err();
        match err {
            GatewayError::InvalidResponse(raw) => {
                assert!(raw.ends_with('…'));
                assert!(raw.trim_end_matches('…').chars().all(|c| c == 'x'));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Same for a declined JSON envelope with a long localized message.
        let message = "پرداخت ناموفق ".repeat(40);
        let body = format!(r#"{{"data":{{"code":-51,"message":"{message}"}}}}"#);
        let err = interpret_response(&body).unwrap_err();
        match err {
            GatewayError::Declined { code, raw } => {
                assert_eq!(code, -51);
                assert!(raw.ends_with('…'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn redirect_url_appends_authority() {
        let client = GatewayClient::new(test_config("https://sandbox.example")).unwrap();
        assert_eq!(
            client.redirect_url("A0001"),
            "https://sandbox.example/StartPay/A0001"
        );
    }

    #[test]
    fn numeric_and_string_ref_ids_are_accepted() {
        let data = interpret_response(r#"{"data":{"code":100,"ref_id":20012345}}"#).unwrap();
        assert_eq!(data.pointer("/ref_id").unwrap().as_i64(), Some(20012345));

        let data = interpret_response(r#"{"data":{"code":100,"ref_id":"TESTREF"}}"#).unwrap();
        assert_eq!(data.pointer("/ref_id").unwrap().as_str(), Some("TESTREF"));
    }
}
