use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cart_cache_ttl: Duration,
    pub gateway: GatewayConfig,
}

/// Settlement provider settings. Defaults point at the provider sandbox
/// with a placeholder merchant id.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub request_endpoint: String,
    pub verify_endpoint: String,
    pub start_pay_base: String,
    pub callback_url: String,
    pub min_amount: i64,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let cart_cache_ttl = env::var("CART_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));
        Ok(Self {
            database_url,
            host,
            port,
            cart_cache_ttl,
            gateway: GatewayConfig::from_env(),
        })
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let merchant_id = env::var("GATEWAY_MERCHANT_ID")
            .unwrap_or_else(|_| "00000000-0000-0000-0000-000000000000".to_string());
        let request_endpoint = env::var("GATEWAY_REQUEST_ENDPOINT").unwrap_or_else(|_| {
            "https://sandbox.zarinpal.com/pg/v4/payment/request.json".to_string()
        });
        let verify_endpoint = env::var("GATEWAY_VERIFY_ENDPOINT").unwrap_or_else(|_| {
            "https://sandbox.zarinpal.com/pg/v4/payment/verify.json".to_string()
        });
        let start_pay_base = env::var("GATEWAY_START_PAY_BASE")
            .unwrap_or_else(|_| "https://sandbox.zarinpal.com".to_string());
        let callback_url = env::var("GATEWAY_CALLBACK_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/api/payments".to_string());
        let min_amount = env::var("GATEWAY_MIN_AMOUNT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1000);
        let timeout = env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));
        Self {
            merchant_id,
            request_endpoint,
            verify_endpoint,
            start_pay_base,
            callback_url,
            min_amount,
            timeout,
        }
    }
}
