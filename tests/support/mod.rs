#![allow(dead_code)]

use std::time::Duration;

use sqlx::PgPool;
use storefront_api::{
    config::{AppConfig, GatewayConfig},
    db::create_pool,
    gateway::GatewayClient,
    middleware::auth::AuthUser,
    models::Role,
    state::AppState,
};
use uuid::Uuid;

pub fn gateway_config(base: &str) -> GatewayConfig {
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

/// Build an `AppState` against the test database, or `None` when no
/// database is configured so the caller can skip.
pub async fn setup_state(gateway_base: &str) -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        cart_cache_ttl: Duration::from_secs(60),
        gateway: gateway_config(gateway_base),
    };
    let gateway = GatewayClient::new(config.gateway.clone())?;
    Ok(Some(AppState::new(pool, config, gateway)))
}

/// Insert a user with a unique email so parallel tests never collide.
pub async fn create_user(pool: &PgPool, role: Role) -> anyhow::Result<AuthUser> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, 'not-a-real-hash', $2) RETURNING id",
    )
    .bind(format!("{}@example.com", Uuid::new_v4()))
    .bind(role)
    .fetch_one(pool)
    .await?;
    Ok(AuthUser { user_id, role })
}

/// Seed a seller with a store and one active listing; returns the
/// store item id the cart and checkout paths operate on.
pub async fn create_listing(
    pool: &PgPool,
    name: &str,
    price: i64,
    discount_price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let seller = create_user(pool, Role::Seller).await?;

    let (store_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO stores (seller_id, name) VALUES ($1, 'Test Store') RETURNING id",
    )
    .bind(seller.user_id)
    .fetch_one(pool)
    .await?;

    let (product_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO products (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await?;

    let (item_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO store_items (store_id, product_id, stock, price, discount_price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(store_id)
    .bind(product_id)
    .bind(stock)
    .bind(price)
    .bind(discount_price)
    .fetch_one(pool)
    .await?;

    Ok(item_id)
}

pub async fn create_address(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Uuid> {
    let (address_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO addresses (user_id, label, line1, city, state, country, postal_code)
        VALUES ($1, 'Home', '1 Test Street', 'Testville', 'TS', 'US', '00000')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(address_id)
}

pub async fn item_stock(pool: &PgPool, item_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM store_items WHERE id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await?;
    Ok(stock)
}
