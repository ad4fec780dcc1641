use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "admin").await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "seller123", "seller").await?;
    let customer_id = ensure_user(&pool, "customer@example.com", "customer123", "customer").await?;

    let store_id = ensure_store(&pool, seller_id, "Ferris Outfitters").await?;
    seed_listings(&pool, store_id).await?;
    seed_address(&pool, customer_id).await?;

    println!("Seed completed. Admin {admin_id}, seller {seller_id}, customer {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, $3::user_role)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_store(pool: &sqlx::PgPool, seller_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let (store_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO stores (seller_id, name, description)
        VALUES ($1, $2, 'Merch for Rustaceans')
        ON CONFLICT (seller_id) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(seller_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    println!("Ensured store {name}");
    Ok(store_id)
}

async fn seed_listings(pool: &sqlx::PgPool, store_id: Uuid) -> anyhow::Result<()> {
    let listings: Vec<(&str, &str, i64, i64, i32)> = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 550_000, 0, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", 120_000, 99_000, 100),
        ("Rust Sticker Pack", "Decorate your laptop", 50_000, 0, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", 250_000, 199_000, 75),
    ];

    for (name, desc, price, discount_price, stock) in listings {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT si.id FROM store_items si
            JOIN products p ON p.id = si.product_id
            WHERE si.store_id = $1 AND p.name = $2 AND si.is_deleted = FALSE
            "#,
        )
        .bind(store_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;
        if existing.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        let (product_id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO products (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(desc)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO store_items (store_id, product_id, stock, price, discount_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(stock)
        .bind(price)
        .bind(discount_price)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    println!("Seeded listings");
    Ok(())
}

async fn seed_address(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM addresses WHERE user_id = $1 AND is_deleted = FALSE LIMIT 1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO addresses (user_id, label, line1, city, state, country, postal_code, is_default)
        VALUES ($1, 'Home', '1 Crab Lane', 'Shellville', 'CA', 'US', '90210', TRUE)
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    println!("Seeded customer address");
    Ok(())
}
