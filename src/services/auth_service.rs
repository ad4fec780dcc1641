use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::auth::{
        AddressList, Claims, CreateAddressRequest, LoginRequest, LoginResponse, RegisterRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Role, User},
    response::{ApiResponse, Meta},
};

pub async fn register_user(pool: &DbPool, payload: RegisterRequest) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        password,
        role,
    } = payload;

    // Admin accounts are provisioned out of band, never self-registered.
    let role = match role.as_deref() {
        None | Some("customer") => Role::Customer,
        Some("seller") => Role::Seller,
        Some(other) => {
            return Err(AppError::BadRequest(format!("Invalid role '{other}'")));
        }
    };

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(email.as_str())
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    audit::record(
        pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id, "role": role.as_str() })),
    )
    .await;

    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(pool: &DbPool, payload: LoginRequest) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(user.id, user.role)?;

    audit::record(
        pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {token}"),
        },
        Some(Meta::empty()),
    ))
}

pub fn issue_token(user_id: Uuid, role: Role) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn create_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let mut tx = pool.begin().await?;

    if payload.is_default {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
    }

    let address: Address = sqlx::query_as(
        r#"
        INSERT INTO addresses (id, user_id, label, line1, line2, city, state, country, postal_code, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, user_id, label, line1, line2, city, state, country, postal_code, is_default, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&payload.label)
    .bind(&payload.line1)
    .bind(&payload.line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.country)
    .bind(&payload.postal_code)
    .bind(payload.is_default)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ApiResponse::success("Address created", address, None))
}

pub async fn list_addresses(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<AddressList>> {
    let items: Vec<Address> = sqlx::query_as(
        r#"
        SELECT id, user_id, label, line1, line2, city, state, country, postal_code, is_default, created_at
        FROM addresses
        WHERE user_id = $1 AND is_deleted = FALSE
        ORDER BY created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::empty()),
    ))
}
