//! Authentication service: password hashing, session tokens, registration
//! and login.
//!
//! # Security
//!
//! - Passwords are hashed with argon2id and a random 16-byte salt
//! - Session tokens are HS256 JWTs carrying user id, email and role
//! - Login failures never reveal whether the email exists

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserRole},
};

const MIN_PASSWORD_LEN: usize = 8;

/// Claims carried in a session token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    role: UserRole,
    iat: i64,
    exp: i64,
}

/// Hash a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash verifies as `false`.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// Sign a session token valid for `ttl_hours`.
pub fn issue_token(auth: &AuthContext, secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: auth.user_id,
        email: auth.email.clone(),
        role: auth.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Verify a session token and recover the caller's identity.
///
/// Bad signatures, expired tokens and malformed input all map to
/// `Unauthorized`.
pub fn decode_token(token: &str, secret: &str) -> Result<AuthContext, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AppError::Unauthorized
    })?;

    Ok(AuthContext {
        user_id: data.claims.sub,
        email: data.claims.email,
        role: data.claims.role,
    })
}

/// Trim + lower-case, with a minimal shape check.
///
/// Only `local@domain` is required; single-label domains such as
/// `localhost` are accepted for bootstrap admins.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }
    Ok(email)
}

fn auth_response(user: User, secret: &str, ttl_hours: i64) -> Result<AuthResponse, AppError> {
    let context = AuthContext {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role(),
    };
    let token = issue_token(&context, secret, ttl_hours)?;

    Ok(AuthResponse {
        token,
        token_type: "Bearer",
        expires_in: ttl_hours * 3600,
        user: user.into(),
    })
}

/// Open the "Main" USD account for a user if it does not exist yet.
async fn ensure_default_account(tx: &mut DbTx<'_>, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO accounts (user_id, account_name, currency)
        VALUES ($1, 'Main', 'USD')
        ON CONFLICT (user_id, currency, account_name) DO NOTHING
        "#,
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Register a new user with a default account.
///
/// # Errors
///
/// - `InvalidRequest`: malformed email or short password
/// - `EmailTaken`: a user with this email exists
pub async fn register(
    pool: &DbPool,
    request: RegisterRequest,
    secret: &str,
    ttl_hours: i64,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&request.email)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let password_hash = hash_password(&request.password)?;
    let full_name = request
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(full_name)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::EmailTaken)?;

    ensure_default_account(&mut tx, user.id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "user registered");

    auth_response(user, secret, ttl_hours)
}

/// Authenticate with email + password.
pub async fn login(
    pool: &DbPool,
    request: LoginRequest,
    secret: &str,
    ttl_hours: i64,
) -> Result<AuthResponse, AppError> {
    let email = request.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    auth_response(user, secret, ttl_hours)
}

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::UserNotFound)
}

pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    Ok(users)
}

/// Create or promote the bootstrap admin.
///
/// An existing user keeps their password; only the role changes.
pub async fn ensure_admin(pool: &DbPool, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email)?;
    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, 'ADMIN')
        ON CONFLICT (email) DO UPDATE SET role = 'ADMIN', updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await?;

    ensure_default_account(&mut tx, user.id).await?;

    tx.commit().await?;

    Ok(user)
}
