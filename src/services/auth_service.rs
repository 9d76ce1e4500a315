use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use password_hash::rand_core::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::auth::{LoginRequest, LoginResponse, LogoutResponse, RegisterRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const USER_COLUMNS: &str = "id, email, full_name, is_active, created_at";

#[derive(sqlx::FromRow)]
struct Credentials {
    id: Uuid,
    password_hash: String,
    is_active: bool,
}

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let email = payload.email.trim().to_lowercase();
    let full_name = payload.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }
    validate_password(&payload.password)?;

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
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let user: User = sqlx::query_as(&format!(
        "INSERT INTO users (id, email, full_name, password_hash) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(email.as_str())
    .bind(full_name.as_str())
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_duplicate_email)?;

    audit::record(
        pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let pool = &state.pool;
    let email = payload.email.trim().to_lowercase();
    let credentials: Option<Credentials> =
        sqlx::query_as("SELECT id, password_hash, is_active FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(pool)
            .await?;

    let credentials = match credentials {
        Some(c) => c,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&credentials.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    if !credentials.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    sqlx::query("DELETE FROM user_sessions WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(credentials.id)
        .execute(pool)
        .await?;

    let lifetime = if payload.remember_me {
        Duration::days(state.config.session_remember_days)
    } else {
        Duration::hours(state.config.session_ttl_hours)
    };
    let expires_at = session_expiry(Utc::now(), lifetime)?;
    let token = generate_session_token();

    sqlx::query(
        "INSERT INTO user_sessions (id, user_id, session_token, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(credentials.id)
    .bind(token.as_str())
    .bind(expires_at)
    .execute(pool)
    .await?;

    let user = fetch_user(pool, credentials.id).await?;

    audit::record(
        pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            expires_at,
            user,
        },
        Some(Meta::empty()),
    ))
}

pub async fn logout_user(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<LogoutResponse>> {
    sqlx::query("DELETE FROM user_sessions WHERE session_token = $1")
        .bind(user.token.as_str())
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Logged out",
        LogoutResponse { logged_out: true },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = fetch_user(pool, user.user_id).await?;
    Ok(ApiResponse::ok(user))
}

async fn fetch_user(pool: &DbPool, id: Uuid) -> AppResult<User> {
    let user: Option<User> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    user.ok_or(AppError::NotFound)
}

/// A concurrent registration can pass the lookup above and lose on the unique index.
fn map_duplicate_email(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::BadRequest("Email is already taken".to_string())
        }
        _ => AppError::DbError(err),
    }
}

fn session_expiry(now: DateTime<Utc>, lifetime: Duration) -> AppResult<DateTime<Utc>> {
    now.checked_add_signed(lifetime)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))
}

/// 32 random bytes, hex encoded.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest("Password must contain a letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("Password must contain a digit".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("budi@example.co.id"));
        assert!(!is_valid_email("budi@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("budi @example.com"));
        assert!(!is_valid_email("budi@@example.com"));
    }

    #[test]
    fn password_strength() {
        assert!(validate_password("rahasia123").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("1234567890").is_err());
    }

    #[test]
    fn non_database_errors_stay_system_errors() {
        assert!(matches!(
            map_duplicate_email(sqlx::Error::RowNotFound),
            AppError::DbError(_)
        ));
    }

    #[test]
    fn session_tokens_are_unique_hex() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
