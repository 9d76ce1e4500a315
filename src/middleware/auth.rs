use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

/// Outcome of looking up a bearer token.
#[derive(Debug)]
pub enum SessionResolution {
    Authorized(AuthUser),
    Unauthorized,
}

pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;
    Ok(token)
}

/// Resolves a session token. Expired sessions are deleted and reported like unknown ones.
pub async fn resolve_session(pool: &DbPool, token: &str) -> AppResult<SessionResolution> {
    let row: Option<(Uuid, DateTime<Utc>, bool)> = sqlx::query_as(
        r#"
        SELECT s.user_id, s.expires_at, u.is_active
        FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some((user_id, expires_at, is_active)) = row else {
        return Ok(SessionResolution::Unauthorized);
    };

    if expires_at <= Utc::now() {
        if let Err(err) = sqlx::query("DELETE FROM user_sessions WHERE session_token = $1")
            .bind(token)
            .execute(pool)
            .await
        {
            tracing::warn!(error = %err, "expired session cleanup failed");
        }
        return Ok(SessionResolution::Unauthorized);
    }

    if !is_active {
        return Ok(SessionResolution::Unauthorized);
    }

    Ok(SessionResolution::Authorized(AuthUser {
        user_id,
        token: token.to_string(),
    }))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        match resolve_session(&state.pool, token).await? {
            SessionResolution::Authorized(user) => Ok(user),
            SessionResolution::Unauthorized => {
                Err(AppError::Unauthorized("Invalid or expired session".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")).unwrap(), "abc123");
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer   ")),
            Err(AppError::Unauthorized(_))
        ));
    }
}
