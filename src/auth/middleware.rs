use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use sqlx::SqlitePool;

use super::token::TokenKeys;
use crate::db as queries;
use crate::db::User;
use crate::error::ApiError;

/// Current authenticated user (required).
/// Rejects with 401 unless the request carries a valid, unrevoked bearer
/// token for an active account.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        let keys = TokenKeys::from_ref(state);

        let token = match bearer_token(&parts.headers) {
            BearerToken::Missing => return Err(ApiError::unauthorized("Authentication required")),
            BearerToken::Malformed => {
                return Err(ApiError::unauthorized("Invalid authentication format"))
            }
            BearerToken::Present(token) => token,
        };

        let claims = keys.decode(token).map_err(|e| {
            tracing::debug!("Rejected access token: {e}");
            ApiError::InvalidToken("Invalid or expired token".to_string())
        })?;

        if queries::is_token_blacklisted(&pool, &claims.jti).await? {
            return Err(ApiError::InvalidToken(
                "Token has been invalidated".to_string(),
            ));
        }

        let Some(user) = queries::get_user_by_id(&pool, claims.user_id).await? else {
            return Err(ApiError::InvalidToken("User not found".to_string()));
        };

        if !user.is_active() {
            return Err(ApiError::unauthorized(format!(
                "Account is {}",
                user.account_status
            )));
        }

        Ok(RequireUser(user))
    }
}

/// Current authenticated user, if any.
/// Any failure that would make [`RequireUser`] reject yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireUser::from_request_parts(parts, state).await {
            Ok(RequireUser(user)) => Ok(MaybeUser(Some(user))),
            // Storage failures still surface
            Err(e @ (ApiError::Database(_) | ApiError::Internal(_))) => Err(e),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

/// Require user to be an admin.
/// Returns 403 Forbidden if user is not an admin.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }

        Ok(RequireAdmin(user))
    }
}

/// Outcome of reading the `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
pub enum BearerToken<'a> {
    Missing,
    Malformed,
    Present(&'a str),
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> BearerToken<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return BearerToken::Missing;
    };
    let Ok(value) = value.to_str() else {
        return BearerToken::Malformed;
    };

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            BearerToken::Present(token.trim())
        }
        _ => BearerToken::Malformed,
    }
}
