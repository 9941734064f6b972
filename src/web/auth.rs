use std::sync::OnceLock;

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use super::extract::{non_empty, ApiJson};
use super::AppState;
use crate::auth::{
    bearer_token, hash_password, validate_password_strength, verify_password, BearerToken,
    MaybeUser, TokenType,
};
use crate::db as queries;
use crate::db::NewUser;
use crate::error::{ApiError, ApiResult};

/// Registration payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    date_of_birth: Option<String>,
}

/// Login payload: either email or username plus password.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    token: Option<String>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]{3,50}$").expect("username regex is valid"))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && email_regex().is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    username_regex().is_match(username)
}

fn parse_date_of_birth(value: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    // Reject dates in the future
    (date <= chrono::Utc::now().date_naive()).then_some(date)
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    non_empty(value).ok_or_else(|| ApiError::bad_request(format!("The field {field} is required")))
}

/// POST /api/auth/register - Create an account.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = required(req.username, "username")?;
    let email = required(req.email, "email")?;
    // Passwords are not trimmed
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("The field password is required"))?;
    let first_name = required(req.first_name, "first_name")?;
    let last_name = required(req.last_name, "last_name")?;
    let date_of_birth = required(req.date_of_birth, "date_of_birth")?;

    if !is_valid_username(&username) {
        return Err(ApiError::bad_request(
            "Username must be 3-50 characters of letters, numbers, dots or underscores",
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if parse_date_of_birth(&date_of_birth).is_none() {
        return Err(ApiError::bad_request(
            "Invalid date of birth format. Use YYYY-MM-DD",
        ));
    }
    validate_password_strength(&password).map_err(|_| {
        ApiError::bad_request(
            "Password must be at least 8 characters long and contain both letters and numbers",
        )
    })?;

    let pool = state.db.pool();
    if queries::get_user_by_username(pool, &username).await?.is_some() {
        return Err(ApiError::conflict("Username already exists"));
    }
    if queries::get_user_by_email(pool, &email).await?.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash = hash_password(&password)?;
    let created = queries::create_user(
        pool,
        &NewUser {
            username: username.clone(),
            email,
            password_hash,
            first_name,
            last_name,
            date_of_birth,
        },
    )
    .await;

    // Another registration may have claimed the name while we hashed
    let user_id = match created {
        Ok(user_id) => user_id,
        Err(e) if queries::is_unique_violation(&e) => {
            return Err(
                if queries::get_user_by_username(pool, &username).await?.is_some() {
                    ApiError::conflict("Username already exists")
                } else {
                    ApiError::conflict("Email already exists")
                },
            );
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id, username = %username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "user_id": user_id,
        })),
    ))
}

/// POST /api/auth/login - Exchange credentials for an access token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = non_empty(req.email);
    let username = non_empty(req.username);
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Password is required"))?;

    let pool = state.db.pool();
    let user = match (email, username) {
        (Some(email), _) => {
            if !is_valid_email(&email) {
                return Err(ApiError::bad_request("Invalid email address"));
            }
            queries::get_user_by_email(pool, &email).await?
        }
        (None, Some(username)) => queries::get_user_by_username(pool, &username).await?,
        (None, None) => return Err(ApiError::bad_request("Email or username is required")),
    };

    let Some(user) = user else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&password, &user.password_hash)? {
        tracing::debug!(user_id = user.user_id, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active() {
        return Err(ApiError::unauthorized(format!(
            "Account is {}. Please contact support.",
            user.account_status
        )));
    }

    let issued = state.tokens.issue(user.user_id, TokenType::Auth)?;
    queries::update_last_login(pool, user.user_id).await?;

    tracing::info!(user_id = user.user_id, "User logged in");

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": issued.token,
        "user_id": user.user_id,
        "username": user.username,
        "role": user.role,
        "expiration": issued.claims.exp,
    })))
}

/// POST /api/auth/logout - Revoke a token.
///
/// The token comes from the JSON body, or from the `Authorization` header
/// when the body has none.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<ApiJson<LogoutRequest>>,
) -> ApiResult<Json<serde_json::Value>> {
    let from_body = body.and_then(|ApiJson(req)| non_empty(req.token));
    let token = match (&from_body, bearer_token(&headers)) {
        (Some(token), _) => token.as_str(),
        (None, BearerToken::Present(token)) => token,
        (None, _) => return Err(ApiError::bad_request("Token is required")),
    };

    let claims = state
        .tokens
        .decode(token)
        .map_err(|_| ApiError::InvalidToken("Invalid or expired token".to_string()))?;

    if !queries::blacklist_token(state.db.pool(), &claims.jti, claims.exp).await? {
        return Err(ApiError::unauthorized("Token already invalidated"));
    }

    tracing::info!(user_id = claims.user_id, "User logged out");

    Ok(Json(json!({
        "success": true,
        "message": "Successfully logged out",
    })))
}

/// GET /api/auth/validate - Check the bearer token.
pub async fn validate(MaybeUser(user): MaybeUser) -> ApiResult<Json<serde_json::Value>> {
    let Some(user) = user else {
        return Err(ApiError::InvalidToken(
            "Invalid or expired token".to_string(),
        ));
    };

    Ok(Json(json!({
        "success": true,
        "message": "Authentication valid",
        "user": {
            "user_id": user.user_id,
            "username": user.username,
            "email": user.email,
            "role": user.role,
            "account_status": user.account_status,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+tag@mail.example.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("al ice@example.com"));
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("alice smith"));
        assert!(!is_valid_username(&"a".repeat(51)));
    }

    #[test]
    fn test_date_of_birth() {
        assert!(parse_date_of_birth("1990-04-12").is_some());
        assert!(parse_date_of_birth("1990-13-01").is_none());
        assert!(parse_date_of_birth("12/04/1990").is_none());
        assert!(parse_date_of_birth("2999-01-01").is_none());
    }
}
