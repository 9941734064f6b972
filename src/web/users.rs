use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, ApiJson, ApiPath, MultipartForm};
use super::AppState;
use crate::auth::{hash_password, validate_password_length, verify_password, RequireUser};
use crate::db as queries;
use crate::error::{ApiError, ApiResult};
use crate::media::{validate_upload, UploadKind};
use crate::pagination::{PageParams, Pagination};

const MAX_NAME_LENGTH: usize = 50;
const MAX_BIO_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdate {
    current_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    password: Option<String>,
}

/// GET /api/users/me - The authenticated account.
pub async fn me(RequireUser(user): RequireUser) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}

/// DELETE /api/users/me - Soft-delete the caller's account.
///
/// Requires the current password. Existing tokens stop working because the
/// auth extractor only admits active accounts.
pub async fn delete_account(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> ApiResult<Json<Value>> {
    let Some(password) = req.password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::bad_request("Password is required"));
    };
    if !verify_password(&password, &user.password_hash)? {
        return Err(ApiError::bad_request("Password is incorrect"));
    }

    if !queries::soft_delete_user(state.db.pool(), user.user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = user.user_id, "Account deleted by owner");

    Ok(Json(json!({
        "success": true,
        "message": "User account deleted successfully",
        "deleted_user_id": user.user_id,
        "deleted_username": user.username,
    })))
}

/// GET /api/users/:id - Public profile plus relation to the viewer.
pub async fn get_user(
    State(state): State<AppState>,
    RequireUser(viewer): RequireUser,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let profile = queries::get_user_profile(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let friendship = if user_id == viewer.user_id {
        None
    } else {
        queries::get_friendship_between(pool, viewer.user_id, user_id).await?
    };
    let friendship_status = friendship.as_ref().map(|f| f.status.clone());
    let request_direction = friendship.as_ref().filter(|f| !f.is_accepted()).map(|f| {
        if f.user_id_1 == viewer.user_id {
            "sent"
        } else {
            "received"
        }
    });
    let is_blocked = queries::has_blocked(pool, viewer.user_id, user_id).await?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "is_own_profile": user_id == viewer.user_id,
        "friendship_status": friendship_status,
        "request_direction": request_direction,
        "is_blocked": is_blocked,
    })))
}

/// GET /api/users/:id/posts - Posts by a user that the viewer may see.
pub async fn user_posts(
    State(state): State<AppState>,
    RequireUser(viewer): RequireUser,
    ApiPath(user_id): ApiPath<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    if queries::get_user_profile(pool, user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let page = Pagination::resolve(&params, 10, 50);
    let total = queries::count_user_posts(pool, viewer.user_id, user_id).await?;
    let posts =
        queries::get_user_posts(pool, viewer.user_id, user_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "total_posts": total,
        "pagination": page.meta(total),
    })))
}

fn check_length(value: &str, max: usize, field: &str) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// PUT /api/users/profile - Update name and bio.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let first_name = non_empty(req.first_name);
    let last_name = non_empty(req.last_name);
    // An empty bio clears it
    let bio = req.bio.map(|b| b.trim().to_string());

    let mut updated = Vec::new();
    if let Some(first_name) = &first_name {
        check_length(first_name, MAX_NAME_LENGTH, "First name")?;
        updated.push("first_name");
    }
    if let Some(last_name) = &last_name {
        check_length(last_name, MAX_NAME_LENGTH, "Last name")?;
        updated.push("last_name");
    }
    if let Some(bio) = &bio {
        check_length(bio, MAX_BIO_LENGTH, "Bio")?;
        updated.push("bio");
    }

    if updated.is_empty() {
        return Err(ApiError::bad_request("No profile updates provided"));
    }

    queries::update_user_profile(
        state.db.pool(),
        user.user_id,
        first_name.as_deref(),
        last_name.as_deref(),
        bio.as_deref(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "updated_fields": updated,
    })))
}

/// POST /api/users/profile/picture - Replace the profile picture.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = MultipartForm::read(multipart, "profile_picture").await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let extension = validate_upload(
        UploadKind::ProfilePicture,
        &file.file_name,
        file.content_type.as_deref(),
        file.data.len(),
        state.config.max_profile_picture_bytes,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let url = state
        .media
        .save(UploadKind::ProfilePicture, user.user_id, &extension, &file.data)
        .await?;

    match queries::set_profile_picture(state.db.pool(), user.user_id, &url).await {
        Ok(Some(previous)) => state.media.remove(&previous).await,
        Ok(None) => {}
        Err(e) => {
            state.media.remove(&url).await;
            return Err(e.into());
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "Profile picture updated successfully",
        "profile_picture": url,
    })))
}

/// PUT /api/users/password - Change password after confirming the current one.
pub async fn update_password(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<PasswordUpdate>,
) -> ApiResult<Json<Value>> {
    let (Some(current), Some(new)) = (
        req.current_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "Current password and new password are required",
        ));
    };

    validate_password_length(&new).map_err(|e| ApiError::bad_request(e.to_string()))?;

    if !verify_password(&current, &user.password_hash)? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let password_hash = hash_password(&new)?;
    queries::update_user_password(state.db.pool(), user.user_id, &password_hash).await?;

    tracing::info!(user_id = user.user_id, "Password changed");

    Ok(Json(json!({
        "success": true,
        "message": "Password updated successfully",
    })))
}

/// POST /api/users/:id/block - Block a user and drop any friendship.
pub async fn block_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(target_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if target_id == user.user_id {
        return Err(ApiError::bad_request("You cannot block yourself"));
    }

    let pool = state.db.pool();
    if queries::get_user_by_id(pool, target_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    let Some(block_id) = queries::block_user(pool, user.user_id, target_id).await? else {
        return Err(ApiError::bad_request("User is already blocked"));
    };

    Ok(Json(json!({
        "success": true,
        "message": "User blocked successfully",
        "block_id": block_id,
    })))
}

/// DELETE /api/users/:id/block - Lift a block.
pub async fn unblock_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(target_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !queries::unblock_user(state.db.pool(), user.user_id, target_id).await? {
        return Err(ApiError::not_found("User is not blocked"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "User unblocked successfully",
    })))
}

/// GET /api/users/blocked - Accounts the viewer has blocked.
pub async fn blocked_users(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_blocked_users(pool, user.user_id).await?;
    let blocked = queries::get_blocked_users(pool, user.user_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "blocked_users": blocked,
        "total": total,
        "pagination": page.meta(total),
    })))
}
