use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};

use super::extract::ApiPath;
use super::AppState;
use crate::auth::RequireUser;
use crate::db as queries;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageParams, Pagination};

async fn ensure_post_visible(state: &AppState, viewer_id: i64, post_id: i64) -> ApiResult<()> {
    if !queries::can_view_post(state.db.pool(), viewer_id, post_id).await? {
        return Err(ApiError::not_found("Post not found or access denied"));
    }
    Ok(())
}

async fn ensure_comment_visible(state: &AppState, viewer_id: i64, comment_id: i64) -> ApiResult<()> {
    if queries::get_visible_comment(state.db.pool(), viewer_id, comment_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Comment not found or access denied"));
    }
    Ok(())
}

// ========== Posts ==========

/// POST /api/posts/:id/like
pub async fn like_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    ensure_post_visible(&state, user.user_id, post_id).await?;

    let pool = state.db.pool();
    if !queries::like_post(pool, user.user_id, post_id).await? {
        return Err(ApiError::bad_request("Post already liked"));
    }
    let likes_count = queries::count_post_likes(pool, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post liked successfully",
        "likes_count": likes_count,
    })))
}

/// DELETE /api/posts/:id/like
pub async fn unlike_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    if !queries::unlike_post(pool, user.user_id, post_id).await? {
        return Err(ApiError::bad_request("Post not liked yet"));
    }
    let likes_count = queries::count_post_likes(pool, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post unliked successfully",
        "likes_count": likes_count,
    })))
}

/// GET /api/posts/:id/liked - Whether the viewer has liked a post.
pub async fn has_liked_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    ensure_post_visible(&state, user.user_id, post_id).await?;

    let like = queries::get_post_like(state.db.pool(), user.user_id, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "post_id": post_id,
        "has_liked": like.is_some(),
        "like_id": like.as_ref().map(|l| l.like_id),
        "liked_at": like.map(|l| l.created_at),
    })))
}

/// GET /api/posts/:id/likes - Who liked a post, newest first.
pub async fn post_likes(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    ensure_post_visible(&state, user.user_id, post_id).await?;

    let pool = state.db.pool();
    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_active_post_likers(pool, post_id).await?;
    let likes = queries::get_post_likes(pool, post_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "post_id": post_id,
        "likes": likes,
        "total_likes": total,
        "pagination": page.meta(total),
    })))
}

// ========== Comments ==========

/// POST /api/comments/:id/like
pub async fn like_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    ensure_comment_visible(&state, user.user_id, comment_id).await?;

    let pool = state.db.pool();
    if !queries::like_comment(pool, user.user_id, comment_id).await? {
        return Err(ApiError::bad_request("Comment already liked"));
    }
    let likes_count = queries::count_comment_likes(pool, comment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment liked successfully",
        "likes_count": likes_count,
    })))
}

/// DELETE /api/comments/:id/like
pub async fn unlike_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    if !queries::unlike_comment(pool, user.user_id, comment_id).await? {
        return Err(ApiError::bad_request("Comment not liked yet"));
    }
    let likes_count = queries::count_comment_likes(pool, comment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment unliked successfully",
        "likes_count": likes_count,
    })))
}

/// GET /api/comments/:id/likes
pub async fn comment_likes(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    ensure_comment_visible(&state, user.user_id, comment_id).await?;

    let pool = state.db.pool();
    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_active_comment_likers(pool, comment_id).await?;
    let likes = queries::get_comment_likes(pool, comment_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "comment_id": comment_id,
        "likes": likes,
        "total_likes": total,
        "pagination": page.meta(total),
    })))
}
