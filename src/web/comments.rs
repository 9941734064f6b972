use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{ApiJson, ApiPath};
use super::AppState;
use crate::auth::RequireUser;
use crate::comments::{build_thread, CommentNode, REPLIES_PER_COMMENT};
use crate::db as queries;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageParams, Pagination};

const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct NewCommentRequest {
    content: Option<String>,
    parent_comment_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    content: Option<String>,
}

fn validate_content(content: Option<String>) -> ApiResult<String> {
    let content = content.map(|c| c.trim().to_string()).unwrap_or_default();
    if content.is_empty() {
        return Err(ApiError::bad_request("Comment content is required"));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Comment must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(content)
}

/// POST /api/posts/:id/comments - Comment on a post or reply to a comment.
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<NewCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = validate_content(req.content)?;

    let pool = state.db.pool();
    if !queries::can_view_post(pool, user.user_id, post_id).await? {
        return Err(ApiError::not_found("Post not found or access denied"));
    }

    if let Some(parent_id) = req.parent_comment_id {
        let parent = queries::get_comment(pool, parent_id).await?;
        if !parent.is_some_and(|p| p.post_id == post_id) {
            return Err(ApiError::bad_request("Parent comment not found"));
        }
    }

    let comment_id =
        queries::insert_comment(pool, post_id, user.user_id, req.parent_comment_id, &content)
            .await?;
    let comment = queries::get_comment_view(pool, user.user_id, comment_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Comment {comment_id} missing after insert"))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Comment added successfully",
            "comment": CommentNode::unloaded(comment),
        })),
    ))
}

/// GET /api/posts/:id/comments - Top-level comments with their first replies.
pub async fn post_comments(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    if !queries::can_view_post(pool, user.user_id, post_id).await? {
        return Err(ApiError::not_found("Post not found or access denied"));
    }

    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_top_level_comments(pool, post_id).await?;
    let top_level =
        queries::get_top_level_comments(pool, user.user_id, post_id, page.limit, page.offset())
            .await?;

    let parent_ids: Vec<i64> = top_level
        .iter()
        .filter(|c| c.reply_count > 0)
        .map(|c| c.comment_id)
        .collect();
    let replies = if parent_ids.is_empty() {
        Vec::new()
    } else {
        queries::get_replies_for_parents(pool, user.user_id, &parent_ids, REPLIES_PER_COMMENT)
            .await?
    };

    let comments = build_thread(top_level, replies, REPLIES_PER_COMMENT as usize);

    Ok(Json(json!({
        "success": true,
        "comments": comments,
        "total_comments": total,
        "current_page": page.page,
        "total_pages": page.total_pages(total),
        "replies_per_comment_limit": REPLIES_PER_COMMENT,
    })))
}

/// GET /api/comments/:id/replies - Page through the direct replies of a comment.
pub async fn comment_replies(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    if queries::get_visible_comment(pool, user.user_id, comment_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Comment not found or access denied"));
    }

    let page = Pagination::resolve(&params, 10, 50);
    let total = queries::count_replies(pool, comment_id).await?;
    let replies: Vec<CommentNode> =
        queries::get_replies(pool, user.user_id, comment_id, page.limit, page.offset())
            .await?
            .into_iter()
            .map(CommentNode::unloaded)
            .collect();

    Ok(Json(json!({
        "success": true,
        "parent_comment_id": comment_id,
        "replies": replies,
        "total_replies": total,
        "current_page": page.page,
        "total_pages": page.total_pages(total),
    })))
}

/// PUT /api/comments/:id - Author edits a comment.
pub async fn update_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(req): ApiJson<EditCommentRequest>,
) -> ApiResult<Json<Value>> {
    let content = validate_content(req.content)?;

    let pool = state.db.pool();
    let comment = queries::get_comment(pool, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.user_id != user.user_id {
        return Err(ApiError::forbidden("You can only edit your own comments"));
    }

    queries::update_comment(pool, comment_id, &content).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment updated successfully",
    })))
}

/// DELETE /api/comments/:id - Comment author, post owner or an admin.
pub async fn delete_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(comment_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let comment = queries::get_comment(pool, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    let allowed = comment.user_id == user.user_id
        || user.is_admin()
        || queries::get_post(pool, comment.post_id)
            .await?
            .is_some_and(|p| p.user_id == user.user_id);
    if !allowed {
        return Err(ApiError::forbidden(
            "You do not have permission to delete this comment",
        ));
    }

    queries::delete_comment(pool, comment_id).await?;

    tracing::info!(comment_id, deleted_by = user.user_id, "Comment deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Comment deleted successfully",
    })))
}
