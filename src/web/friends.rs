use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::ApiPath;
use super::AppState;
use crate::auth::RequireUser;
use crate::db as queries;
use crate::db::{Friendship, RequestDirection};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Deserialize)]
pub struct RequestListParams {
    #[serde(flatten)]
    page: PageParams,
    #[serde(rename = "type")]
    direction: Option<String>,
}

/// GET /api/friends - Accepted friends of the viewer.
pub async fn list_friends(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_friends(pool, user.user_id).await?;
    let friends = queries::get_friends(pool, user.user_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "friends": friends,
        "total_friends": total,
        "pagination": page.meta(total),
    })))
}

/// GET /api/friends/requests?type=received|sent - Pending requests.
pub async fn list_requests(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<RequestListParams>,
) -> ApiResult<Json<Value>> {
    let direction = match params.direction.as_deref() {
        None | Some("") => RequestDirection::Received,
        Some(other) => RequestDirection::from_str(other).ok_or_else(|| {
            ApiError::bad_request("Invalid request type. Must be received or sent")
        })?,
    };

    let pool = state.db.pool();
    let page = Pagination::resolve(&params.page, 20, 50);
    let total = queries::count_friend_requests(pool, user.user_id, direction).await?;
    let requests =
        queries::get_friend_requests(pool, user.user_id, direction, page.limit, page.offset())
            .await?;

    Ok(Json(json!({
        "success": true,
        "type": direction,
        "requests": requests,
        "total_requests": total,
        "pagination": page.meta(total),
    })))
}

/// POST /api/friends/request/:user_id - Send a friend request.
pub async fn send_request(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(target_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    if target_id == user.user_id {
        return Err(ApiError::bad_request(
            "You cannot send a friend request to yourself",
        ));
    }

    let pool = state.db.pool();
    let target = queries::get_user_by_id(pool, target_id).await?;
    if !target.is_some_and(|t| t.is_active()) {
        return Err(ApiError::not_found("User not found"));
    }
    if queries::is_blocked_either_way(pool, user.user_id, target_id).await? {
        return Err(ApiError::forbidden("Cannot send friend request to this user"));
    }

    if let Some(existing) = queries::get_friendship_between(pool, user.user_id, target_id).await? {
        return Err(existing_friendship_error(&existing, user.user_id));
    }

    // A crossing request can land between the check and the insert
    let Some(friendship_id) =
        queries::create_friend_request(pool, user.user_id, target_id).await?
    else {
        let existing = queries::get_friendship_between(pool, user.user_id, target_id).await?;
        return Err(existing.map_or_else(
            || ApiError::bad_request("Friend request already exists"),
            |f| existing_friendship_error(&f, user.user_id),
        ));
    };

    tracing::debug!(from = user.user_id, to = target_id, "Friend request sent");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Friend request sent successfully",
            "friendship_id": friendship_id,
        })),
    ))
}

fn existing_friendship_error(existing: &Friendship, user_id: i64) -> ApiError {
    let message = if existing.is_accepted() {
        "You are already friends with this user"
    } else if existing.user_id_1 == user_id {
        "Friend request already sent"
    } else {
        "This user has already sent you a friend request"
    };
    ApiError::bad_request(message)
}

/// DELETE /api/friends/request/:user_id - Withdraw an outgoing request.
pub async fn cancel_request(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(target_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !queries::delete_friend_request(state.db.pool(), user.user_id, target_id).await? {
        return Err(ApiError::not_found("Friend request not found"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Friend request cancelled",
    })))
}

/// POST /api/friends/accept/:user_id - Accept a request from that user.
pub async fn accept_request(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(requester_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !queries::accept_friend_request(state.db.pool(), requester_id, user.user_id).await? {
        return Err(ApiError::not_found("Friend request not found"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Friend request accepted",
    })))
}

/// POST /api/friends/reject/:user_id - Decline a request from that user.
pub async fn reject_request(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(requester_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !queries::delete_friend_request(state.db.pool(), requester_id, user.user_id).await? {
        return Err(ApiError::not_found("Friend request not found"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Friend request rejected",
    })))
}

/// DELETE /api/friends/:user_id - Unfriend.
pub async fn remove_friend(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(friend_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !queries::delete_friendship(state.db.pool(), user.user_id, friend_id).await? {
        return Err(ApiError::not_found("Friendship not found"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Friend removed successfully",
    })))
}
