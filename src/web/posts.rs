use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, ApiJson, ApiPath, MultipartForm, UploadedFile};
use super::AppState;
use crate::auth::RequireUser;
use crate::db as queries;
use crate::db::{NewPost, PostChanges, PostType, PrivacyLevel};
use crate::error::{ApiError, ApiResult};
use crate::media::{validate_upload, UploadKind};
use crate::pagination::{PageParams, Pagination};

const MAX_CAPTION_LENGTH: usize = 2000;
const MAX_LOCATION_NAME_LENGTH: usize = 255;

/// Post fields, sent either as JSON or as multipart text fields.
#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    caption: Option<String>,
    post_type: Option<String>,
    privacy_level: Option<String>,
    location_lat: Option<f64>,
    location_lng: Option<f64>,
    location_name: Option<String>,
}

impl PostInput {
    fn from_form(form: &MultipartForm) -> ApiResult<Self> {
        Ok(Self {
            caption: form.text("caption"),
            post_type: form.text("post_type"),
            privacy_level: form.text("privacy_level"),
            location_lat: parse_coordinate(form.text("location_lat"), "latitude")?,
            location_lng: parse_coordinate(form.text("location_lng"), "longitude")?,
            location_name: form.text("location_name"),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(flatten)]
    page: PageParams,
    filter: Option<String>,
}

fn parse_coordinate(value: Option<String>, name: &str) -> ApiResult<Option<f64>> {
    value
        .map(|v| v.parse::<f64>())
        .transpose()
        .map_err(|_| ApiError::bad_request(format!("Invalid {name}")))
}

fn parse_privacy(value: &str) -> ApiResult<PrivacyLevel> {
    PrivacyLevel::from_str(value).ok_or_else(|| {
        ApiError::bad_request("Invalid privacy level. Must be public, friends, or private")
    })
}

/// Checks shared by create and update.
fn validate_details(
    caption: Option<&str>,
    lat: Option<f64>,
    lng: Option<f64>,
    location_name: Option<&str>,
) -> ApiResult<()> {
    if caption.is_some_and(|c| c.chars().count() > MAX_CAPTION_LENGTH) {
        return Err(ApiError::bad_request(format!(
            "Caption must be at most {MAX_CAPTION_LENGTH} characters"
        )));
    }
    if location_name.is_some_and(|n| n.chars().count() > MAX_LOCATION_NAME_LENGTH) {
        return Err(ApiError::bad_request(format!(
            "Location name must be at most {MAX_LOCATION_NAME_LENGTH} characters"
        )));
    }
    if lat.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(ApiError::bad_request("Latitude must be between -90 and 90"));
    }
    if lng.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
        return Err(ApiError::bad_request(
            "Longitude must be between -180 and 180",
        ));
    }
    if lat.is_some() != lng.is_some() {
        return Err(ApiError::bad_request(
            "Latitude and longitude must be provided together",
        ));
    }
    Ok(())
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// POST /api/posts - Create a post from JSON or a multipart form.
pub async fn create_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    request: Request,
) -> ApiResult<impl IntoResponse> {
    let (input, file): (PostInput, Option<UploadedFile>) = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state).await?;
        let form = MultipartForm::read(multipart, "media").await?;
        (PostInput::from_form(&form)?, form.file)
    } else {
        let ApiJson(input) = ApiJson::<PostInput>::from_request(request, &state).await?;
        (input, None)
    };

    let post_type = input
        .post_type
        .as_deref()
        .and_then(PostType::from_str)
        .ok_or_else(|| ApiError::bad_request("Invalid post type. Must be text, photo, or video"))?;
    let privacy_level = parse_privacy(input.privacy_level.as_deref().unwrap_or_default())?;
    let caption = non_empty(input.caption);
    let location_name = non_empty(input.location_name);

    validate_details(
        caption.as_deref(),
        input.location_lat,
        input.location_lng,
        location_name.as_deref(),
    )?;

    let upload_kind = match post_type {
        PostType::Text => {
            if caption.is_none() {
                return Err(ApiError::bad_request("Caption is required for text posts"));
            }
            None
        }
        PostType::Photo => Some(UploadKind::Photo),
        PostType::Video => Some(UploadKind::Video),
    };

    // Text posts ignore any attached file
    let media_url = match (upload_kind, file) {
        (None, _) => None,
        (Some(_), None) => {
            return Err(ApiError::bad_request(format!(
                "A media file is required for {} posts",
                post_type.as_str()
            )));
        }
        (Some(kind), Some(file)) => {
            let extension = validate_upload(
                kind,
                &file.file_name,
                file.content_type.as_deref(),
                file.data.len(),
                state.config.max_post_upload_bytes,
            )
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
            Some(
                state
                    .media
                    .save(kind, user.user_id, &extension, &file.data)
                    .await?,
            )
        }
    };

    let new_post = NewPost {
        user_id: user.user_id,
        caption,
        post_type,
        media_url: media_url.clone(),
        privacy_level,
        location_lat: input.location_lat,
        location_lng: input.location_lng,
        location_name,
    };

    let post_id = match queries::insert_post(state.db.pool(), &new_post).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(url) = &media_url {
                state.media.remove(url).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(post_id, user_id = user.user_id, post_type = post_type.as_str(), "Post created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Post created successfully",
            "post_id": post_id,
            "media_url": media_url,
        })),
    ))
}

/// GET /api/posts/feed - Posts visible to the viewer, newest first.
pub async fn feed(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let page = Pagination::resolve(&params.page, 10, 50);
    let filter = non_empty(params.filter);

    let total = queries::count_feed(pool, user.user_id, filter.as_deref()).await?;
    let posts = queries::get_feed(
        pool,
        user.user_id,
        filter.as_deref(),
        page.limit,
        page.offset(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "total_posts": total,
        "current_page": page.page,
        "total_pages": page.total_pages(total),
        "limit": page.limit,
    })))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let post = queries::get_visible_post(state.db.pool(), user.user_id, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found or access denied"))?;

    Ok(Json(json!({ "success": true, "post": post })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    caption: Option<String>,
    privacy_level: Option<String>,
    location_lat: Option<f64>,
    location_lng: Option<f64>,
    location_name: Option<String>,
}

/// PUT /api/posts/:id - Owner edits caption, privacy or location.
pub async fn update_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let post = queries::get_post(pool, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if post.user_id != user.user_id {
        return Err(ApiError::forbidden("You can only edit your own posts"));
    }

    let changes = PostChanges {
        caption: req.caption.map(|c| c.trim().to_string()),
        privacy_level: req.privacy_level.as_deref().map(parse_privacy).transpose()?,
        location_lat: req.location_lat,
        location_lng: req.location_lng,
        location_name: req.location_name.map(|n| n.trim().to_string()),
    };
    if changes.is_empty() {
        return Err(ApiError::bad_request("No valid fields to update"));
    }

    validate_details(
        changes.caption.as_deref(),
        changes.location_lat,
        changes.location_lng,
        changes.location_name.as_deref(),
    )?;

    // A text post keeps a caption
    if post.post_type == PostType::Text.as_str()
        && changes.caption.as_deref().is_some_and(str::is_empty)
    {
        return Err(ApiError::bad_request("Caption is required for text posts"));
    }

    queries::update_post(pool, post_id, &changes).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post updated successfully",
    })))
}

/// DELETE /api/posts/:id - Owner or admin removes a post and its media.
pub async fn delete_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let post = queries::get_post(pool, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if post.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::forbidden("You can only delete your own posts"));
    }

    if !queries::delete_post(pool, post_id).await? {
        return Err(ApiError::not_found("Post not found"));
    }
    if let Some(url) = &post.media_url {
        state.media.remove(url).await;
    }

    tracing::info!(post_id, deleted_by = user.user_id, "Post deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted successfully",
    })))
}
