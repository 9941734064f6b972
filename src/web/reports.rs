use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, ApiJson};
use super::AppState;
use crate::auth::RequireUser;
use crate::db as queries;
use crate::db::{NewReport, ReportContentType};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageParams, Pagination};

const MAX_REASON_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    reported_id: Option<i64>,
    content_type: Option<String>,
    content_id: Option<i64>,
    reason: Option<String>,
    description: Option<String>,
}

/// POST /api/reports - Report a user, post or comment.
pub async fn create_report(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<ReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(reported_id), Some(content_type), Some(content_id), Some(reason)) = (
        req.reported_id,
        non_empty(req.content_type),
        req.content_id,
        non_empty(req.reason),
    ) else {
        return Err(ApiError::bad_request(
            "reported_id, content_type, content_id and reason are required",
        ));
    };

    let content_type = ReportContentType::from_str(&content_type).ok_or_else(|| {
        ApiError::bad_request("Invalid content type. Must be user, post, or comment")
    })?;
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Reason must be at most {MAX_REASON_LENGTH} characters"
        )));
    }
    if reported_id == user.user_id {
        return Err(ApiError::bad_request("You cannot report yourself"));
    }

    let pool = state.db.pool();
    let reported = queries::get_user_by_id(pool, reported_id).await?;
    if !reported.is_some_and(|u| u.is_active()) {
        return Err(ApiError::not_found("Reported user not found"));
    }

    let owner_id = match content_type {
        ReportContentType::User => {
            if content_id != reported_id {
                return Err(ApiError::bad_request(
                    "For user reports, content_id must match reported_id",
                ));
            }
            reported_id
        }
        ReportContentType::Post => {
            queries::get_post(pool, content_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Post not found"))?
                .user_id
        }
        ReportContentType::Comment => {
            queries::get_comment(pool, content_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Comment not found"))?
                .user_id
        }
    };
    if owner_id != reported_id {
        return Err(ApiError::bad_request(
            "Reported content does not belong to the reported user",
        ));
    }

    let report = NewReport {
        reporter_id: user.user_id,
        reported_id,
        content_type,
        content_id,
        reason,
        description: non_empty(req.description),
    };
    let Some(report_id) = queries::create_report(pool, &report).await? else {
        return Err(ApiError::conflict("You have already reported this content"));
    };

    tracing::info!(
        report_id,
        reporter_id = user.user_id,
        reported_id,
        content_type = content_type.as_str(),
        "Report filed"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Report submitted successfully",
            "report_id": report_id,
        })),
    ))
}

/// GET /api/reports/mine - Reports the viewer has filed.
pub async fn my_reports(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let page = Pagination::resolve(&params, 20, 50);
    let total = queries::count_reports_by_reporter(pool, user.user_id).await?;
    let reports =
        queries::list_reports_by_reporter(pool, user.user_id, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "reports": reports,
        "total_reports": total,
        "pagination": page.meta(total),
    })))
}
