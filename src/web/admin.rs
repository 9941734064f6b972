use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use super::auth::{is_valid_email, is_valid_username};
use super::extract::{non_empty, ApiJson, ApiPath};
use super::AppState;
use crate::auth::RequireAdmin;
use crate::db as queries;
use crate::db::{
    AccountStatus, ReportContentType, ReportFilter, ReportStatus, ReportView, UserChanges,
    UserFilter, UserRole,
};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Deserialize)]
pub struct ReportListParams {
    #[serde(flatten)]
    page: PageParams,
    status: Option<String>,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportUpdate {
    status: Option<String>,
    admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    #[serde(flatten)]
    page: PageParams,
    status: Option<String>,
    role: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    role: Option<String>,
    account_status: Option<String>,
}

/// Admins may only move accounts between active and suspended.
fn parse_account_status(value: &str) -> ApiResult<AccountStatus> {
    match AccountStatus::from_str(value) {
        Some(status @ (AccountStatus::Active | AccountStatus::Suspended)) => Ok(status),
        _ => Err(ApiError::bad_request(
            "Invalid account status. Must be active or suspended",
        )),
    }
}

fn parse_role(value: &str) -> ApiResult<UserRole> {
    UserRole::from_str(value)
        .ok_or_else(|| ApiError::bad_request("Invalid role. Must be user or admin"))
}

fn parse_status(value: &str) -> ApiResult<ReportStatus> {
    ReportStatus::from_str(value).ok_or_else(|| {
        ApiError::bad_request(
            "Invalid status. Must be pending, reviewed, action_taken, or dismissed",
        )
    })
}

/// Snapshot of the reported content, or null when it has since been deleted.
async fn content_details(pool: &SqlitePool, report: &ReportView) -> anyhow::Result<Value> {
    let details = match ReportContentType::from_str(&report.content_type) {
        Some(ReportContentType::Post) => queries::get_post(pool, report.content_id)
            .await?
            .map(|p| {
                json!({
                    "caption": p.caption,
                    "post_type": p.post_type,
                    "media_url": p.media_url,
                    "privacy_level": p.privacy_level,
                    "created_at": p.created_at,
                })
            }),
        Some(ReportContentType::Comment) => queries::get_comment(pool, report.content_id)
            .await?
            .map(|c| {
                json!({
                    "content": c.content,
                    "post_id": c.post_id,
                    "created_at": c.created_at,
                })
            }),
        Some(ReportContentType::User) => queries::get_user_by_id(pool, report.content_id)
            .await?
            .map(|u| {
                json!({
                    "username": u.username,
                    "first_name": u.first_name,
                    "last_name": u.last_name,
                    "account_status": u.account_status,
                })
            }),
        None => None,
    };
    Ok(details.unwrap_or(Value::Null))
}

async fn with_details(pool: &SqlitePool, report: ReportView) -> anyhow::Result<Value> {
    let details = content_details(pool, &report).await?;
    let mut value = serde_json::to_value(report)?;
    value["content_details"] = details;
    Ok(value)
}

/// GET /api/admin/reports - Moderation queue.
pub async fn list_reports(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<ReportListParams>,
) -> ApiResult<Json<Value>> {
    let filter = ReportFilter {
        status: non_empty(params.status)
            .as_deref()
            .map(parse_status)
            .transpose()?,
        content_type: non_empty(params.content_type)
            .as_deref()
            .map(|c| {
                ReportContentType::from_str(c).ok_or_else(|| {
                    ApiError::bad_request("Invalid content type. Must be user, post, or comment")
                })
            })
            .transpose()?,
    };

    let pool = state.db.pool();
    let page = Pagination::resolve(&params.page, 20, 100);
    let total = queries::count_reports(pool, &filter).await?;

    let mut reports = Vec::new();
    for report in queries::list_reports(pool, &filter, page.limit, page.offset()).await? {
        reports.push(with_details(pool, report).await?);
    }

    Ok(Json(json!({
        "success": true,
        "reports": reports,
        "total_reports": total,
        "pagination": page.meta(total),
    })))
}

/// GET /api/admin/reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(report_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let report = queries::get_report(pool, report_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    Ok(Json(json!({
        "success": true,
        "report": with_details(pool, report).await?,
    })))
}

/// PUT /api/admin/reports/:id - Change status and/or notes.
pub async fn update_report(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(report_id): ApiPath<i64>,
    ApiJson(req): ApiJson<ReportUpdate>,
) -> ApiResult<Json<Value>> {
    let status = non_empty(req.status)
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let admin_notes = req.admin_notes.map(|n| n.trim().to_string());

    if status.is_none() && admin_notes.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let pool = state.db.pool();
    if !queries::update_report(
        pool,
        report_id,
        status,
        admin_notes.as_deref(),
        admin.user_id,
    )
    .await?
    {
        return Err(ApiError::not_found("Report not found"));
    }

    tracing::info!(
        report_id,
        admin_id = admin.user_id,
        status = status.map(|s| s.as_str()),
        "Report updated"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Report updated successfully",
    })))
}

/// POST /api/admin/users/:id/suspend
pub async fn suspend_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("You cannot suspend yourself"));
    }

    let pool = state.db.pool();
    let target = queries::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target.is_admin() {
        return Err(ApiError::forbidden("Cannot suspend an admin account"));
    }
    if target.account_status == AccountStatus::Suspended.as_str() {
        return Err(ApiError::bad_request("User is already suspended"));
    }

    queries::set_account_status(pool, user_id, AccountStatus::Suspended).await?;

    tracing::warn!(user_id, admin_id = admin.user_id, "User suspended");

    Ok(Json(json!({
        "success": true,
        "message": "User suspended successfully",
    })))
}

/// POST /api/admin/users/:id/activate - Lift a suspension.
pub async fn activate_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let target = queries::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target.account_status != AccountStatus::Suspended.as_str() {
        return Err(ApiError::bad_request("Only suspended users can be activated"));
    }

    queries::set_account_status(pool, user_id, AccountStatus::Active).await?;

    tracing::info!(user_id, admin_id = admin.user_id, "User reactivated");

    Ok(Json(json!({
        "success": true,
        "message": "User activated successfully",
    })))
}

/// GET /api/admin/users - Accounts with activity counts.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<UserListParams>,
) -> ApiResult<Json<Value>> {
    let filter = UserFilter {
        status: non_empty(params.status)
            .as_deref()
            .map(parse_account_status)
            .transpose()?,
        role: non_empty(params.role).as_deref().map(parse_role).transpose()?,
        search: non_empty(params.search),
    };

    let pool = state.db.pool();
    let page = Pagination::resolve(&params.page, 20, 100);
    let total = queries::count_users_admin(pool, &filter).await?;
    let users = queries::list_users_admin(pool, &filter, page.limit, page.offset()).await?;

    Ok(Json(json!({
        "success": true,
        "users": users,
        "total_users": total,
        "pagination": page.meta(total),
    })))
}

/// PUT /api/admin/users/:id - Edit account fields, role or status.
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UserUpdate>,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let target = queries::get_user_by_id(pool, user_id)
        .await?
        .filter(|u| u.account_status != AccountStatus::Deleted.as_str())
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let is_self = target.user_id == admin.user_id;
    if target.is_admin() && !is_self {
        return Err(ApiError::forbidden("Cannot modify other admin accounts"));
    }

    let changes = UserChanges {
        username: non_empty(req.username),
        email: non_empty(req.email),
        first_name: non_empty(req.first_name),
        last_name: non_empty(req.last_name),
        bio: req.bio.map(|b| b.trim().to_string()),
        role: non_empty(req.role).as_deref().map(parse_role).transpose()?,
        account_status: non_empty(req.account_status)
            .as_deref()
            .map(parse_account_status)
            .transpose()?,
    };
    if changes.is_empty() {
        return Err(ApiError::bad_request("No valid fields provided for update"));
    }

    if is_self && changes.role == Some(UserRole::User) {
        return Err(ApiError::forbidden("Cannot remove admin role from yourself"));
    }
    if is_self && changes.account_status == Some(AccountStatus::Suspended) {
        return Err(ApiError::bad_request("You cannot suspend yourself"));
    }

    if let Some(username) = &changes.username {
        if !is_valid_username(username) {
            return Err(ApiError::bad_request(
                "Username must be 3-50 characters of letters, numbers, dots or underscores",
            ));
        }
        if queries::get_user_by_username(pool, username)
            .await?
            .is_some_and(|u| u.user_id != user_id)
        {
            return Err(ApiError::bad_request("Username is already taken"));
        }
    }
    if let Some(email) = &changes.email {
        if !is_valid_email(email) {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if queries::get_user_by_email(pool, email)
            .await?
            .is_some_and(|u| u.user_id != user_id)
        {
            return Err(ApiError::bad_request("Email address is already taken"));
        }
    }

    match queries::update_user_admin(pool, user_id, &changes).await {
        Ok(()) => {}
        Err(e) if queries::is_unique_violation(&e) => {
            return Err(ApiError::bad_request("Username or email is already taken"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id, admin_id = admin.user_id, "User updated by admin");

    let user = queries::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "user": user,
    })))
}

/// DELETE /api/admin/users/:id - Soft-delete a non-admin account.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if user_id == admin.user_id {
        return Err(ApiError::forbidden("Cannot delete your own account"));
    }

    let pool = state.db.pool();
    let target = queries::get_user_by_id(pool, user_id)
        .await?
        .filter(|u| u.account_status != AccountStatus::Deleted.as_str())
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target.is_admin() {
        return Err(ApiError::forbidden("Cannot delete admin accounts"));
    }

    if !queries::soft_delete_user(pool, user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::warn!(user_id, admin_id = admin.user_id, "User deleted by admin");

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
        "deleted_user": {
            "user_id": target.user_id,
            "username": target.username,
        },
    })))
}
