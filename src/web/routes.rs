use axum::routing::{delete, get, post, put};
use axum::Router;

use super::{admin, auth, comments, friends, geocode, likes, posts, reports, users, AppState};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/validate", get(auth::validate))
        // Users
        .route("/api/users/me", get(users::me).delete(users::delete_account))
        .route("/api/users/profile", put(users::update_profile))
        .route("/api/users/profile/picture", post(users::upload_profile_picture))
        .route("/api/users/password", put(users::update_password))
        .route("/api/users/blocked", get(users::blocked_users))
        .route("/api/users/:id", get(users::get_user))
        .route("/api/users/:id/posts", get(users::user_posts))
        .route(
            "/api/users/:id/block",
            post(users::block_user).delete(users::unblock_user),
        )
        // Posts
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/feed", get(posts::feed))
        .route(
            "/api/posts/:id",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/api/posts/:id/comments",
            get(comments::post_comments).post(comments::add_comment),
        )
        .route(
            "/api/posts/:id/like",
            post(likes::like_post).delete(likes::unlike_post),
        )
        .route("/api/posts/:id/liked", get(likes::has_liked_post))
        .route("/api/posts/:id/likes", get(likes::post_likes))
        // Comments
        .route(
            "/api/comments/:id",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/api/comments/:id/replies", get(comments::comment_replies))
        .route(
            "/api/comments/:id/like",
            post(likes::like_comment).delete(likes::unlike_comment),
        )
        .route("/api/comments/:id/likes", get(likes::comment_likes))
        // Friends
        .route("/api/friends", get(friends::list_friends))
        .route("/api/friends/requests", get(friends::list_requests))
        .route(
            "/api/friends/request/:user_id",
            post(friends::send_request).delete(friends::cancel_request),
        )
        .route("/api/friends/accept/:user_id", post(friends::accept_request))
        .route("/api/friends/reject/:user_id", post(friends::reject_request))
        .route("/api/friends/:user_id", delete(friends::remove_friend))
        // Reports
        .route("/api/reports", post(reports::create_report))
        .route("/api/reports/mine", get(reports::my_reports))
        // Admin
        .route("/api/admin/reports", get(admin::list_reports))
        .route(
            "/api/admin/reports/:id",
            get(admin::get_report).put(admin::update_report),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/api/admin/users/:id/suspend", post(admin::suspend_user))
        .route("/api/admin/users/:id/activate", post(admin::activate_user))
        // Location
        .route("/api/geocode", get(geocode::reverse_geocode))
}

async fn health() -> &'static str {
    "OK"
}
