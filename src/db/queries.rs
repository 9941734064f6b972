use anyhow::{Context, Result};
use sqlx::{Sqlite, SqlitePool};

use super::models::{
    AccountStatus, AdminUserView, Comment, CommentView, Friendship, FriendshipStatus, Like,
    LikeView, NewPost, NewReport, NewUser, Post, PostChanges, PostView, RelatedUser,
    ReportFilter, ReportStatus, ReportView, RequestDirection, User, UserChanges, UserFilter,
    UserProfile,
};

// ========== Visibility ==========

/// Binds the viewer id as `viewer.id`. Must be the first `?` of any query
/// that uses it, so it goes directly after the driving table in FROM.
const VIEWER_JOIN: &str = "JOIN (SELECT ? AS id) viewer";

/// A post `p` written by `u` is visible to `viewer` when the author is active
/// and the post is the viewer's own, public, or friends-only with an accepted
/// friendship in either direction.
const VISIBLE_POST: &str = r"
    u.account_status = 'active'
    AND (
        p.user_id = viewer.id
        OR p.privacy_level = 'public'
        OR (
            p.privacy_level = 'friends'
            AND EXISTS (
                SELECT 1 FROM friendships f
                WHERE f.status = 'accepted'
                  AND ((f.user_id_1 = viewer.id AND f.user_id_2 = p.user_id)
                    OR (f.user_id_2 = viewer.id AND f.user_id_1 = p.user_id))
            )
        )
    )
";

const POST_VIEW_COLUMNS: &str = r"
    p.post_id, p.user_id, p.caption, p.post_type, p.media_url, p.privacy_level,
    p.location_lat, p.location_lng, p.location_name, p.created_at, p.updated_at,
    u.username, u.first_name, u.last_name, u.profile_picture,
    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.post_id) AS likes_count,
    (SELECT COUNT(*) FROM comments c
        JOIN users cu ON cu.user_id = c.user_id
        WHERE c.post_id = p.post_id AND cu.account_status = 'active') AS comments_count,
    EXISTS (SELECT 1 FROM likes l
        WHERE l.post_id = p.post_id AND l.user_id = viewer.id) AS user_has_liked
";

const COMMENT_VIEW_COLUMNS: &str = r"
    c.comment_id, c.post_id, c.user_id, c.parent_comment_id, c.content,
    c.created_at, c.updated_at,
    u.username, u.first_name, u.last_name, u.profile_picture,
    (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.comment_id) AS likes_count,
    EXISTS (SELECT 1 FROM likes l
        WHERE l.comment_id = c.comment_id AND l.user_id = viewer.id) AS user_has_liked,
    (SELECT COUNT(*) FROM comments r
        JOIN users ru ON ru.user_id = r.user_id
        WHERE r.parent_comment_id = c.comment_id AND ru.account_status = 'active') AS reply_count
";

const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

fn like_pattern(filter: &str) -> String {
    let escaped = filter
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

/// True if a query failed on a UNIQUE constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .is_some_and(unique_violation)
}

// ========== Users ==========

/// Create a user, returning its ID. The first account ever created is an admin.
///
/// A taken username or email fails with a UNIQUE violation, see
/// [`is_unique_violation`].
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (username, email, password_hash, first_name, last_name, date_of_birth, role)
        VALUES (?, ?, ?, ?, ?, ?,
            CASE WHEN (SELECT COUNT(*) FROM users) = 0 THEN 'admin' ELSE 'user' END)
        ",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.date_of_birth)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

/// Get a user by ID.
pub async fn get_user_by_id(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by id")
}

/// Get a user by username (case-insensitive).
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by username")
}

/// Get a user by email (case-insensitive).
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by email")
}

/// Record a successful login.
pub async fn update_last_login(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = datetime('now') WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update last login")?;
    Ok(())
}

/// Public profile with post and friend counts. Deleted accounts are hidden.
pub async fn get_user_profile(pool: &SqlitePool, user_id: i64) -> Result<Option<UserProfile>> {
    sqlx::query_as(
        r"
        SELECT
            u.user_id, u.username, u.first_name, u.last_name, u.bio,
            u.profile_picture, u.registration_date,
            (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.user_id) AS post_count,
            (SELECT COUNT(*) FROM friendships f
                WHERE f.status = 'accepted'
                  AND (f.user_id_1 = u.user_id OR f.user_id_2 = u.user_id)) AS friend_count
        FROM users u
        WHERE u.user_id = ? AND u.account_status != 'deleted'
        ",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch user profile")
}

/// Update profile text fields. `None` leaves a field untouched.
pub async fn update_user_profile(
    pool: &SqlitePool,
    user_id: i64,
    first_name: Option<&str>,
    last_name: Option<&str>,
    bio: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE users
        SET first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            bio = COALESCE(?, bio)
        WHERE user_id = ?
        ",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(bio)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;
    Ok(())
}

/// Set the profile picture path, returning the previous one.
pub async fn set_profile_picture(
    pool: &SqlitePool,
    user_id: i64,
    picture: &str,
) -> Result<Option<String>> {
    let mut tx = pool.begin().await?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT profile_picture FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read profile picture")?;

    sqlx::query("UPDATE users SET profile_picture = ? WHERE user_id = ?")
        .bind(picture)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to set profile picture")?;

    tx.commit().await?;
    Ok(previous.and_then(|(p,)| p))
}

/// Replace a user's password hash.
pub async fn update_user_password(
    pool: &SqlitePool,
    user_id: i64,
    password_hash: &str,
) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE user_id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update password")?;
    Ok(())
}

/// Change an account's status.
pub async fn set_account_status(
    pool: &SqlitePool,
    user_id: i64,
    status: AccountStatus,
) -> Result<()> {
    sqlx::query("UPDATE users SET account_status = ? WHERE user_id = ?")
        .bind(status.as_str())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update account status")?;
    Ok(())
}

/// Soft-delete an account: mark it deleted, free its username and email for
/// reuse and drop its friendships and pending requests. Returns false if the
/// account does not exist or is already deleted.
pub async fn soft_delete_user(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r"
        UPDATE users
        SET account_status = 'deleted',
            username = 'deleted_' || user_id || '_' || username,
            email = 'deleted_' || user_id || '_' || email
        WHERE user_id = ? AND account_status != 'deleted'
        ",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete user")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM friendships WHERE user_id_1 = ? OR user_id_2 = ?")
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to drop friendships of deleted user")?;

    tx.commit().await?;
    Ok(true)
}

const ADMIN_USER_FILTER: &str = r"
    u.account_status != 'deleted'
    AND (? IS NULL OR u.account_status = ?)
    AND (? IS NULL OR u.role = ?)
    AND (? IS NULL
        OR u.username LIKE ? ESCAPE '\'
        OR u.email LIKE ? ESCAPE '\'
        OR (u.first_name || ' ' || u.last_name) LIKE ? ESCAPE '\')
";

fn bind_user_filter<'q, O>(
    query: sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &UserFilter,
) -> sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
    let status = filter.status.map(|s| s.as_str());
    let role = filter.role.map(|r| r.as_str());
    let pattern = filter.search.as_deref().map(like_pattern);
    query
        .bind(status)
        .bind(status)
        .bind(role)
        .bind(role)
        .bind(pattern.clone())
        .bind(pattern.clone())
        .bind(pattern.clone())
        .bind(pattern)
}

pub async fn count_users_admin(pool: &SqlitePool, filter: &UserFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM users u WHERE {ADMIN_USER_FILTER}");
    let (count,) = bind_user_filter(sqlx::query_as::<Sqlite, (i64,)>(&sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(count)
}

/// Accounts for the admin user table, newest registrations first.
pub async fn list_users_admin(
    pool: &SqlitePool,
    filter: &UserFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<AdminUserView>> {
    let sql = format!(
        r"
        SELECT
            u.user_id, u.username, u.email, u.first_name, u.last_name,
            u.profile_picture, u.bio, u.date_of_birth, u.registration_date,
            u.last_login, u.account_status, u.role,
            (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.user_id) AS posts_count,
            (SELECT COUNT(*) FROM reports r
                WHERE r.reported_id = u.user_id AND r.content_type = 'user') AS reports_count,
            (SELECT COUNT(*) FROM friendships f
                WHERE f.status = 'accepted'
                  AND (f.user_id_1 = u.user_id OR f.user_id_2 = u.user_id)) AS friends_count
        FROM users u
        WHERE {ADMIN_USER_FILTER}
        ORDER BY u.registration_date DESC, u.user_id DESC
        LIMIT ? OFFSET ?
        "
    );
    bind_user_filter(sqlx::query_as::<Sqlite, AdminUserView>(&sql), filter)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")
}

/// Apply admin edits to an account. A taken username or email fails with a
/// UNIQUE violation, see [`is_unique_violation`].
pub async fn update_user_admin(
    pool: &SqlitePool,
    user_id: i64,
    changes: &UserChanges,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE users
        SET username = COALESCE(?, username),
            email = COALESCE(?, email),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            bio = COALESCE(?, bio),
            role = COALESCE(?, role),
            account_status = COALESCE(?, account_status)
        WHERE user_id = ?
        ",
    )
    .bind(&changes.username)
    .bind(&changes.email)
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.bio)
    .bind(changes.role.map(|r| r.as_str()))
    .bind(changes.account_status.map(|s| s.as_str()))
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to update user")?;
    Ok(())
}

// ========== Token Blacklist ==========

/// Revoke a token until its expiry. Returns false if it was already revoked.
pub async fn blacklist_token(pool: &SqlitePool, token_id: &str, expires_at: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO token_blacklist (token_id, expiration) VALUES (?, datetime(?, 'unixepoch'))",
    )
    .bind(token_id)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to blacklist token")?;

    Ok(result.rows_affected() > 0)
}

/// Check whether a token id has been revoked.
pub async fn is_token_blacklisted(pool: &SqlitePool, token_id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM token_blacklist WHERE token_id = ?")
        .bind(token_id)
        .fetch_optional(pool)
        .await
        .context("Failed to check token blacklist")?;
    Ok(row.is_some())
}

/// Drop blacklist entries whose tokens have expired anyway.
pub async fn delete_expired_blacklist_entries(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM token_blacklist WHERE expiration < datetime('now')")
        .execute(pool)
        .await
        .context("Failed to delete expired blacklist entries")?;
    Ok(result.rows_affected())
}

// ========== Posts ==========

/// Insert a new post, returning its ID.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO posts (user_id, caption, post_type, media_url, privacy_level,
                           location_lat, location_lng, location_name)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post.user_id)
    .bind(&post.caption)
    .bind(post.post_type.as_str())
    .bind(&post.media_url)
    .bind(post.privacy_level.as_str())
    .bind(post.location_lat)
    .bind(post.location_lng)
    .bind(&post.location_name)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok(result.last_insert_rowid())
}

/// Get a post by ID regardless of visibility.
pub async fn get_post(pool: &SqlitePool, post_id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get a post as seen by `viewer_id`, or `None` if it is missing or hidden.
pub async fn get_visible_post(
    pool: &SqlitePool,
    viewer_id: i64,
    post_id: i64,
) -> Result<Option<PostView>> {
    let sql = format!(
        r"
        SELECT {POST_VIEW_COLUMNS}
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE p.post_id = ? AND {VISIBLE_POST}
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch visible post")
}

/// Check whether `viewer_id` may see a post.
pub async fn can_view_post(pool: &SqlitePool, viewer_id: i64, post_id: i64) -> Result<bool> {
    let sql = format!(
        r"
        SELECT 1
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE p.post_id = ? AND {VISIBLE_POST}
        "
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to check post visibility")?;
    Ok(row.is_some())
}

fn feed_filter_clause(filter: Option<&str>) -> &'static str {
    if filter.is_some() {
        r"AND (p.caption LIKE ? ESCAPE '\' OR p.location_name LIKE ? ESCAPE '\')"
    } else {
        ""
    }
}

/// Posts visible to `viewer_id`, newest first, optionally filtered by a
/// substring of caption or location name.
pub async fn get_feed(
    pool: &SqlitePool,
    viewer_id: i64,
    filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostView>> {
    let sql = format!(
        r"
        SELECT {POST_VIEW_COLUMNS}
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE {VISIBLE_POST} {filter_clause}
        ORDER BY p.created_at DESC, p.post_id DESC
        LIMIT ? OFFSET ?
        ",
        filter_clause = feed_filter_clause(filter)
    );

    let mut query = sqlx::query_as::<Sqlite, PostView>(&sql).bind(viewer_id);
    if let Some(filter) = filter {
        let pattern = like_pattern(filter);
        query = query.bind(pattern.clone()).bind(pattern);
    }

    query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch feed")
}

/// Count the posts `get_feed` would page over.
pub async fn count_feed(pool: &SqlitePool, viewer_id: i64, filter: Option<&str>) -> Result<i64> {
    let sql = format!(
        r"
        SELECT COUNT(*)
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE {VISIBLE_POST} {filter_clause}
        ",
        filter_clause = feed_filter_clause(filter)
    );

    let mut query = sqlx::query_as::<Sqlite, (i64,)>(&sql).bind(viewer_id);
    if let Some(filter) = filter {
        let pattern = like_pattern(filter);
        query = query.bind(pattern.clone()).bind(pattern);
    }

    let (count,) = query
        .fetch_one(pool)
        .await
        .context("Failed to count feed posts")?;
    Ok(count)
}

/// Posts by `author_id` that `viewer_id` may see, newest first.
pub async fn get_user_posts(
    pool: &SqlitePool,
    viewer_id: i64,
    author_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostView>> {
    let sql = format!(
        r"
        SELECT {POST_VIEW_COLUMNS}
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE p.user_id = ? AND {VISIBLE_POST}
        ORDER BY p.created_at DESC, p.post_id DESC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch user posts")
}

/// Count the posts `get_user_posts` would page over.
pub async fn count_user_posts(pool: &SqlitePool, viewer_id: i64, author_id: i64) -> Result<i64> {
    let sql = format!(
        r"
        SELECT COUNT(*)
        FROM posts p
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = p.user_id
        WHERE p.user_id = ? AND {VISIBLE_POST}
        "
    );
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(author_id)
        .fetch_one(pool)
        .await
        .context("Failed to count user posts")?;
    Ok(count)
}

/// Apply a partial update to a post and bump `updated_at`.
pub async fn update_post(pool: &SqlitePool, post_id: i64, changes: &PostChanges) -> Result<()> {
    let sql = format!(
        r"
        UPDATE posts
        SET caption = COALESCE(?, caption),
            privacy_level = COALESCE(?, privacy_level),
            location_lat = COALESCE(?, location_lat),
            location_lng = COALESCE(?, location_lng),
            location_name = COALESCE(?, location_name),
            updated_at = {NOW}
        WHERE post_id = ?
        "
    );
    sqlx::query(&sql)
        .bind(&changes.caption)
        .bind(changes.privacy_level.map(|p| p.as_str()))
        .bind(changes.location_lat)
        .bind(changes.location_lng)
        .bind(&changes.location_name)
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to update post")?;
    Ok(())
}

/// Delete a post together with its comments and likes.
pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM likes WHERE comment_id IN (SELECT comment_id FROM comments WHERE post_id = ?)",
    )
    .bind(post_id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comment likes")?;

    sqlx::query("DELETE FROM likes WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post likes")?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post comments")?;

    let result = sqlx::query("DELETE FROM posts WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

// ========== Comments ==========

/// Insert a comment or reply, returning its ID.
pub async fn insert_comment(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    parent_comment_id: Option<i64>,
    content: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO comments (post_id, user_id, parent_comment_id, content) VALUES (?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(parent_comment_id)
    .bind(content)
    .execute(pool)
    .await
    .context("Failed to insert comment")?;

    Ok(result.last_insert_rowid())
}

/// Get a comment by ID regardless of visibility.
pub async fn get_comment(pool: &SqlitePool, comment_id: i64) -> Result<Option<Comment>> {
    sqlx::query_as("SELECT * FROM comments WHERE comment_id = ?")
        .bind(comment_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch comment")
}

/// Get a comment whose post `viewer_id` may see.
pub async fn get_visible_comment(
    pool: &SqlitePool,
    viewer_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>> {
    let sql = format!(
        r"
        SELECT c.*
        FROM comments c
        {VIEWER_JOIN}
        JOIN posts p ON p.post_id = c.post_id
        JOIN users u ON u.user_id = p.user_id
        WHERE c.comment_id = ? AND {VISIBLE_POST}
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(comment_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch visible comment")
}

/// Get a comment with author and like details.
pub async fn get_comment_view(
    pool: &SqlitePool,
    viewer_id: i64,
    comment_id: i64,
) -> Result<Option<CommentView>> {
    let sql = format!(
        r"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = c.user_id
        WHERE c.comment_id = ?
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(comment_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch comment view")
}

/// Count top-level comments on a post by active users.
pub async fn count_top_level_comments(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*)
        FROM comments c
        JOIN users u ON u.user_id = c.user_id
        WHERE c.post_id = ? AND c.parent_comment_id IS NULL AND u.account_status = 'active'
        ",
    )
    .bind(post_id)
    .fetch_one(pool)
    .await
    .context("Failed to count comments")?;
    Ok(count)
}

/// A page of top-level comments on a post, oldest first.
pub async fn get_top_level_comments(
    pool: &SqlitePool,
    viewer_id: i64,
    post_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommentView>> {
    let sql = format!(
        r"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = c.user_id
        WHERE c.post_id = ? AND c.parent_comment_id IS NULL AND u.account_status = 'active'
        ORDER BY c.created_at ASC, c.comment_id ASC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch comments")
}

/// The first `per_parent` direct replies (oldest first) of each parent comment.
pub async fn get_replies_for_parents(
    pool: &SqlitePool,
    viewer_id: i64,
    parent_ids: &[i64],
    per_parent: i64,
) -> Result<Vec<CommentView>> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; parent_ids.len()].join(", ");
    let sql = format!(
        r"
        SELECT * FROM (
            SELECT {COMMENT_VIEW_COLUMNS},
                ROW_NUMBER() OVER (
                    PARTITION BY c.parent_comment_id
                    ORDER BY c.created_at ASC, c.comment_id ASC
                ) AS reply_rank
            FROM comments c
            {VIEWER_JOIN}
            JOIN users u ON u.user_id = c.user_id
            WHERE c.parent_comment_id IN ({placeholders}) AND u.account_status = 'active'
        )
        WHERE reply_rank <= ?
        ORDER BY parent_comment_id, created_at ASC, comment_id ASC
        "
    );

    let mut query = sqlx::query_as::<Sqlite, CommentView>(&sql).bind(viewer_id);
    for id in parent_ids {
        query = query.bind(*id);
    }

    query
        .bind(per_parent)
        .fetch_all(pool)
        .await
        .context("Failed to fetch replies")
}

/// Count direct replies to a comment by active users.
pub async fn count_replies(pool: &SqlitePool, parent_comment_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*)
        FROM comments c
        JOIN users u ON u.user_id = c.user_id
        WHERE c.parent_comment_id = ? AND u.account_status = 'active'
        ",
    )
    .bind(parent_comment_id)
    .fetch_one(pool)
    .await
    .context("Failed to count replies")?;
    Ok(count)
}

/// A page of direct replies to a comment, oldest first.
pub async fn get_replies(
    pool: &SqlitePool,
    viewer_id: i64,
    parent_comment_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommentView>> {
    let sql = format!(
        r"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        {VIEWER_JOIN}
        JOIN users u ON u.user_id = c.user_id
        WHERE c.parent_comment_id = ? AND u.account_status = 'active'
        ORDER BY c.created_at ASC, c.comment_id ASC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(viewer_id)
        .bind(parent_comment_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch replies")
}

/// Replace a comment's text and bump `updated_at`.
pub async fn update_comment(pool: &SqlitePool, comment_id: i64, content: &str) -> Result<()> {
    let sql = format!("UPDATE comments SET content = ?, updated_at = {NOW} WHERE comment_id = ?");
    sqlx::query(&sql)
        .bind(content)
        .bind(comment_id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;
    Ok(())
}

/// Delete a comment. Replies and likes go with it.
pub async fn delete_comment(pool: &SqlitePool, comment_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE comment_id = ?")
        .bind(comment_id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(result.rows_affected() > 0)
}

// ========== Likes ==========

/// Like a post. Returns false if the user already liked it.
pub async fn like_post(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO likes (user_id, post_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to like post")?;
    Ok(result.rows_affected() > 0)
}

/// Remove a post like. Returns false if there was none.
pub async fn unlike_post(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
        .bind(user_id)
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to unlike post")?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_post_likes(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count post likes")?;
    Ok(count)
}

/// Likes on a post from active accounts, matching [`get_post_likes`].
pub async fn count_active_post_likers(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*) FROM likes l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.post_id = ? AND u.account_status = 'active'
        ",
    )
    .bind(post_id)
    .fetch_one(pool)
    .await
    .context("Failed to count post likers")?;
    Ok(count)
}

/// The viewer's like on a post, if any.
pub async fn get_post_like(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<Option<Like>> {
    sqlx::query_as("SELECT like_id, created_at FROM likes WHERE user_id = ? AND post_id = ?")
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post like")
}

/// Users who liked a post, newest first.
pub async fn get_post_likes(
    pool: &SqlitePool,
    post_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<LikeView>> {
    sqlx::query_as(
        r"
        SELECT l.like_id, u.user_id, u.username, u.first_name, u.last_name,
               u.profile_picture, l.created_at AS liked_at
        FROM likes l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.post_id = ? AND u.account_status = 'active'
        ORDER BY l.created_at DESC, l.like_id DESC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to fetch post likes")
}

/// Like a comment. Returns false if the user already liked it.
pub async fn like_comment(pool: &SqlitePool, user_id: i64, comment_id: i64) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO likes (user_id, comment_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(comment_id)
        .execute(pool)
        .await
        .context("Failed to like comment")?;
    Ok(result.rows_affected() > 0)
}

/// Remove a comment like. Returns false if there was none.
pub async fn unlike_comment(pool: &SqlitePool, user_id: i64, comment_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND comment_id = ?")
        .bind(user_id)
        .bind(comment_id)
        .execute(pool)
        .await
        .context("Failed to unlike comment")?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_comment_likes(pool: &SqlitePool, comment_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE comment_id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comment likes")?;
    Ok(count)
}

pub async fn count_active_comment_likers(pool: &SqlitePool, comment_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*) FROM likes l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.comment_id = ? AND u.account_status = 'active'
        ",
    )
    .bind(comment_id)
    .fetch_one(pool)
    .await
    .context("Failed to count comment likers")?;
    Ok(count)
}

/// Users who liked a comment, newest first.
pub async fn get_comment_likes(
    pool: &SqlitePool,
    comment_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<LikeView>> {
    sqlx::query_as(
        r"
        SELECT l.like_id, u.user_id, u.username, u.first_name, u.last_name,
               u.profile_picture, l.created_at AS liked_at
        FROM likes l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.comment_id = ? AND u.account_status = 'active'
        ORDER BY l.created_at DESC, l.like_id DESC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(comment_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to fetch comment likes")
}

// ========== Friendships ==========

/// The friendship row between two users in either direction.
pub async fn get_friendship_between(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
) -> Result<Option<Friendship>> {
    sqlx::query_as(
        r"
        SELECT * FROM friendships
        WHERE (user_id_1 = ? AND user_id_2 = ?) OR (user_id_1 = ? AND user_id_2 = ?)
        ",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch friendship")
}

/// Create a pending request from `requester_id` to `recipient_id`.
///
/// Returns `None` if any row already exists for the pair, in either direction.
pub async fn create_friend_request(
    pool: &SqlitePool,
    requester_id: i64,
    recipient_id: i64,
) -> Result<Option<i64>> {
    let result = sqlx::query(
        "INSERT INTO friendships (user_id_1, user_id_2, status) VALUES (?, ?, 'pending')",
    )
    .bind(requester_id)
    .bind(recipient_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(Some(done.last_insert_rowid())),
        Err(e) if unique_violation(&e) => Ok(None),
        Err(e) => Err(e).context("Failed to create friend request"),
    }
}

/// Accept a pending request. Returns false if no such request exists.
pub async fn accept_friend_request(
    pool: &SqlitePool,
    requester_id: i64,
    recipient_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE friendships SET status = ?
        WHERE user_id_1 = ? AND user_id_2 = ? AND status = 'pending'
        ",
    )
    .bind(FriendshipStatus::Accepted.as_str())
    .bind(requester_id)
    .bind(recipient_id)
    .execute(pool)
    .await
    .context("Failed to accept friend request")?;

    Ok(result.rows_affected() > 0)
}

/// Delete a pending request. Returns false if no such request exists.
pub async fn delete_friend_request(
    pool: &SqlitePool,
    requester_id: i64,
    recipient_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM friendships WHERE user_id_1 = ? AND user_id_2 = ? AND status = 'pending'",
    )
    .bind(requester_id)
    .bind(recipient_id)
    .execute(pool)
    .await
    .context("Failed to delete friend request")?;

    Ok(result.rows_affected() > 0)
}

/// Remove an accepted friendship in either direction.
pub async fn delete_friendship(pool: &SqlitePool, user_a: i64, user_b: i64) -> Result<bool> {
    let result = sqlx::query(
        r"
        DELETE FROM friendships
        WHERE status = 'accepted'
          AND ((user_id_1 = ? AND user_id_2 = ?) OR (user_id_1 = ? AND user_id_2 = ?))
        ",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .execute(pool)
    .await
    .context("Failed to delete friendship")?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_friends(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*)
        FROM friendships f
        JOIN users u ON u.user_id = CASE WHEN f.user_id_1 = ? THEN f.user_id_2 ELSE f.user_id_1 END
        WHERE f.status = 'accepted' AND (f.user_id_1 = ? OR f.user_id_2 = ?)
          AND u.account_status = 'active'
        ",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count friends")?;
    Ok(count)
}

/// Accepted friends of a user, most recent first.
pub async fn get_friends(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<RelatedUser>> {
    sqlx::query_as(
        r"
        SELECT f.friendship_id AS relation_id, u.user_id, u.username, u.first_name,
               u.last_name, u.profile_picture, f.created_at AS since
        FROM friendships f
        JOIN users u ON u.user_id = CASE WHEN f.user_id_1 = ? THEN f.user_id_2 ELSE f.user_id_1 END
        WHERE f.status = 'accepted' AND (f.user_id_1 = ? OR f.user_id_2 = ?)
          AND u.account_status = 'active'
        ORDER BY f.created_at DESC, f.friendship_id DESC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to fetch friends")
}

/// SQL pieces selecting the other party of a pending request.
const fn request_sides(direction: RequestDirection) -> (&'static str, &'static str) {
    match direction {
        // (column matching the caller, column naming the other user)
        RequestDirection::Received => ("f.user_id_2", "f.user_id_1"),
        RequestDirection::Sent => ("f.user_id_1", "f.user_id_2"),
    }
}

pub async fn count_friend_requests(
    pool: &SqlitePool,
    user_id: i64,
    direction: RequestDirection,
) -> Result<i64> {
    let (mine, other) = request_sides(direction);
    let sql = format!(
        r"
        SELECT COUNT(*)
        FROM friendships f
        JOIN users u ON u.user_id = {other}
        WHERE {mine} = ? AND f.status = 'pending' AND u.account_status = 'active'
        "
    );
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count friend requests")?;
    Ok(count)
}

/// Pending requests received by or sent from a user, newest first.
pub async fn get_friend_requests(
    pool: &SqlitePool,
    user_id: i64,
    direction: RequestDirection,
    limit: i64,
    offset: i64,
) -> Result<Vec<RelatedUser>> {
    let (mine, other) = request_sides(direction);
    let sql = format!(
        r"
        SELECT f.friendship_id AS relation_id, u.user_id, u.username, u.first_name,
               u.last_name, u.profile_picture, f.created_at AS since
        FROM friendships f
        JOIN users u ON u.user_id = {other}
        WHERE {mine} = ? AND f.status = 'pending' AND u.account_status = 'active'
        ORDER BY f.created_at DESC, f.friendship_id DESC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch friend requests")
}

// ========== Blocks ==========

/// True if either user has blocked the other.
pub async fn is_blocked_either_way(pool: &SqlitePool, user_a: i64, user_b: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r"
        SELECT 1 FROM blocks
        WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?)
        LIMIT 1
        ",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .fetch_optional(pool)
    .await
    .context("Failed to check blocks")?;
    Ok(row.is_some())
}

/// True if `blocker_id` has blocked `blocked_id`.
pub async fn has_blocked(pool: &SqlitePool, blocker_id: i64, blocked_id: i64) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .fetch_optional(pool)
            .await
            .context("Failed to check block")?;
    Ok(row.is_some())
}

/// Block a user, dropping any friendship or pending request between the two.
/// Returns `None` if the block already exists.
pub async fn block_user(
    pool: &SqlitePool,
    blocker_id: i64,
    blocked_id: i64,
) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
        DELETE FROM friendships
        WHERE (user_id_1 = ? AND user_id_2 = ?) OR (user_id_1 = ? AND user_id_2 = ?)
        ",
    )
    .bind(blocker_id)
    .bind(blocked_id)
    .bind(blocked_id)
    .bind(blocker_id)
    .execute(&mut *tx)
    .await
    .context("Failed to remove friendship before block")?;

    let result = sqlx::query("INSERT INTO blocks (blocker_id, blocked_id) VALUES (?, ?)")
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await;

    let block_id = match result {
        Ok(done) => done.last_insert_rowid(),
        // Dropping the transaction rolls back the friendship delete
        Err(e) if unique_violation(&e) => return Ok(None),
        Err(e) => return Err(e).context("Failed to insert block"),
    };

    tx.commit().await?;
    Ok(Some(block_id))
}

/// Remove a block. Returns false if there was none.
pub async fn unblock_user(pool: &SqlitePool, blocker_id: i64, blocked_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(pool)
        .await
        .context("Failed to unblock user")?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_blocked_users(pool: &SqlitePool, blocker_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE blocker_id = ?")
        .bind(blocker_id)
        .fetch_one(pool)
        .await
        .context("Failed to count blocked users")?;
    Ok(count)
}

/// Users blocked by `blocker_id`, most recent first.
pub async fn get_blocked_users(
    pool: &SqlitePool,
    blocker_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<RelatedUser>> {
    sqlx::query_as(
        r"
        SELECT b.block_id AS relation_id, u.user_id, u.username, u.first_name,
               u.last_name, u.profile_picture, b.created_at AS since
        FROM blocks b
        JOIN users u ON u.user_id = b.blocked_id
        WHERE b.blocker_id = ?
        ORDER BY b.created_at DESC, b.block_id DESC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(blocker_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to fetch blocked users")
}

// ========== Reports ==========

const REPORT_VIEW_SELECT: &str = r"
    SELECT r.report_id, r.reporter_id, reporter.username AS reporter_username,
           r.reported_id, reported.username AS reported_username,
           r.content_type, r.content_id, r.reason, r.description, r.status,
           r.admin_notes, r.reviewed_by, reviewer.username AS reviewer_username,
           r.reviewed_at, r.created_at
    FROM reports r
    JOIN users reporter ON reporter.user_id = r.reporter_id
    JOIN users reported ON reported.user_id = r.reported_id
    LEFT JOIN users reviewer ON reviewer.user_id = r.reviewed_by
";

/// File a report. Returns `None` if the same reporter already filed an
/// identical report.
pub async fn create_report(pool: &SqlitePool, report: &NewReport) -> Result<Option<i64>> {
    let result = sqlx::query(
        r"
        INSERT INTO reports (reporter_id, reported_id, content_type, content_id, reason, description)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(report.reporter_id)
    .bind(report.reported_id)
    .bind(report.content_type.as_str())
    .bind(report.content_id)
    .bind(&report.reason)
    .bind(&report.description)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(Some(done.last_insert_rowid())),
        Err(e) if unique_violation(&e) => Ok(None),
        Err(e) => Err(e).context("Failed to insert report"),
    }
}

/// Get a report with usernames attached.
pub async fn get_report(pool: &SqlitePool, report_id: i64) -> Result<Option<ReportView>> {
    let sql = format!("{REPORT_VIEW_SELECT} WHERE r.report_id = ?");
    sqlx::query_as(&sql)
        .bind(report_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch report")
}

pub async fn count_reports(pool: &SqlitePool, filter: &ReportFilter) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*) FROM reports r
        WHERE (? IS NULL OR r.status = ?) AND (? IS NULL OR r.content_type = ?)
        ",
    )
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.content_type.map(|c| c.as_str()))
    .bind(filter.content_type.map(|c| c.as_str()))
    .fetch_one(pool)
    .await
    .context("Failed to count reports")?;
    Ok(count)
}

/// The moderation queue: pending first, then reviewed, actioned and
/// dismissed, newest first within each status.
pub async fn list_reports(
    pool: &SqlitePool,
    filter: &ReportFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<ReportView>> {
    let sql = format!(
        r"
        {REPORT_VIEW_SELECT}
        WHERE (? IS NULL OR r.status = ?) AND (? IS NULL OR r.content_type = ?)
        ORDER BY CASE r.status
                    WHEN 'pending' THEN 1
                    WHEN 'reviewed' THEN 2
                    WHEN 'action_taken' THEN 3
                    WHEN 'dismissed' THEN 4
                 END,
                 r.created_at DESC, r.report_id DESC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.content_type.map(|c| c.as_str()))
        .bind(filter.content_type.map(|c| c.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list reports")
}

pub async fn count_reports_by_reporter(pool: &SqlitePool, reporter_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports WHERE reporter_id = ?")
        .bind(reporter_id)
        .fetch_one(pool)
        .await
        .context("Failed to count reports by reporter")?;
    Ok(count)
}

/// Reports filed by a user, newest first.
pub async fn list_reports_by_reporter(
    pool: &SqlitePool,
    reporter_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ReportView>> {
    let sql = format!(
        r"
        {REPORT_VIEW_SELECT}
        WHERE r.reporter_id = ?
        ORDER BY r.created_at DESC, r.report_id DESC
        LIMIT ? OFFSET ?
        "
    );
    sqlx::query_as(&sql)
        .bind(reporter_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list reports by reporter")
}

/// Update a report's status and notes. Leaving `pending` stamps the reviewer
/// and review time.
pub async fn update_report(
    pool: &SqlitePool,
    report_id: i64,
    status: Option<ReportStatus>,
    admin_notes: Option<&str>,
    reviewer_id: i64,
) -> Result<bool> {
    let status = status.map(|s| s.as_str());
    let sql = format!(
        r"
        UPDATE reports
        SET status = COALESCE(?, status),
            admin_notes = COALESCE(?, admin_notes),
            reviewed_by = CASE
                WHEN status = 'pending' AND COALESCE(?, status) != 'pending' THEN ?
                ELSE reviewed_by END,
            reviewed_at = CASE
                WHEN status = 'pending' AND COALESCE(?, status) != 'pending' THEN {NOW}
                ELSE reviewed_at END
        WHERE report_id = ?
        "
    );
    let result = sqlx::query(&sql)
        .bind(status)
        .bind(admin_notes)
        .bind(status)
        .bind(reviewer_id)
        .bind(status)
        .bind(report_id)
        .execute(pool)
        .await
        .context("Failed to update report")?;

    Ok(result.rows_affected() > 0)
}
