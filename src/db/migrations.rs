use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    if current_version < 3 {
        debug!("Running migration v3");
        run_migration_v3(pool).await?;
        set_schema_version(pool, 3).await?;
    }

    if current_version < 4 {
        debug!("Running migration v4");
        run_migration_v4(pool).await?;
        set_schema_version(pool, 4).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: users, posts, comments, likes");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            bio TEXT,
            profile_picture TEXT,
            role TEXT NOT NULL DEFAULT 'user'
                CHECK (role IN ('user', 'admin')),
            account_status TEXT NOT NULL DEFAULT 'active'
                CHECK (account_status IN ('active', 'suspended', 'deleted')),
            registration_date TEXT NOT NULL DEFAULT (datetime('now')),
            last_login TEXT
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            post_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            caption TEXT,
            post_type TEXT NOT NULL DEFAULT 'text'
                CHECK (post_type IN ('text', 'photo', 'video')),
            media_url TEXT,
            privacy_level TEXT NOT NULL DEFAULT 'public'
                CHECK (privacy_level IN ('public', 'friends', 'private')),
            location_lat REAL,
            location_lng REAL,
            location_name TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comments (
            comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            parent_comment_id INTEGER REFERENCES comments(comment_id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comments table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS likes (
            like_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            post_id INTEGER REFERENCES posts(post_id) ON DELETE CASCADE,
            comment_id INTEGER REFERENCES comments(comment_id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            CHECK ((post_id IS NULL) != (comment_id IS NULL)),
            UNIQUE (user_id, post_id),
            UNIQUE (user_id, comment_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create likes table")?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_comment ON likes(comment_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: friendships, blocks, reports");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS friendships (
            friendship_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id_1 INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            user_id_2 INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted')),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            CHECK (user_id_1 != user_id_2),
            UNIQUE (user_id_1, user_id_2)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create friendships table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS blocks (
            block_id INTEGER PRIMARY KEY AUTOINCREMENT,
            blocker_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            blocked_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            UNIQUE (blocker_id, blocked_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create blocks table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS reports (
            report_id INTEGER PRIMARY KEY AUTOINCREMENT,
            reporter_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            reported_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            content_type TEXT NOT NULL
                CHECK (content_type IN ('user', 'post', 'comment')),
            content_id INTEGER NOT NULL,
            reason TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'reviewed', 'action_taken', 'dismissed')),
            admin_notes TEXT,
            reviewed_by INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
            reviewed_at TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create reports table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_friendships_2 ON friendships(user_id_2, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_reporter ON reports(reporter_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn run_migration_v3(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v3: token blacklist");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS token_blacklist (
            token_id TEXT PRIMARY KEY,
            expiration TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create token_blacklist table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_token_blacklist_expiration ON token_blacklist(expiration)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn run_migration_v4(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v4: unique friendship pairs and reports");

    let mut tx = pool.begin().await?;

    // Collapse rows left by crossing requests: an accepted row wins, then the oldest
    sqlx::query(
        r"
        DELETE FROM friendships
        WHERE EXISTS (
            SELECT 1 FROM friendships other
            WHERE min(other.user_id_1, other.user_id_2) = min(friendships.user_id_1, friendships.user_id_2)
              AND max(other.user_id_1, other.user_id_2) = max(friendships.user_id_1, friendships.user_id_2)
              AND other.friendship_id != friendships.friendship_id
              AND (
                  (other.status = 'accepted' AND friendships.status = 'pending')
                  OR (other.status = friendships.status
                      AND other.friendship_id < friendships.friendship_id)
              )
        )
        ",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to collapse duplicate friendships")?;

    sqlx::query(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friendships_pair
        ON friendships(min(user_id_1, user_id_2), max(user_id_1, user_id_2))
        ",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create friendship pair index")?;

    sqlx::query(
        r"
        DELETE FROM reports
        WHERE report_id NOT IN (
            SELECT min(report_id) FROM reports
            GROUP BY reporter_id, reported_id, content_type, content_id, reason
        )
        ",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to collapse duplicate reports")?;

    sqlx::query(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_unique
        ON reports(reporter_id, reported_id, content_type, content_id, reason)
        ",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create report uniqueness index")?;

    tx.commit().await?;
    Ok(())
}
