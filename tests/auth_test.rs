//! Integration tests for authentication: passwords, tokens and revocation.

use std::time::Duration;

use socialconnect::auth::cleanup::{cleanup_once, run_cleanup_worker, CleanupConfig};
use socialconnect::auth::{
    hash_password, validate_password_length, validate_password_strength, verify_password,
    TokenError, TokenKeys, TokenType,
};
use socialconnect::db::{
    blacklist_token, create_user, get_user_by_email, get_user_by_username, is_token_blacklisted,
    update_user_password, Database, NewUser,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn keys() -> TokenKeys {
    TokenKeys::new(
        b"integration-test-secret-integration",
        Duration::from_secs(3600),
    )
}

fn new_user(username: &str, password_hash: String) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        date_of_birth: "1990-01-01".to_string(),
    }
}

#[tokio::test]
async fn test_password_hashing() {
    let password = "SecureP4ssword";
    let hash = hash_password(password).expect("Failed to hash password");

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(password, &hash).expect("Failed to verify password"));
    assert!(!verify_password("WrongPassword1", &hash).expect("Failed to verify password"));

    // Salted: same input, different hash
    let again = hash_password(password).expect("Failed to hash password");
    assert_ne!(hash, again);
}

#[tokio::test]
async fn test_password_rules() {
    assert!(validate_password_strength("abcdefg1").is_ok());
    assert!(validate_password_strength("MyP4ssword").is_ok());

    // Too short
    assert!(validate_password_strength("abc1").is_err());
    // Letters only / digits only
    assert!(validate_password_strength("abcdefgh").is_err());
    assert!(validate_password_strength("12345678").is_err());

    // Password change only checks length
    assert!(validate_password_length("abcdefgh").is_ok());
    assert!(validate_password_length("short").is_err());
}

#[tokio::test]
async fn test_token_round_trip() {
    let keys = keys();
    let issued = keys.issue(42, TokenType::Auth).expect("Failed to issue token");

    assert_eq!(issued.claims.exp - issued.claims.iat, 3600);
    assert_eq!(issued.claims.jti.len(), 32);

    let claims = keys.decode(&issued.token).expect("Token should decode");
    assert_eq!(claims.user_id, 42);
    assert_eq!(claims.jti, issued.claims.jti);

    // Each token gets its own id
    let other = keys.issue(42, TokenType::Auth).expect("Failed to issue token");
    assert_ne!(other.claims.jti, issued.claims.jti);
}

#[tokio::test]
async fn test_token_rejections() {
    let keys = keys();

    let expired = keys
        .issue_at(1, TokenType::Auth, chrono::Utc::now().timestamp() - 7200)
        .expect("Failed to issue token");
    assert!(matches!(keys.decode(&expired.token), Err(TokenError::Expired)));

    // Correctly signed, but not an auth token
    let now = chrono::Utc::now().timestamp();
    let reset = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &serde_json::json!({
            "user_id": 1,
            "type": "reset",
            "iat": now,
            "exp": now + 3600,
            "jti": "reset-token-id",
        }),
        &jsonwebtoken::EncodingKey::from_secret(b"integration-test-secret-integration"),
    )
    .expect("Failed to sign claims");
    assert!(matches!(keys.decode(&reset), Err(TokenError::Invalid(_))));

    let foreign = TokenKeys::new(b"some-other-secret-entirely-different", Duration::from_secs(60))
        .issue(1, TokenType::Auth)
        .expect("Failed to issue token");
    assert!(matches!(keys.decode(&foreign.token), Err(TokenError::Invalid(_))));

    assert!(matches!(keys.decode("garbage"), Err(TokenError::Invalid(_))));
}

#[tokio::test]
async fn test_blacklist_and_cleanup() {
    let (db, _temp_dir) = setup_test_db().await;
    let pool = db.pool();
    let now = chrono::Utc::now().timestamp();

    assert!(blacklist_token(pool, "live", now + 3600).await.unwrap());
    assert!(blacklist_token(pool, "stale", now - 3600).await.unwrap());
    // Revoking twice is reported
    assert!(!blacklist_token(pool, "live", now + 3600).await.unwrap());

    cleanup_once(pool).await;

    assert!(is_token_blacklisted(pool, "live").await.unwrap());
    assert!(!is_token_blacklisted(pool, "stale").await.unwrap());
}

#[tokio::test]
async fn test_cleanup_worker_stops_on_shutdown() {
    let (db, _temp_dir) = setup_test_db().await;
    let pool = db.pool().clone();
    let now = chrono::Utc::now().timestamp();
    blacklist_token(&pool, "stale", now - 60).await.unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_cleanup_worker(
        pool.clone(),
        CleanupConfig {
            interval: Duration::from_secs(3600),
        },
        shutdown.clone(),
    ));

    // The first pass runs immediately
    let mut cleaned = false;
    for _ in 0..50 {
        if !is_token_blacklisted(&pool, "stale").await.unwrap() {
            cleaned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cleaned, "initial cleanup pass did not run");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .expect("worker panicked");
}

#[tokio::test]
async fn test_credentials_lookup_and_password_change() {
    let (db, _temp_dir) = setup_test_db().await;
    let pool = db.pool();

    let hash = hash_password("original1").unwrap();
    let user_id = create_user(pool, &new_user("Alice", hash)).await.unwrap();

    // Usernames and emails match regardless of case
    let by_name = get_user_by_username(pool, "alice").await.unwrap().unwrap();
    assert_eq!(by_name.user_id, user_id);
    let by_email = get_user_by_email(pool, "ALICE@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.user_id, user_id);

    let new_hash = hash_password("changed12").unwrap();
    update_user_password(pool, user_id, &new_hash).await.unwrap();

    let user = get_user_by_username(pool, "Alice").await.unwrap().unwrap();
    assert!(verify_password("changed12", &user.password_hash).unwrap());
    assert!(!verify_password("original1", &user.password_hash).unwrap());
}
