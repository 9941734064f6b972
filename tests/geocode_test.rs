//! Reverse-geocoding proxy tests against a mock provider.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use socialconnect::auth::TokenType;
use socialconnect::config::Config;
use socialconnect::db::{create_user, Database, NewUser};
use socialconnect::geocode::{GeocodeClient, GeocodeError};
use socialconnect::web::{self, AppState};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-maps-key";

fn provider_reply() -> Value {
    json!({
        "status": "OK",
        "results": [{ "formatted_address": "10 Downing St, London SW1A 2AA, UK" }],
    })
}

async fn setup_app(geocode_url: String, api_key: Option<&str>) -> (Router, String, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create database");
    let config = Config {
        media_dir: temp_dir.path().join("media"),
        google_maps_api_key: api_key.map(str::to_string),
        geocode_url,
        geocode_timeout: Duration::from_secs(2),
        ..Config::for_testing()
    };
    let state = AppState::new(config, db).expect("Failed to build state");
    let user_id = register(&state).await;
    let token = state
        .tokens
        .issue(user_id, TokenType::Auth)
        .expect("Failed to issue token")
        .token;
    (web::create_app(state), token, temp_dir)
}

async fn register(state: &AppState) -> i64 {
    create_user(
        state.db.pool(),
        &NewUser {
            username: "mapper".to_string(),
            email: "mapper@example.com".to_string(),
            password_hash: "unused".to_string(),
            first_name: "Map".to_string(),
            last_name: "Per".to_string(),
            date_of_birth: "1990-01-01".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

async fn lookup(app: &Router, token: Option<&str>, query: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(format!("/api/geocode{query}"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_provider_body_is_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .and(query_param("latlng", "51.5034,-0.1276"))
        .and(query_param("key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_reply()))
        .expect(1)
        .mount(&server)
        .await;

    let (app, token, _temp_dir) =
        setup_app(format!("{}/geocode", server.uri()), Some(API_KEY)).await;

    let (status, body) = lookup(&app, Some(&token), "?lat=51.5034&lng=-0.1276").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, provider_reply());
}

#[tokio::test]
async fn test_invalid_coordinates() {
    let server = MockServer::start().await;
    let (app, token, _temp_dir) =
        setup_app(format!("{}/geocode", server.uri()), Some(API_KEY)).await;

    for query in ["", "?lat=51.5", "?lat=abc&lng=0", "?lat=95&lng=0", "?lat=0&lng=200"] {
        let (status, body) = lookup(&app, Some(&token), query).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query:?}");
        assert_eq!(body["error"], "Invalid coordinates");
    }

    // Nothing reached the provider
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_api_key() {
    let server = MockServer::start().await;
    let (app, token, _temp_dir) = setup_app(format!("{}/geocode", server.uri()), None).await;

    let (status, body) = lookup(&app, Some(&token), "?lat=1&lng=2").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API key not configured");
}

#[tokio::test]
async fn test_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (app, token, _temp_dir) =
        setup_app(format!("{}/geocode", server.uri()), Some(API_KEY)).await;

    let (status, body) = lookup(&app, Some(&token), "?lat=1&lng=2").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to get location data");
}

#[tokio::test]
async fn test_requires_authentication() {
    let server = MockServer::start().await;
    let (app, _token, _temp_dir) =
        setup_app(format!("{}/geocode", server.uri()), Some(API_KEY)).await;

    let (status, body) = lookup(&app, None, "?lat=1&lng=2").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_client_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = GeocodeClient::new(
        &format!("{}/geocode", server.uri()),
        Some(API_KEY.to_string()),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(
        client.reverse(1.0, 2.0).await,
        Err(GeocodeError::Upstream)
    ));
}
