use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::auth::RequireUser;
use crate::geocode::parse_coordinates;

#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
    lat: Option<String>,
    lng: Option<String>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// GET /api/geocode?lat&lng - Reverse-geocode through the server-side key.
///
/// The provider's body is relayed as-is, so errors use the provider-style
/// `{"error": ...}` shape rather than the API envelope.
pub async fn reverse_geocode(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    Query(params): Query<GeocodeParams>,
) -> Response {
    let Some((lat, lng)) = parse_coordinates(params.lat.as_deref(), params.lng.as_deref()) else {
        return error(StatusCode::BAD_REQUEST, "Invalid coordinates");
    };

    match state.geocoder.reverse(lat, lng).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
