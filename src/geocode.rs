//! Reverse-geocoding proxy client.
//!
//! Keeps the provider API key on the server: clients send coordinates and
//! get the provider's JSON body back unchanged.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("socialconnect/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("API key not configured")]
    NotConfigured,
    #[error("Failed to get location data")]
    Upstream,
}

/// Validate a latitude/longitude pair.
#[must_use]
pub fn parse_coordinates(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let lat: f64 = lat?.trim().parse().ok()?;
    let lng: f64 = lng?.trim().parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some((lat, lng))
}

#[derive(Debug, Clone)]
pub struct GeocodeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodeClient {
    /// Create a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create geocoding HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    /// Look up the address for a coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NotConfigured`] without an API key, and
    /// [`GeocodeError::Upstream`] on transport failures, non-200 replies or
    /// bodies that are not JSON.
    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<serde_json::Value, GeocodeError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GeocodeError::NotConfigured);
        };

        debug!(lat, lng, "Reverse geocoding");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("latlng", format!("{lat},{lng}")), ("key", api_key.to_string())])
            .send()
            .await
            .map_err(|e| {
                warn!("Geocoding request failed: {e}");
                GeocodeError::Upstream
            })?;

        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "Geocoding provider returned an error");
            return Err(GeocodeError::Upstream);
        }

        response.json().await.map_err(|e| {
            warn!("Geocoding provider returned invalid JSON: {e}");
            GeocodeError::Upstream
        })
    }
}
