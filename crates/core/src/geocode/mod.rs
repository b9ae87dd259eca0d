//! Place-name search, proxied to a Nominatim-compatible geocoder.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoder rate limit exceeded")]
    RateLimitExceeded,

    #[error("Geocoder returned HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse geocoder response: {0}")]
    ParseError(String),
}

/// Looks up places by name.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns the upstream JSON result for `query` unchanged.
    async fn search(&self, query: &str) -> Result<Value, GeocodeError>;
}

/// Nominatim search client.
///
/// Nominatim's usage policy requires an identifying User-Agent.
pub struct NominatimClient {
    client: Client,
    url: String,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(&self, query: &str) -> Result<Value, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        debug!("Geocode search: query='{}'", query);

        let response = self
            .client
            .get(&self.url)
            .query(&[("format", "json"), ("q", query), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if status == 429 {
            warn!("Geocoder rate limit exceeded");
            return Err(GeocodeError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeocodeError::ParseError(e.to_string()))
    }
}
