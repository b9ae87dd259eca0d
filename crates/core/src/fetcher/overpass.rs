//! Overpass API client.
//!
//! Overpass is a shared, rate-limited public service: requests carry an
//! identifying User-Agent and callers are expected to pace themselves.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{TileSource, UpstreamError};
use crate::config::OverpassConfig;
use crate::geo::Tile;

/// Builds the Overpass QL query returning every element inside `tile`.
pub fn build_query(tile: &Tile, timeout_secs: u64) -> String {
    let area = format!("{},{},{},{}", tile.south, tile.west, tile.north, tile.east);
    format!(
        "[out:xml][timeout:{timeout}];\n\
         (\n  node({area});\n  way({area});\n  relation({area});\n);\n\
         (._;>;);\n\
         out meta;\n",
        timeout = timeout_secs,
        area = area,
    )
}

/// HTTP client for the Overpass interpreter endpoint.
pub struct OverpassClient {
    client: Client,
    url: String,
    query_timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(config: &OverpassConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            query_timeout_secs: config.query_timeout_secs,
        })
    }
}

#[async_trait]
impl TileSource for OverpassClient {
    fn name(&self) -> &str {
        "overpass"
    }

    async fn fetch_to(&self, tile: &Tile, dest: &Path) -> Result<u64, UpstreamError> {
        let query = build_query(tile, self.query_timeout_secs);
        debug!("Overpass query for {:?} -> {}", tile, self.url);

        let mut response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("data={}", urlencoding::encode(&query)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::status(status.as_u16(), body));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
