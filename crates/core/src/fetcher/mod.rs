//! Raw map data retrieval for individual tiles.
//!
//! A [`TileSource`] performs a single network attempt; [`TileFetcher`] wraps
//! it with the retry policy and makes sure a failed fetch never leaves a
//! usable-looking file behind.

mod overpass;

pub use overpass::{build_query, OverpassClient};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OverpassConfig;
use crate::geo::Tile;
use crate::metrics::TILE_FETCH_ATTEMPTS;

/// Errors from the upstream data source.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Writing the response to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed; carries the last failure.
    #[error("tile fetch failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// One attempt at retrieving raw data for a tile.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Downloads the tile's data into `dest`, returning the bytes written.
    async fn fetch_to(&self, tile: &Tile, dest: &Path) -> Result<u64, UpstreamError>;
}

/// Fetches tiles with a single retry after a fixed pause.
#[derive(Clone)]
pub struct TileFetcher {
    source: Arc<dyn TileSource>,
    retry_delay: Duration,
    max_attempts: u32,
}

impl TileFetcher {
    pub fn new(source: Arc<dyn TileSource>, retry_delay: Duration) -> Self {
        Self {
            source,
            retry_delay,
            max_attempts: 2,
        }
    }

    pub fn from_config(source: Arc<dyn TileSource>, config: &OverpassConfig) -> Self {
        Self::new(source, config.retry_delay())
    }

    /// Fetches `tile` into `dest`.
    ///
    /// Data is staged in a `.part` sibling and only renamed into place once an
    /// attempt succeeds.
    pub async fn fetch(&self, tile: &Tile, dest: &Path) -> Result<u64, UpstreamError> {
        let staging = staging_path(dest);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.source.fetch_to(tile, &staging).await {
                Ok(bytes) => {
                    tokio::fs::rename(&staging, dest).await?;
                    TILE_FETCH_ATTEMPTS.with_label_values(&["success"]).inc();
                    debug!(
                        "{} tile {:?} fetched ({} bytes, attempt {})",
                        self.source.name(),
                        tile,
                        bytes,
                        attempt
                    );
                    return Ok(bytes);
                }
                Err(e) => {
                    TILE_FETCH_ATTEMPTS.with_label_values(&["failure"]).inc();
                    let _ = tokio::fs::remove_file(&staging).await;

                    if attempt >= self.max_attempts {
                        return Err(UpstreamError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        "{} fetch attempt {} failed: {}; retrying in {:?}",
                        self.source.name(),
                        attempt,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
