//! Mock tile source for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::fetcher::{TileSource, UpstreamError};
use crate::geo::Tile;

use super::fixtures;

/// Mock implementation of the TileSource trait.
///
/// Provides controllable behavior for testing:
/// - Record every fetch attempt
/// - Fail a given number of upcoming attempts (as HTTP 429)
/// - Control the payload written on success
/// - Simulate slow upstream responses
/// - Track overlapping attempts and when each one ran
#[derive(Debug, Clone)]
pub struct MockTileSource {
    attempts: Arc<RwLock<Vec<Tile>>>,
    failures_remaining: Arc<RwLock<u32>>,
    payload: Arc<RwLock<Vec<u8>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    windows: Arc<RwLock<Vec<(Instant, Instant)>>>,
}

impl Default for MockTileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTileSource {
    /// Create a source that always succeeds with a small but plausible OSM document.
    pub fn new() -> Self {
        Self::with_payload(fixtures::sample_osm_xml())
    }

    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(Vec::new())),
            failures_remaining: Arc::new(RwLock::new(0)),
            payload: Arc::new(RwLock::new(payload)),
            delay: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            windows: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Make the next `count` attempts fail.
    pub async fn fail_next(&self, count: u32) {
        *self.failures_remaining.write().await = count;
    }

    pub async fn set_payload(&self, payload: Vec<u8>) {
        *self.payload.write().await = payload;
    }

    /// Wait this long inside every attempt.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Tiles requested so far, one entry per attempt.
    pub async fn attempts(&self) -> Vec<Tile> {
        self.attempts.read().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Most attempts that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Start and end of every finished attempt, in completion order.
    pub async fn attempt_windows(&self) -> Vec<(Instant, Instant)> {
        self.windows.read().await.clone()
    }

    async fn attempt(&self, dest: &Path) -> Result<u64, UpstreamError> {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }

        {
            let mut remaining = self.failures_remaining.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                // A truncated body, as a dropped connection would leave.
                tokio::fs::write(dest, b"<osm").await?;
                return Err(UpstreamError::status(429, "Too Many Requests"));
            }
        }

        let payload = self.payload.read().await.clone();
        tokio::fs::write(dest, &payload).await?;
        Ok(payload.len() as u64)
    }
}

#[async_trait]
impl TileSource for MockTileSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_to(&self, tile: &Tile, dest: &Path) -> Result<u64, UpstreamError> {
        self.attempts.write().await.push(*tile);

        let started = Instant::now();
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let result = self.attempt(dest).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.windows.write().await.push((started, Instant::now()));
        result
    }
}
