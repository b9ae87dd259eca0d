//! Downloads the raw data for a whole job.
//!
//! Small requests are a single fetch. Larger ones are partitioned, fetched
//! tile by tile into a scratch directory and merged into one file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::OverpassConfig;
use crate::fetcher::TileFetcher;
use crate::geo::{BoundingBox, Tile, TilePartitioner};
use crate::metrics::TILES_PER_JOB;
use crate::pipeline::{ProgressEmitter, StepError};
use crate::tools::MapToolchain;

/// Canonical raw data file inside a job directory.
pub const RAW_FILENAME: &str = "map.osm";
/// Scratch directory for per-tile downloads.
pub const TILES_DIRNAME: &str = "tiles";

/// Fetches, merges and sanity-checks the raw data for a bounding box.
pub struct DownloadCoordinator {
    fetcher: TileFetcher,
    partitioner: TilePartitioner,
    toolchain: Arc<MapToolchain>,
    tile_pause: Duration,
    min_result_bytes: u64,
    max_concurrent_fetches: usize,
}

impl DownloadCoordinator {
    pub fn new(fetcher: TileFetcher, toolchain: Arc<MapToolchain>, config: &OverpassConfig) -> Self {
        Self {
            fetcher,
            partitioner: TilePartitioner::new(config.tile_area_deg2),
            toolchain,
            tile_pause: config.tile_pause(),
            min_result_bytes: config.min_result_bytes,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
        }
    }

    pub fn with_tile_pause(mut self, pause: Duration) -> Self {
        self.tile_pause = pause;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Downloads `bbox` into `job_dir`, returning the raw data file.
    pub async fn download(
        &self,
        bbox: &BoundingBox,
        job_dir: &Path,
        progress: &dyn ProgressEmitter,
    ) -> Result<PathBuf, StepError> {
        let output = job_dir.join(RAW_FILENAME);
        let tiles = self.partitioner.partition(bbox);
        TILES_PER_JOB.observe(tiles.len() as f64);

        if let [tile] = tiles.as_slice() {
            progress.emit("Downloading OSM data...").await;
            self.fetcher.fetch(tile, &output).await?;
        } else {
            info!(
                "Area {:.4} deg² split into {} tiles",
                bbox.area_deg2(),
                tiles.len()
            );
            let tiles_dir = job_dir.join(TILES_DIRNAME);
            tokio::fs::create_dir_all(&tiles_dir).await?;

            let paths = if self.max_concurrent_fetches > 1 {
                self.fetch_pooled(&tiles, &tiles_dir, progress).await?
            } else {
                self.fetch_sequential(&tiles, &tiles_dir, progress).await?
            };

            progress
                .emit(&format!("Merging {} tiles...", paths.len()))
                .await;
            self.toolchain.merge(&paths, &output).await?;
        }

        let size = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size < self.min_result_bytes {
            return Err(StepError::EmptyResult { size });
        }

        debug!("Raw data ready at {} ({} bytes)", output.display(), size);
        Ok(output)
    }

    async fn fetch_sequential(
        &self,
        tiles: &[Tile],
        tiles_dir: &Path,
        progress: &dyn ProgressEmitter,
    ) -> Result<Vec<PathBuf>, StepError> {
        let total = tiles.len();
        let mut paths = Vec::with_capacity(total);

        for (idx, tile) in tiles.iter().enumerate() {
            let path = tile_path(tiles_dir, idx + 1);
            progress
                .emit(&format!("Downloading tile {}/{}...", idx + 1, total))
                .await;
            self.fetcher.fetch(tile, &path).await?;
            paths.push(path);

            if idx + 1 < total && !self.tile_pause.is_zero() {
                tokio::time::sleep(self.tile_pause).await;
            }
        }

        Ok(paths)
    }

    /// Fetches up to `max_concurrent_fetches` tiles at a time, keeping tile order.
    async fn fetch_pooled(
        &self,
        tiles: &[Tile],
        tiles_dir: &Path,
        progress: &dyn ProgressEmitter,
    ) -> Result<Vec<PathBuf>, StepError> {
        let total = tiles.len();

        stream::iter(tiles.iter().copied().enumerate().map(|(idx, tile)| {
            let path = tile_path(tiles_dir, idx + 1);
            async move {
                progress
                    .emit(&format!("Downloading tile {}/{}...", idx + 1, total))
                    .await;
                self.fetcher.fetch(&tile, &path).await?;
                Ok::<_, StepError>(path)
            }
        }))
        .buffered(self.max_concurrent_fetches)
        .try_collect()
        .await
    }
}

fn tile_path(dir: &Path, number: usize) -> PathBuf {
    dir.join(format!("tile_{:03}.osm", number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{working_toolchain, MockToolchain};
    use crate::testing::{MockTileSource, RecordingEmitter};
    use tempfile::TempDir;

    fn coordinator(source: Arc<MockTileSource>, tools: &MockToolchain) -> DownloadCoordinator {
        let config = OverpassConfig::default();
        let fetcher = TileFetcher::new(source, Duration::ZERO);
        DownloadCoordinator::new(fetcher, Arc::new(tools.toolchain.clone()), &config)
            .with_tile_pause(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_single_tile_goes_straight_to_raw_file() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();

        let raw = coordinator(source.clone(), &tools)
            .download(&BoundingBox::new(45.0, 7.0, 45.1, 7.1), dir.path(), &emitter)
            .await
            .unwrap();

        assert_eq!(raw, dir.path().join(RAW_FILENAME));
        assert!(raw.exists());
        assert!(!dir.path().join(TILES_DIRNAME).exists());
        assert_eq!(emitter.steps().await, vec!["Downloading OSM data..."]);
        assert_eq!(tools.osmium.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_multi_tile_fetches_in_order_then_merges() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();
        // 1° x 1° at 0.25 deg² per tile
        let bbox = BoundingBox::new(45.0, 7.0, 46.0, 8.0);

        let raw = coordinator(source.clone(), &tools)
            .download(&bbox, dir.path(), &emitter)
            .await
            .unwrap();

        let steps = emitter.steps().await;
        assert_eq!(
            steps,
            vec![
                "Downloading tile 1/4...",
                "Downloading tile 2/4...",
                "Downloading tile 3/4...",
                "Downloading tile 4/4...",
                "Merging 4 tiles...",
            ]
        );
        assert_eq!(source.attempts().await.len(), 4);
        assert!(dir.path().join("tiles/tile_001.osm").exists());
        assert!(dir.path().join("tiles/tile_004.osm").exists());

        let merges = tools.osmium.invocations().await;
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].args[0], "merge");
        assert!(merges[0].args[1].ends_with("tile_001.osm"));
        assert!(raw.exists());
    }

    #[tokio::test]
    async fn test_pooled_fetch_keeps_tile_order() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();

        coordinator(source.clone(), &tools)
            .with_max_concurrent_fetches(3)
            .download(&BoundingBox::new(45.0, 7.0, 46.0, 8.0), dir.path(), &emitter)
            .await
            .unwrap();

        let args = &tools.osmium.invocations().await[0].args;
        let tiles: Vec<&String> = args.iter().filter(|a| a.contains("tile_")).collect();
        assert_eq!(tiles.len(), 4);
        assert!(tiles[0].ends_with("tile_001.osm"));
        assert!(tiles[3].ends_with("tile_004.osm"));
    }

    #[tokio::test]
    async fn test_sequential_fetches_pause_between_tiles_only() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        source.set_delay(Duration::from_millis(20)).await;
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();
        let pause = Duration::from_millis(150);

        coordinator(source.clone(), &tools)
            .with_max_concurrent_fetches(1)
            .with_tile_pause(pause)
            .download(&BoundingBox::new(45.0, 7.0, 46.0, 8.0), dir.path(), &emitter)
            .await
            .unwrap();
        let returned = std::time::Instant::now();

        assert_eq!(source.peak_in_flight(), 1);
        let windows = source.attempt_windows().await;
        assert_eq!(windows.len(), 4);
        for pair in windows.windows(2) {
            let (_, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start - prev_end >= pause);
        }
        let (_, last_end) = windows[3];
        assert!(returned - last_end < pause);
    }

    #[tokio::test]
    async fn test_pooled_fetch_stays_within_limit() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        source.set_delay(Duration::from_millis(30)).await;
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();

        // 2° x 2° at 0.25 deg² per tile
        coordinator(source.clone(), &tools)
            .with_max_concurrent_fetches(3)
            .download(&BoundingBox::new(44.0, 6.0, 46.0, 8.0), dir.path(), &emitter)
            .await
            .unwrap();

        assert_eq!(source.attempt_count().await, 16);
        assert!(source.peak_in_flight() <= 3);
        assert!(source.peak_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_failed_tile_stops_download() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        source.fail_next(2).await;
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();

        let err = coordinator(source.clone(), &tools)
            .download(&BoundingBox::new(45.0, 7.0, 46.0, 8.0), dir.path(), &emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Upstream(_)));
        assert_eq!(source.attempts().await.len(), 2);
        assert_eq!(tools.osmium.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_merge_failure_is_tool_error() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::new());
        let tools = working_toolchain();
        tools.osmium.set_exit(1, "merge: input file corrupt").await;
        let emitter = RecordingEmitter::new();

        let err = coordinator(source, &tools)
            .download(&BoundingBox::new(45.0, 7.0, 46.0, 8.0), dir.path(), &emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::ExternalTool { .. }));
        assert!(err.to_string().contains("input file corrupt"));
    }

    #[tokio::test]
    async fn test_tiny_result_is_empty() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockTileSource::with_payload(b"<osm/>".to_vec()));
        let tools = working_toolchain();
        let emitter = RecordingEmitter::new();

        let err = coordinator(source, &tools)
            .download(&BoundingBox::new(45.0, 7.0, 45.1, 7.1), dir.path(), &emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::EmptyResult { size: 6 }));
    }

    #[test]
    fn test_tile_path_is_zero_padded() {
        assert_eq!(
            tile_path(Path::new("/j/tiles"), 7),
            PathBuf::from("/j/tiles/tile_007.osm")
        );
    }
}
