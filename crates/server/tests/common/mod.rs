//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without network
//! access or the map tools installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use trailforge_core::queue::QueuedJob;
use trailforge_core::testing::fixtures::MockToolchain;
use trailforge_core::testing::{MockGeocoder, MockTileSource};
use trailforge_core::{
    DownloadCoordinator, Geocoder, JobQueue, LocalJobQueue, OrchestratorConfig,
    PipelineOrchestrator, TileFetcher, WorkerPool,
};

/// Re-export fixtures for test convenience
pub use trailforge_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Tile downloads (MockTileSource)
/// - Map tools (MockToolchain)
/// - Place search (MockGeocoder)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_generate() {
///     let fixture = TestFixture::with_workers().await;
///
///     let response = fixture.post("/api/generate", json!({
///         "bbox": { "south": 45.0, "west": 7.0, "north": 45.1, "east": 7.1 }
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock tile source - control downloads
    pub tiles: Arc<MockTileSource>,
    /// Mock map tools - control conversion, splitting and compiling
    pub tools: MockToolchain,
    /// Mock geocoder - configure search results
    pub geocoder: Arc<MockGeocoder>,
    /// Temporary directory holding job directories
    pub temp_dir: TempDir,
    /// Held while no workers run so enqueueing keeps working
    receiver: Option<mpsc::UnboundedReceiver<QueuedJob>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a fixture whose jobs stay queued (no workers).
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Create a fixture with a worker pool running queued jobs.
    pub async fn with_workers() -> Self {
        Self::build(true).await
    }

    async fn build(start_workers: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::test_config(temp_dir.path().join("jobs"));

        let tiles = Arc::new(MockTileSource::new());
        let tools = fixtures::working_toolchain();
        let geocoder = Arc::new(MockGeocoder::new());

        let (queue, receiver) = LocalJobQueue::new();
        let queue: Arc<dyn JobQueue> = Arc::new(queue);

        let receiver = if start_workers {
            let toolchain = Arc::new(tools.toolchain.clone());
            let coordinator = Arc::new(DownloadCoordinator::new(
                TileFetcher::from_config(tiles.clone(), &config.overpass),
                Arc::clone(&toolchain),
                &config.overpass,
            ));
            let orchestrator = Arc::new(PipelineOrchestrator::new(
                coordinator,
                toolchain,
                Arc::clone(&queue),
                OrchestratorConfig::from_config(&config),
            ));
            WorkerPool::new(orchestrator, config.jobs.max_concurrent_jobs).spawn(receiver);
            None
        } else {
            Some(receiver)
        };

        let state = Arc::new(trailforge_server::state::AppState::new(
            &config,
            queue,
            Arc::clone(&geocoder) as Arc<dyn Geocoder>,
        ));
        let router = trailforge_server::api::create_router(state);

        Self {
            router,
            tiles,
            tools,
            geocoder,
            temp_dir,
            receiver,
        }
    }

    /// Directory holding the per-job directories.
    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("jobs")
    }

    /// Write an artifact for `job_id` directly, bypassing the pipeline.
    pub fn place_artifact(&self, job_id: &str, contents: &[u8]) -> PathBuf {
        let dir = self.data_dir().join(job_id);
        std::fs::create_dir_all(&dir).expect("Failed to create job dir");
        let path = dir.join("gmapsupp.img");
        std::fs::write(&path, contents).expect("Failed to write artifact");
        path
    }

    /// Submit a bbox and return the job id.
    pub async fn submit(&self, south: f64, west: f64, north: f64, east: f64) -> String {
        let response = self
            .post(
                "/api/generate",
                serde_json::json!({
                    "bbox": { "south": south, "west": west, "north": north, "east": east }
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["job_id"]
            .as_str()
            .expect("job_id missing")
            .to_string()
    }

    /// Take the next job handed to workers, when the fixture runs none.
    pub fn next_queued(&mut self) -> Option<QueuedJob> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// Poll the status endpoint until the job leaves queued/processing.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        let path = format!("/api/status/{}", job_id);
        for _ in 0..300 {
            let response = self.get(&path).await;
            let status = response.body["status"].as_str().unwrap_or_default();
            if status != "queued" && status != "processing" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish in time", job_id);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let body = serde_json::to_string(&body).unwrap();
        self.request("POST", path, Some((body, "application/json")), &[])
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request(
            "POST",
            path,
            Some((body.to_string(), "application/json")),
            &[],
        )
        .await
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<(String, &str)>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = match body {
            Some((content, content_type)) => {
                request_builder = request_builder.header("Content-Type", content_type);
                Body::from(content)
            }
            None => Body::empty(),
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
