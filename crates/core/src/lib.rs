pub mod artifact;
pub mod config;
pub mod download;
pub mod fetcher;
pub mod geo;
pub mod geocode;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod testing;
pub mod tools;

pub use artifact::{
    is_valid_job_id, parse_range, ArtifactDownload, ArtifactError, ArtifactServer, ByteRange,
    RangeError,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use download::DownloadCoordinator;
pub use fetcher::{OverpassClient, TileFetcher, TileSource, UpstreamError};
pub use geo::{AreaLimits, BoundingBox, Tile, TilePartitioner, ValidationError};
pub use geocode::{GeocodeError, Geocoder, NominatimClient};
pub use pipeline::{
    ArtifactInfo, Job, OrchestratorConfig, PipelineError, PipelineOrchestrator, PipelineState,
    ProgressEmitter, StepError,
};
pub use queue::{JobQueue, LocalJobQueue, QueueError, QueuedJob, TaskState, WorkerPool};
pub use tools::{ExternalTool, MapToolchain, ProcessTool, ToolError, ToolOutput};
