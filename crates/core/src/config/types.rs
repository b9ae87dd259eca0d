use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub overpass: OverpassConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Where job directories and artifacts live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory; each job gets `<data_dir>/<job_id>`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// The only filename the download endpoint will serve.
    #[serde(default = "default_artifact_filename")]
    pub artifact_filename: String,
    /// Chunk size for streamed range responses.
    #[serde(default = "default_chunk_bytes")]
    pub download_chunk_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            artifact_filename: default_artifact_filename(),
            download_chunk_bytes: default_chunk_bytes(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data/jobs")
}

fn default_artifact_filename() -> String {
    "gmapsupp.img".to_string()
}

fn default_chunk_bytes() -> usize {
    1024 * 1024
}

/// Accepted bounding box area range, in square degrees.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_area")]
    pub max_bbox_area_deg2: f64,
    #[serde(default = "default_min_area")]
    pub min_bbox_area_deg2: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bbox_area_deg2: default_max_area(),
            min_bbox_area_deg2: default_min_area(),
        }
    }
}

fn default_max_area() -> f64 {
    4.0 // ~40,000 km² at mid-latitudes
}

fn default_min_area() -> f64 {
    1e-6
}

/// Overpass API (raw OSM data source) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverpassConfig {
    #[serde(default = "default_overpass_url")]
    pub url: String,
    /// Requests larger than this are split into tiles.
    #[serde(default = "default_tile_area")]
    pub tile_area_deg2: f64,
    /// Per-attempt HTTP timeout in seconds.
    #[serde(default = "default_overpass_timeout")]
    pub timeout_secs: u64,
    /// Server-side timeout embedded in the query.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Pause before the single retry of a failed tile.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Pause between consecutive tiles.
    #[serde(default = "default_tile_pause")]
    pub tile_pause_ms: u64,
    /// Downloads smaller than this are treated as empty areas.
    #[serde(default = "default_min_result_bytes")]
    pub min_result_bytes: u64,
    /// 1 keeps tile fetches sequential.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            url: default_overpass_url(),
            tile_area_deg2: default_tile_area(),
            timeout_secs: default_overpass_timeout(),
            query_timeout_secs: default_query_timeout(),
            retry_delay_ms: default_retry_delay(),
            tile_pause_ms: default_tile_pause(),
            min_result_bytes: default_min_result_bytes(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            user_agent: default_user_agent(),
        }
    }
}

impl OverpassConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn tile_pause(&self) -> Duration {
        Duration::from_millis(self.tile_pause_ms)
    }
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_tile_area() -> f64 {
    0.25
}

fn default_overpass_timeout() -> u64 {
    360
}

fn default_query_timeout() -> u64 {
    300
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_tile_pause() -> u64 {
    1000
}

fn default_min_result_bytes() -> u64 {
    100
}

fn default_max_concurrent_fetches() -> usize {
    1
}

fn default_user_agent() -> String {
    format!("TrailForge/{}", env!("CARGO_PKG_VERSION"))
}

/// Place-name search proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub url: String,
    /// Nominatim's usage policy requires a descriptive User-Agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: default_geocoder_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocoder_timeout(),
        }
    }
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_geocoder_timeout() -> u64 {
    10
}

/// External map tooling (osmium, splitter, mkgmap).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_osmium_path")]
    pub osmium_path: PathBuf,
    #[serde(default = "default_java_path")]
    pub java_path: PathBuf,
    #[serde(default = "default_splitter_jar")]
    pub splitter_jar: PathBuf,
    #[serde(default = "default_mkgmap_jar")]
    pub mkgmap_jar: PathBuf,
    /// Passed to the JVM as `-Xmx<value>`.
    #[serde(default = "default_java_heap")]
    pub java_max_heap: String,
    #[serde(default = "default_convert_timeout")]
    pub convert_timeout_secs: u64,
    #[serde(default = "default_tool_timeout")]
    pub merge_timeout_secs: u64,
    #[serde(default = "default_tool_timeout")]
    pub split_timeout_secs: u64,
    #[serde(default = "default_tool_timeout")]
    pub compile_timeout_secs: u64,
    #[serde(default)]
    pub map: MapMetadata,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            osmium_path: default_osmium_path(),
            java_path: default_java_path(),
            splitter_jar: default_splitter_jar(),
            mkgmap_jar: default_mkgmap_jar(),
            java_max_heap: default_java_heap(),
            convert_timeout_secs: default_convert_timeout(),
            merge_timeout_secs: default_tool_timeout(),
            split_timeout_secs: default_tool_timeout(),
            compile_timeout_secs: default_tool_timeout(),
            map: MapMetadata::default(),
        }
    }
}

fn default_osmium_path() -> PathBuf {
    PathBuf::from("osmium")
}

fn default_java_path() -> PathBuf {
    PathBuf::from("java")
}

fn default_splitter_jar() -> PathBuf {
    PathBuf::from("/opt/splitter/splitter.jar")
}

fn default_mkgmap_jar() -> PathBuf {
    PathBuf::from("/opt/mkgmap/mkgmap.jar")
}

fn default_java_heap() -> String {
    "4g".to_string()
}

fn default_convert_timeout() -> u64 {
    120
}

fn default_tool_timeout() -> u64 {
    300
}

/// Identifying metadata baked into the compiled map.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapMetadata {
    #[serde(default = "default_family_id")]
    pub family_id: u32,
    #[serde(default = "default_map_name")]
    pub series_name: String,
    #[serde(default = "default_map_name")]
    pub family_name: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for MapMetadata {
    fn default() -> Self {
        Self {
            family_id: default_family_id(),
            series_name: default_map_name(),
            family_name: default_map_name(),
            description: default_description(),
        }
    }
}

fn default_family_id() -> u32 {
    6324
}

fn default_map_name() -> String {
    "OSM Garmin".to_string()
}

fn default_description() -> String {
    "Custom OSM Map".to_string()
}

/// Job execution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// A job still running after this long is failed.
    #[serde(default = "default_hard_limit")]
    pub hard_time_limit_secs: u64,
    /// Crossing this only logs a warning.
    #[serde(default = "default_soft_limit")]
    pub soft_time_limit_secs: u64,
    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            hard_time_limit_secs: default_hard_limit(),
            soft_time_limit_secs: default_soft_limit(),
            max_concurrent_jobs: default_max_jobs(),
        }
    }
}

impl JobsConfig {
    pub fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.hard_time_limit_secs)
    }

    pub fn soft_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit_secs)
    }
}

fn default_hard_limit() -> u64 {
    600 // 10 minutes
}

fn default_soft_limit() -> u64 {
    540
}

fn default_max_jobs() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.storage.data_dir, PathBuf::from("/data/jobs"));
        assert_eq!(config.storage.artifact_filename, "gmapsupp.img");
        assert_eq!(config.limits.max_bbox_area_deg2, 4.0);
        assert_eq!(config.overpass.tile_area_deg2, 0.25);
        assert_eq!(config.overpass.max_concurrent_fetches, 1);
        assert_eq!(config.jobs.hard_time_limit_secs, 600);
        assert_eq!(config.jobs.soft_time_limit_secs, 540);
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[storage]
data_dir = "/tmp/jobs"

[overpass]
url = "http://localhost:12345/api/interpreter"
retry_delay_ms = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/jobs"));
        assert_eq!(config.storage.download_chunk_bytes, 1024 * 1024);
        assert_eq!(config.overpass.url, "http://localhost:12345/api/interpreter");
        assert_eq!(config.overpass.retry_delay(), Duration::from_millis(10));
        assert_eq!(config.overpass.tile_pause(), Duration::from_secs(1));
    }

    #[test]
    fn test_map_metadata_defaults() {
        let toml = r#"
[tools]
java_max_heap = "2g"

[tools.map]
description = "Alps"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tools.java_max_heap, "2g");
        assert_eq!(config.tools.map.family_id, 6324);
        assert_eq!(config.tools.map.series_name, "OSM Garmin");
        assert_eq!(config.tools.map.description, "Alps");
        assert_eq!(config.tools.convert_timeout_secs, 120);
    }

    #[test]
    fn test_user_agent_identifies_application() {
        let config = GeocoderConfig::default();
        assert!(config.user_agent.starts_with("TrailForge/"));
    }
}
