//! The osmium / splitter / mkgmap chain that turns raw OSM data into a
//! Garmin image.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{ExternalTool, ProcessTool};
use crate::config::ToolsConfig;
use crate::pipeline::StepError;

/// Sorted binary intermediate written by the converter.
pub const CONVERTED_FILENAME: &str = "map.osm.pbf";
/// Directory the splitter writes its tiles into.
pub const SPLIT_DIRNAME: &str = "splitter_output";
/// Optional manifest the splitter writes next to its tiles.
pub const SPLIT_TEMPLATE_FILENAME: &str = "template.args";
/// Directory the compiler writes into before the image is moved into place.
pub const COMPILE_DIRNAME: &str = "mkgmap_output";

const SPLIT_TILE_SUFFIX: &str = ".osm.pbf";

/// Runs each map tool step against a job directory.
#[derive(Clone)]
pub struct MapToolchain {
    osmium: Arc<dyn ExternalTool>,
    splitter: Arc<dyn ExternalTool>,
    compiler: Arc<dyn ExternalTool>,
    config: ToolsConfig,
}

impl MapToolchain {
    pub fn new(
        osmium: Arc<dyn ExternalTool>,
        splitter: Arc<dyn ExternalTool>,
        compiler: Arc<dyn ExternalTool>,
        config: ToolsConfig,
    ) -> Self {
        Self {
            osmium,
            splitter,
            compiler,
            config,
        }
    }

    /// Toolchain backed by the locally installed binaries.
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(
            Arc::new(ProcessTool::osmium(config)),
            Arc::new(ProcessTool::java_jar("splitter", config, &config.splitter_jar)),
            Arc::new(ProcessTool::java_jar("mkgmap", config, &config.mkgmap_jar)),
            config.clone(),
        )
    }

    /// Combines several raw tile files into `output`.
    pub async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), StepError> {
        let mut args = vec!["merge".to_string()];
        args.extend(inputs.iter().map(|p| path_arg(p)));
        args.extend(["-o".to_string(), path_arg(output), "--overwrite".to_string()]);

        run(
            self.osmium.as_ref(),
            &args,
            secs(self.config.merge_timeout_secs),
        )
        .await
    }

    /// Converts the raw download into a sorted PBF file.
    pub async fn convert(&self, raw: &Path, job_dir: &Path) -> Result<PathBuf, StepError> {
        let output = job_dir.join(CONVERTED_FILENAME);
        let args = vec![
            "sort".to_string(),
            path_arg(raw),
            "-o".to_string(),
            path_arg(&output),
            "--overwrite".to_string(),
        ];

        run(
            self.osmium.as_ref(),
            &args,
            secs(self.config.convert_timeout_secs),
        )
        .await?;
        Ok(output)
    }

    /// Splits the PBF into map tiles, returning the split output directory.
    pub async fn split(&self, pbf: &Path, job_dir: &Path) -> Result<PathBuf, StepError> {
        let output_dir = job_dir.join(SPLIT_DIRNAME);
        tokio::fs::create_dir_all(&output_dir).await?;

        let args = vec![
            format!("--output-dir={}", output_dir.display()),
            path_arg(pbf),
        ];

        run(
            self.splitter.as_ref(),
            &args,
            secs(self.config.split_timeout_secs),
        )
        .await?;
        Ok(output_dir)
    }

    /// Compiles the split tiles into the final image inside `job_dir`.
    ///
    /// The compiler writes into [`COMPILE_DIRNAME`]; the image only appears in
    /// `job_dir` once the compiler has exited successfully.
    pub async fn compile(
        &self,
        split_dir: &Path,
        job_dir: &Path,
        artifact_filename: &str,
    ) -> Result<PathBuf, StepError> {
        let tiles = split_tiles(split_dir).await?;
        if tiles.is_empty() {
            return Err(StepError::MissingArtifact(format!(
                "No PBF tiles found in {}",
                split_dir.display()
            )));
        }

        let output_dir = job_dir.join(COMPILE_DIRNAME);
        tokio::fs::create_dir_all(&output_dir).await?;

        let map = &self.config.map;
        let mut args = vec![
            "--gmapsupp".to_string(),
            format!("--output-dir={}", output_dir.display()),
            "--route".to_string(),
            "--add-pois-to-areas".to_string(),
            "--index".to_string(),
            format!("--family-id={}", map.family_id),
            format!("--series-name={}", map.series_name),
            format!("--family-name={}", map.family_name),
            format!("--description={}", map.description),
        ];

        let template = split_dir.join(SPLIT_TEMPLATE_FILENAME);
        if tokio::fs::try_exists(&template).await? {
            args.extend(["-c".to_string(), path_arg(&template)]);
        } else {
            debug!("No {} in {}, passing tiles directly", SPLIT_TEMPLATE_FILENAME, split_dir.display());
            args.extend(tiles.iter().map(|p| path_arg(p)));
        }

        run(
            self.compiler.as_ref(),
            &args,
            secs(self.config.compile_timeout_secs),
        )
        .await?;

        let compiled = output_dir.join(artifact_filename);
        if !tokio::fs::try_exists(&compiled).await? {
            return Err(StepError::MissingArtifact(format!(
                "mkgmap did not produce {}",
                artifact_filename
            )));
        }
        let artifact = job_dir.join(artifact_filename);
        tokio::fs::rename(&compiled, &artifact).await?;
        debug!("Moved {} into {}", artifact_filename, job_dir.display());
        Ok(artifact)
    }
}

async fn run(tool: &dyn ExternalTool, args: &[String], timeout: Duration) -> Result<(), StepError> {
    let output = tool.invoke(args, timeout).await?;
    if !output.succeeded() {
        return Err(StepError::tool_failed(tool.name(), &output));
    }
    Ok(())
}

async fn split_tiles(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut tiles = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tiles),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_tile = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(SPLIT_TILE_SUFFIX));
        if is_tile {
            tiles.push(path);
        }
    }

    tiles.sort();
    Ok(tiles)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
