//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the pipeline's collaborator
//! traits, allowing the whole pipeline and HTTP surface to be exercised
//! without network access or the map tools installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use trailforge_core::testing::{fixtures, MockTileSource};
//!
//! let source = MockTileSource::new();
//! source.fail_next(1).await;
//!
//! let tools = fixtures::working_toolchain();
//! tools.compiler.set_exit(1, "mkgmap crashed").await;
//! ```

mod mock_emitter;
mod mock_geocoder;
mod mock_tile_source;
mod mock_tool;

pub use mock_emitter::RecordingEmitter;
pub use mock_geocoder::MockGeocoder;
pub use mock_tile_source::MockTileSource;
pub use mock_tool::{MockTool, ToolEffect, ToolInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::{MockTool, ToolEffect};
    use crate::config::{Config, ToolsConfig};
    use crate::tools::{MapToolchain, SPLIT_TEMPLATE_FILENAME};

    /// A minimal OSM XML document comfortably above the empty-result threshold.
    pub fn sample_osm_xml() -> Vec<u8> {
        br#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="Overpass API">
  <node id="1" lat="45.05" lon="7.05" version="1"/>
  <node id="2" lat="45.06" lon="7.06" version="1"/>
  <way id="10" version="1"><nd ref="1"/><nd ref="2"/><tag k="highway" v="path"/></way>
</osm>
"#
        .to_vec()
    }

    /// Effect writing `contents` to the path following `flag` (e.g. `-o`).
    pub fn writes_flag_value(flag: &str, contents: Vec<u8>) -> ToolEffect {
        let flag = flag.to_string();
        Arc::new(move |args: &[String]| {
            let target = args
                .iter()
                .position(|a| *a == flag)
                .and_then(|i| args.get(i + 1));
            match target {
                Some(path) => std::fs::write(path, &contents),
                None => Ok(()),
            }
        })
    }

    /// Effect creating `files` inside the `--output-dir=` directory.
    pub fn writes_into_output_dir(files: Vec<(&'static str, Vec<u8>)>) -> ToolEffect {
        Arc::new(move |args: &[String]| {
            let Some(dir) = args.iter().find_map(|a| a.strip_prefix("--output-dir=")) else {
                return Ok(());
            };
            let dir = Path::new(dir);
            std::fs::create_dir_all(dir)?;
            for (name, contents) in &files {
                std::fs::write(dir.join(name), contents)?;
            }
            Ok(())
        })
    }

    /// Mock tools wired into a toolchain, kept accessible for assertions.
    #[derive(Clone)]
    pub struct MockToolchain {
        pub osmium: Arc<MockTool>,
        pub splitter: Arc<MockTool>,
        pub compiler: Arc<MockTool>,
        pub toolchain: MapToolchain,
    }

    impl MockToolchain {
        pub fn from_tools(osmium: MockTool, splitter: MockTool, compiler: MockTool) -> Self {
            let osmium = Arc::new(osmium);
            let splitter = Arc::new(splitter);
            let compiler = Arc::new(compiler);
            let toolchain = MapToolchain::new(
                osmium.clone(),
                splitter.clone(),
                compiler.clone(),
                ToolsConfig::default(),
            );
            Self {
                osmium,
                splitter,
                compiler,
                toolchain,
            }
        }
    }

    /// Tools that succeed and write the files the real ones would.
    pub fn working_toolchain() -> MockToolchain {
        MockToolchain::from_tools(
            MockTool::new("osmium").with_effect(writes_flag_value("-o", sample_osm_xml())),
            MockTool::new("splitter").with_effect(writes_into_output_dir(vec![
                ("63240001.osm.pbf", b"split tile".to_vec()),
                (SPLIT_TEMPLATE_FILENAME, b"input-file: 63240001.osm.pbf\n".to_vec()),
            ])),
            MockTool::new("mkgmap").with_effect(writes_into_output_dir(vec![(
                "gmapsupp.img",
                vec![0u8; 4096],
            )])),
        )
    }

    /// Default configuration rooted at `data_dir`, with no pauses.
    pub fn test_config(data_dir: impl Into<PathBuf>) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = data_dir.into();
        config.overpass.retry_delay_ms = 0;
        config.overpass.tile_pause_ms = 0;
        config
    }
}
