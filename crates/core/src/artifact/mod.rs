//! Serving finished map artifacts, whole or by byte range.
//!
//! Each job directory exposes exactly one file. Anything else is refused
//! before the filesystem is touched.

mod range;

pub use range::{parse_range, ByteRange, RangeError};

use std::io::SeekFrom;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid filename: {filename} (expected {expected})")]
    InvalidFilename { filename: String, expected: String },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("File not found")]
    NotFound { job_id: String },

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Location and size of an artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// An open artifact ready to stream.
pub struct ArtifactDownload {
    pub filename: String,
    pub file_size: u64,
    /// Present for partial responses.
    pub range: Option<ByteRange>,
    pub body: ReaderStream<Take<File>>,
}

impl ArtifactDownload {
    /// Number of bytes the body will yield.
    pub fn content_length(&self) -> u64 {
        self.range.map(|r| r.byte_count()).unwrap_or(self.file_size)
    }

    pub fn content_range(&self) -> Option<String> {
        self.range.map(|r| r.content_range(self.file_size))
    }
}

/// Read-only access to artifacts under the data directory.
#[derive(Debug, Clone)]
pub struct ArtifactServer {
    data_dir: PathBuf,
    filename: String,
    chunk_size: usize,
}

impl ArtifactServer {
    pub fn new(data_dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            filename: filename.into(),
            chunk_size: 1024 * 1024,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.data_dir, &config.artifact_filename)
            .with_chunk_size(config.download_chunk_bytes)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The only filename this server hands out.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Checks the request and locates the artifact.
    pub async fn resolve(
        &self,
        job_id: &str,
        filename: &str,
    ) -> Result<ResolvedArtifact, ArtifactError> {
        if filename != self.filename {
            return Err(ArtifactError::InvalidFilename {
                filename: filename.to_string(),
                expected: self.filename.clone(),
            });
        }
        if !is_valid_job_id(job_id) {
            return Err(ArtifactError::InvalidJobId(job_id.to_string()));
        }

        let path = self.data_dir.join(job_id).join(&self.filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ResolvedArtifact {
                path,
                filename: self.filename.clone(),
                size: meta.len(),
            }),
            Ok(_) => Err(ArtifactError::NotFound {
                job_id: job_id.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArtifactError::NotFound {
                job_id: job_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens the artifact, honouring an optional `Range` header value.
    pub async fn open(
        &self,
        job_id: &str,
        filename: &str,
        range_header: Option<&str>,
    ) -> Result<ArtifactDownload, ArtifactError> {
        let artifact = self.resolve(job_id, filename).await?;
        let range = range_header
            .map(|header| parse_range(header, artifact.size))
            .transpose()?;

        let mut file = File::open(&artifact.path).await?;
        let length = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                range.byte_count()
            }
            None => artifact.size,
        };

        debug!(
            job_id,
            "Serving {} ({:?} of {} bytes)",
            artifact.filename,
            range,
            artifact.size
        );

        Ok(ArtifactDownload {
            filename: artifact.filename,
            file_size: artifact.size,
            range,
            body: ReaderStream::with_capacity(file.take(length), self.chunk_size),
        })
    }
}

/// A job id must be a single plain path component.
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
