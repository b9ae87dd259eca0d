use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a map generation job.
///
/// States only move forward along [`PipelineState::SEQUENCE`], except that
/// any non-terminal state may drop straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Queued,
    Downloading,
    Converting,
    Splitting,
    Compiling,
    Completed,
    Failed,
}

impl PipelineState {
    /// The happy path, in order.
    pub const SEQUENCE: [PipelineState; 6] = [
        PipelineState::Queued,
        PipelineState::Downloading,
        PipelineState::Converting,
        PipelineState::Splitting,
        PipelineState::Compiling,
        PipelineState::Completed,
    ];

    /// The state that follows this one on success.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Queued => Some(PipelineState::Downloading),
            PipelineState::Downloading => Some(PipelineState::Converting),
            PipelineState::Converting => Some(PipelineState::Splitting),
            PipelineState::Splitting => Some(PipelineState::Compiling),
            PipelineState::Compiling => Some(PipelineState::Completed),
            PipelineState::Completed | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }

    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == PipelineState::Failed || self.next() == Some(to)
    }

    /// Message shown to pollers when a step starts.
    pub fn progress_message(&self) -> Option<&'static str> {
        match self {
            PipelineState::Downloading => Some("Downloading OSM data..."),
            PipelineState::Converting => Some("Converting to PBF..."),
            PipelineState::Splitting => Some("Splitting map tiles..."),
            PipelineState::Compiling => Some("Compiling Garmin IMG..."),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Queued => "queued",
            PipelineState::Downloading => "downloading",
            PipelineState::Converting => "converting",
            PipelineState::Splitting => "splitting",
            PipelineState::Compiling => "compiling",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
