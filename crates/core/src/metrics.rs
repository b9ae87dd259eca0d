//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (outcomes, wall-clock duration, per-step duration)
//! - Tile downloads (attempts, tiles per job)
//! - External map tools (invocations, duration)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Finished jobs by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trailforge_jobs_total", "Total map generation jobs finished"),
        &["result"], // "completed", "failed", "timed_out"
    )
    .unwrap()
});

/// End-to-end job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("trailforge_job_duration_seconds", "Duration of whole jobs")
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 240.0, 420.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

/// Duration of each pipeline step in seconds.
pub static STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trailforge_step_duration_seconds",
            "Duration of individual pipeline steps",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["step", "result"],
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Individual tile fetch attempts by result.
pub static TILE_FETCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trailforge_tile_fetch_attempts_total",
            "Total tile fetch attempts against the upstream source",
        ),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Tiles needed per job.
pub static TILES_PER_JOB: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("trailforge_tiles_per_job", "Number of tiles fetched per job")
            .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0]),
    )
    .unwrap()
});

// =============================================================================
// External Tool Metrics
// =============================================================================

/// External tool invocations by tool and result.
pub static TOOL_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trailforge_tool_invocations_total",
            "Total external tool invocations",
        ),
        &["tool", "result"], // result: "success", "failure", "timeout"
    )
    .unwrap()
});

/// External tool run time in seconds.
pub static TOOL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trailforge_tool_duration_seconds",
            "Duration of external tool runs",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["tool"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(STEP_DURATION.clone()),
        // Downloads
        Box::new(TILE_FETCH_ATTEMPTS.clone()),
        Box::new(TILES_PER_JOB.clone()),
        // Tools
        Box::new(TOOL_INVOCATIONS.clone()),
        Box::new(TOOL_DURATION.clone()),
    ]
}
