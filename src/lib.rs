//! Shared types for kvbench: error taxonomy, per-benchmark run summaries.
//!
//! The harness itself lives in [`runner`]; the statistics engine in
//! [`histogram`] and [`rawlog`]; deterministic data generation in [`random`];
//! storage backends behind the [`adapters::StorageAdapter`] contract.

pub mod adapters;
pub mod histogram;
pub mod random;
pub mod rawlog;
pub mod report;
pub mod runner;

use serde::Serialize;
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Any backend failure (open, prepare, bind, step, finalize). Fatal to
    /// the run: the runner propagates it and no partial phase stats are kept.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    /// Bad caller input (compression ratio outside [0, 1], zero value size).
    /// Returned rather than aborting so the caller decides.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

// ────────────────────────────────────────────────────────────────────────────────
// Run summaries
// ────────────────────────────────────────────────────────────────────────────────

/// Width of every benchmark key: a zero-padded 16-digit decimal index.
pub const KEY_SIZE: usize = 16;

/// Latency distribution snapshot taken from the histogram at phase end.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub mean_us: f64,
    pub stddev_us: f64,
    pub p50_us: f64,
    pub p75_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub max_us: f64,
}

/// Result of one completed named benchmark.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub ops: u64,
    pub elapsed_secs: f64,
    pub micros_per_op: f64,
    /// Present only when the phase moved bytes (write phases).
    pub mb_per_sec: Option<f64>,
    pub message: String,
    /// Present only when histogram collection was enabled.
    pub latency: Option<LatencySnapshot>,
}
