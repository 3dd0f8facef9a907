//! # Pool Error Types
//!
//! This module defines the error types shared by the worker pool and the
//! connection pool.
//!
//! ## Error Classification
//!
//! - Construction errors: invalid worker count, a worker's setup step failed.
//!   Fatal to the pool instance that raised them.
//! - Closed-pool errors: work dispatched after `close`. Recoverable, the
//!   caller must not reuse the pool.
//! - Timeouts: a timed dispatch ran past its deadline. The caller may retry.
//!
//! ## Usage Example
//!
//! ```rust
//! use readypool_api::errors::PoolError;
//!
//! fn describe(error: PoolError) -> &'static str {
//!     match error {
//!         PoolError::Timeout(_) => "retry later",
//!         PoolError::Closed => "pool is gone",
//!         _ => "unexpected",
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the worker pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool needs at least one worker.
    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(usize),

    /// A worker failed to initialize or its loop thread could not be started.
    #[error("Pool construction failed: {0}")]
    Construction(String),

    /// The pool has not been opened yet.
    #[error("Pool is not running")]
    NotRunning,

    /// The pool has been closed, or is closing.
    #[error("Pool is closed")]
    Closed,

    /// A timed dispatch did not obtain a result before its deadline.
    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    /// The worker panicked while running the job, no result was produced.
    #[error("Worker {worker} panicked while running a job")]
    WorkerPanicked { worker: usize },
}

impl PoolError {
    /// Whether retrying the same dispatch later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Timeout(_) | PoolError::WorkerPanicked { .. })
    }
}

/// Errors raised by the connection pool.
#[derive(Error, Debug)]
pub enum ConnPoolError {
    #[error("Invalid capacity settings (initial: {initial}, max: {max})")]
    InvalidCapacity { initial: usize, max: usize },

    /// The factory failed while pre-filling the pool.
    #[error("Factory is not able to fill the pool: {0}")]
    Fill(#[source] anyhow::Error),

    /// The factory failed while serving an `acquire` with no idle connection.
    #[error("Failed to create connection: {0}")]
    Factory(#[source] anyhow::Error),

    #[error("Connection pool is closed")]
    Closed,
}
