//! # Readypool API
//!
//! Readypool is a fixed-size worker pool: a bounded set of long-lived workers,
//! each polled for readiness before it is handed a job. This crate holds the
//! contract between a worker and the pool, free of threads and channels, so
//! worker implementations can depend on it alone.
//!
//! ## Core Components
//!
//! - **Worker**: the unit of executable work (`job` + `ready`)
//! - **Capabilities**: optional lifecycle hooks and interruptibility,
//!   declared once per worker
//! - **Interrupt**: thread-safe handle that unblocks a stuck worker
//! - **Errors**: the error taxonomy of the worker pool and connection pool
//!
//! ## Usage Example
//!
//! ```rust
//! use readypool_api::{Capabilities, Worker};
//!
//! struct Doubler;
//!
//! impl Worker for Doubler {
//!     type Input = u64;
//!     type Output = u64;
//!
//!     fn job(&mut self, input: u64) -> u64 {
//!         input * 2
//!     }
//! }
//!
//! assert_eq!(Doubler.capabilities(), Capabilities::BASIC);
//! ```
//!
//! ## Module Organization
//!
//! - [`worker`]: Worker trait, capability descriptor and interrupt handle
//! - [`errors`]: Error types
//! - [`types`]: Common type definitions

pub mod errors;
pub mod types;
pub mod worker;

pub use errors::{ConnPoolError, PoolError};
pub use types::{BoxedWorker, Completion, PoolResult, Task};
pub use worker::{Capabilities, Interrupt, Worker};

/// Lifecycle status of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Constructed, not opened yet
    Created = 0,
    /// Open and accepting work
    Running = 1,
    /// `close` is in progress
    ShuttingDown = 2,
    /// Fully closed
    Closed = 3,
}

impl PoolStatus {
    pub fn from_usize(value: usize) -> Self {
        match value {
            0 => PoolStatus::Created,
            1 => PoolStatus::Running,
            2 => PoolStatus::ShuttingDown,
            _ => PoolStatus::Closed,
        }
    }
}
