//! # Scheduler Module
//!
//! The worker-pool scheduler: per-worker wrapper loops and the pool manager
//! that routes each job to whichever wrapper becomes ready first.
//!
//! ## Key Concepts
//! - Readiness handshake: a wrapper only receives a job after it signalled
//!   ready, so each worker has at most one job in flight
//! - Timed dispatch: one deadline bounds the whole dispatch; on expiry the
//!   claimed worker is interrupted
//! - Shutdown signal: explicit broadcast object that ends every wait of a
//!   wrapper loop
//!
//! ## Thread Safety
//! - One OS thread per wrapper loop
//! - Rendezvous channels (`flume::bounded(0)`) for the ready and job handoffs
//! - Atomics for the pool status and the pending async counter

mod pool;
mod signal;
mod wrapper;

pub use pool::Pool;
pub use signal::ShutdownSignal;
pub use wrapper::{WorkerWrapper, WrapperState};
