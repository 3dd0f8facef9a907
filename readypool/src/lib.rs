//! # readypool
//!
//! A fixed-size pool of workers for running jobs in parallel. Each job goes
//! to whichever worker signals ready first, and each worker runs at most one
//! job at a time. Workers may gate their own readiness, hook into the pool
//! lifecycle and be interrupted when a timed job runs out of time.
//!
//! The crate also carries a small bounded connection pool (`conn`) for
//! workers whose jobs talk to the network.
//!
//! ```rust
//! use readypool::Pool;
//!
//! let pool = Pool::from_fn(4, |x: u64| x * 2).unwrap();
//! pool.open().unwrap();
//! assert_eq!(pool.send_work(10).unwrap(), 20);
//! pool.close();
//! ```

pub mod config;
pub mod conn;
pub mod logging;
pub mod scheduler;
pub mod workers;

pub use config::{
    default_worker_count, ConnectionPoolConfig, PoolConfig, DEFAULT_READY_POLL_INTERVAL,
    DEFAULT_THREAD_NAME_PREFIX, DEFAULT_WARMUP_TIMEOUT,
};
pub use conn::{ChannelPool, ConnectionPool, Factory, PooledConnection};
pub use scheduler::{Pool, ShutdownSignal, WorkerWrapper, WrapperState};
pub use workers::{FnWorker, TaskWorker};

pub use readypool_api::{
    BoxedWorker, Capabilities, Completion, ConnPoolError, Interrupt, PoolError, PoolResult,
    PoolStatus, Task, Worker,
};
