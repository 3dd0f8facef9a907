//! # Connection Pool Module
//!
//! A bounded cache of reusable connections. It carries no scheduling logic
//! and the worker pool never calls it; workers whose jobs do I/O may hold one.
//!
//! ## Key Concepts
//! - Idle cache: at most `max_capacity` idle connections are kept
//! - Factory: creates a connection when the cache is empty
//! - Pooled handle: returns its connection on drop unless marked unusable
//!
//! Closing a connection is dropping it, so the pool works with any type whose
//! `Drop` releases the underlying resource (`TcpStream`, `UnixStream`, ...).

mod channel_pool;
mod pooled;

use std::ops::DerefMut;

use readypool_api::ConnPoolError;

pub use channel_pool::{ChannelPool, Factory};
pub use pooled::PooledConnection;

/// Common interface for connection pools
pub trait ConnectionPool: Send + Sync {
    /// Connection type handed out by the pool
    type Conn;
    /// Handle that gives access to a connection while it is borrowed
    type Handle: DerefMut<Target = Self::Conn>;

    /// Take an idle connection, or create one if none is idle.
    fn acquire(&self) -> Result<Self::Handle, ConnPoolError>;

    /// Give a connection back. Dropped instead if the pool is closed or full.
    fn release(&self, conn: Self::Conn);

    /// Drop every idle connection and refuse further acquires.
    fn close(&self);

    /// Number of idle connections.
    fn size(&self) -> usize;
}
