use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_queue::ArrayQueue;
use tracing::debug;

use readypool_api::ConnPoolError;

use crate::config::ConnectionPoolConfig;
use super::pooled::PooledConnection;
use super::ConnectionPool;

/// Creates a new connection when the idle cache is empty.
pub type Factory<C> = Arc<dyn Fn() -> anyhow::Result<C> + Send + Sync>;

/// Connection pool backed by a bounded lock-free queue of idle connections.
///
/// # Thread Safety
/// - `ChannelPool` is a cheap handle; clones share the same cache
/// - The queue handle sits behind a mutex only so `close` can swap it out;
///   pushes and pops run on the `ArrayQueue` itself
pub struct ChannelPool<C> {
    shared: Arc<Shared<C>>,
}

pub(crate) struct Shared<C> {
    idle: Mutex<Option<Arc<ArrayQueue<C>>>>,
    factory: Factory<C>,
    max_capacity: usize,
}

impl<C> Clone for ChannelPool<C> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<C: Send + 'static> fmt::Debug for ChannelPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("idle", &self.shared.idle_len())
            .field("max_capacity", &self.shared.max_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<C: Send + 'static> ChannelPool<C> {
    /// Create a pool and fill it with `initial_capacity` connections.
    ///
    /// # Errors
    /// - `InvalidCapacity` if `max_capacity` is zero or below `initial_capacity`
    /// - `Fill` if the factory fails while pre-filling; connections created so
    ///   far are dropped
    pub fn new<F>(initial_capacity: usize, max_capacity: usize, factory: F) -> Result<Self, ConnPoolError>
    where
        F: Fn() -> anyhow::Result<C> + Send + Sync + 'static,
    {
        if max_capacity == 0 || initial_capacity > max_capacity {
            return Err(ConnPoolError::InvalidCapacity {
                initial: initial_capacity,
                max: max_capacity,
            });
        }

        let idle = Arc::new(ArrayQueue::new(max_capacity));
        let pool = Self {
            shared: Arc::new(Shared {
                idle: Mutex::new(Some(idle.clone())),
                factory: Arc::new(factory),
                max_capacity,
            }),
        };

        for _ in 0..initial_capacity {
            match (pool.shared.factory)() {
                Ok(conn) => {
                    // Cannot overflow, initial_capacity <= max_capacity
                    let _ = idle.push(conn);
                }
                Err(e) => {
                    pool.close();
                    return Err(ConnPoolError::Fill(e));
                }
            }
        }

        Ok(pool)
    }

    pub fn from_config<F>(config: &ConnectionPoolConfig, factory: F) -> Result<Self, ConnPoolError>
    where
        F: Fn() -> anyhow::Result<C> + Send + Sync + 'static,
    {
        Self::new(config.initial_capacity, config.max_capacity, factory)
    }

    pub fn max_capacity(&self) -> usize {
        self.shared.max_capacity
    }

    pub fn is_closed(&self) -> bool {
        self.shared.idle_queue().is_none()
    }
}

impl<C: Send + 'static> ConnectionPool for ChannelPool<C> {
    type Conn = C;
    type Handle = PooledConnection<C>;

    fn acquire(&self) -> Result<PooledConnection<C>, ConnPoolError> {
        let idle = self.shared.idle_queue().ok_or(ConnPoolError::Closed)?;
        let conn = match idle.pop() {
            Some(conn) => conn,
            None => (self.shared.factory)().map_err(ConnPoolError::Factory)?,
        };
        Ok(PooledConnection::new(conn, Arc::downgrade(&self.shared)))
    }

    fn release(&self, conn: C) {
        self.shared.put(conn);
    }

    fn close(&self) {
        let idle = self.shared.lock_idle().take();
        if let Some(idle) = idle {
            let mut dropped = 0;
            while let Some(conn) = idle.pop() {
                drop(conn);
                dropped += 1;
            }
            debug!(dropped, "connection pool closed");
        }
    }

    fn size(&self) -> usize {
        self.shared.idle_len()
    }
}

impl<C> Shared<C> {
    fn lock_idle(&self) -> MutexGuard<'_, Option<Arc<ArrayQueue<C>>>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn idle_queue(&self) -> Option<Arc<ArrayQueue<C>>> {
        self.lock_idle().clone()
    }

    fn idle_len(&self) -> usize {
        self.idle_queue().map_or(0, |idle| idle.len())
    }

    /// Return a connection to the cache, or drop it if closed or full.
    pub(crate) fn put(&self, conn: C) {
        let guard = self.lock_idle();
        match guard.as_ref() {
            Some(idle) => {
                if let Err(conn) = idle.push(conn) {
                    drop(conn);
                    debug!("idle cache full, connection dropped");
                }
            }
            None => {
                drop(conn);
                debug!("connection pool closed, connection dropped");
            }
        }
    }
}
