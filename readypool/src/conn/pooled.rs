use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use tracing::debug;

use super::channel_pool::Shared;

/// A connection borrowed from a `ChannelPool`.
///
/// Dropping the handle gives the connection back to the pool. A connection
/// marked unusable (after an I/O error, say) is dropped instead, which closes
/// it. If the pool itself is gone the connection is dropped too.
pub struct PooledConnection<C> {
    conn: Option<C>,
    pool: Weak<Shared<C>>,
    unusable: bool,
}

impl<C> PooledConnection<C> {
    pub(crate) fn new(conn: C, pool: Weak<Shared<C>>) -> Self {
        Self { conn: Some(conn), pool, unusable: false }
    }

    /// Do not return this connection to the pool.
    pub fn mark_unusable(&mut self) {
        self.unusable = true;
    }

    pub fn is_unusable(&self) -> bool {
        self.unusable
    }

    /// Take the connection out of the pool's care for good.
    pub fn detach(mut self) -> C {
        match self.conn.take() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken on detach or drop"),
        }
    }

    fn conn_ref(&self) -> &C {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is only taken on detach or drop"),
        }
    }

    fn conn_mut(&mut self) -> &mut C {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is only taken on detach or drop"),
        }
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn_ref()
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn_mut()
    }
}

impl<C: fmt::Debug> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("unusable", &self.unusable)
            .finish()
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.unusable {
            debug!("unusable connection dropped");
            return;
        }
        match self.pool.upgrade() {
            Some(pool) => pool.put(conn),
            None => drop(conn),
        }
    }
}
