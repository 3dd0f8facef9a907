use std::time::Duration;

pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const DEFAULT_WARMUP_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "readypool-worker";

/// Number of workers to use when the caller has no better figure.
pub fn default_worker_count() -> usize {
    num_cpus::get()
}

// --- Worker Pool Configuration ---

/// Configuration for a worker `Pool`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// How long a warming-up worker waits between two `ready` polls.
    pub ready_poll_interval: Duration,

    /// How long `open` waits for every worker to report ready once.
    /// Workers still warming up after this are left running and logged.
    /// `None` waits until all of them have reported.
    pub warmup_timeout: Option<Duration>,

    /// Prefix of the worker loop thread names, suffixed with the worker index.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
            warmup_timeout: Some(DEFAULT_WARMUP_TIMEOUT),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    pub fn with_warmup_timeout(mut self, timeout: Duration) -> Self {
        self.warmup_timeout = Some(timeout);
        self
    }

    /// Make `open` block until every worker has warmed up.
    pub fn with_unbounded_warmup(mut self) -> Self {
        self.warmup_timeout = None;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub(crate) fn worker_thread_name(&self, worker: usize) -> String {
        format!("{}-{}", self.thread_name_prefix, worker)
    }

    pub(crate) fn async_thread_name(&self) -> String {
        format!("{}-async", self.thread_name_prefix)
    }
}

// --- Connection Pool Configuration ---

/// Capacity settings for a `ChannelPool`.
#[derive(Clone, Debug)]
pub struct ConnectionPoolConfig {
    /// Connections created up front by the factory.
    pub initial_capacity: usize,

    /// Maximum number of idle connections kept for reuse.
    pub max_capacity: usize,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            max_capacity: num_cpus::get(),
        }
    }
}
