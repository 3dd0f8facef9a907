use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use readypool_api::{BoxedWorker, Completion, PoolError, PoolResult, PoolStatus, Task};

use crate::config::PoolConfig;
use crate::workers::{FnWorker, TaskWorker};
use super::signal::ShutdownSignal;
use super::wrapper::{Assignment, WorkerWrapper};

/// Fixed-size worker pool
///
/// A `Pool` presents one logical work acceptor backed by a fixed set of
/// workers. Each job goes to whichever worker signals ready first.
///
/// # Thread Safety
/// - `Pool` is a cheap handle; clones share the same workers
/// - All dispatch methods take `&self` and may be called from many threads
/// - The pending async counter and the status are atomics
///
/// # Lifecycle
/// 1. Construct (`from_fn`, `from_workers`, `generic`)
/// 2. `open` starts every worker loop and waits for them to warm up
/// 3. `send_work*` dispatches jobs
/// 4. `close` stops and joins every worker; dropping the last handle closes too
pub struct Pool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    inner: Arc<PoolInner<I, O>>,
}

struct PoolInner<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    id: Uuid,
    wrappers: Vec<WorkerWrapper<I, O>>,
    ready: Receiver<usize>,
    pending: Arc<AtomicUsize>,
    status: AtomicUsize,
    closing: ShutdownSignal,
    config: PoolConfig,
    lifecycle: Mutex<()>,
}

impl<I, O> Clone for Pool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<I, O> fmt::Debug for Pool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("workers", &self.inner.wrappers.len())
            .field("pending_async_jobs", &self.num_pending_async_jobs())
            .field("status", &self.status())
            .finish()
    }
}

impl<I, O> Pool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a pool of `worker_count` workers that all run `job`.
    pub fn from_fn<F>(worker_count: usize, job: F) -> PoolResult<Self>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Self::from_fn_with_config(worker_count, job, PoolConfig::default())
    }

    pub fn from_fn_with_config<F>(worker_count: usize, job: F, config: PoolConfig) -> PoolResult<Self>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        if worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount(worker_count));
        }
        let job = Arc::new(job);
        let workers = (0..worker_count)
            .map(|_| Box::new(FnWorker::from_shared(job.clone())) as BoxedWorker<I, O>)
            .collect();
        Self::from_workers_with_config(workers, config)
    }

    /// Create a pool from explicit worker instances, which may mix
    /// capabilities.
    pub fn from_workers(workers: Vec<BoxedWorker<I, O>>) -> PoolResult<Self> {
        Self::from_workers_with_config(workers, PoolConfig::default())
    }

    pub fn from_workers_with_config(
        workers: Vec<BoxedWorker<I, O>>,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        if workers.is_empty() {
            return Err(PoolError::InvalidWorkerCount(0));
        }
        // Loops are the only senders, so the queue disconnects once all have exited
        let (ready_tx, ready) = flume::unbounded();
        let wrappers = workers
            .into_iter()
            .enumerate()
            .map(|(id, worker)| WorkerWrapper::new(id, worker, ready_tx.clone()))
            .collect();

        Ok(Self {
            inner: Arc::new(PoolInner {
                id: Uuid::new_v4(),
                wrappers,
                ready,
                pending: Arc::new(AtomicUsize::new(0)),
                status: AtomicUsize::new(PoolStatus::Created as usize),
                closing: ShutdownSignal::new(),
                config,
                lifecycle: Mutex::new(()),
            }),
        })
    }

    /// Start every worker and wait for each to report ready once.
    ///
    /// The wait is bounded by `PoolConfig::warmup_timeout` unless that is
    /// `None`; workers still warming up after the bound stay in the pool.
    /// Opening a running pool does nothing, opening a closed pool fails
    /// with `Closed`.
    pub fn open(&self) -> PoolResult<()> {
        let inner = &self.inner;
        let _lifecycle = inner.lock_lifecycle();
        let _span = crate::pool_span!(inner.id).entered();
        match inner.status() {
            PoolStatus::Created => {}
            PoolStatus::Running => return Ok(()),
            PoolStatus::ShuttingDown | PoolStatus::Closed => return Err(PoolError::Closed),
        }

        let (warmup_tx, warmup_rx) = flume::unbounded();
        for (idx, wrapper) in inner.wrappers.iter().enumerate() {
            if let Err(e) = wrapper.open_reporting(&inner.config, Some(warmup_tx.clone())) {
                crate::log_error!(e, pool = %inner.id, worker = idx);
                let opened = &inner.wrappers[..idx];
                opened.iter().for_each(WorkerWrapper::close);
                opened.iter().for_each(WorkerWrapper::join);
                inner.closing.trigger();
                inner.set_status(PoolStatus::Closed);
                return Err(e);
            }
        }
        drop(warmup_tx);

        inner.set_status(PoolStatus::Running);
        inner.await_warmup(warmup_rx);
        crate::log_pool!(inner.id, "opened", workers = inner.wrappers.len());
        Ok(())
    }

    /// Run `input` on the first worker to become ready and wait for the
    /// result.
    pub fn send_work(&self, input: I) -> PoolResult<O> {
        self.inner.dispatch(input, None)
    }

    /// Like `send_work`, bounded by one overall `timeout`.
    ///
    /// If the deadline passes after a worker took the job, that worker is
    /// interrupted and its eventual result is discarded.
    pub fn send_work_timed(&self, timeout: Duration, input: I) -> PoolResult<O> {
        self.inner.dispatch(input, Some(timeout))
    }

    pub fn send_work_timed_ms(&self, timeout_ms: u64, input: I) -> PoolResult<O> {
        self.send_work_timed(Duration::from_millis(timeout_ms), input)
    }

    /// Dispatch `input` on a separate thread and return immediately.
    ///
    /// The result, or the dispatch error, goes to `on_complete` if one is
    /// given. The pending counter covers the job until the callback returns.
    /// If the helper thread cannot be spawned the callback gets a
    /// `Construction` error right here, on the caller's thread.
    pub fn send_work_async(&self, input: I, on_complete: Option<Completion<O>>) {
        let job = AsyncJob {
            input,
            on_complete,
            _pending: PendingGuard::new(self.inner.pending.clone()),
        };
        let pool = self.clone();
        let pool_id = self.inner.id;

        // The job is only handed over once the thread exists, so a failed
        // spawn still has it at hand to report
        let (job_tx, job_rx) = flume::bounded::<AsyncJob<I, O>>(1);
        let spawned = thread::Builder::new()
            .name(self.inner.config.async_thread_name())
            .spawn(move || {
                if let Ok(job) = job_rx.recv() {
                    job.run(&pool, pool_id);
                }
            });

        match spawned {
            Ok(_) => {
                if let Err(flume::SendError(job)) = job_tx.send(job) {
                    job.abandon(pool_id, PoolError::Closed);
                }
            }
            Err(e) => {
                error!(pool = %pool_id, error = %e, "failed to spawn async dispatch thread");
                job.abandon(
                    pool_id,
                    PoolError::Construction(format!("failed to spawn async dispatch thread: {}", e)),
                );
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.inner.wrappers.len()
    }

    /// Snapshot of async jobs submitted but not completed.
    pub fn num_pending_async_jobs(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Close every worker, join them (running `terminate` hooks) and reject
    /// further work. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Pool<Task, ()> {
    /// Create a pool whose jobs are closures run by the workers.
    pub fn generic(worker_count: usize) -> PoolResult<Self> {
        Self::generic_with_config(worker_count, PoolConfig::default())
    }

    pub fn generic_with_config(worker_count: usize, config: PoolConfig) -> PoolResult<Self> {
        if worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount(worker_count));
        }
        let workers = (0..worker_count)
            .map(|_| Box::new(TaskWorker) as BoxedWorker<Task, ()>)
            .collect();
        Self::from_workers_with_config(workers, config)
    }
}

impl<I, O> PoolInner<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn status(&self) -> PoolStatus {
        PoolStatus::from_usize(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: PoolStatus) {
        self.status.store(status as usize, Ordering::Release);
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_running(&self) -> PoolResult<()> {
        match self.status() {
            PoolStatus::Running => Ok(()),
            PoolStatus::Created => Err(PoolError::NotRunning),
            PoolStatus::ShuttingDown | PoolStatus::Closed => Err(PoolError::Closed),
        }
    }

    fn await_warmup(&self, warmup_rx: Receiver<usize>) {
        let expected = self.wrappers.len();
        let deadline = self.config.warmup_timeout.map(|t| Instant::now() + t);
        let mut warmed = 0;
        while warmed < expected {
            let reported = match deadline {
                Some(deadline) => warmup_rx.recv_deadline(deadline).ok(),
                None => warmup_rx.recv().ok(),
            };
            match reported {
                Some(worker) => {
                    debug!(pool = %self.id, worker, "worker warmed up");
                    warmed += 1;
                }
                None => break,
            }
        }
        if warmed < expected {
            warn!(
                pool = %self.id,
                warmed,
                workers = expected,
                "not every worker reported ready during warm-up"
            );
        }
    }

    fn dispatch(&self, input: I, timeout: Option<Duration>) -> PoolResult<O> {
        self.ensure_running()?;
        let deadline = timeout.map(|t| Instant::now() + t);
        let timed_out = || PoolError::Timeout(timeout.unwrap_or_default());

        let worker = self.claim_ready_worker(deadline).map_err(|e| match e {
            RecvTimeoutError::Timeout if !self.closing.is_triggered() => timed_out(),
            _ => PoolError::Closed,
        })?;
        let wrapper = &self.wrappers[worker];

        // The claimed loop is blocked on its empty job slot, so this never waits
        let (reply, result) = flume::bounded(1);
        wrapper
            .assign(Assignment { input, reply })
            .map_err(|_| PoolError::Closed)?;
        crate::log_dispatch!(worker, "handed off", pool = %self.id);

        let output = match deadline {
            Some(deadline) => result.recv_deadline(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    wrapper.interrupt();
                    timed_out()
                }
                RecvTimeoutError::Disconnected => PoolError::WorkerPanicked { worker },
            }),
            None => result.recv().map_err(|_| PoolError::WorkerPanicked { worker }),
        };

        if let Err(PoolError::Timeout(after)) = &output {
            warn!(pool = %self.id, worker, timeout = ?after, "job timed out, worker interrupted");
        }
        output
    }

    /// Take the next wrapper id off the ready queue.
    ///
    /// `Disconnected` once every loop has exited, which only happens on close.
    fn claim_ready_worker(&self, deadline: Option<Instant>) -> Result<usize, RecvTimeoutError> {
        match deadline {
            Some(deadline) => self.ready.recv_deadline(deadline),
            None => self.ready.recv().map_err(|_| RecvTimeoutError::Disconnected),
        }
    }

    fn close(&self) {
        let _lifecycle = self.lock_lifecycle();
        match self.status() {
            PoolStatus::Closed => return,
            PoolStatus::Created => {
                self.closing.trigger();
                self.set_status(PoolStatus::Closed);
                return;
            }
            PoolStatus::Running | PoolStatus::ShuttingDown => {}
        }
        let _span = crate::pool_span!(self.id).entered();

        self.set_status(PoolStatus::ShuttingDown);
        self.closing.trigger();
        crate::log_pool!(self.id, "closing", pending_async_jobs = self.pending.load(Ordering::Acquire));

        self.wrappers.iter().for_each(WorkerWrapper::close);
        self.wrappers.iter().for_each(WorkerWrapper::join);

        self.set_status(PoolStatus::Closed);
        info!(pool = %self.id, "pool closed");
    }
}

impl<I, O> Drop for PoolInner<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

/// Counts one async job for as long as it lives.
struct PendingGuard {
    counter: Arc<AtomicUsize>,
}

impl PendingGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An async submission on its way to the helper thread.
struct AsyncJob<I, O> {
    input: I,
    on_complete: Option<Completion<O>>,
    // Released after the callback returns
    _pending: PendingGuard,
}

impl<I, O> AsyncJob<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn run(self, pool: &Pool<I, O>, pool_id: Uuid) {
        let result = pool.send_work(self.input);
        complete(pool_id, self.on_complete, result);
    }

    /// Report `error` without dispatching.
    fn abandon(self, pool_id: Uuid, error: PoolError) {
        complete(pool_id, self.on_complete, Err(error));
    }
}

fn complete<O>(pool_id: Uuid, on_complete: Option<Completion<O>>, result: PoolResult<O>) {
    match on_complete {
        Some(callback) => callback(result),
        None => {
            if let Err(e) = result {
                debug!(pool = %pool_id, error = %e, "async job failed, no completion callback");
            }
        }
    }
}
