//! # Worker Wrapper Module
//!
//! Runs one worker's readiness / job / result cycle on a dedicated thread.
//!
//! ## Loop Protocol
//! 1. Warming up: poll `ready()` every `ready_poll_interval` until it holds
//! 2. Push the wrapper id onto the pool's ready queue
//! 3. Wait for an assignment on the wrapper's own job slot
//! 4. Run the job and send the result to the assignment's reply slot
//! 5. Back to 1, or straight to 3 once the wrapper is closed
//!
//! An id on the ready queue always stands for a loop blocked in step 3, and
//! each loop pushes its id once per cycle. Whoever pops the id owns that
//! loop's next job, so a readiness report is never lost or double-claimed.
//!
//! `close` fires the shutdown signal (ending a warm-up wait) and drops the
//! job sender (ending a job wait). A loop busy inside `ready()` or `job()`
//! only notices once the worker returns; `interrupt` exists for that.
//!
//! ## Ownership
//! The worker is moved onto the loop thread by `open` and handed back through
//! the thread's join handle, so `terminate` runs on the joining thread only
//! after the loop is gone.

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, error, warn};

use readypool_api::{BoxedWorker, Capabilities, Interrupt, PoolError, PoolResult, Worker};

use crate::config::PoolConfig;
use crate::logging;
use super::signal::ShutdownSignal;

/// One job handed to a wrapper, with the slot its result goes to.
///
/// The reply channel holds a single value, so the loop never blocks on it.
/// If the dispatcher stopped waiting, the result is dropped.
pub(crate) struct Assignment<I, O> {
    pub(crate) input: I,
    pub(crate) reply: Sender<O>,
}

/// States a wrapper can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    /// Constructed, loop not started
    Idle,
    /// Loop thread started
    Running,
    /// Loop thread joined (or never started because open failed)
    Joined,
}

enum Slot<I, O> {
    Idle(LoopParts<I, O>),
    Running(JoinHandle<BoxedWorker<I, O>>),
    Joined,
}

/// Everything the loop thread takes ownership of.
struct LoopParts<I, O> {
    worker: BoxedWorker<I, O>,
    ready_tx: Sender<usize>,
    job_rx: Receiver<Assignment<I, O>>,
}

struct LoopContext<I, O> {
    id: usize,
    ready_tx: Sender<usize>,
    job_rx: Receiver<Assignment<I, O>>,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
    warmup: Option<Sender<usize>>,
}

/// Scheduler-owned execution loop around one worker.
pub struct WorkerWrapper<I, O> {
    id: usize,
    capabilities: Capabilities,
    interrupter: Option<Arc<dyn Interrupt>>,
    job_tx: Mutex<Option<Sender<Assignment<I, O>>>>,
    shutdown: ShutdownSignal,
    slot: Mutex<Slot<I, O>>,
}

impl<I, O> fmt::Debug for WorkerWrapper<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerWrapper")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state())
            .field("closed", &self.shutdown.is_triggered())
            .finish()
    }
}

impl<I, O> WorkerWrapper<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Wrap a worker. Its capabilities are read here, once.
    ///
    /// `ready` receives the wrapper id each time the worker is ready for a
    /// job; the receiver hands that job over with `assign`.
    pub fn new(id: usize, worker: BoxedWorker<I, O>, ready: Sender<usize>) -> Self {
        let capabilities = worker.capabilities();
        let interrupter = if capabilities.interruptible {
            let handle = worker.interrupter();
            if handle.is_none() {
                warn!(worker = id, "worker declares interrupt support but provides no handle");
            }
            handle
        } else {
            None
        };

        // One slot: the loop takes at most one assignment per readiness report
        let (job_tx, job_rx) = flume::bounded(1);

        Self {
            id,
            capabilities,
            interrupter,
            job_tx: Mutex::new(Some(job_tx)),
            shutdown: ShutdownSignal::new(),
            slot: Mutex::new(Slot::Idle(LoopParts { worker, ready_tx: ready, job_rx })),
        }
    }

    /// Initialize the worker (if it has lifecycle hooks) and start its loop.
    pub fn open(&self, config: &PoolConfig) -> PoolResult<()> {
        self.open_reporting(config, None)
    }

    /// Like `open`, and the loop sends its id on `warmup` the first time
    /// the worker reports ready.
    pub(crate) fn open_reporting(
        &self,
        config: &PoolConfig,
        warmup: Option<Sender<usize>>,
    ) -> PoolResult<()> {
        let mut slot = self.lock_slot();
        let LoopParts { mut worker, ready_tx, job_rx } = match mem::replace(&mut *slot, Slot::Joined) {
            Slot::Idle(parts) => parts,
            other => {
                *slot = other;
                return Err(PoolError::Construction(format!(
                    "worker {} has already been opened",
                    self.id
                )));
            }
        };

        if self.capabilities.lifecycle {
            worker.initialize().map_err(|e| {
                PoolError::Construction(format!("worker {} failed to initialize: {:#}", self.id, e))
            })?;
        }

        let ctx = LoopContext {
            id: self.id,
            ready_tx,
            job_rx,
            shutdown: self.shutdown.clone(),
            poll_interval: config.ready_poll_interval,
            warmup,
        };
        let dispatch = logging::current_subscriber();

        let handle = thread::Builder::new()
            .name(config.worker_thread_name(self.id))
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || run_loop(worker, ctx)))
            .map_err(|e| {
                PoolError::Construction(format!(
                    "failed to spawn loop thread for worker {}: {}",
                    self.id, e
                ))
            })?;

        *slot = Slot::Running(handle);
        debug!(worker = self.id, capabilities = %self.capabilities, "worker wrapper opened");
        Ok(())
    }

    /// Hand a job to the loop. Only valid right after taking this wrapper's
    /// id off the ready queue.
    ///
    /// Gives the assignment back if the wrapper has been closed.
    pub(crate) fn assign(&self, assignment: Assignment<I, O>) -> Result<(), Assignment<I, O>> {
        match self.lock_job_tx().as_ref() {
            Some(job_tx) => job_tx.try_send(assignment).map_err(|e| {
                if let TrySendError::Full(_) = &e {
                    error!(worker = self.id, "job slot already taken, assignment refused");
                }
                e.into_inner()
            }),
            None => Err(assignment),
        }
    }

    /// Mark the wrapper closed. The loop exits at its next wait; use `join`
    /// to wait for it.
    pub fn close(&self) {
        let fired = self.shutdown.trigger();
        let job_tx = self.lock_job_tx().take();
        drop(job_tx);
        if fired {
            debug!(worker = self.id, "worker wrapper closing");
        }
    }

    /// Wait for the loop to exit, then run the worker's `terminate` hook.
    ///
    /// Only meaningful after `close`. Calling it again, or on a wrapper that
    /// was never opened, does nothing.
    pub fn join(&self) {
        let handle = {
            let mut slot = self.lock_slot();
            match mem::replace(&mut *slot, Slot::Joined) {
                Slot::Running(handle) => handle,
                other => {
                    *slot = other;
                    return;
                }
            }
        };

        match handle.join() {
            Ok(mut worker) => {
                if self.capabilities.lifecycle {
                    worker.terminate();
                }
                debug!(worker = self.id, "worker wrapper joined");
            }
            Err(_) => {
                error!(worker = self.id, "worker loop thread panicked, terminate skipped");
            }
        }
    }

    /// Ask the worker to abandon whatever it is blocked on.
    /// No-op for workers without interrupt support.
    pub fn interrupt(&self) {
        if let Some(interrupter) = &self.interrupter {
            debug!(worker = self.id, "interrupting worker");
            interrupter.interrupt();
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_open(&self) -> bool {
        self.state() == WrapperState::Running && !self.shutdown.is_triggered()
    }

    pub fn state(&self) -> WrapperState {
        match &*self.lock_slot() {
            Slot::Idle(_) => WrapperState::Idle,
            Slot::Running(_) => WrapperState::Running,
            Slot::Joined => WrapperState::Joined,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<I, O>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_job_tx(&self) -> MutexGuard<'_, Option<Sender<Assignment<I, O>>>> {
        self.job_tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn run_loop<I, O>(mut worker: BoxedWorker<I, O>, ctx: LoopContext<I, O>) -> BoxedWorker<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let LoopContext { id, ready_tx, job_rx, shutdown, poll_interval, mut warmup } = ctx;
    let span = crate::worker_span!(id);
    let _enter = span.enter();
    debug!("worker loop started");

    loop {
        if !shutdown.is_triggered() {
            if !wait_until_ready(&mut *worker, id, &shutdown, poll_interval) {
                break;
            }
            // Unbounded queue, never blocks; fails only once the pool is gone
            if ready_tx.send(id).is_err() {
                break;
            }
            crate::log_dispatch!(id, "ready");
            // Reported after the push, so a warmed worker is already claimable
            if let Some(warmup) = warmup.take() {
                let _ = warmup.send(id);
            }
        }

        // Disconnects once `close` drops the sender and the slot is empty
        match job_rx.recv() {
            Ok(assignment) => execute(&mut *worker, id, assignment),
            Err(_) => break,
        }
    }

    debug!("worker loop stopped");
    worker
}

/// Poll `ready()` until it holds. Returns `false` if the wrapper closed first.
fn wait_until_ready<I, O>(
    worker: &mut dyn Worker<Input = I, Output = O>,
    id: usize,
    shutdown: &ShutdownSignal,
    poll_interval: Duration,
) -> bool
where
    I: Send + 'static,
    O: Send + 'static,
{
    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| worker.ready())) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(payload) => {
                error!(worker = id, panic = %panic_message(payload.as_ref()), "worker panicked in ready check");
            }
        }
        if shutdown.wait_timeout(poll_interval) {
            return false;
        }
    }
}

fn execute<I, O>(
    worker: &mut dyn Worker<Input = I, Output = O>,
    id: usize,
    assignment: Assignment<I, O>,
) where
    I: Send + 'static,
    O: Send + 'static,
{
    let Assignment { input, reply } = assignment;
    match panic::catch_unwind(AssertUnwindSafe(|| worker.job(input))) {
        Ok(output) => {
            if reply.send(output).is_err() {
                debug!(worker = id, "dispatcher stopped waiting, result discarded");
            }
        }
        Err(payload) => {
            // Dropping the reply sender tells the dispatcher no result is coming
            error!(worker = id, panic = %panic_message(payload.as_ref()), "worker panicked while running a job");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Counter {
        jobs: Arc<AtomicUsize>,
        terminated: Arc<AtomicBool>,
    }

    impl Worker for Counter {
        type Input = u32;
        type Output = u32;

        fn job(&mut self, input: u32) -> u32 {
            self.jobs.fetch_add(1, Ordering::SeqCst);
            input + 1
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::EXTENDED
        }

        fn terminate(&mut self) {
            self.terminated.store(true, Ordering::SeqCst);
        }
    }

    struct NeverReady;

    impl Worker for NeverReady {
        type Input = ();
        type Output = ();

        fn job(&mut self, _input: ()) {
            panic!("job must not run on a worker that never became ready");
        }

        fn ready(&mut self) -> bool {
            false
        }
    }

    fn fast_config() -> PoolConfig {
        PoolConfig::default().with_ready_poll_interval(Duration::from_millis(1))
    }

    fn counter() -> Box<Counter> {
        Box::new(Counter {
            jobs: Arc::new(AtomicUsize::new(0)),
            terminated: Arc::new(AtomicBool::new(false)),
        })
    }

    fn hand_job(wrapper: &WorkerWrapper<u32, u32>, ready: &Receiver<usize>, input: u32) -> u32 {
        assert_eq!(ready.recv().unwrap(), wrapper.id());
        let (reply, result) = flume::bounded(1);
        assert!(wrapper.assign(Assignment { input, reply }).is_ok());
        result.recv().unwrap()
    }

    #[test]
    fn test_handshake_runs_jobs_in_order() {
        let jobs = Arc::new(AtomicUsize::new(0));
        let terminated = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<u32, u32> = WorkerWrapper::new(
            0,
            Box::new(Counter { jobs: jobs.clone(), terminated: terminated.clone() }),
            ready_tx,
        );
        assert_eq!(wrapper.state(), WrapperState::Idle);

        wrapper.open(&fast_config()).unwrap();
        assert!(wrapper.is_open());

        for input in 0..10 {
            assert_eq!(hand_job(&wrapper, &ready_rx, input), input + 1);
        }
        assert_eq!(jobs.load(Ordering::SeqCst), 10);
        assert!(!terminated.load(Ordering::SeqCst));

        wrapper.close();
        wrapper.join();
        assert!(terminated.load(Ordering::SeqCst));
        assert_eq!(wrapper.state(), WrapperState::Joined);

        // Second join is a no-op
        wrapper.join();
    }

    #[test]
    fn test_one_readiness_report_per_job() {
        let (ready_tx, ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<u32, u32> = WorkerWrapper::new(5, counter(), ready_tx);
        wrapper.open(&fast_config()).unwrap();

        assert_eq!(ready_rx.recv().unwrap(), 5);
        // Blocked waiting for a job, so no second report
        assert!(ready_rx.recv_timeout(Duration::from_millis(30)).is_err());

        let (reply, result) = flume::bounded(1);
        assert!(wrapper.assign(Assignment { input: 1, reply }).is_ok());
        assert_eq!(result.recv().unwrap(), 2);
        assert_eq!(ready_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);

        wrapper.close();
        wrapper.join();
    }

    #[test]
    fn test_assign_after_close_is_refused() {
        let (ready_tx, ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<u32, u32> = WorkerWrapper::new(2, counter(), ready_tx);
        wrapper.open(&fast_config()).unwrap();
        assert_eq!(ready_rx.recv().unwrap(), 2);

        wrapper.close();
        let (reply, _result) = flume::bounded(1);
        let refused = wrapper.assign(Assignment { input: 9, reply }).unwrap_err();
        assert_eq!(refused.input, 9);

        // The loop waiting for a job sees the disconnect and exits
        wrapper.join();
        assert_eq!(wrapper.state(), WrapperState::Joined);
    }

    #[test]
    fn test_open_twice_fails() {
        let (ready_tx, _ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<u32, u32> = WorkerWrapper::new(3, counter(), ready_tx);
        wrapper.open(&fast_config()).unwrap();

        let err = wrapper.open(&fast_config()).unwrap_err();
        assert!(matches!(err, PoolError::Construction(_)));

        wrapper.close();
        wrapper.join();
    }

    #[test]
    fn test_close_ends_warming_up_loop() {
        let (ready_tx, ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<(), ()> = WorkerWrapper::new(1, Box::new(NeverReady), ready_tx);
        wrapper.open(&fast_config()).unwrap();

        // Never signals ready
        assert!(ready_rx.recv_timeout(Duration::from_millis(30)).is_err());

        wrapper.close();
        wrapper.join();
        assert_eq!(wrapper.state(), WrapperState::Joined);
    }

    #[test]
    fn test_join_without_open_is_noop() {
        let (ready_tx, _ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<(), ()> = WorkerWrapper::new(2, Box::new(NeverReady), ready_tx);
        wrapper.close();
        wrapper.join();
        assert_eq!(wrapper.state(), WrapperState::Idle);
    }

    #[test]
    fn test_interrupt_without_capability_is_noop() {
        let (ready_tx, _ready_rx) = flume::unbounded();
        let wrapper: WorkerWrapper<(), ()> = WorkerWrapper::new(4, Box::new(NeverReady), ready_tx);
        assert_eq!(wrapper.capabilities(), Capabilities::BASIC);
        wrapper.interrupt();
    }

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn std::any::Any + Send> = Box::new("boom");
        let from_string: Box<dyn std::any::Any + Send> = Box::new("bang".to_string());
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "Unknown panic");
    }
}
