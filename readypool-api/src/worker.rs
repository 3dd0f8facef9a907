use std::fmt;
use std::sync::Arc;

/// Optional capabilities a worker may declare on top of `job` and `ready`.
///
/// The pool reads these once, when the worker's wrapper is built, and never
/// checks the worker again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `initialize` runs before the loop starts, `terminate` after it stops.
    pub lifecycle: bool,
    /// `interrupter` hands out a handle that can unblock the worker.
    pub interruptible: bool,
}

impl Capabilities {
    pub const BASIC: Self = Self { lifecycle: false, interruptible: false };
    pub const EXTENDED: Self = Self { lifecycle: true, interruptible: false };
    pub const INTERRUPTIBLE: Self = Self { lifecycle: false, interruptible: true };
    pub const FULL: Self = Self { lifecycle: true, interruptible: true };

    pub fn with_lifecycle(mut self) -> Self {
        self.lifecycle = true;
        self
    }

    pub fn with_interrupt(mut self) -> Self {
        self.interruptible = true;
        self
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lifecycle, self.interruptible) {
            (false, false) => write!(f, "basic"),
            (true, false) => write!(f, "extended"),
            (false, true) => write!(f, "interruptible"),
            (true, true) => write!(f, "extended+interruptible"),
        }
    }
}

/// Cooperative unblock request for a worker stuck in `ready` or `job`.
///
/// Called from a dispatching thread while the worker's own loop may be
/// running, so implementations must be thread safe.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

impl<F> Interrupt for F
where
    F: Fn() + Send + Sync,
{
    fn interrupt(&self) {
        self()
    }
}

/// Core Worker trait
///
/// A worker executes one job at a time on the thread of its wrapper loop.
/// `job` is only called after `ready` last returned `true`.
pub trait Worker: Send + 'static {
    /// Job input type
    type Input: Send + 'static;
    /// Job output type
    type Output: Send + 'static;

    /// Run one unit of work synchronously.
    ///
    /// Failures are part of the output value; the pool has no error channel
    /// for a job.
    fn job(&mut self, input: Self::Input) -> Self::Output;

    /// Report whether the worker can take a job right now.
    fn ready(&mut self) -> bool {
        true
    }

    /// Capabilities beyond `job` and `ready`.
    fn capabilities(&self) -> Capabilities {
        Capabilities::BASIC
    }

    /// Called once before the loop starts. Only used with `lifecycle`.
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once after the loop has stopped. Only used with `lifecycle`.
    fn terminate(&mut self) {}

    /// Handle used to interrupt the worker. Only used with `interruptible`.
    fn interrupter(&self) -> Option<Arc<dyn Interrupt>> {
        None
    }
}
