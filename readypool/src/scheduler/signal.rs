use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

/// One-shot shutdown broadcast.
///
/// Every clone observes the same signal. Once `trigger` has been called,
/// `is_triggered` returns `true` everywhere and every receive on
/// `listener()` completes immediately, which lets the signal take part in a
/// `flume::Selector` next to ordinary channels.
///
/// Nothing is ever sent on the listener channel; triggering drops the only
/// sender, so receivers observe a disconnect.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    triggered: AtomicBool,
    trigger_tx: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (trigger_tx, listener) = flume::bounded(0);
        Self {
            inner: Arc::new(SignalInner {
                triggered: AtomicBool::new(false),
                trigger_tx: Mutex::new(Some(trigger_tx)),
                listener,
            }),
        }
    }

    /// Fire the signal. Returns `true` for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self
            .inner
            .trigger_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Receiver that becomes disconnected once the signal fires.
    pub fn listener(&self) -> &Receiver<()> {
        &self.inner.listener
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.inner.listener.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
        }
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        if self.is_triggered() {
            return;
        }
        let _ = self.inner.listener.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger_is_one_shot() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_clones_observe_trigger() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        signal.trigger();

        assert!(observer.is_triggered());
        assert!(observer.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_wait_timeout_expires_without_trigger() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();

        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_wakes_blocked_waiters() {
        let signal = ShutdownSignal::new();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        signal.trigger();

        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn test_listener_selects_after_trigger() {
        let signal = ShutdownSignal::new();
        let (_tx, rx) = flume::bounded::<u32>(0);

        signal.trigger();

        let fired = flume::Selector::new()
            .recv(&rx, |_| false)
            .recv(signal.listener(), |_| true)
            .wait();
        assert!(fired);
    }
}
