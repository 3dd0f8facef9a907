use readypool_api::{Capabilities, Interrupt, PoolStatus, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Echo;

impl Worker for Echo {
    type Input = String;
    type Output = String;

    fn job(&mut self, input: String) -> String {
        input
    }
}

struct Interruptible {
    interrupts: Arc<AtomicUsize>,
}

impl Worker for Interruptible {
    type Input = ();
    type Output = ();

    fn job(&mut self, _input: ()) {}

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn interrupter(&self) -> Option<Arc<dyn Interrupt>> {
        let interrupts = self.interrupts.clone();
        Some(Arc::new(move || {
            interrupts.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[test]
fn test_worker_defaults() {
    let mut worker = Echo;

    assert!(worker.ready());
    assert_eq!(worker.capabilities(), Capabilities::BASIC);
    assert!(worker.initialize().is_ok());
    assert!(worker.interrupter().is_none());
    assert_eq!(worker.job("hello".to_string()), "hello");
}

#[test]
fn test_closure_interrupter() {
    let interrupts = Arc::new(AtomicUsize::new(0));
    let worker = Interruptible { interrupts: interrupts.clone() };

    let handle = worker.interrupter().expect("interruptible worker hands out a handle");
    handle.interrupt();
    handle.interrupt();

    assert_eq!(interrupts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_capability_builders() {
    assert_eq!(Capabilities::BASIC.with_lifecycle(), Capabilities::EXTENDED);
    assert_eq!(Capabilities::BASIC.with_interrupt(), Capabilities::INTERRUPTIBLE);
    assert_eq!(Capabilities::EXTENDED.with_interrupt(), Capabilities::FULL);
    assert_eq!(Capabilities::default(), Capabilities::BASIC);
}

#[test]
fn test_capability_display() {
    assert_eq!(Capabilities::BASIC.to_string(), "basic");
    assert_eq!(Capabilities::EXTENDED.to_string(), "extended");
    assert_eq!(Capabilities::INTERRUPTIBLE.to_string(), "interruptible");
    assert_eq!(Capabilities::FULL.to_string(), "extended+interruptible");
}

#[test]
fn test_pool_status_round_trip() {
    for status in [
        PoolStatus::Created,
        PoolStatus::Running,
        PoolStatus::ShuttingDown,
        PoolStatus::Closed,
    ] {
        assert_eq!(PoolStatus::from_usize(status as usize), status);
    }
    // Unknown values collapse to Closed
    assert_eq!(PoolStatus::from_usize(42), PoolStatus::Closed);
}
