//! Ready-made workers used by the pool's convenience constructors.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use readypool_api::{Task, Worker};

/// Stateless worker backed by a shared function. Always ready.
pub struct FnWorker<F, I, O> {
    job: Arc<F>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> FnWorker<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    pub fn new(job: F) -> Self {
        Self::from_shared(Arc::new(job))
    }

    /// Build a worker sharing `job` with other workers.
    pub fn from_shared(job: Arc<F>) -> Self {
        Self { job, _marker: PhantomData }
    }
}

impl<F, I, O> fmt::Debug for FnWorker<F, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

impl<F, I, O> Worker for FnWorker<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn job(&mut self, input: I) -> O {
        (self.job)(input)
    }
}

/// Worker that runs the closure it is handed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskWorker;

impl Worker for TaskWorker {
    type Input = Task;
    type Output = ();

    fn job(&mut self, task: Task) {
        task()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_fn_worker_shares_function() {
        let job = Arc::new(|x: i64| x * 3);
        let mut first = FnWorker::from_shared(job.clone());
        let mut second = FnWorker::from_shared(job);

        assert!(first.ready());
        assert_eq!(first.job(2), 6);
        assert_eq!(second.job(-4), -12);
    }

    #[test]
    fn test_task_worker_runs_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        TaskWorker.job(Box::new(move || flag.store(true, Ordering::SeqCst)));

        assert!(ran.load(Ordering::SeqCst));
    }
}
