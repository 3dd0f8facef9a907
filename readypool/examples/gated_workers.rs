use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use readypool::{logging, BoxedWorker, Capabilities, Interrupt, Pool, PoolConfig, Worker};

/// Rate-limited worker: becomes ready only when the shared budget has a token.
/// Jobs sleep in small steps so they can be interrupted.
struct Throttled {
    name: String,
    budget: Arc<AtomicU32>,
    cancelled: Arc<AtomicBool>,
}

impl Worker for Throttled {
    type Input = u64;
    type Output = String;

    fn job(&mut self, millis: u64) -> String {
        for _ in 0..millis {
            if self.cancelled.swap(false, Ordering::SeqCst) {
                return format!("{} cancelled", self.name);
            }
            thread::sleep(Duration::from_millis(1));
        }
        format!("{} slept {}ms", self.name, millis)
    }

    fn ready(&mut self) -> bool {
        self.budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| t.checked_sub(1))
            .is_ok()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        logging::info!(worker = %self.name, "connected");
        Ok(())
    }

    fn terminate(&mut self) {
        logging::info!(worker = %self.name, "disconnected");
    }

    fn interrupter(&self) -> Option<Arc<dyn Interrupt>> {
        let cancelled = self.cancelled.clone();
        Some(Arc::new(move || cancelled.store(true, Ordering::SeqCst)))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_default();

    let budget = Arc::new(AtomicU32::new(3));
    let workers: Vec<BoxedWorker<u64, String>> = (0..2)
        .map(|i| {
            Box::new(Throttled {
                name: format!("throttled-{}", i),
                budget: budget.clone(),
                cancelled: Arc::new(AtomicBool::new(false)),
            }) as BoxedWorker<u64, String>
        })
        .collect();

    let config = PoolConfig::default()
        .with_ready_poll_interval(Duration::from_millis(2))
        .with_thread_name_prefix("throttled");
    let pool = Pool::from_workers_with_config(workers, config)?;
    pool.open()?;

    println!("{}", pool.send_work(5)?);

    // Long job, short deadline: the worker is interrupted
    match pool.send_work_timed(Duration::from_millis(20), 1_000) {
        Ok(out) => println!("{}", out),
        Err(e) => println!("timed job failed: {}", e),
    }

    // Refill the budget in the background; jobs wait for tokens
    let refill = budget.clone();
    let refiller = thread::spawn(move || {
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(50));
            refill.fetch_add(1, Ordering::SeqCst);
        }
    });
    for millis in [1, 2, 3] {
        println!("{}", pool.send_work(millis)?);
    }

    let _ = refiller.join();
    pool.close();
    Ok(())
}
