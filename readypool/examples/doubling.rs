use std::error::Error;
use std::time::Duration;

use readypool::{default_worker_count, logging, Pool};

// Doubles a range of numbers on one worker per CPU, first synchronously,
// then with async completions.
fn main() -> Result<(), Box<dyn Error>> {
    logging::init_development();

    let pool = Pool::from_fn(default_worker_count(), |x: u64| {
        std::thread::sleep(Duration::from_millis(10));
        x * 2
    })?;
    pool.open()?;

    for x in 0..5 {
        println!("{} * 2 = {}", x, pool.send_work(x)?);
    }

    let (tx, rx) = flume::unbounded();
    for x in 100..110 {
        let tx = tx.clone();
        pool.send_work_async(x, Some(Box::new(move |result| {
            let _ = tx.send((x, result));
        })));
    }
    drop(tx);
    println!("pending async jobs: {}", pool.num_pending_async_jobs());

    for (x, result) in rx.iter() {
        match result {
            Ok(doubled) => println!("async {} * 2 = {}", x, doubled),
            Err(e) => eprintln!("async job {} failed: {}", x, e),
        }
    }

    match pool.send_work_timed_ms(1, 42) {
        Ok(v) => println!("fast enough: {}", v),
        Err(e) => println!("timed dispatch failed: {} (retryable: {})", e, e.is_retryable()),
    }

    pool.close();
    Ok(())
}
