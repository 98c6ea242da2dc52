//! Basic lane thread pool usage
//!
//! Demonstrates batch submission on both lanes, the tick pump, stopping a
//! batch and pool snapshots.
//!
//! Run with: RUST_LOG=debug cargo run --example basic_usage

use lane_thread_pool::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Lane Thread Pool - Basic Usage Example ===\n");

    let config = PoolConfig::new()
        .with_performance_profile(PerformanceProfile::Max)
        .with_idle_timeout(Duration::from_secs(2))
        .with_thread_name_prefix("demo");
    // Machines with too few cores fall back to a single worker
    let config = match config.validate() {
        Ok(()) => config,
        Err(e) => {
            println!("   {}", e);
            config.with_multithreading(false)
        }
    };
    let mut pool = ThreadPool::with_config(config)?;
    let lanes = pool.lane_sizes();
    println!(
        "1. Starting thread pool: {} low / {} high workers",
        lanes.low, lanes.high
    );
    pool.start()?;

    println!("\n2. Submitting a low-priority batch:");
    let jobs: Vec<Job> = (0..10)
        .map(|i| {
            pool.create(format!("chunk-{}", i), move || {
                println!(
                    "  Chunk {} executing on {}",
                    i,
                    thread::current().name().unwrap_or("?")
                );
                thread::sleep(Duration::from_millis(50));
                Ok(())
            })
        })
        .collect();
    let chunks = pool.handle(jobs, Priority::Low)?;
    chunks.on_complete(|| println!("  All chunks finished"));

    println!("\n3. Submitting a high-priority job:");
    let urgent_job = pool.create("urgent", || {
        println!("  Urgent job done");
        Ok(())
    });
    let urgent = pool.handle_job(urgent_job, Priority::High)?;

    println!("\n4. A batch that gets stopped:");
    let endless = pool.handle_job(
        Job::cancellable("endless", |token| {
            while !token.is_cancelled() {
                thread::sleep(Duration::from_millis(10));
            }
            println!("  Endless job saw {:?}", token.reason());
            Ok(())
        }),
        Priority::Low,
    )?;

    // Host loop: one tick per frame
    let has_high_lane = pool.lane_worker_count(Priority::High) > 0;
    let mut frame = 0;
    while chunks.in_progress() || (has_high_lane && urgent.in_progress()) {
        pool.tick();
        if frame == 10 {
            pool.stop(endless.id());
            println!("  Stopped batch {}", endless.id());
        }
        frame += 1;
        thread::sleep(Duration::from_millis(16));
    }
    if endless.in_progress() {
        pool.stop(endless.id());
    }

    println!("\n5. Pool snapshot:");
    let snapshot = pool.snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).map_err(|e| ThreadError::other(e.to_string()))?
    );

    println!("\n6. Shutting down");
    pool.shutdown();
    println!("   Jobs completed: {}", pool.total_jobs_completed());
    println!("   Jobs failed: {}", pool.total_jobs_failed());

    Ok(())
}
