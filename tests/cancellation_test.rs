//! Stopping batches and shutting the pool down

use lane_thread_pool::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

fn started_pool(low: usize, high: usize) -> ThreadPool {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = PoolConfig::new()
        .with_lane_sizes(low, high)
        .with_poll_interval(Duration::from_millis(5))
        .with_join_timeout(Duration::from_secs(2));
    let mut pool = ThreadPool::with_config(config).expect("Failed to create pool");
    pool.start().expect("Failed to start pool");
    pool
}

fn wait_for_flag(flag: &AtomicBool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !flag.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    flag.load(Ordering::SeqCst)
}

#[test]
fn test_stop_running_batch_frees_worker_immediately() {
    let mut pool = started_pool(1, 1);
    let started = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));
    let callback_fired = Arc::new(AtomicBool::new(false));

    let started_clone = Arc::clone(&started);
    let cancelled_clone = Arc::clone(&cancelled);
    let job = Job::cancellable("long-running", move |token| {
        started_clone.store(true, Ordering::SeqCst);
        while !token.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        if token.reason().is_some() {
            cancelled_clone.store(true, Ordering::SeqCst);
        }
        token.check()
    });
    let handler = pool.handle_job(job, Priority::High).expect("submit");
    let fired_clone = Arc::clone(&callback_fired);
    handler.on_complete(move || fired_clone.store(true, Ordering::SeqCst));

    assert!(wait_for_flag(&started));
    assert_eq!(pool.lane_count_in_state(Priority::High, WorkerState::Working), 1);

    pool.stop(handler.id());

    // Idle again without waiting for the job to notice
    assert_eq!(pool.lane_count_in_state(Priority::High, WorkerState::Idling), 1);
    assert_eq!(pool.busy_worker_count(), 0);
    assert!(handler.is_cancelled());
    assert!(!handler.is_done());

    assert!(wait_for_flag(&cancelled));
    for _ in 0..5 {
        pool.tick();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!callback_fired.load(Ordering::SeqCst));
    assert_eq!(handler.executed(), 0);
    assert_eq!(pool.total_jobs_completed(), 0);

    // The freed worker takes new work
    let next = pool
        .handle_job(Job::new("next", || Ok(())), Priority::High)
        .expect("submit");
    assert!(pool.wait_for(&next, Duration::from_secs(5)));
}

#[test]
fn test_stop_pending_batch_never_runs_its_jobs() {
    let mut pool = started_pool(1, 0);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let blocker = pool
        .handle_job(
            Job::new("blocker", move || {
                let _ = release_rx.recv();
                Ok(())
            }),
            Priority::Low,
        )
        .expect("submit blocker");

    let executed = Arc::new(AtomicUsize::new(0));
    let jobs: Vec<Job> = (0..5)
        .map(|i| {
            let executed = Arc::clone(&executed);
            Job::new(format!("queued-{}", i), move || {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();
    let queued = pool.handle(jobs, Priority::Low).expect("submit queued");
    assert_eq!(pool.pending_count(Priority::Low), 1);

    pool.stop(queued.id());
    assert_eq!(pool.pending_count(Priority::Low), 0);
    assert!(queued.is_cancelled());
    assert_eq!(queued.count(), 0);

    drop(release_tx);
    assert!(pool.wait_for(&blocker, Duration::from_secs(5)));
    for _ in 0..5 {
        pool.tick();
    }
    assert_eq!(executed.load(Ordering::SeqCst), 0);
    assert!(!queued.is_done());
}

#[test]
fn test_stop_partially_dispatched_batch() {
    let mut pool = started_pool(2, 0);
    let executed = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<Job> = (0..6)
        .map(|i| {
            let executed = Arc::clone(&executed);
            let started = Arc::clone(&started);
            Job::cancellable(format!("part-{}", i), move |token| {
                started.fetch_add(1, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();
    let handler = pool.handle(jobs, Priority::Low).expect("submit");
    assert_eq!(pool.busy_worker_count(), 2);
    assert_eq!(pool.pending_jobs(), 4);

    let deadline = Instant::now() + Duration::from_secs(5);
    while started.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }

    pool.stop(handler.id());
    assert_eq!(pool.busy_worker_count(), 0);
    assert_eq!(pool.pending_batches(), 0);
    assert_eq!(pool.idle_worker_count(), 2);

    // Only the two in-flight jobs ever ran
    let deadline = Instant::now() + Duration::from_secs(5);
    while executed.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    pool.tick();
    assert_eq!(executed.load(Ordering::SeqCst), 2);
    assert_eq!(handler.executed(), 0);
}

#[test]
fn test_stop_unknown_or_finished_batch_is_noop() {
    let mut pool = started_pool(1, 0);
    let handler = pool
        .handle_job(Job::new("done", || Ok(())), Priority::Low)
        .expect("submit");
    assert!(pool.wait_for(&handler, Duration::from_secs(5)));

    pool.stop(handler.id());
    pool.stop(9_999);

    assert!(handler.is_done());
    assert!(!handler.is_cancelled());
    assert_eq!(pool.busy_worker_count(), 0);
}

#[test]
fn test_cancellation_reason_names_the_stopped_batch() {
    let mut pool = started_pool(1, 0);
    let (reason_tx, reason_rx) = mpsc::channel();
    let started = Arc::new(AtomicBool::new(false));

    let started_clone = Arc::clone(&started);
    let job = Job::cancellable("observe", move |token| {
        started_clone.store(true, Ordering::SeqCst);
        while !token.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        let _ = reason_tx.send(token.reason());
        Ok(())
    });
    let handler = pool.handle_job(job, Priority::Low).expect("submit");
    assert!(wait_for_flag(&started));
    pool.stop(handler.id());

    let reason = reason_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("job observed cancellation");
    assert_eq!(reason, Some(CancellationReason::BatchStopped(handler.id())));
}

#[test]
fn test_shutdown_with_jobs_in_flight() {
    let mut pool = started_pool(2, 1);
    let observed_shutdown = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<Job> = (0..3)
        .map(|i| {
            let observed = Arc::clone(&observed_shutdown);
            let started = Arc::clone(&started);
            Job::cancellable(format!("busy-{}", i), move |token| {
                started.fetch_add(1, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                if token.reason() == Some(CancellationReason::Shutdown) {
                    observed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
        })
        .collect();
    let low = pool.handle(jobs, Priority::Low).expect("submit");
    let high = pool
        .handle_job(Job::new("quick", || Ok(())), Priority::High)
        .expect("submit");
    assert!(pool.wait_for(&high, Duration::from_secs(5)));
    assert_eq!(pool.pending_jobs(), 1);

    let deadline = Instant::now() + Duration::from_secs(5);
    while started.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(started.load(Ordering::SeqCst), 2);

    pool.shutdown();

    assert!(!pool.is_running());
    assert_eq!(pool.worker_count(), 0);
    assert_eq!(pool.live_thread_count(), 0);
    assert_eq!(pool.pending_batches(), 0);
    assert!(low.is_cancelled());
    assert_eq!(observed_shutdown.load(Ordering::SeqCst), 2);

    // Second shutdown is harmless
    pool.shutdown();
    assert_eq!(pool.worker_count(), 0);

    // Submission after shutdown is rejected
    let result = pool.handle_job(Job::new("late", || Ok(())), Priority::Low);
    assert!(matches!(result, Err(ThreadError::NotRunning { .. })));
}

#[test]
fn test_shutdown_cancels_running_batch() {
    let mut pool = started_pool(1, 0);
    let started = Arc::new(AtomicBool::new(false));
    let callback_fired = Arc::new(AtomicBool::new(false));

    let started_clone = Arc::clone(&started);
    let handler = pool
        .handle_job(
            Job::cancellable("endless", move |token| {
                started_clone.store(true, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                Ok(())
            }),
            Priority::Low,
        )
        .expect("submit");
    let fired_clone = Arc::clone(&callback_fired);
    handler.on_complete(move || fired_clone.store(true, Ordering::SeqCst));
    assert!(wait_for_flag(&started));

    pool.shutdown();

    assert!(handler.is_cancelled());
    assert!(!handler.in_progress());
    assert!(handler.wait_timeout(Duration::from_secs(1)));
    assert!(!handler.is_done());
    assert!(!callback_fired.load(Ordering::SeqCst));
}

#[test]
fn test_dropping_pool_stops_workers() {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    {
        let mut pool = started_pool(1, 0);
        let started_clone = Arc::clone(&started);
        let finished_clone = Arc::clone(&finished);
        pool.handle_job(
            Job::cancellable("until-drop", move |token| {
                started_clone.store(true, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                finished_clone.store(true, Ordering::SeqCst);
                Ok(())
            }),
            Priority::Low,
        )
        .expect("submit");
        assert!(wait_for_flag(&started));
    }
    assert!(finished.load(Ordering::SeqCst));
}
