// src/runtime.rs
//! Explicit holder for process-wide state that would otherwise live as
//! free-floating globals: the shared task pool, a cached current-time
//! reading, and the shutdown flag. One `Runtime` is built once in `main`
//! and handed to every constructor that needs it.

use crate::task::pool::TaskPool;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Shared state every worker, the dispatcher, and the connection pool are
/// constructed with: the task arena, a cached wall-clock second (refreshed
/// by a background ticker so hot paths never call `SystemTime::now`
/// directly), and the run flag workers poll once per loop iteration.
pub struct Runtime {
    pool: Arc<TaskPool>,
    current_time: Arc<AtomicU64>,
    run_flag: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn new(pool: Arc<TaskPool>) -> Self {
        let current_time = Arc::new(AtomicU64::new(unix_seconds()));
        let run_flag = Arc::new(AtomicBool::new(true));

        let tick_time = current_time.clone();
        let tick_flag = run_flag.clone();
        let ticker = std::thread::spawn(move || {
            while tick_flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(200));
                tick_time.store(unix_seconds(), Ordering::Relaxed);
            }
        });

        Self {
            pool,
            current_time,
            run_flag,
            ticker: Some(ticker),
        }
    }

    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    /// Cached wall-clock second. Updated roughly every 200ms by the ticker
    /// thread, not on every call — callers that need finer granularity than
    /// a second shouldn't be using this.
    pub fn current_time(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }

    pub fn run_flag(&self) -> Arc<AtomicBool> {
        self.run_flag.clone()
    }

    /// Flips the run flag; worker loops notice on their next iteration and
    /// exit after finishing in-flight cleanup.
    pub fn shutdown(&self) {
        self.run_flag.store(false, Ordering::SeqCst);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.run_flag.store(false, Ordering::SeqCst);
        if let Some(handle) = self.ticker.take() {
            let _ = handle.join();
        }
    }
}
