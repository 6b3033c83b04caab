// src/io/dispatch.rs
//! Hands accepted connections from the listener thread to worker threads,
//! round robin, via each worker's wake-up pipe.

use crate::error::{CoreError, CoreResult};
use crate::io::poller::Interest;
use crate::task::pool::TaskPool;
use crate::task::{Task, TaskCallbacks, TaskId};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One worker's hand-off surface, as seen by the listener/dispatcher.
pub struct WorkerHandle {
    pub id: usize,
    pub(crate) inbound: Arc<Mutex<Vec<(TaskId, Task)>>>,
    pub(crate) wake_sender: Mutex<mio::unix::pipe::Sender>,
}

impl WorkerHandle {
    /// Builds the handle a dispatcher needs from the [`super::worker::WorkerInit`]
    /// [`super::worker::spawn_worker`] hands back — the two always travel
    /// together, one per spawned worker.
    pub fn new(id: usize, init: super::worker::WorkerInit) -> Self {
        Self {
            id,
            inbound: init.inbound,
            wake_sender: Mutex::new(init.wake_sender),
        }
    }

    fn wake(&self) -> CoreResult<()> {
        let mut sender = self.wake_sender.lock().expect("wake sender mutex poisoned");
        sender.write_all(&[1u8]).map_err(CoreError::from)
    }
}

/// Round-robins accepted connections across a fixed set of workers.
///
/// Invariant: each task is handed off to at most one worker; after
/// `dispatch` returns, the listener never touches the task again.
pub struct Dispatcher {
    pool: Arc<TaskPool>,
    workers: Vec<WorkerHandle>,
    next: AtomicUsize,
}

impl Dispatcher {
    pub fn new(pool: Arc<TaskPool>, workers: Vec<WorkerHandle>) -> CoreResult<Self> {
        if workers.is_empty() {
            return Err(CoreError::InvalidArgument(
                "at least one worker is required".into(),
            ));
        }
        Ok(Self {
            pool,
            workers,
            next: AtomicUsize::new(0),
        })
    }

    /// Pops a task from the pool, attaches `conn`/`peer`/`callbacks`, and
    /// assigns it to the next worker in round-robin order. If the pool is
    /// exhausted the connection is dropped (closed) immediately with no
    /// lingering.
    pub fn dispatch(
        &self,
        conn: mio::net::TcpStream,
        peer: SocketAddr,
        callbacks: Arc<dyn TaskCallbacks>,
        interest: Interest,
    ) -> CoreResult<()> {
        let Some((id, mut task)) = self.pool.acquire() else {
            drop(conn);
            return Err(CoreError::Unavailable("task pool exhausted".into()));
        };
        task.peer_addr = Some(peer.to_string());
        task.conn = Some(conn);
        task.callbacks = Some(callbacks);
        task.interest = Some(interest);

        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let worker = &self.workers[idx];
        worker
            .inbound
            .lock()
            .expect("inbound mutex poisoned")
            .push((id, task));
        worker.wake()
    }

    /// Wakes every worker's `poll` immediately, so a flipped run flag is
    /// noticed right away instead of waiting out the worker's timer-sweep
    /// poll timeout. Best effort: a worker whose wake pipe has already
    /// gone away (the worker thread exited on its own) is skipped rather
    /// than treated as an error.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            if let Err(e) = worker.wake() {
                tracing::warn!(worker = worker.id, error = %e, "failed to wake worker for shutdown");
            }
        }
    }

    /// Task pool this dispatcher draws from — exposed so a listener can
    /// check occupancy before `accept`ing (backpressure, not required but
    /// convenient).
    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
