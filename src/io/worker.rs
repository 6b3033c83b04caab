// src/io/worker.rs
//! The single-threaded cooperative I/O worker loop.
//!
//! Each worker owns its demultiplexer, its timing wheel, and the tasks
//! currently attached to it end to end — no cross-thread work-stealing, no
//! synchronization on the hot path beyond the one lock guarding its inbound
//! hand-off list.

use crate::error::{CoreError, CoreResult};
use crate::io::dispatch::WorkerHandle;
use crate::io::poller::{Demultiplexer, Interest, ReadyEvents};
use crate::runtime::Runtime;
use crate::task::{CallbackOutcome, Task, TaskId};
use crate::timer::{TimerOwner, TimingWheel};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Reserved slot index for the wake-up pipe's own registration; real tasks
/// never occupy it because the task pool's capacity is always far below
/// `u32::MAX`.
const WAKE_SLOT: u32 = u32::MAX;

/// What [`spawn_worker`] hands back to the caller so it can build a
/// [`WorkerHandle`] for the dispatcher.
pub struct WorkerInit {
    pub inbound: Arc<Mutex<Vec<(TaskId, Task)>>>,
    pub wake_sender: mio::unix::pipe::Sender,
}

struct Worker {
    id: usize,
    runtime: Arc<Runtime>,
    demux: Demultiplexer,
    wheel: TimingWheel,
    wake_rx: mio::unix::pipe::Receiver,
    inbound: Arc<Mutex<Vec<(TaskId, Task)>>>,
    attached: HashMap<u32, (TaskId, Task)>,
    deletion: Vec<TaskId>,
    idle_timeout_secs: u64,
    last_swept_second: u64,
}

impl Worker {
    fn run(mut self) -> CoreResult<()> {
        self.demux.attach(
            &mut self.wake_rx,
            TaskId::new(WAKE_SLOT, 0),
            Interest::Readable,
        )?;
        let run_flag = self.runtime.run_flag();

        while run_flag.load(std::sync::atomic::Ordering::SeqCst) {
            self.deletion.clear();

            let ready = match self.demux.poll(Some(Duration::from_millis(1000))) {
                Ok(ready) => ready,
                Err(e) => {
                    tracing::error!(worker = self.id, error = %e, fatal = true, "poll failed");
                    return Err(CoreError::Fatal(format!(
                        "worker {} event poll failed: {e}",
                        self.id
                    )));
                }
            };

            for (id, events) in ready {
                if id.slot() == WAKE_SLOT {
                    self.drain_wake_pipe();
                    self.absorb_inbound();
                } else {
                    self.dispatch_io(id, events);
                }
            }

            self.drain_deletions();

            let now = self.runtime.current_time();
            if now > self.last_swept_second {
                self.last_swept_second = now;
                let expired = self.wheel.sweep(now);
                for (_timer_id, owner) in expired {
                    if let TimerOwner::Task(task_id) = owner {
                        self.dispatch_timeout(task_id);
                    }
                }
                self.drain_deletions();
            }
        }

        self.shutdown_attached();
        Ok(())
    }

    fn drain_wake_pipe(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.wake_rx.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    fn absorb_inbound(&mut self) {
        let incoming: Vec<(TaskId, Task)> = {
            let mut guard = self.inbound.lock().expect("inbound mutex poisoned");
            guard.drain(..).collect()
        };

        for (id, mut task) in incoming {
            let interest = task.interest.unwrap_or(Interest::Readable);
            if let Some(conn) = task.conn.as_mut() {
                if let Err(e) = self.demux.attach(conn, id, interest) {
                    tracing::warn!(worker = self.id, error = %e, "failed to attach inbound task");
                    self.runtime.pool().release(id, task);
                    continue;
                }
            }
            task.worker_id = Some(self.id);
            let expires = self.runtime.current_time() + self.idle_timeout_secs;
            task.timer = Some(self.wheel.add(expires, TimerOwner::Task(id)));
            self.attached.insert(id.slot(), (id, task));
        }
    }

    fn dispatch_io(&mut self, id: TaskId, events: ReadyEvents) {
        let slot = id.slot();
        let outcome = {
            let Some((stored_id, task)) = self.attached.get_mut(&slot) else {
                return;
            };
            if stored_id.generation() != id.generation() {
                return;
            }
            let Some(callbacks) = task.callbacks.clone() else {
                return;
            };
            if events.error || events.closed {
                CallbackOutcome::Delete
            } else {
                let mut outcome = CallbackOutcome::Continue;
                if events.readable {
                    outcome = callbacks.on_readable(task);
                }
                if outcome == CallbackOutcome::Continue && events.writable {
                    outcome = callbacks.on_writable(task);
                }
                outcome
            }
        };
        if outcome == CallbackOutcome::Delete {
            self.deletion.push(id);
        }
    }

    fn dispatch_timeout(&mut self, id: TaskId) {
        let slot = id.slot();
        let outcome = {
            let Some((stored_id, task)) = self.attached.get_mut(&slot) else {
                return;
            };
            if stored_id.generation() != id.generation() {
                return;
            }
            task.timer = None;
            match task.callbacks.clone() {
                Some(cb) => cb.on_timeout(task),
                None => CallbackOutcome::Delete,
            }
        };
        if outcome == CallbackOutcome::Delete {
            self.deletion.push(id);
        }
    }

    /// Drains `self.deletion`, running `clean_up` on each task before
    /// releasing it: close the fd, detach the timer, return to the pool.
    fn drain_deletions(&mut self) {
        if self.deletion.is_empty() {
            return;
        }
        let ids: Vec<TaskId> = std::mem::take(&mut self.deletion);
        let count = ids.len();
        for id in ids {
            let slot = id.slot();
            let Some((stored_id, mut task)) = self.attached.remove(&slot) else {
                continue;
            };
            if stored_id.generation() != id.generation() {
                self.attached.insert(slot, (stored_id, task));
                continue;
            }
            self.clean_up_one(&mut task);
            self.runtime.pool().release(stored_id, task);
        }
        tracing::debug!(worker = self.id, count, "drained deletion list");
    }

    fn clean_up_one(&mut self, task: &mut Task) {
        if let Some(timer_id) = task.timer.take() {
            let _ = self.wheel.remove(timer_id);
        }
        if let Some(mut conn) = task.conn.take() {
            let _ = self.demux.detach(&mut conn);
        }
        if let Some(cb) = task.callbacks.clone() {
            cb.on_cleanup(task);
        }
    }

    fn shutdown_attached(&mut self) {
        let slots: Vec<u32> = self.attached.keys().copied().collect();
        for slot in slots {
            if let Some((id, mut task)) = self.attached.remove(&slot) {
                self.clean_up_one(&mut task);
                self.runtime.pool().release(id, task);
            }
        }
    }
}

/// Builds the demultiplexer, timing wheel, and wake-up pipe for worker
/// `id`, then spawns it on its own OS thread. Returns the thread handle and
/// the [`WorkerInit`] the caller needs to build a [`WorkerHandle`] for the
/// dispatcher.
pub fn spawn_worker(
    id: usize,
    runtime: Arc<Runtime>,
    idle_timeout_secs: u64,
    wheel_slots: usize,
    events_capacity: usize,
) -> CoreResult<(JoinHandle<CoreResult<()>>, WorkerInit)> {
    let (wake_sender, wake_rx) = mio::unix::pipe::new().map_err(CoreError::from)?;
    let demux = Demultiplexer::new(events_capacity)?;
    let wheel = TimingWheel::new(wheel_slots, runtime.current_time())?;
    let inbound = Arc::new(Mutex::new(Vec::new()));

    let worker = Worker {
        id,
        runtime,
        demux,
        wheel,
        wake_rx,
        inbound: inbound.clone(),
        attached: HashMap::new(),
        deletion: Vec::new(),
        idle_timeout_secs,
        last_swept_second: 0,
    };

    let handle = std::thread::Builder::new()
        .name(format!("fdfs-io-worker-{id}"))
        .spawn(move || worker.run())
        .map_err(|e| CoreError::Fatal(format!("failed to spawn worker {id}: {e}")))?;

    Ok((handle, WorkerInit { inbound, wake_sender }))
}
