// src/task/mod.rs
//! The pooled unit of I/O: one connection's buffer, timer, and callbacks.
//!
//! A [`Task`] is never allocated on the fly in the hot path. It is drawn from
//! a [`pool::TaskPool`] sized once at startup (see [`crate::config`]) and
//! handed, by value, from the accept loop to exactly one worker thread. The
//! worker attaches it to a file descriptor and a timer entry, runs callbacks
//! on it until the connection ends, then hands it back to the pool.

pub mod pool;

use crate::buffer::Buffer;
use crate::timer::TimerId;
use std::sync::Arc;

/// Identifies a [`Task`]'s slot in its owning [`pool::TaskPool`].
///
/// Carries a generation counter alongside the slot index so that a `TaskId`
/// held past a `release()`/`acquire()` cycle is detectable rather than
/// silently aliasing whatever task now occupies the same slot — `acquire()`
/// bumps the slot's generation every time it hands the slot out. The worker
/// uses this same value as both its local storage key and the `mio::Token`
/// it registers with the event demultiplexer (see [`crate::io::poller`]),
/// which is why the pair is packed into a single `usize`-sized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    slot: u32,
    generation: u32,
}

impl TaskId {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// The raw slot index backing this id.
    #[inline]
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// The generation this id was issued under.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl From<TaskId> for mio::Token {
    fn from(id: TaskId) -> Self {
        mio::Token(((id.generation as usize) << 32) | id.slot as usize)
    }
}

impl From<mio::Token> for TaskId {
    fn from(token: mio::Token) -> Self {
        let bits = token.0;
        TaskId {
            slot: (bits & 0xFFFF_FFFF) as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// What a [`TaskCallbacks`] method asks the worker loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Keep the task attached; nothing further to do this iteration.
    Continue,
    /// Append the task to the worker's deletion list. Per §4.4, the task
    /// must not be reused until the deletion list is drained.
    Delete,
}

/// The capability set a task is polymorphic over: readable, writable,
/// timed-out, and cleaned-up. Concrete implementations plug in for the
/// accept path, the upload path, the replication path, and so on — the core
/// itself never inspects an application protocol.
pub trait TaskCallbacks: Send + Sync {
    /// The fd became readable (or, for the wake-up pipe, "has bytes").
    fn on_readable(&self, task: &mut Task) -> CallbackOutcome;

    /// The fd became writable.
    fn on_writable(&self, task: &mut Task) -> CallbackOutcome {
        let _ = task;
        CallbackOutcome::Continue
    }

    /// The task's timer entry expired. Per §5, this is the normal closure
    /// path, not an error — implementations should treat it as "close this
    /// connection" unless they have a reason (e.g. a keepalive) to `modify`
    /// the timer instead and return `Continue`.
    fn on_timeout(&self, task: &mut Task) -> CallbackOutcome {
        let _ = task;
        CallbackOutcome::Delete
    }

    /// Runs once, synchronously, while the task is being drained from the
    /// deletion list — the place to close the fd and release any
    /// application-level state stashed in `task.extra`.
    fn on_cleanup(&self, task: &mut Task) {
        let _ = task;
    }
}

/// The unit of I/O: peer address, owning worker, fd/interest, buffer, extra
/// argument slot, request counter, timer handle, and callback set.
///
/// A task is, at any quiescent point, in exactly one of three states: idle
/// on the pool's free list, attached to a worker (owning a connection and a
/// timer entry), or on a worker's deletion list awaiting `clean_up`. `next`
/// is the intrusive link used for whichever of those lists currently holds
/// it; it is never meaningful in more than one list at a time because the
/// states are mutually exclusive.
pub struct Task {
    /// Printable peer address, set when the task is attached to a connection.
    pub peer_addr: Option<String>,
    /// The worker thread index that currently owns this task, if attached.
    pub worker_id: Option<usize>,
    /// The live socket, once attached. `None` while idle on the free list.
    pub conn: Option<mio::net::TcpStream>,
    /// Current readiness subscription, mirrored from the last `attach` call.
    pub interest: Option<mio::Interest>,
    /// Read/write buffer. `capacity`/`length`/`offset` map onto
    /// `Buffer::capacity`/`Buffer::len`/`Buffer::pos`.
    pub buffer: Buffer,
    /// Extra-argument slot for application state (sized by the pool's
    /// `arg_size` at init, zeroed on release).
    pub extra: Vec<u8>,
    /// Number of requests served on the current attachment.
    pub req_count: u64,
    /// This task's entry in its worker's timing wheel, if armed.
    pub timer: Option<TimerId>,
    /// The capability set currently plugged in for this task.
    pub callbacks: Option<Arc<dyn TaskCallbacks>>,
    pub(crate) next: Option<u32>,
}

impl Task {
    fn new(min_buf: usize, arg_size: usize) -> Self {
        Self {
            peer_addr: None,
            worker_id: None,
            conn: None,
            interest: None,
            buffer: Buffer::new(min_buf),
            extra: vec![0u8; arg_size],
            req_count: 0,
            timer: None,
            callbacks: None,
            next: None,
        }
    }

    /// Restores a task to its just-released state: no peer, no socket, no
    /// timer, empty buffer, zeroed extra-argument area, zeroed counter.
    ///
    /// Invariant: `release(acquire())` must restore everything up to
    /// `min_buf` bytes of the data buffer; `buffer.burn()` already zeroes
    /// the whole allocation and resets `pos`/`len`, so nothing else needs
    /// explicit clearing there.
    fn reset(&mut self, min_buf: usize) {
        self.peer_addr = None;
        self.worker_id = None;
        self.conn = None;
        self.interest = None;
        self.req_count = 0;
        self.timer = None;
        self.callbacks = None;
        self.next = None;

        self.buffer.burn();
        if self.buffer.capacity() > min_buf {
            // Shrinking a Vec-backed buffer to a smaller capacity cannot fail.
            self.buffer.resize(min_buf).expect("shrink to min_buf");
        }
        for b in &mut self.extra {
            *b = 0;
        }
    }

    /// `capacity`/`length`/`offset` invariant check.
    pub fn buffer_invariant_holds(&self, min_buf: usize) -> bool {
        self.buffer.pos() <= self.buffer.len()
            && self.buffer.len() <= self.buffer.capacity()
            && self.buffer.capacity() >= min_buf
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("peer_addr", &self.peer_addr)
            .field("worker_id", &self.worker_id)
            .field("buffer_len", &self.buffer.len())
            .field("buffer_capacity", &self.buffer.capacity())
            .field("req_count", &self.req_count)
            .field("has_timer", &self.timer.is_some())
            .finish()
    }
}
