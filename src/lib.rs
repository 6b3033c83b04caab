// src/lib.rs
//! # fastdfs-core
//!
//! The network I/O core shared by every FastDFS-style tracker, storage
//! node, and long-lived client: a fixed-capacity task/buffer pool, a
//! hashed timing wheel for connection aging, a single-threaded-per-worker
//! I/O event loop built on [`mio`], a listener-to-worker dispatch queue,
//! and the tracker-facing client connection pool.
//!
//! The application-level request handlers (upload/download/metadata),
//! on-disk storage layout, and replication binlog are deliberately out of
//! scope — those are separable modules that consume a [`task::Task`] from
//! this core and produce a response. What this crate does carry end to end
//! is the existing FastDFS wire framing ([`protocol`]) so the core can be
//! exercised without a stand-in for those handlers, plus the ambient
//! concerns every server binary needs regardless: configuration
//! ([`config`]), process lifecycle ([`cli`]), and a [`runtime::Runtime`]
//! holding the state that would otherwise live as process-wide globals.
//!
//! Concurrency model: each I/O worker owns its tasks, its timing wheel, and
//! its event demultiplexer end to end — no cross-thread work-stealing. The
//! only shared state is the task pool's free list (one short-held mutex)
//! and the client connection pool's address-keyed map (one mutex, see
//! [`connpool`]).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_safety_doc)]

pub mod buffer;
pub mod cli;
pub mod config;
pub mod connpool;
pub mod error;
pub mod io;
pub mod protocol;
pub mod runtime;
pub mod server;
pub mod task;
pub mod timer;

pub use buffer::Buffer;
pub use connpool::{Connection, ConnectionPool};
pub use error::{BufferError, CoreError, CoreResult, Result};
pub use io::{Demultiplexer, Dispatcher, Interest, WorkerHandle};
pub use runtime::Runtime;
pub use task::pool::{AllocMode, TaskPool, TaskPoolConfig};
pub use task::{CallbackOutcome, Task, TaskCallbacks, TaskId};
pub use timer::{TimerOwner, TimingWheel};

/// Commonly used imports for a binary embedding this core.
pub mod prelude {
    pub use crate::buffer::Buffer;
    pub use crate::config::{IniContext, Settings};
    pub use crate::connpool::{Connection, ConnectionPool};
    pub use crate::error::{BufferError, CoreError, CoreResult, Result};
    pub use crate::io::{Demultiplexer, Dispatcher, Interest, WorkerHandle};
    pub use crate::protocol::{Command, FileId, Header};
    pub use crate::runtime::Runtime;
    pub use crate::task::pool::{AllocMode, TaskPool, TaskPoolConfig};
    pub use crate::task::{CallbackOutcome, Task, TaskCallbacks, TaskId};
    pub use crate::timer::{TimerOwner, TimingWheel};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_basic_buffer() {
        let mut buf = Buffer::new(1024);
        buf.put_u32(42).unwrap();
        buf.put_byte(0xFF).unwrap();

        buf.set_pos(0).unwrap();
        assert_eq!(buf.get_u32().unwrap(), 42);
        assert_eq!(buf.get_byte().unwrap(), 0xFF);
    }

    #[test]
    fn test_task_pool_round_trip() {
        let pool = TaskPool::new(TaskPoolConfig {
            capacity: 4,
            min_buf: 128,
            max_buf: 4096,
            arg_size: 0,
            mode: AllocMode::SeparateBuffer,
        })
        .unwrap();

        let (id, mut task) = pool.acquire().unwrap();
        task.buffer.put_u32(7).unwrap();
        pool.release(id, task);

        let (_id2, task2) = pool.acquire().unwrap();
        assert_eq!(task2.buffer.len(), 0);
        assert!(task2.buffer_invariant_holds(128));
    }

    #[test]
    fn test_timing_wheel_sweep() {
        let mut wheel = TimingWheel::new(8, 1000).unwrap();
        let e = wheel.add(1002, TimerOwner::Anonymous);
        let expired = wheel.sweep(1003);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, e);
    }
}
