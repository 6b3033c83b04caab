// src/task/pool.rs
//! The global, fixed-capacity arena tasks are drawn from and returned to.
//!
//! One `Mutex`-guarded inner struct, pre-warmed at construction, with no
//! growth past capacity. Tasks are moved out of the arena by value on
//! `acquire` and moved back in on `release`, so the mutex is only ever held
//! for the pointer-chase that pops or pushes the free list — never across a
//! syscall or a callback invocation.

use crate::error::{CoreError, CoreResult};
use crate::task::{Task, TaskId};
use std::sync::Mutex;

/// How a task's data buffer is sized and grown.
///
/// Whole-block allocation pre-commits every task's buffer to `max_buf` up
/// front (no `resize` ever needed); separate-buffer allocation starts each
/// task at `min_buf` and lets `Buffer::resize` grow it on demand, shrinking
/// back to `min_buf` on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocMode {
    /// `min_buf == max_buf`: every task's buffer is allocated at full size
    /// once, at pool construction, and never resized.
    WholeBlock,
    /// Task buffers start at `min_buf` and grow toward `max_buf` as needed.
    SeparateBuffer,
}

/// Fixed-capacity sizing for a [`TaskPool`].
#[derive(Debug, Clone)]
pub struct TaskPoolConfig {
    /// Number of task slots. Never grows past this after `new`.
    pub capacity: usize,
    /// Initial (and, in `WholeBlock` mode, permanent) buffer size per task.
    pub min_buf: usize,
    /// Ceiling a task's buffer may grow to in `SeparateBuffer` mode. Ignored
    /// in `WholeBlock` mode (where `min_buf` already is the fixed size).
    pub max_buf: usize,
    /// Size of the `Task::extra` application-state slot, fixed for the
    /// pool's lifetime.
    pub arg_size: usize,
    /// Whole-block vs separate-buffer allocation.
    pub mode: AllocMode,
}

impl TaskPoolConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.min_buf == 0 {
            return Err(CoreError::InvalidArgument("min_buf must be > 0".into()));
        }
        if self.mode == AllocMode::SeparateBuffer && self.max_buf < self.min_buf {
            return Err(CoreError::InvalidArgument(
                "max_buf must be >= min_buf in separate-buffer mode".into(),
            ));
        }
        Ok(())
    }
}

struct TaskPoolInner {
    slots: Vec<Option<Task>>,
    generations: Vec<u32>,
    free_head: Option<u32>,
    free_count: usize,
}

/// Point-in-time occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub free: usize,
}

/// A fixed-capacity arena of [`Task`]s, checked out and returned by
/// [`TaskId`].
///
/// No slot is ever allocated after construction: `acquire` returning `None`
/// means the pool is exhausted, mapped by callers to
/// [`CoreError::Unavailable`].
pub struct TaskPool {
    inner: Mutex<TaskPoolInner>,
    min_buf: usize,
    max_buf: usize,
    arg_size: usize,
    mode: AllocMode,
}

impl TaskPool {
    /// Pre-allocates `config.capacity` tasks and chains them into a free
    /// list through `Task::next`, tail-first, so the first `acquire()`
    /// returns slot 0.
    pub fn new(config: TaskPoolConfig) -> CoreResult<Self> {
        config.validate()?;

        let initial_buf = match config.mode {
            AllocMode::WholeBlock => config.min_buf,
            AllocMode::SeparateBuffer => config.min_buf,
        };

        let mut slots = Vec::with_capacity(config.capacity);
        for i in 0..config.capacity {
            let mut task = Task::new(initial_buf, config.arg_size);
            if config.mode == AllocMode::WholeBlock && config.min_buf != initial_buf {
                task.buffer.resize(config.min_buf)?;
            }
            task.next = if i + 1 < config.capacity {
                Some((i + 1) as u32)
            } else {
                None
            };
            slots.push(Some(task));
        }

        Ok(Self {
            inner: Mutex::new(TaskPoolInner {
                generations: vec![0u32; config.capacity],
                free_head: if config.capacity > 0 { Some(0) } else { None },
                free_count: config.capacity,
                slots,
            }),
            min_buf: config.min_buf,
            max_buf: config.max_buf,
            arg_size: config.arg_size,
            mode: config.mode,
        })
    }

    /// Total number of slots this pool was constructed with.
    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("task pool mutex poisoned").slots.len()
    }

    /// Checks out the most recently released task (LIFO), or `None` if the
    /// pool is exhausted. The returned `TaskId`'s generation is bumped past
    /// whatever it was the last time this slot was handed out.
    pub fn acquire(&self) -> Option<(TaskId, Task)> {
        let mut inner = self.inner.lock().expect("task pool mutex poisoned");
        let slot = inner.free_head?;
        let mut task = inner.slots[slot as usize]
            .take()
            .expect("free list pointed at an occupied slot");
        inner.free_head = task.next;
        task.next = None;
        inner.free_count -= 1;
        inner.generations[slot as usize] = inner.generations[slot as usize].wrapping_add(1);
        let id = TaskId::new(slot, inner.generations[slot as usize]);
        Some((id, task))
    }

    /// Returns a task to the pool, resetting it to its just-released state
    /// and pushing it onto the head of the free list (so the next `acquire`
    /// returns this same slot — LIFO reuse).
    ///
    /// A stale `id` (wrong generation, or a slot already free) is a
    /// programming error: debug builds panic, release builds quietly drop
    /// the task rather than corrupt the free list.
    pub fn release(&self, id: TaskId, mut task: Task) {
        let mut inner = self.inner.lock().expect("task pool mutex poisoned");
        let slot = id.slot() as usize;
        debug_assert!(slot < inner.slots.len(), "TaskId out of range");
        debug_assert_eq!(
            inner.generations[slot], id.generation,
            "stale TaskId released (use-after-release or double release)"
        );
        debug_assert!(
            inner.slots[slot].is_none(),
            "slot already on free list (double release)"
        );
        if slot >= inner.slots.len() || inner.generations[slot] != id.generation {
            return;
        }

        task.reset(self.min_buf);
        task.next = inner.free_head;
        inner.free_head = Some(slot as u32);
        inner.slots[slot] = Some(task);
        inner.free_count += 1;
    }

    /// `(in_use, free)` occupancy snapshot.
    pub fn stats(&self) -> TaskPoolStats {
        let inner = self.inner.lock().expect("task pool mutex poisoned");
        let capacity = inner.slots.len();
        TaskPoolStats {
            capacity,
            in_use: capacity - inner.free_count,
            free: inner.free_count,
        }
    }

    /// Buffer growth ceiling configured for this pool (see [`AllocMode`]).
    pub fn max_buf(&self) -> usize {
        self.max_buf
    }

    /// Buffer floor configured for this pool.
    pub fn min_buf(&self) -> usize {
        self.min_buf
    }

    /// Allocation mode configured for this pool.
    pub fn mode(&self) -> AllocMode {
        self.mode
    }

    /// Size of the per-task application-state slot.
    pub fn arg_size(&self) -> usize {
        self.arg_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> TaskPoolConfig {
        TaskPoolConfig {
            capacity,
            min_buf: 64,
            max_buf: 4096,
            arg_size: 16,
            mode: AllocMode::SeparateBuffer,
        }
    }

    #[test]
    fn acquire_then_release_restores_buffer_and_counters() {
        let pool = TaskPool::new(config(2)).unwrap();
        let (id, mut task) = pool.acquire().unwrap();
        task.req_count = 7;
        task.buffer.resize(2048).unwrap();
        task.peer_addr = Some("10.0.0.1:23000".to_string());
        pool.release(id, task);

        let (_id2, task2) = pool.acquire().unwrap();
        assert_eq!(task2.req_count, 0);
        assert_eq!(task2.buffer.capacity(), 64);
        assert!(task2.peer_addr.is_none());
        assert!(task2.buffer_invariant_holds(64));
    }

    #[test]
    fn exhaustion_then_release_yields_most_recently_released_lifo() {
        let pool = TaskPool::new(config(2)).unwrap();
        let (id_a, task_a) = pool.acquire().unwrap();
        let (id_b, task_b) = pool.acquire().unwrap();
        assert!(pool.acquire().is_none(), "pool of 2 must refuse a third acquire");

        pool.release(id_a, task_a);
        let (id_back, _task) = pool.acquire().unwrap();
        assert_eq!(id_back.slot(), id_a.slot(), "LIFO: most recently released slot comes back first");

        pool.release(id_b, task_b);
        let stats = pool.stats();
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn acquired_task_generation_changes_across_checkouts() {
        let pool = TaskPool::new(config(1)).unwrap();
        let (id1, task1) = pool.acquire().unwrap();
        pool.release(id1, task1);
        let (id2, _task2) = pool.acquire().unwrap();
        assert_eq!(id1.slot(), id2.slot());
        assert_ne!(id1.generation(), id2.generation());
    }

    #[test]
    fn stats_reflect_in_use_and_free_counts() {
        let pool = TaskPool::new(config(3)).unwrap();
        let (id, task) = pool.acquire().unwrap();
        let stats = pool.stats();
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.free, 2);
        pool.release(id, task);
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    fn whole_block_mode_preallocates_min_buf_and_never_shrinks_below_it() {
        let cfg = TaskPoolConfig {
            capacity: 1,
            min_buf: 128,
            max_buf: 128,
            arg_size: 0,
            mode: AllocMode::WholeBlock,
        };
        let pool = TaskPool::new(cfg).unwrap();
        let (id, task) = pool.acquire().unwrap();
        assert_eq!(task.buffer.capacity(), 128);
        pool.release(id, task);
        let (_id2, task2) = pool.acquire().unwrap();
        assert_eq!(task2.buffer.capacity(), 128);
    }

    #[test]
    fn zero_capacity_pool_builds_but_every_acquire_is_exhausted() {
        let pool = TaskPool::new(config(0)).unwrap();
        assert_eq!(pool.capacity(), 0);
        assert!(pool.acquire().is_none());
    }
}
