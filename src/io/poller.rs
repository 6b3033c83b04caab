// src/io/poller.rs
//! Thin wrapper over the platform readiness primitive.
//!
//! The rest of the core depends on [`Demultiplexer`] only, so swapping the
//! underlying mechanism never ripples past this file — today that mechanism
//! is `mio`'s epoll/kqueue/IOCP abstraction.

use crate::error::{CoreError, CoreResult};
use crate::task::TaskId;
use std::time::Duration;

/// Readiness interest a task subscribes with. Maps directly onto
/// `mio::Interest` but stays a local type so callers never need the `mio`
/// crate in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    Both,
}

impl From<Interest> for mio::Interest {
    fn from(i: Interest) -> Self {
        match i {
            Interest::Readable => mio::Interest::READABLE,
            Interest::Writable => mio::Interest::WRITABLE,
            Interest::Both => mio::Interest::READABLE.add(mio::Interest::WRITABLE),
        }
    }
}

/// The events a single readiness entry reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyEvents {
    pub readable: bool,
    pub writable: bool,
    /// Peer closed the read half (or the socket as a whole) — treated like
    /// FastDFS's original code treats `EPOLLHUP`/`EPOLLRDHUP`: a cue to tear
    /// the task down rather than read again.
    pub closed: bool,
    pub error: bool,
}

impl From<&mio::event::Event> for ReadyEvents {
    fn from(ev: &mio::event::Event) -> Self {
        ReadyEvents {
            readable: ev.is_readable(),
            writable: ev.is_writable(),
            closed: ev.is_read_closed() || ev.is_write_closed(),
            error: ev.is_error(),
        }
    }
}

/// A single-threaded event demultiplexer: one per I/O worker, never shared.
pub struct Demultiplexer {
    poll: mio::Poll,
    events: mio::Events,
}

impl Demultiplexer {
    /// `events_capacity` bounds how many readiness entries a single `poll`
    /// call can drain at once; it does not bound the number of attached fds.
    pub fn new(events_capacity: usize) -> CoreResult<Self> {
        let poll = mio::Poll::new().map_err(|e| CoreError::from(e))?;
        Ok(Self {
            poll,
            events: mio::Events::with_capacity(events_capacity),
        })
    }

    /// Idempotent subscription. `source` must outlive the registration;
    /// callers re-register after any move (e.g. after `TcpStream` moves into
    /// a `Task`).
    pub fn attach<S: mio::event::Source + ?Sized>(
        &self,
        source: &mut S,
        token: TaskId,
        interest: Interest,
    ) -> CoreResult<()> {
        self.poll
            .registry()
            .register(source, token.into(), interest.into())
            .map_err(CoreError::from)
    }

    /// Changes the interest set for an already-attached source.
    pub fn reregister<S: mio::event::Source + ?Sized>(
        &self,
        source: &mut S,
        token: TaskId,
        interest: Interest,
    ) -> CoreResult<()> {
        self.poll
            .registry()
            .reregister(source, token.into(), interest.into())
            .map_err(CoreError::from)
    }

    pub fn detach<S: mio::event::Source + ?Sized>(&self, source: &mut S) -> CoreResult<()> {
        self.poll.registry().deregister(source).map_err(CoreError::from)
    }

    /// Blocks at most `timeout`, then returns ready `(TaskId, ReadyEvents)`
    /// pairs. `EINTR` is not treated as an error: if the underlying poll is
    /// interrupted, it retries rather than surfacing the interruption to
    /// the caller.
    pub fn poll(&mut self, timeout: Option<Duration>) -> CoreResult<Vec<(TaskId, ReadyEvents)>> {
        loop {
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CoreError::from(e)),
            }
        }
        Ok(self
            .events
            .iter()
            .map(|ev| (TaskId::from(ev.token()), ReadyEvents::from(ev)))
            .collect())
    }
}
