// src/connpool/mod.rs
//! The tracker-facing client connection pool: an address-keyed map of idle
//! connection stacks, reused LIFO and evicted once they go stale.
//!
//! A single `Mutex`-guarded inner struct shared via `Arc`, kept synchronous
//! (`std::sync::Mutex`, not an async lock) since neither the worker loop nor
//! the task pool pulls in an async runtime.

use crate::error::{CoreError, CoreResult};
use socket2::{SockRef, TcpKeepalive};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One pooled outbound socket to a specific tracker or storage server.
pub struct Connection {
    stream: TcpStream,
    addr: String,
    last_used: Instant,
}

impl Connection {
    /// The `host:port` this connection was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Time of the last successful read or write.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Whether the kernel still reports this socket as open. This is a
    /// best-effort liveness check (a zero-length non-blocking peek), not a
    /// protocol-level probe — liveness comes from socket state, not from
    /// sending bytes.
    pub fn is_alive(&self) -> bool {
        let mut buf = [0u8; 1];
        match self.stream.set_nonblocking(true) {
            Ok(()) => {}
            Err(_) => return false,
        }
        let peek_result = self.stream.peek(&mut buf);
        let _ = self.stream.set_nonblocking(false);
        match peek_result {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }

    /// Direct access for callers that need to read/write the wire protocol.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn write_all(&mut self, buf: &[u8]) -> CoreResult<()> {
        self.stream.write_all(buf).map_err(|e| CoreError::NetworkError {
            op: "write",
            peer: self.addr.clone(),
            cause: e,
        })?;
        self.last_used = Instant::now();
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        self.stream.read_exact(buf).map_err(|e| CoreError::NetworkError {
            op: "read",
            peer: self.addr.clone(),
            cause: e,
        })?;
        self.last_used = Instant::now();
        Ok(())
    }
}

struct Inner {
    stacks: HashMap<String, Vec<Connection>>,
    closed: bool,
}

/// An address-keyed pool of idle outbound connections, LIFO per address.
///
/// Thread-safe via a single mutex guarding the address map and closed flag
/// — sockets themselves are used single-threaded by the caller between
/// `get` and `put`.
pub struct ConnectionPool {
    inner: Mutex<Inner>,
    max_conns_per_addr: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    default_addr: Option<String>,
}

impl ConnectionPool {
    /// Registers an empty LIFO stack for each of `addrs`. The first address,
    /// if any, becomes the default used when `get(None)` is called.
    pub fn new(
        addrs: Vec<String>,
        max_conns_per_addr: usize,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let default_addr = addrs.first().cloned();
        let mut stacks = HashMap::new();
        for addr in addrs {
            stacks.entry(addr).or_insert_with(Vec::new);
        }
        Self {
            inner: Mutex::new(Inner {
                stacks,
                closed: false,
            }),
            max_conns_per_addr,
            connect_timeout,
            idle_timeout,
            default_addr,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("connection pool mutex poisoned")
    }

    /// Idempotent runtime registration of a new server address — a no-op if
    /// already present, and a no-op (not an error) after [`close`](Self::close).
    pub fn add_addr(&self, addr: impl Into<String>) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.stacks.entry(addr.into()).or_insert_with(Vec::new);
    }

    /// Pops the top of `addr`'s idle stack until a live, non-stale
    /// connection is found, discarding stale/dead ones along the way; if
    /// the stack empties out, opens a fresh TCP connection with
    /// `connect_timeout`, TCP_NODELAY and keepalive set.
    pub fn get(&self, addr: Option<&str>) -> CoreResult<Connection> {
        let addr = match addr {
            Some(a) => a.to_string(),
            None => self
                .default_addr
                .clone()
                .ok_or_else(|| CoreError::InvalidArgument("no default server address configured".into()))?,
        };

        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(CoreError::PoolClosed);
            }
            let stack = inner.stacks.entry(addr.clone()).or_insert_with(Vec::new);
            while let Some(conn) = stack.pop() {
                if conn.is_alive() && conn.last_used.elapsed() <= self.idle_timeout {
                    return Ok(conn);
                }
                // stale or dead: drop it (Connection's TcpStream closes on drop)
            }
        }

        self.create_connection(&addr)
    }

    fn create_connection(&self, addr: &str) -> CoreResult<Connection> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| CoreError::InvalidArgument(format!("invalid server address {addr:?}: {e}")))?
            .next()
            .ok_or_else(|| CoreError::InvalidArgument(format!("server address {addr:?} resolved to nothing")))?;

        let stream = TcpStream::connect_timeout(&socket_addr, self.connect_timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                CoreError::Timeout(format!("connect to {addr}"))
            } else {
                CoreError::NetworkError {
                    op: "connect",
                    peer: addr.to_string(),
                    cause: e,
                }
            }
        })?;
        stream.set_nodelay(true).map_err(CoreError::from)?;
        let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(30));
        SockRef::from(&stream)
            .set_tcp_keepalive(&keepalive)
            .map_err(CoreError::from)?;

        Ok(Connection {
            stream,
            addr: addr.to_string(),
            last_used: Instant::now(),
        })
    }

    /// Returns `conn` to its address's idle stack, unless the pool is
    /// closed, the address is unknown, the stack is at capacity, or the
    /// connection is already stale — in any of those cases the connection
    /// is simply dropped (closed). A `None` conn is a no-op.
    pub fn put(&self, conn: Option<Connection>) {
        let Some(conn) = conn else { return };
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        if conn.last_used.elapsed() > self.idle_timeout {
            return;
        }
        let Some(stack) = inner.stacks.get_mut(&conn.addr) else {
            return;
        };
        if stack.len() >= self.max_conns_per_addr {
            return;
        }
        stack.push(conn);
        sweep_stale(stack, self.idle_timeout);
    }

    /// Flips the closed flag and closes every pooled connection.
    /// Idempotent: a second call is a no-op. After `close`, `get` returns
    /// `PoolClosed` and `put` silently discards whatever it's handed.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.stacks.values_mut().for_each(|stack| stack.clear());
    }

    /// Number of idle connections currently pooled for `addr`, for tests
    /// and diagnostics.
    pub fn idle_count(&self, addr: &str) -> usize {
        self.lock().stacks.get(addr).map(Vec::len).unwrap_or(0)
    }
}

fn sweep_stale(stack: &mut Vec<Connection>, idle_timeout: Duration) {
    stack.retain(|c| c.last_used.elapsed() <= idle_timeout);
}
