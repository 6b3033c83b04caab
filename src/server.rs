// src/server.rs
//! Shared bootstrap for the `fdfs-tracker` and `fdfs-storage` binaries:
//! config loading, logging, `Runtime`/`TaskPool`/worker/dispatcher wiring,
//! and the blocking accept loop that hands connections to [`Dispatcher`].
//! The two binaries differ only in role name, default port, and —
//! eventually — which [`TaskCallbacks`] implementation they plug in; the
//! upload/download/metadata handlers themselves live at the application
//! layer above this core.

use crate::cli::{self, Action, Cli};
use crate::config::{IniContext, Settings};
use crate::error::{CoreError, CoreResult};
use crate::io::dispatch::WorkerHandle;
use crate::io::{worker, Dispatcher, Interest};
use crate::protocol::header::{Header, HEADER_LEN};
use crate::runtime::Runtime;
use crate::task::pool::{AllocMode, TaskPool, TaskPoolConfig};
use crate::task::{CallbackOutcome, Task, TaskCallbacks};
use clap::Parser;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Echoes a single response frame back on the first readable event, then
/// marks the task for deletion. Exercises the header codec end to end
/// without standing in for any real request handler.
struct EchoOnce;

impl TaskCallbacks for EchoOnce {
    fn on_readable(&self, task: &mut Task) -> CallbackOutcome {
        let mut header_buf = [0u8; HEADER_LEN];
        use std::io::Read;
        let Some(conn) = task.conn.as_mut() else {
            return CallbackOutcome::Delete;
        };
        match conn.read(&mut header_buf) {
            Ok(n) if n == HEADER_LEN => {}
            Ok(_) => return CallbackOutcome::Continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return CallbackOutcome::Continue,
            Err(_) => return CallbackOutcome::Delete,
        }
        let response = match Header::decode(&header_buf) {
            Ok(_req) => Header::response(0, 0).encode(),
            Err(_) => Header::response(0, 2).encode(),
        };
        use std::io::Write;
        let _ = task.conn.as_mut().and_then(|c| c.write_all(&response).ok());
        CallbackOutcome::Delete
    }
}

/// Loads `path` (falling back to built-in defaults if the file is absent —
/// convenient for the demo binaries; a production deployment would treat a
/// missing conf file as fatal) and extracts the recognized [`Settings`].
fn load_settings(path: &std::path::Path) -> CoreResult<Settings> {
    let ctx = if path.exists() {
        IniContext::load_file(path)?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        IniContext::new()
    };
    Settings::from_ini(&ctx)
}

/// Runs a server identified by `role` (used for the pid file name and log
/// context) on `default_port` unless overridden by `FDFS_PORT`.
pub fn run(role: &str, default_port: u16) -> CoreResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let pid_path = cli::pid_file_for_role(role);

    match cli.action {
        Action::Stop => {
            cli::signal_stop(&pid_path)?;
            tracing::info!(role, "sent stop signal");
            return Ok(());
        }
        Action::Restart => {
            if let Err(e) = cli::signal_stop(&pid_path) {
                tracing::warn!(role, error = %e, "no running instance to stop before restart");
            }
        }
        Action::Start => {}
    }

    let settings = load_settings(&cli.config)?;
    tracing::info!(role, ?settings, "starting server");

    let mode = if settings.min_buff_size == settings.max_buff_size {
        AllocMode::WholeBlock
    } else {
        AllocMode::SeparateBuffer
    };
    let pool = Arc::new(TaskPool::new(TaskPoolConfig {
        capacity: settings.max_connections,
        min_buf: settings.min_buff_size,
        max_buf: settings.max_buff_size,
        arg_size: 0,
        mode,
    })?);

    let runtime = Arc::new(Runtime::new(pool.clone()));

    let mut handles = Vec::with_capacity(settings.work_threads);
    let mut worker_handles = Vec::with_capacity(settings.work_threads);
    for id in 0..settings.work_threads {
        let (join, init) = worker::spawn_worker(
            id,
            runtime.clone(),
            settings.network_timeout_secs,
            1021,
            256,
        )?;
        handles.push(join);
        worker_handles.push(WorkerHandle::new(id, init));
    }

    let dispatcher = Arc::new(Dispatcher::new(pool.clone(), worker_handles)?);

    let port = std::env::var("FDFS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(default_port);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .map_err(|e| CoreError::NetworkError {
            op: "bind",
            peer: format!("0.0.0.0:{port}"),
            cause: e,
        })?;
    tracing::info!(role, port, "listening");

    cli::write_pid_file(&pid_path)?;

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown_requested.clone();
        let _ = ctrlc_handler(move || flag.store(true, Ordering::SeqCst));
    }

    listener
        .set_nonblocking(true)
        .map_err(|e| CoreError::NetworkError {
            op: "set_nonblocking",
            peer: "listener".to_string(),
            cause: e,
        })?;

    while !shutdown_requested.load(Ordering::SeqCst) && runtime.run_flag().load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((std_stream, peer)) => {
                std_stream.set_nonblocking(true).ok();
                let mio_stream = mio::net::TcpStream::from_std(std_stream);
                if let Err(e) = dispatcher.dispatch(mio_stream, peer, Arc::new(EchoOnce), Interest::Readable) {
                    tracing::warn!(error = %e, "failed to dispatch accepted connection");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                break;
            }
        }
    }

    tracing::info!(role, "shutting down");
    runtime.shutdown();
    dispatcher.shutdown();
    for handle in handles {
        let _ = handle.join();
    }
    cli::remove_pid_file(&pid_path)?;
    Ok(())
}

#[cfg(unix)]
fn ctrlc_handler(f: impl Fn() + Send + 'static) -> CoreResult<()> {
    static CALLBACK: Mutex<Option<Box<dyn Fn() + Send>>> = Mutex::new(None);
    *CALLBACK.lock().expect("ctrlc callback mutex poisoned") = Some(Box::new(f));

    extern "C" fn handler(_sig: i32) {
        if let Ok(guard) = CALLBACK.lock() {
            if let Some(cb) = guard.as_ref() {
                cb();
            }
        }
    }

    // SAFETY: installs a signal handler for SIGINT/SIGTERM that only sets an
    // atomic flag via the stored closure; no allocation or non-async-signal-safe
    // work happens inside `handler` beyond the mutex lock, matching the
    // pattern used for the CLI's own `kill` call.
    unsafe {
        libc::signal(libc::SIGINT, handler as usize);
        libc::signal(libc::SIGTERM, handler as usize);
    }
    Ok(())
}

#[cfg(not(unix))]
fn ctrlc_handler(_f: impl Fn() + Send + 'static) -> CoreResult<()> {
    Ok(())
}
