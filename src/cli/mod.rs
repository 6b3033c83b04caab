// src/cli/mod.rs
//! `start|stop|restart` command line handling and PID-file management,
//! shared by every server binary (`fdfs-tracker`, `fdfs-storage`).

use crate::error::{CoreError, CoreResult};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Parsed command line for a server binary.
#[derive(Debug, Parser)]
#[command(about = "FastDFS-style server process", version)]
pub struct Cli {
    #[command(subcommand)]
    pub action: Action,

    /// Path to the server's `.conf` file.
    #[arg(long, default_value = "conf/server.conf")]
    pub config: PathBuf,
}

/// The first positional argument every server binary recognizes.
#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the server in the foreground.
    Start,
    /// Signal a running server (found via its PID file) to stop.
    Stop,
    /// Stop, then start.
    Restart,
}

/// Reads the pid from `pid_path`, if present and parseable.
pub fn read_pid_file(pid_path: &Path) -> CoreResult<Option<u32>> {
    match std::fs::read_to_string(pid_path) {
        Ok(contents) => contents
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| CoreError::InvalidArgument(format!("{pid_path:?} does not contain a valid pid"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::InvalidArgument(format!("reading {pid_path:?}: {e}"))),
    }
}

/// Writes the current process's pid to `pid_path`, creating parent
/// directories as needed.
pub fn write_pid_file(pid_path: &Path) -> CoreResult<()> {
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::InvalidArgument(format!("creating {parent:?}: {e}")))?;
    }
    std::fs::write(pid_path, format!("{}\n", std::process::id()))
        .map_err(|e| CoreError::InvalidArgument(format!("writing {pid_path:?}: {e}")))
}

/// Removes the pid file, if present. Not an error if it's already gone.
pub fn remove_pid_file(pid_path: &Path) -> CoreResult<()> {
    match std::fs::remove_file(pid_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::InvalidArgument(format!("removing {pid_path:?}: {e}"))),
    }
}

/// Sends `SIGTERM` to the pid recorded in `pid_path`. `NotFound` if no pid
/// file exists — there is nothing running to stop.
#[cfg(unix)]
pub fn signal_stop(pid_path: &Path) -> CoreResult<()> {
    let Some(pid) = read_pid_file(pid_path)? else {
        return Err(CoreError::NotFound(format!("no pid file at {pid_path:?}")));
    };
    // SAFETY: `kill` with a validated pid and the termination signal; no
    // pointers are dereferenced.
    let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if rc != 0 {
        return Err(CoreError::NetworkError {
            op: "kill",
            peer: format!("pid {pid}"),
            cause: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// The PID file path for a named server role (e.g. `"tracker"`, `"storage"`).
pub fn pid_file_for_role(role: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/fdfs_{role}d.pid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_current_pid() {
        let dir = std::env::temp_dir().join(format!("fdfs-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pid_path = dir.join("test.pid");

        write_pid_file(&pid_path).unwrap();
        let pid = read_pid_file(&pid_path).unwrap();
        assert_eq!(pid, Some(std::process::id()));

        remove_pid_file(&pid_path).unwrap();
        assert_eq!(read_pid_file(&pid_path).unwrap(), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_pid_file_reads_as_none() {
        let path = Path::new("/tmp/fdfs-cli-test-definitely-missing.pid");
        assert_eq!(read_pid_file(path).unwrap(), None);
    }

    #[test]
    fn pid_file_path_is_named_after_role() {
        assert_eq!(pid_file_for_role("tracker"), PathBuf::from("/tmp/fdfs_trackerd.pid"));
        assert_eq!(pid_file_for_role("storage"), PathBuf::from("/tmp/fdfs_storaged.pid"));
    }
}
