//! Tracker server binary. Thin wrapper around [`fastdfs_core::server::run`]:
//! the tracker differs from the storage binary only in role name and
//! default listen port — everything else (config loading,
//! worker/dispatcher wiring, the accept loop) lives in `server.rs`.

use fastdfs_core::protocol::TRACKER_PORT;

fn main() {
    if let Err(e) = fastdfs_core::server::run("tracker", TRACKER_PORT) {
        eprintln!("fdfs-tracker: {e}");
        std::process::exit(1);
    }
}
