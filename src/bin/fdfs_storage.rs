//! Storage server binary. Thin wrapper around [`fastdfs_core::server::run`];
//! see `fdfs_tracker.rs` for the shared bootstrap this delegates to.

use fastdfs_core::protocol::STORAGE_PORT;

fn main() {
    if let Err(e) = fastdfs_core::server::run("storage", STORAGE_PORT) {
        eprintln!("fdfs-storage: {e}");
        std::process::exit(1);
    }
}
