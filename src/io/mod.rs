// src/io/mod.rs
//! Event demultiplexer, worker loop, and listener-to-worker dispatch.

pub mod dispatch;
pub mod poller;
pub mod worker;

pub use dispatch::{Dispatcher, WorkerHandle};
pub use poller::{Demultiplexer, Interest, ReadyEvents};
pub use worker::{spawn_worker, WorkerInit};
