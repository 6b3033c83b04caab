// src/config/mod.rs
//! Configuration: the FastDFS INI format, with `#include`
//! resolution and duplicate-key insertion-order preservation, plus a typed
//! [`settings::Settings`] extracted from the keys this core recognizes.

pub mod ini;
pub mod settings;

pub use ini::IniContext;
pub use settings::Settings;
