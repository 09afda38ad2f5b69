//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod config;

pub use config::config_task;
