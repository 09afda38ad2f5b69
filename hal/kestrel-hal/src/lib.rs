//! Kestrel hardware abstraction
//!
//! Chip-specific crates implement these traits so the firmware can persist
//! the printer configuration without knowing where it lives.
//!
//! - [`storage::ConfigStorage`] - key-value storage for the document text
//!   and the pending calibration journal

#![no_std]
#![deny(unsafe_code)]

pub mod storage;

pub use storage::{ConfigStorage, StorageError, StorageKey};
