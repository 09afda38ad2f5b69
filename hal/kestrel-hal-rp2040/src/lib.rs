//! RP2040 support for the Kestrel firmware
//!
//! - Flash storage driver (implements `kestrel_hal::ConfigStorage`)
//! - GPIO name checks for resolved configuration pins

#![no_std]

pub mod flash;
pub mod pins;

// Re-export shared traits from kestrel-hal for convenience
pub use kestrel_hal::{ConfigStorage, StorageError, StorageKey};
