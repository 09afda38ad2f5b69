//! Configuration loading and persistence
//!
//! Loads the printer configuration from flash or the embedded default and
//! decides whether it may drive outputs.

pub mod boot;
pub mod loader;

pub use boot::{boot_config, check_board_pins};
pub use loader::{ConfigPersistence, PersistError};
