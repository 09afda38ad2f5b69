//! Inter-task communication
//!
//! The active configuration, the armed flag and the request/outcome pair
//! used to reload or save it. Uses embassy-sync primitives for safe async
//! communication.

extern crate alloc;

use alloc::string::String;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicBool;

use kestrel_core::{CalibrationOverlay, ConfigError, ConfigHandle};

use crate::config::PersistError;

/// Queued configuration requests
const REQUEST_CHANNEL_SIZE: usize = 2;

/// Active configuration, readable from every task
pub static CONFIG: ConfigHandle<CriticalSectionRawMutex> = ConfigHandle::new();

/// Outputs may only be driven while this is set
///
/// False until a configuration has been loaded and accepted.
pub static ARMED: AtomicBool = AtomicBool::new(false);

/// Work for the config task
pub enum ConfigRequest {
    /// Replace the whole document
    Reload(String),
    /// Write calibration values into the SAVE_CONFIG block
    Save(CalibrationOverlay),
    /// Erase stored state and return to the embedded document
    Reset,
}

/// Result of the last request
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigOutcome {
    /// The new configuration is active
    Applied { generation: u32 },
    /// The document did not validate; the previous one stays active
    Rejected(ConfigError),
    /// A pin the board does not have
    UnsupportedPin,
    /// Validated but could not be stored
    Storage(PersistError),
    /// Save requested before any configuration was loaded
    NotLoaded,
}

/// Reload, save and reset requests
pub static CONFIG_REQUEST: Channel<CriticalSectionRawMutex, ConfigRequest, REQUEST_CHANNEL_SIZE> =
    Channel::new();

/// Outcome of the most recent request
pub static CONFIG_OUTCOME: Signal<CriticalSectionRawMutex, ConfigOutcome> = Signal::new();
