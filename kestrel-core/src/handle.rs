//! Shared handle to the active configuration
//!
//! Readers borrow the active [`PrinterConfig`] inside a short lock. A reload
//! parses and validates outside the lock and swaps only on success, so a bad
//! document never replaces a good one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::PrinterConfig;
use crate::error::ConfigError;
use crate::loader::load;

struct State {
    active: Option<PrinterConfig>,
    generation: u32,
}

/// Publishes the active configuration to every task
///
/// `M` is the raw mutex: `CriticalSectionRawMutex` on target, `NoopRawMutex`
/// in single-threaded tests.
pub struct ConfigHandle<M: RawMutex> {
    state: Mutex<M, RefCell<State>>,
}

impl<M: RawMutex> Default for ConfigHandle<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> ConfigHandle<M> {
    /// Create an empty, disarmed handle
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                active: None,
                generation: 0,
            })),
        }
    }

    /// Load `text` and make it the active configuration
    ///
    /// Returns the new generation. On error the previous configuration, if
    /// any, stays active.
    pub fn reload(&self, text: &str) -> Result<u32, ConfigError> {
        let config = load(text)?;
        Ok(self.publish(config))
    }

    /// Make an already loaded configuration active
    pub fn publish(&self, config: PrinterConfig) -> u32 {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            state.active = Some(config);
            state.generation = state.generation.wrapping_add(1);
            state.generation
        })
    }

    /// Run `f` with the active configuration
    ///
    /// Returns `None` if nothing has been loaded yet.
    pub fn with<R>(&self, f: impl FnOnce(&PrinterConfig) -> R) -> Option<R> {
        self.state.lock(|cell| cell.borrow().active.as_ref().map(f))
    }

    /// True once a configuration has been loaded successfully
    pub fn is_armed(&self) -> bool {
        self.state.lock(|cell| cell.borrow().active.is_some())
    }

    /// Number of successful loads
    pub fn generation(&self) -> u32 {
        self.state.lock(|cell| cell.borrow().generation)
    }
}
