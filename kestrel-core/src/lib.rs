//! Board-agnostic printer configuration loading
//!
//! This crate turns a sectioned `key: value` printer configuration document
//! into a validated, typed [`PrinterConfig`]:
//!
//! - Document grammar and the SAVE_CONFIG calibration block
//! - Board pin aliases and pin ownership
//! - Declarative section schemas and value coercion
//! - Cross-field validation
//! - Saving calibration values without touching user text
//! - A lock-protected handle publishing the active configuration

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod document;
pub mod error;
pub mod glyph;
pub mod handle;
pub mod loader;
pub mod overlay;
pub mod pins;
pub mod schema;
pub mod validate;
pub mod value;

pub use config::{PrinterConfig, Section};
pub use error::ConfigError;
pub use handle::ConfigHandle;
pub use loader::load;
pub use overlay::CalibrationOverlay;
pub use pins::ResolvedPin;
