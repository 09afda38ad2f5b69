//! Configuration task
//!
//! Owns the flash storage and serves reload, save and reset requests.
//! A request that fails leaves the active configuration untouched.

extern crate alloc;

use alloc::string::String;

use defmt::*;
use portable_atomic::Ordering;

use kestrel_core::{load, CalibrationOverlay, PrinterConfig};
use kestrel_hal::ConfigStorage;
use kestrel_hal_rp2040::flash::Rp2040FlashStorage;

use crate::channels::{ConfigOutcome, ConfigRequest, ARMED, CONFIG, CONFIG_OUTCOME, CONFIG_REQUEST};
use crate::config::{check_board_pins, ConfigPersistence};
use crate::EMBEDDED_CONFIG;

/// Configuration task - handles reloads and calibration saves
///
/// Flash writes happen here so no other task blocks on them.
#[embassy_executor::task]
pub async fn config_task(mut persistence: ConfigPersistence<Rp2040FlashStorage<'static>>) {
    info!("Config task started");

    loop {
        let outcome = match CONFIG_REQUEST.receive().await {
            ConfigRequest::Reload(text) => reload(&mut persistence, &text).await,
            ConfigRequest::Save(overlay) => save(&mut persistence, &overlay).await,
            ConfigRequest::Reset => reset(&mut persistence).await,
        };

        match &outcome {
            ConfigOutcome::Applied { generation } => info!("Configuration {} active", generation),
            other => warn!("Configuration request failed: {:?}", other),
        }
        CONFIG_OUTCOME.signal(outcome);
    }
}

async fn reload<S: ConfigStorage>(persistence: &mut ConfigPersistence<S>, text: &str) -> ConfigOutcome {
    let config = match load(text) {
        Ok(config) => config,
        Err(e) => return ConfigOutcome::Rejected(e),
    };
    if !check_board_pins(&config) {
        return ConfigOutcome::UnsupportedPin;
    }
    if let Err(e) = persistence.write_document(text).await {
        return ConfigOutcome::Storage(e);
    }
    activate(config)
}

async fn save<S: ConfigStorage>(
    persistence: &mut ConfigPersistence<S>,
    overlay: &CalibrationOverlay,
) -> ConfigOutcome {
    // Copy the text out so parsing happens outside the lock
    let Some(source) = CONFIG.with(|config| String::from(config.source())) else {
        return ConfigOutcome::NotLoaded;
    };

    // The copy parsed here is dropped as soon as the saved one exists
    let saved = load(&source).and_then(|current| current.save(overlay));
    drop(source);
    let (text, config) = match saved {
        Ok(result) => result,
        Err(e) => return ConfigOutcome::Rejected(e),
    };

    info!(
        "Saving {} calibration sections",
        config.overlay().sections().len()
    );
    if let Err(e) = persistence.save(&text, overlay).await {
        return ConfigOutcome::Storage(e);
    }
    activate(config)
}

/// Factory reset: forget the stored document and go back to the embedded one
async fn reset<S: ConfigStorage>(persistence: &mut ConfigPersistence<S>) -> ConfigOutcome {
    if let Err(e) = persistence.erase().await {
        return ConfigOutcome::Storage(e);
    }
    match load(EMBEDDED_CONFIG) {
        Ok(config) if check_board_pins(&config) => activate(config),
        Ok(_) => ConfigOutcome::UnsupportedPin,
        Err(e) => ConfigOutcome::Rejected(e),
    }
}

fn activate(config: PrinterConfig) -> ConfigOutcome {
    let generation = CONFIG.publish(config);
    ARMED.store(true, Ordering::Release);
    ConfigOutcome::Applied { generation }
}
