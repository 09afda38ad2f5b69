//! Boot-time configuration
//!
//! Picks the stored document (or the embedded default), finishes an
//! interrupted calibration save and checks the pins against the board.

use defmt::*;

use kestrel_core::{load, PrinterConfig};
use kestrel_hal::ConfigStorage;
use kestrel_hal_rp2040::pins::find_unknown_pin;

use super::loader::{ConfigPersistence, PersistError};

/// Load the configuration the firmware should start with
///
/// Returns `None` when neither the stored nor the embedded document can be
/// used, in which case outputs must stay disarmed.
pub async fn boot_config<S: ConfigStorage>(
    persistence: &mut ConfigPersistence<S>,
    embedded: &str,
) -> Option<PrinterConfig> {
    let stored = if persistence.has_document().await {
        match load_stored(persistence).await {
            Ok(config) => {
                info!("Loaded configuration from flash");
                Some(config)
            }
            Err(e) => {
                warn!("Stored configuration unusable: {:?}", e);
                None
            }
        }
    } else {
        info!("No configuration in flash");
        None
    };

    let config = match stored {
        Some(config) => config,
        None => match load(embedded) {
            Ok(config) => {
                info!("Using embedded configuration");
                config
            }
            Err(e) => {
                error!("Embedded configuration invalid: {:?}", e);
                return None;
            }
        },
    };

    let config = replay_journal(persistence, config).await;
    check_board_pins(&config).then_some(config)
}

async fn load_stored<S: ConfigStorage>(
    persistence: &mut ConfigPersistence<S>,
) -> Result<PrinterConfig, PersistError> {
    let text = persistence.read_document().await?;
    Ok(load(&text)?)
}

/// Finish a calibration save that was interrupted by a reset
async fn replay_journal<S: ConfigStorage>(
    persistence: &mut ConfigPersistence<S>,
    config: PrinterConfig,
) -> PrinterConfig {
    let overlay = match persistence.read_journal().await {
        Ok(Some(overlay)) => overlay,
        Ok(None) => return config,
        Err(e) => {
            warn!("Discarding unreadable calibration journal: {:?}", e);
            clear_journal(persistence).await;
            return config;
        }
    };

    info!("Replaying interrupted calibration save");
    let (text, saved) = match config.save(&overlay) {
        Ok(result) => result,
        Err(e) => {
            warn!("Calibration journal does not apply: {:?}", e);
            clear_journal(persistence).await;
            return config;
        }
    };
    drop(config);

    // Keep the journal if the document could not be written; the next boot
    // tries again
    match persistence.write_document(&text).await {
        Ok(()) => clear_journal(persistence).await,
        Err(e) => warn!("Could not store replayed calibration: {:?}", e),
    }
    saved
}

async fn clear_journal<S: ConfigStorage>(persistence: &mut ConfigPersistence<S>) {
    if let Err(e) = persistence.clear_journal().await {
        warn!("Could not clear calibration journal: {:?}", e);
    }
}

/// Check that every pin on the local mcu exists on the RP2040
pub fn check_board_pins(config: &PrinterConfig) -> bool {
    match find_unknown_pin(config) {
        None => true,
        Some(unknown) => {
            error!(
                "[{}] {}: pin '{}' is not an RP2040 GPIO",
                Display2Format(unknown.section.id()),
                unknown.key,
                unknown.pin.pin.as_str()
            );
            false
        }
    }
}
