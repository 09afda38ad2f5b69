//! Flash storage driver for RP2040
//!
//! Uses sequential-storage for wear-leveled key-value storage
//! in the last 64KB of flash.
//!
//! Implements the `ConfigStorage` trait from `kestrel-hal`.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use kestrel_hal::storage::{ConfigStorage, StorageError, StorageKey};

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB flash on SKR Pico
pub const CONFIG_PARTITION_SIZE: usize = 64 * 1024; // 64KB for config
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

/// Flash range for the config partition
pub const CONFIG_RANGE: core::ops::Range<u32> =
    (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Payload bytes per item; a document chunk is at most this long
pub const ITEM_CAPACITY: usize = 1024;

/// Item buffer: payload plus key and item header
const DATA_BUFFER_SIZE: usize = ITEM_CAPACITY + 32;

/// RP2040 flash storage
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
    buffer: [u8; DATA_BUFFER_SIZE],
}

impl<'d> Rp2040FlashStorage<'d> {
    /// Create a new flash storage instance
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
            buffer: [0; DATA_BUFFER_SIZE],
        }
    }
}

fn storage_error<E>(error: sequential_storage::Error<E>) -> StorageError {
    match error {
        sequential_storage::Error::Storage { .. } => StorageError::Flash,
        sequential_storage::Error::FullStorage => StorageError::Full,
        sequential_storage::Error::ItemTooBig => StorageError::ItemTooLarge,
        sequential_storage::Error::BufferTooSmall(_) => StorageError::BufferTooSmall,
        _ => StorageError::Storage,
    }
}

impl<'d> ConfigStorage for Rp2040FlashStorage<'d> {
    const ITEM_CAPACITY: usize = ITEM_CAPACITY;

    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError> {
        let item = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut self.buffer,
            &key,
        )
        .await
        .map_err(storage_error)?
        .ok_or(StorageError::NotFound)?;

        let target = buffer
            .get_mut(..item.len())
            .ok_or(StorageError::BufferTooSmall)?;
        target.copy_from_slice(item);
        Ok(item.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > ITEM_CAPACITY {
            return Err(StorageError::ItemTooLarge);
        }
        map::store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut self.buffer,
            &key,
            &data,
        )
        .await
        .map_err(storage_error)
    }

    async fn remove(&mut self, key: StorageKey) -> Result<(), StorageError> {
        map::remove_item::<StorageKey, _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut self.buffer,
            &key,
        )
        .await
        .map_err(storage_error)
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                CONFIG_RANGE,
                &mut NoCache::new(),
                &mut self.buffer,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }

    async fn erase_all(&mut self) -> Result<(), StorageError> {
        self.flash
            .erase(CONFIG_RANGE.start, CONFIG_RANGE.end)
            .await
            .map_err(|_| StorageError::Flash)
    }
}
