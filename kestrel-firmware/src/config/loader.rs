//! Configuration persistence
//!
//! The document text is stored in chunks across two banks. A write fills the
//! bank not referenced by the header, then rewrites the header, so a power
//! loss mid-write leaves the previous document intact.
//!
//! Saving calibration values first journals the overlay. If the device
//! resets before the document is rewritten, the journal is replayed at boot.

extern crate alloc;

use alloc::string::String;
use alloc::vec;

use defmt::*;
use serde::{Deserialize, Serialize};

use kestrel_core::overlay::crc32;
use kestrel_core::{CalibrationOverlay, ConfigError};
use kestrel_hal::{ConfigStorage, StorageError, StorageKey};

/// Chunk keys per bank
const BANK_CHUNKS: usize = 128;

/// Upper bound for the encoded header
const HEADER_SIZE: usize = 16;

/// Configuration persistence errors
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Storage operation failed
    Storage(StorageError),
    /// Stored or saved document does not validate
    Config(ConfigError),
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// Reassembled document does not match its header
    CrcMismatch,
    /// Invalid UTF-8 in the stored document
    InvalidUtf8,
    /// Document needs more chunks than a bank holds
    TooLarge,
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        PersistError::Storage(e)
    }
}

impl From<ConfigError> for PersistError {
    fn from(e: ConfigError) -> Self {
        PersistError::Config(e)
    }
}

/// Where the current document lives
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DocumentHeader {
    bank: u8,
    len: u32,
    crc: u32,
}

impl DocumentHeader {
    fn chunk_key(bank: u8, index: usize) -> StorageKey {
        // index < BANK_CHUNKS, so the sum fits in a u8
        StorageKey::DocumentChunk(bank * BANK_CHUNKS as u8 + index as u8)
    }
}

/// Configuration persistence manager
///
/// Owns the storage and moves documents and calibration journals in and
/// out of it.
pub struct ConfigPersistence<S: ConfigStorage> {
    storage: S,
}

impl<S: ConfigStorage> ConfigPersistence<S> {
    /// Create a new config persistence manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    async fn read_header(&mut self) -> Result<DocumentHeader, PersistError> {
        let mut buffer = [0u8; HEADER_SIZE];
        let len = self
            .storage
            .read(StorageKey::DocumentHeader, &mut buffer)
            .await?;
        let header: DocumentHeader =
            postcard::from_bytes(&buffer[..len]).map_err(|_| PersistError::Deserialize)?;
        if header.bank > 1 {
            return Err(PersistError::Deserialize);
        }
        Ok(header)
    }

    /// Check if a document has ever been stored
    pub async fn has_document(&mut self) -> bool {
        self.storage.exists(StorageKey::DocumentHeader).await
    }

    /// Read the stored document text
    ///
    /// `PersistError::Storage(StorageError::NotFound)` means nothing has been
    /// stored yet.
    pub async fn read_document(&mut self) -> Result<String, PersistError> {
        let header = self.read_header().await?;
        let len = header.len as usize;
        debug!("Stored document: {} bytes in bank {}", len, header.bank);

        let mut data = vec![0u8; len];
        for (index, chunk) in data.chunks_mut(S::ITEM_CAPACITY).enumerate() {
            let key = DocumentHeader::chunk_key(header.bank, index);
            let read = self.storage.read(key, chunk).await?;
            if read != chunk.len() {
                warn!("Chunk {} has {} bytes, expected {}", index, read, chunk.len());
                return Err(PersistError::CrcMismatch);
            }
        }

        if crc32(&data) != header.crc {
            warn!("Stored document CRC mismatch");
            return Err(PersistError::CrcMismatch);
        }
        String::from_utf8(data).map_err(|_| PersistError::InvalidUtf8)
    }

    /// Store a document, replacing the current one
    pub async fn write_document(&mut self, text: &str) -> Result<(), PersistError> {
        let bytes = text.as_bytes();
        let chunks = bytes.len().div_ceil(S::ITEM_CAPACITY);
        if chunks > BANK_CHUNKS {
            return Err(PersistError::TooLarge);
        }
        let len = u32::try_from(bytes.len()).map_err(|_| PersistError::TooLarge)?;

        let previous = match self.read_header().await {
            Ok(header) => Some(header),
            Err(PersistError::Storage(StorageError::NotFound)) => None,
            Err(e) => {
                warn!("Unreadable document header, overwriting: {:?}", e);
                None
            }
        };
        let bank = match previous {
            Some(header) if header.bank == 0 => 1,
            _ => 0,
        };

        for (index, chunk) in bytes.chunks(S::ITEM_CAPACITY).enumerate() {
            self.storage
                .write(DocumentHeader::chunk_key(bank, index), chunk)
                .await?;
        }

        let header = DocumentHeader {
            bank,
            len,
            crc: crc32(bytes),
        };
        let mut buffer = [0u8; HEADER_SIZE];
        let encoded =
            postcard::to_slice(&header, &mut buffer).map_err(|_| PersistError::Serialize)?;
        self.storage
            .write(StorageKey::DocumentHeader, encoded)
            .await?;
        info!("Stored document: {} bytes in {} chunks", bytes.len(), chunks);

        // The old bank is no longer referenced; failing to clear it only
        // wastes space until the next compaction
        if let Some(old) = previous {
            let old_chunks = (old.len as usize).div_ceil(S::ITEM_CAPACITY);
            for index in 0..old_chunks.min(BANK_CHUNKS) {
                if let Err(e) = self
                    .storage
                    .remove(DocumentHeader::chunk_key(old.bank, index))
                    .await
                {
                    debug!("Could not clear old chunk {}: {:?}", index, e);
                }
            }
        }
        Ok(())
    }

    /// Read a pending calibration journal, if any
    pub async fn read_journal(&mut self) -> Result<Option<CalibrationOverlay>, PersistError> {
        let mut buffer = vec![0u8; S::ITEM_CAPACITY];
        let len = match self
            .storage
            .read(StorageKey::PendingOverlay, &mut buffer)
            .await
        {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        postcard::from_bytes(&buffer[..len])
            .map(Some)
            .map_err(|_| PersistError::Deserialize)
    }

    async fn write_journal(&mut self, overlay: &CalibrationOverlay) -> Result<(), PersistError> {
        let encoded = postcard::to_allocvec(overlay).map_err(|_| PersistError::Serialize)?;
        if encoded.len() > S::ITEM_CAPACITY {
            return Err(PersistError::TooLarge);
        }
        self.storage
            .write(StorageKey::PendingOverlay, &encoded)
            .await?;
        Ok(())
    }

    /// Drop the pending calibration journal
    pub async fn clear_journal(&mut self) -> Result<(), PersistError> {
        self.storage.remove(StorageKey::PendingOverlay).await?;
        Ok(())
    }

    /// Persist a saved document together with the overlay it was made from
    ///
    /// `text` must be the output of `PrinterConfig::save(overlay)`.
    pub async fn save(&mut self, text: &str, overlay: &CalibrationOverlay) -> Result<(), PersistError> {
        self.write_journal(overlay).await?;
        self.write_document(text).await?;
        self.clear_journal().await
    }

    /// Erase every stored document and journal
    pub async fn erase(&mut self) -> Result<(), PersistError> {
        warn!("Erasing stored configuration");
        self.storage.erase_all().await?;
        Ok(())
    }
}
