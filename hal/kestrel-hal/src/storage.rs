//! Persistent configuration storage
//!
//! The printer configuration is kept as text. A document usually exceeds
//! the size of a single storage item, so it is split into numbered chunks
//! described by a header item. The pending calibration journal lives under
//! its own key so an interrupted save can be finished at the next boot.

use core::future::Future;

/// Storage keys
///
/// Encoded as two bytes: a tag and a chunk index (zero for the
/// non-chunked keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageKey {
    /// Length and checksum of the stored document
    DocumentHeader,
    /// One slice of the document text
    DocumentChunk(u8),
    /// Calibration overlay waiting to be written into the document
    PendingOverlay,
}

impl StorageKey {
    /// Encoded size of every key
    pub const ENCODED_LEN: usize = 2;

    const TAG_HEADER: u8 = 0;
    const TAG_CHUNK: u8 = 1;
    const TAG_PENDING: u8 = 2;

    /// Two-byte encoding
    pub fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        match self {
            StorageKey::DocumentHeader => [Self::TAG_HEADER, 0],
            StorageKey::DocumentChunk(index) => [Self::TAG_CHUNK, index],
            StorageKey::PendingOverlay => [Self::TAG_PENDING, 0],
        }
    }

    /// Decode a key, rejecting unknown tags and stray index bytes
    pub fn from_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Option<Self> {
        match bytes {
            [Self::TAG_HEADER, 0] => Some(StorageKey::DocumentHeader),
            [Self::TAG_CHUNK, index] => Some(StorageKey::DocumentChunk(index)),
            [Self::TAG_PENDING, 0] => Some(StorageKey::PendingOverlay),
            _ => None,
        }
    }
}

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash operation failed
    Flash,
    /// Storage layer failed (corrupt item, bad state)
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Item larger than [`ConfigStorage::ITEM_CAPACITY`]
    ItemTooLarge,
    /// Storage is full
    Full,
}

/// Key-value storage for configuration data
///
/// Implementations handle wear leveling and per-item integrity. A write
/// either lands completely or leaves the previous value readable.
pub trait ConfigStorage {
    /// Largest value a single key can hold
    const ITEM_CAPACITY: usize;

    /// Read a value into `buffer`, returning its length
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize, StorageError>>;

    /// Write a value, replacing any previous one
    fn write(&mut self, key: StorageKey, data: &[u8]) -> impl Future<Output = Result<(), StorageError>>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&mut self, key: StorageKey) -> impl Future<Output = Result<(), StorageError>>;

    /// Check if a key holds a value
    fn exists(&mut self, key: StorageKey) -> impl Future<Output = bool>;

    /// Erase the whole configuration partition
    fn erase_all(&mut self) -> impl Future<Output = Result<(), StorageError>>;
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        let bytes = self.to_bytes();
        let Some(target) = buffer.get_mut(..bytes.len()) else {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        };
        target.copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        let Some(&[tag, index]) = buffer.get(..Self::ENCODED_LEN) else {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        };
        match StorageKey::from_bytes([tag, index]) {
            Some(key) => Ok((key, Self::ENCODED_LEN)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}
