//! Persisted configuration storage abstractions
//!
//! Provides a key-value store for node configuration blobs. Keys are
//! slash-separated paths such as `/sensors/engine_rpm/calibrate`; values are
//! opaque bytes (postcard-encoded by the core).

/// Errors from configuration storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Storage operation failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Key longer than the store supports
    KeyTooLong,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Configuration store trait
///
/// Implementations may be backed by flash, EEPROM or RAM. Writes should be
/// atomic per key where the medium allows it.
pub trait ConfigStore {
    /// Read a value by key into the provided buffer
    ///
    /// # Returns
    /// The number of bytes read, or an error.
    fn read(&mut self, key: &str, buffer: &mut [u8]) -> Result<usize, StoreError>;

    /// Write a value by key, replacing any previous value
    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: &str) -> bool;

    /// Remove a key
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}
