//! RAM-backed configuration store
//!
//! Holds node configuration blobs for the life of the process. Used on
//! boards without a persistent medium and as the store in host tests.

use enginemon_core::config::{MAX_CONFIG_SIZE, MAX_KEY_LEN};
use enginemon_hal::{ConfigStore, StoreError};
use heapless::{FnvIndexMap, String, Vec};

/// Key/value store of at most `N` entries (`N` must be a power of two)
pub struct MemoryStore<const N: usize> {
    entries: FnvIndexMap<String<MAX_KEY_LEN>, Vec<u8, MAX_CONFIG_SIZE>, N>,
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MemoryStore<N> {
    pub const fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(key: &str) -> Result<String<MAX_KEY_LEN>, StoreError> {
        String::try_from(key).map_err(|_| StoreError::KeyTooLong)
    }
}

impl<const N: usize> ConfigStore for MemoryStore<N> {
    fn read(&mut self, key: &str, buffer: &mut [u8]) -> Result<usize, StoreError> {
        let data = self
            .entries
            .get(&Self::key(key)?)
            .ok_or(StoreError::NotFound)?;
        let dest = buffer
            .get_mut(..data.len())
            .ok_or(StoreError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let value = Vec::from_slice(data).map_err(|_| StoreError::BufferTooSmall)?;
        self.entries
            .insert(Self::key(key)?, value)
            .map_err(|_| StoreError::Full)?;
        Ok(())
    }

    fn exists(&mut self, key: &str) -> bool {
        Self::key(key).is_ok_and(|k| self.entries.contains_key(&k))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries
            .remove(&Self::key(key)?)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_replace() {
        let mut store: MemoryStore<4> = MemoryStore::new();
        store.write("/sensors/engine_rpm/calibrate", &[1, 2, 3]).unwrap();
        store.write("/sensors/engine_rpm/calibrate", &[9]).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(store.read("/sensors/engine_rpm/calibrate", &mut buf), Ok(1));
        assert_eq!(buf[0], 9);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_errors() {
        let mut store: MemoryStore<2> = MemoryStore::new();
        let mut small = [0u8; 1];

        assert_eq!(store.read("/missing", &mut small), Err(StoreError::NotFound));
        store.write("/a", &[1, 2]).unwrap();
        assert_eq!(store.read("/a", &mut small), Err(StoreError::BufferTooSmall));

        let long_key = "/".repeat(MAX_KEY_LEN + 1);
        assert_eq!(store.write(&long_key, &[1]), Err(StoreError::KeyTooLong));
        assert!(!store.exists(&long_key));

        store.write("/b", &[1]).unwrap();
        assert_eq!(store.write("/c", &[1]), Err(StoreError::Full));

        let big = [0u8; MAX_CONFIG_SIZE + 1];
        assert_eq!(store.write("/a", &big), Err(StoreError::BufferTooSmall));
    }

    #[test]
    fn test_remove() {
        let mut store: MemoryStore<4> = MemoryStore::new();
        store.write("/a", &[1]).unwrap();
        assert!(store.exists("/a"));
        store.remove("/a").unwrap();
        assert!(!store.exists("/a"));
        assert_eq!(store.remove("/a"), Err(StoreError::NotFound));
    }
}
