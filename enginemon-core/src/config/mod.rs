//! Persisted node configuration
//!
//! Configurable nodes (frequency multiplier, linear scale/offset, threshold
//! bounds, curve tables, telemetry paths) expose a small serde struct that is
//! stored as postcard binary under a path-like key. The external store is
//! queried once when the node is registered; later updates are pushed in
//! through the [`ConfigRegistry`] and take effect on the next emission
//! without touching the graph wiring.

pub mod registry;

use enginemon_hal::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use registry::{ConfigRegistry, MAX_CONFIGURABLES};

/// Maximum configuration key length
pub const MAX_KEY_LEN: usize = 48;

/// Maximum encoded size of a single node configuration
pub const MAX_CONFIG_SIZE: usize = 192;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Two nodes registered under the same key
    DuplicateKey,
    /// No node is registered under the key
    UnknownKey,
    /// Registry is full
    TooManyNodes,
    /// Stored bytes are not a valid configuration
    Decode,
    /// Configuration does not fit the output buffer
    Encode,
    /// Decoded configuration failed validation
    InvalidValue,
    /// Backing store failed
    Store(StoreError),
}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        ConfigError::Store(e)
    }
}

/// A node whose parameters can be persisted and updated live
pub trait Configurable {
    /// Key under which the configuration is stored, if any
    fn config_key(&self) -> Option<&str>;

    /// Replace the node's parameters from an encoded configuration
    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError>;

    /// Encode the node's current parameters into `buf`
    ///
    /// Returns the number of bytes written.
    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError>;
}

/// Decode a postcard-encoded configuration
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConfigError> {
    postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)
}

/// Encode a configuration with postcard, returning the used length
pub fn encode<T: Serialize>(value: &T, buf: &mut [u8]) -> Result<usize, ConfigError> {
    postcard::to_slice(value, buf)
        .map(|used| used.len())
        .map_err(|_| ConfigError::Encode)
}

/// Reject non-finite parameters
pub(crate) fn require_finite(values: &[f32]) -> Result<(), ConfigError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue)
    }
}
