//! Key-addressed registry of configurable nodes

use enginemon_hal::{ConfigStore, StoreError};

use super::{ConfigError, Configurable, MAX_CONFIG_SIZE};

/// Default registry capacity
pub const MAX_CONFIGURABLES: usize = 16;

/// Routes configuration loads and live updates to nodes by key
pub struct ConfigRegistry<'a, const N: usize = MAX_CONFIGURABLES> {
    nodes: [Option<&'a dyn Configurable>; N],
    len: usize,
}

impl<'a, const N: usize> Default for ConfigRegistry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> ConfigRegistry<'a, N> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            nodes: [None; N],
            len: 0,
        }
    }

    /// Register a node
    ///
    /// Nodes without a key are accepted but not tracked; returns whether
    /// the node was added.
    pub fn register(&mut self, node: &'a dyn Configurable) -> Result<bool, ConfigError> {
        let Some(key) = node.config_key() else {
            return Ok(false);
        };
        if self.find(key).is_some() {
            return Err(ConfigError::DuplicateKey);
        }
        let slot = self
            .nodes
            .get_mut(self.len)
            .ok_or(ConfigError::TooManyNodes)?;
        *slot = Some(node);
        self.len += 1;
        Ok(true)
    }

    /// Look up a node by key
    pub fn find(&self, key: &str) -> Option<&'a dyn Configurable> {
        self.nodes[..self.len]
            .iter()
            .flatten()
            .copied()
            .find(|n| n.config_key() == Some(key))
    }

    /// Apply the stored override for `key`, if the store has one
    ///
    /// Returns `Ok(false)` when the store has no entry for the key, leaving
    /// the node on its constructor defaults.
    pub fn load_from<S: ConfigStore>(&self, key: &str, store: &mut S) -> Result<bool, ConfigError> {
        let node = self.find(key).ok_or(ConfigError::UnknownKey)?;
        let mut buf = [0u8; MAX_CONFIG_SIZE];
        match store.read(key, &mut buf) {
            Ok(len) => {
                node.load(&buf[..len])?;
                Ok(true)
            }
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(ConfigError::Store(e)),
        }
    }

    /// Push a live update to the node registered under `key`
    pub fn apply(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        self.find(key).ok_or(ConfigError::UnknownKey)?.load(bytes)
    }

    /// Write the current configuration of the node under `key` to `store`
    pub fn persist<S: ConfigStore>(&self, key: &str, store: &mut S) -> Result<(), ConfigError> {
        let node = self.find(key).ok_or(ConfigError::UnknownKey)?;
        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let len = node.save(&mut buf)?;
        store.write(key, &buf[..len])?;
        Ok(())
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
