//! Linear scaling: `value * scale + offset`

use core::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::config::{decode, encode, require_finite, ConfigError, Configurable};
use crate::dataflow::{Consumer, Producer, ValueProducer};

/// Persisted linear transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    pub scale: f32,
    pub offset: f32,
}

/// Unit conversion by scale and offset
///
/// `Linear::new(1.0, 0.0)` is an identity stage, useful when a sink only
/// needs its own configuration key. Non-finite input is forwarded as is.
pub struct Linear<'a> {
    scale: Cell<f32>,
    offset: Cell<f32>,
    config_key: Option<&'static str>,
    output: Producer<'a, f32>,
}

impl<'a> Linear<'a> {
    pub const fn new(scale: f32, offset: f32) -> Self {
        Self {
            scale: Cell::new(scale),
            offset: Cell::new(offset),
            config_key: None,
            output: Producer::new(),
        }
    }

    pub fn with_config_key(mut self, key: &'static str) -> Self {
        self.config_key = Some(key);
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale.get()
    }

    pub fn offset(&self) -> f32 {
        self.offset.get()
    }

    /// Apply the transform without emitting
    pub fn apply(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return value;
        }
        value * self.scale.get() + self.offset.get()
    }
}

impl<'a> Consumer<f32> for Linear<'a> {
    fn set(&self, value: f32) {
        self.output.emit(self.apply(value));
    }
}

impl<'a> ValueProducer<'a, f32> for Linear<'a> {
    fn output(&self) -> &Producer<'a, f32> {
        &self.output
    }
}

impl<'a> Configurable for Linear<'a> {
    fn config_key(&self) -> Option<&str> {
        self.config_key
    }

    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let config: LinearConfig = decode(bytes)?;
        require_finite(&[config.scale, config.offset])?;
        self.scale.set(config.scale);
        self.offset.set(config.offset);
        Ok(())
    }

    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        encode(
            &LinearConfig {
                scale: self.scale.get(),
                offset: self.offset.get(),
            },
            buf,
        )
    }
}
