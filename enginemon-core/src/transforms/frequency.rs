//! Pulse count to frequency conversion

use core::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::config::{decode, encode, require_finite, ConfigError, Configurable};
use crate::dataflow::{Consumer, Producer, ValueProducer};
use crate::sensors::PulseSource;

/// Persisted frequency transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyConfig {
    pub multiplier: f32,
}

/// Converts a pulse count over a known interval into pulses per second
///
/// `frequency = count / interval_s * multiplier`. The multiplier corrects
/// for pulses per revolution, gear teeth and the like.
pub struct Frequency<'a> {
    multiplier: Cell<f32>,
    interval_ms: u32,
    config_key: Option<&'static str>,
    output: Producer<'a, f32>,
}

impl<'a> Frequency<'a> {
    /// Create a transform for counts reported every `interval_ms`
    ///
    /// An interval of zero is treated as 1 ms.
    pub fn new(multiplier: f32, interval_ms: u32) -> Self {
        Self {
            multiplier: Cell::new(multiplier),
            interval_ms: interval_ms.max(1),
            config_key: None,
            output: Producer::new(),
        }
    }

    /// Create a transform matching the report interval of `source`
    pub fn for_source(source: &PulseSource<'_>, multiplier: f32) -> Self {
        Self::new(multiplier, source.interval_ms())
    }

    pub fn with_config_key(mut self, key: &'static str) -> Self {
        self.config_key = Some(key);
        self
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier.get()
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Frequency for `count` pulses in one interval
    pub fn apply(&self, count: u32) -> f32 {
        let interval_s = self.interval_ms as f32 / 1000.0;
        count as f32 / interval_s * self.multiplier.get()
    }
}

impl<'a> Consumer<u32> for Frequency<'a> {
    fn set(&self, count: u32) {
        self.output.emit(self.apply(count));
    }
}

impl<'a> ValueProducer<'a, f32> for Frequency<'a> {
    fn output(&self) -> &Producer<'a, f32> {
        &self.output
    }
}

impl<'a> Configurable for Frequency<'a> {
    fn config_key(&self) -> Option<&str> {
        self.config_key
    }

    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let config: FrequencyConfig = decode(bytes)?;
        require_finite(&[config.multiplier])?;
        self.multiplier.set(config.multiplier);
        Ok(())
    }

    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        encode(
            &FrequencyConfig {
                multiplier: self.multiplier.get(),
            },
            buf,
        )
    }
}
