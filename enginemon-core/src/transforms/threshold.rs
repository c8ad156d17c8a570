//! Range check to boolean

use core::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::config::{decode, encode, require_finite, ConfigError, Configurable};
use crate::dataflow::{Consumer, Producer, ValueProducer};

/// Persisted threshold parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub low: f32,
    pub high: f32,
    pub invert: bool,
    /// Width of the release band; 0 disables hysteresis
    ///
    /// At most half of `high - low`, so the release band is never empty.
    pub hysteresis: f32,
}

impl ThresholdConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_finite(&[self.low, self.high, self.hysteresis])?;
        if self.low > self.high || self.hysteresis < 0.0 {
            return Err(ConfigError::InvalidValue);
        }
        if self.hysteresis > max_hysteresis(self.low, self.high) {
            return Err(ConfigError::InvalidValue);
        }
        Ok(())
    }
}

fn max_hysteresis(low: f32, high: f32) -> f32 {
    (high - low) / 2.0
}

/// Emits `true` when the input is outside `[low, high]`
///
/// With `invert` set the output is `true` inside the range instead. With a
/// hysteresis band `h > 0`, a `true` output is only released once the
/// input is back inside `[low + h, high - h]` (or, inverted, once it leaves
/// `[low - h, high + h]`). With `h = 0` every input is judged on its own.
///
/// Non-finite input produces no emission.
pub struct Threshold<'a> {
    low: Cell<f32>,
    high: Cell<f32>,
    invert: Cell<bool>,
    hysteresis: Cell<f32>,
    config_key: Option<&'static str>,
    output: Producer<'a, bool>,
}

impl<'a> Threshold<'a> {
    pub fn new(low: f32, high: f32, invert: bool) -> Self {
        Self {
            low: Cell::new(low),
            high: Cell::new(high),
            invert: Cell::new(invert),
            hysteresis: Cell::new(0.0),
            config_key: None,
            output: Producer::new(),
        }
    }

    /// Set the release band, clamped to `[0, (high - low) / 2]`
    pub fn with_hysteresis(self, band: f32) -> Self {
        let limit = max_hysteresis(self.low.get(), self.high.get()).max(0.0);
        self.hysteresis.set(band.max(0.0).min(limit));
        self
    }

    pub fn with_config_key(mut self, key: &'static str) -> Self {
        self.config_key = Some(key);
        self
    }

    pub fn config(&self) -> ThresholdConfig {
        ThresholdConfig {
            low: self.low.get(),
            high: self.high.get(),
            invert: self.invert.get(),
            hysteresis: self.hysteresis.get(),
        }
    }

    /// Evaluate `value` given the previously emitted output
    pub fn evaluate(&self, value: f32, previous: Option<bool>) -> bool {
        let ThresholdConfig {
            low,
            high,
            invert,
            hysteresis,
        } = self.config();
        let h = if previous == Some(true) { hysteresis } else { 0.0 };
        let (lo, hi) = if invert {
            (low - h, high + h)
        } else {
            (low + h, high - h)
        };
        let outside = value < lo || value > hi;
        outside != invert
    }
}

impl<'a> Consumer<f32> for Threshold<'a> {
    fn set(&self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let state = self.evaluate(value, self.output.get());
        self.output.emit(state);
    }
}

impl<'a> ValueProducer<'a, bool> for Threshold<'a> {
    fn output(&self) -> &Producer<'a, bool> {
        &self.output
    }
}

impl<'a> Configurable for Threshold<'a> {
    fn config_key(&self) -> Option<&str> {
        self.config_key
    }

    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let config: ThresholdConfig = decode(bytes)?;
        config.validate()?;
        self.low.set(config.low);
        self.high.set(config.high);
        self.invert.set(config.invert);
        self.hysteresis.set(config.hysteresis);
        Ok(())
    }

    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        encode(&self.config(), buf)
    }
}
