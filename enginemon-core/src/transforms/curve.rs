//! Piecewise-linear lookup table

use core::cell::RefCell;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::config::{decode, encode, require_finite, ConfigError, Configurable};
use crate::dataflow::{Consumer, Producer, ValueProducer};

/// Maximum number of samples in a curve
pub const MAX_SAMPLES: usize = 16;

/// One known input/output pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub input: f32,
    pub output: f32,
}

impl Sample {
    pub const fn new(input: f32, output: f32) -> Self {
        Self { input, output }
    }
}

/// Persisted sample table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    pub samples: Vec<Sample, MAX_SAMPLES>,
}

/// Maps a value through a sorted table of samples
///
/// Between two samples the output is interpolated linearly; outside the
/// table it is clamped to the first or last sample. Typical use is a
/// resistive sender curve (ohms to kelvin). Non-finite input is forwarded
/// as is; an empty table emits nothing.
pub struct CurveInterpolator<'a> {
    samples: RefCell<Vec<Sample, MAX_SAMPLES>>,
    config_key: Option<&'static str>,
    output: Producer<'a, f32>,
}

impl<'a> Default for CurveInterpolator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CurveInterpolator<'a> {
    /// Create an interpolator with an empty table
    pub const fn new() -> Self {
        Self {
            samples: RefCell::new(Vec::new()),
            config_key: None,
            output: Producer::new(),
        }
    }

    /// Create an interpolator from samples in any order
    pub fn from_samples(samples: &[Sample]) -> Result<Self, ConfigError> {
        let curve = Self::new();
        for sample in samples {
            curve.add_sample(*sample)?;
        }
        Ok(curve)
    }

    pub fn with_config_key(mut self, key: &'static str) -> Self {
        self.config_key = Some(key);
        self
    }

    /// Insert a sample, keeping the table sorted by input
    ///
    /// A sample with the same input as an existing one replaces it.
    pub fn add_sample(&self, sample: Sample) -> Result<(), ConfigError> {
        require_finite(&[sample.input, sample.output])?;
        let mut samples = self.samples.borrow_mut();
        match samples
            .iter()
            .position(|s| s.input >= sample.input)
        {
            Some(i) if samples[i].input == sample.input => {
                samples[i] = sample;
                Ok(())
            }
            Some(i) => samples
                .insert(i, sample)
                .map_err(|_| ConfigError::InvalidValue),
            None => samples.push(sample).map_err(|_| ConfigError::InvalidValue),
        }
    }

    pub fn clear_samples(&self) {
        self.samples.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.samples.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.borrow().is_empty()
    }

    /// Look up `x` in the table
    pub fn interpolate(&self, x: f32) -> Option<f32> {
        if !x.is_finite() {
            return Some(x);
        }
        let samples = self.samples.borrow();
        let first = samples.first()?;
        let last = samples.last()?;
        if x <= first.input {
            return Some(first.output);
        }
        if x >= last.input {
            return Some(last.output);
        }
        samples.windows(2).find_map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            if x == b.input {
                Some(b.output)
            } else if x < b.input {
                let t = (x - a.input) / (b.input - a.input);
                Some(a.output + (b.output - a.output) * t)
            } else {
                None
            }
        })
    }
}

impl<'a> Consumer<f32> for CurveInterpolator<'a> {
    fn set(&self, value: f32) {
        match self.interpolate(value) {
            Some(v) => self.output.emit(v),
            None => warn!("curve has no samples, dropping {}", value),
        }
    }
}

impl<'a> ValueProducer<'a, f32> for CurveInterpolator<'a> {
    fn output(&self) -> &Producer<'a, f32> {
        &self.output
    }
}

impl<'a> Configurable for CurveInterpolator<'a> {
    fn config_key(&self) -> Option<&str> {
        self.config_key
    }

    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let config: CurveConfig = decode(bytes)?;
        let staged = CurveInterpolator::new();
        for sample in config.samples.iter() {
            staged.add_sample(*sample)?;
        }
        *self.samples.borrow_mut() = staged.samples.into_inner();
        Ok(())
    }

    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        encode(
            &CurveConfig {
                samples: self.samples.borrow().clone(),
            },
            buf,
        )
    }
}
