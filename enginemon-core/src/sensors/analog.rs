//! Analog input source

use core::cell::RefCell;

use enginemon_hal::AdcReader;

use crate::context::Context;
use crate::dataflow::{Producer, ValueProducer};
use crate::error::SetupError;
use crate::scheduler::{Millis, Reaction};
use crate::sinks::TelemetryBus;

/// Samples an ADC channel every interval
///
/// Emits `raw * output_scale / full_scale`, so with `output_scale = 3.3`
/// the output is the pin voltage. A failed conversion skips the interval.
pub struct AnalogInput<'a, A: AdcReader> {
    gpio: u8,
    adc: RefCell<A>,
    interval_ms: u32,
    output_scale: f32,
    output: Producer<'a, f32>,
}

impl<'a, A: AdcReader> AnalogInput<'a, A> {
    pub fn new(gpio: u8, adc: A, interval_ms: u32, output_scale: f32) -> Self {
        Self {
            gpio,
            adc: RefCell::new(adc),
            interval_ms,
            output_scale,
            output: Producer::new(),
        }
    }

    pub fn attach<B: TelemetryBus, const N: usize>(
        &'a self,
        ctx: &mut Context<'a, B, N>,
    ) -> Result<(), SetupError> {
        ctx.claim_pin(self.gpio)?;
        ctx.register_periodic(self.interval_ms, self)?;
        Ok(())
    }

    fn sample(&self) -> Option<f32> {
        let mut adc = self.adc.borrow_mut();
        let full_scale = adc.max_value();
        if full_scale == 0 {
            return None;
        }
        match adc.read() {
            Ok(raw) => Some(raw as f32 * self.output_scale / full_scale as f32),
            Err(e) => {
                warn!("adc on gpio {} failed: {:?}", self.gpio, e);
                None
            }
        }
    }
}

impl<'a, A: AdcReader> Reaction for AnalogInput<'a, A> {
    fn react(&self, _now: Millis) {
        if let Some(value) = self.sample() {
            self.output.emit(value);
        }
    }
}

impl<'a, A: AdcReader> ValueProducer<'a, f32> for AnalogInput<'a, A> {
    fn output(&self) -> &Producer<'a, f32> {
        &self.output
    }
}
