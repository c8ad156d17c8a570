//! Digital input sources

use core::cell::RefCell;

use enginemon_hal::InputPin;

use crate::context::Context;
use crate::dataflow::{Producer, ValueProducer};
use crate::error::SetupError;
use crate::scheduler::{InterruptFlag, Millis, Reaction};
use crate::sinks::TelemetryBus;

/// Polls a pin and emits its level every interval
///
/// Suits slow switches such as an oil pressure switch or a gas alarm
/// contact.
pub struct DigitalInputState<'a, P: InputPin> {
    gpio: u8,
    pin: RefCell<P>,
    interval_ms: u32,
    output: Producer<'a, bool>,
}

impl<'a, P: InputPin> DigitalInputState<'a, P> {
    pub fn new(gpio: u8, pin: P, interval_ms: u32) -> Self {
        Self {
            gpio,
            pin: RefCell::new(pin),
            interval_ms,
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
}

impl<'a, P: InputPin> Reaction for DigitalInputState<'a, P> {
    fn react(&self, _now: Millis) {
        let level = self.pin.borrow_mut().is_high();
        self.output.emit(level);
    }
}

impl<'a, P: InputPin> ValueProducer<'a, bool> for DigitalInputState<'a, P> {
    fn output(&self) -> &Producer<'a, bool> {
        &self.output
    }
}

/// Emits the pin level after each edge interrupt
///
/// The edge interrupt only raises `flag`; the pin is sampled and the value
/// emitted from the scheduler on its next tick. Several edges between two
/// ticks produce one emission of the current level.
pub struct DigitalInputChange<'a, P: InputPin> {
    gpio: u8,
    pin: RefCell<P>,
    flag: &'a InterruptFlag,
    output: Producer<'a, bool>,
}

impl<'a, P: InputPin> DigitalInputChange<'a, P> {
    pub fn new(gpio: u8, pin: P, flag: &'a InterruptFlag) -> Self {
        Self {
            gpio,
            pin: RefCell::new(pin),
            flag,
            output: Producer::new(),
        }
    }

    pub fn attach<B: TelemetryBus, const N: usize>(
        &'a self,
        ctx: &mut Context<'a, B, N>,
    ) -> Result<(), SetupError> {
        ctx.claim_pin(self.gpio)?;
        ctx.register_event(self.flag, self)?;
        Ok(())
    }
}

impl<'a, P: InputPin> Reaction for DigitalInputChange<'a, P> {
    fn react(&self, _now: Millis) {
        let level = self.pin.borrow_mut().is_high();
        self.output.emit(level);
    }
}

impl<'a, P: InputPin> ValueProducer<'a, bool> for DigitalInputChange<'a, P> {
    fn output(&self) -> &Producer<'a, bool> {
        &self.output
    }
}
