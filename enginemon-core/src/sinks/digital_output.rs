//! Digital alarm output sink

use core::cell::RefCell;

use enginemon_hal::OutputPin;

use crate::context::Context;
use crate::dataflow::Consumer;
use crate::error::SetupError;
use crate::sinks::TelemetryBus;

/// Drives a pin high or low from a boolean input
///
/// Every emission is written straight to the pin. Any smoothing belongs
/// upstream (see the threshold hysteresis band).
pub struct DigitalOutput<P: OutputPin> {
    gpio: u8,
    pin: RefCell<P>,
}

impl<P: OutputPin> DigitalOutput<P> {
    /// Wrap `pin`, which is GPIO number `gpio` on the board
    pub fn new(gpio: u8, pin: P) -> Self {
        Self {
            gpio,
            pin: RefCell::new(pin),
        }
    }

    /// Claim the output pin
    pub fn attach<'a, B: TelemetryBus, const N: usize>(
        &'a self,
        ctx: &mut Context<'a, B, N>,
    ) -> Result<(), SetupError> {
        ctx.claim_pin(self.gpio)
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    /// Current pin level
    pub fn state(&self) -> bool {
        self.pin.borrow().is_set_high()
    }
}

impl<P: OutputPin> Consumer<bool> for DigitalOutput<P> {
    fn set(&self, value: bool) {
        self.pin.borrow_mut().set_state(value);
    }
}
