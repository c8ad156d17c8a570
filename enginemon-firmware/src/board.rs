//! Board wiring
//!
//! GPIO assignments for the engine monitor board and adapters from the
//! embassy-rp pin drivers to the enginemon-hal traits.

use embassy_rp::gpio::{Input, Output};
use enginemon_hal::{InputPin, OutputPin};
use portable_atomic::{AtomicBool, Ordering};

/// Tachometer pickup (alternator W terminal through an opto)
pub const RPM_GPIO: u8 = 5;
/// DS18B20 chain, 4.7k pull-up to 3V3
pub const ONEWIRE_GPIO: u8 = 3;
/// Exchanger over-temperature buzzer
pub const ALARM_GPIO: u8 = 7;
/// Oil pressure switch, closed to ground at low pressure
pub const OIL_SWITCH_GPIO: u8 = 16;
/// LPG detector alarm contact
pub const LPG_GPIO: u8 = 18;

/// Push-pull output driven by the dataflow
pub struct BoardOutput(pub Output<'static>);

impl OutputPin for BoardOutput {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.0.is_set_high()
    }
}

/// Input polled from the scheduler
pub struct BoardInput(pub Input<'static>);

impl InputPin for BoardInput {
    fn is_high(&mut self) -> bool {
        self.0.is_high()
    }
}

/// Level captured by an edge task
///
/// The task owns the physical input; the scheduler side reads the level it
/// last observed.
pub struct LatchedLevel(pub &'static AtomicBool);

impl InputPin for LatchedLevel {
    fn is_high(&mut self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Map the configured pull to the embassy-rp setting
pub fn pull(pull: enginemon_hal::Pull) -> embassy_rp::gpio::Pull {
    match pull {
        enginemon_hal::Pull::None => embassy_rp::gpio::Pull::None,
        enginemon_hal::Pull::Up => embassy_rp::gpio::Pull::Up,
        enginemon_hal::Pull::Down => embassy_rp::gpio::Pull::Down,
    }
}
