//! GPIO pin abstractions
//!
//! Provides traits for digital input and output pins, the electrical
//! configuration used when counting edges, and a setup-time allocator that
//! rejects invalid or doubly-claimed pins.

use heapless::FnvIndexSet;

/// Number of user GPIOs on the RP2040
pub const RP2040_GPIO_COUNT: u8 = 30;

/// Upper bound on pins any allocator can track
pub const MAX_TRACKED_PINS: usize = 64;

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Digital input pin
///
/// Takes `&mut self` because some port expanders need a bus transaction
/// to sample a pin.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&mut self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&mut self) -> bool {
        !self.is_high()
    }
}

/// Internal resistor configuration for an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Floating input, external biasing
    #[default]
    None,
    /// Internal pull-up enabled
    Up,
    /// Internal pull-down enabled
    Down,
}

/// Which transitions an interrupt-driven input reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high transitions
    #[default]
    Rising,
    /// High to low transitions
    Falling,
    /// Every transition
    Both,
}

/// Pin allocation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number does not exist on this chip
    InvalidPin(u8),
    /// Pin has already been claimed by another component
    PinInUse(u8),
}

/// GPIO allocator to track pin usage
///
/// Every component that touches a physical pin claims it here during setup,
/// so wiring mistakes surface before the scheduler starts.
pub struct PinAllocator {
    /// Number of pins on the chip
    pin_count: u8,
    /// Set of allocated GPIO pins
    allocated: FnvIndexSet<u8, MAX_TRACKED_PINS>,
}

impl Default for PinAllocator {
    fn default() -> Self {
        Self::new(RP2040_GPIO_COUNT)
    }
}

impl PinAllocator {
    /// Create a new allocator for a chip with `pin_count` GPIOs
    pub fn new(pin_count: u8) -> Self {
        Self {
            pin_count: pin_count.min(MAX_TRACKED_PINS as u8),
            allocated: FnvIndexSet::new(),
        }
    }

    /// Allocate a GPIO pin
    pub fn allocate(&mut self, pin: u8) -> Result<(), PinError> {
        if pin >= self.pin_count {
            return Err(PinError::InvalidPin(pin));
        }
        if self.allocated.contains(&pin) {
            return Err(PinError::PinInUse(pin));
        }
        self.allocated
            .insert(pin)
            .map_err(|_| PinError::InvalidPin(pin))?;
        Ok(())
    }

    /// Release a GPIO pin
    pub fn release(&mut self, pin: u8) {
        self.allocated.remove(&pin);
    }

    /// Check if a pin is allocated
    pub fn is_allocated(&self, pin: u8) -> bool {
        self.allocated.contains(&pin)
    }

    /// Get the number of allocated pins
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}
