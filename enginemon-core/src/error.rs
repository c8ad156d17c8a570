//! Setup-time errors
//!
//! Everything that can go wrong while building the graph funnels into
//! [`SetupError`], so wiring code can use `?` throughout. None of these
//! can occur once the scheduler is running: runtime read failures are
//! logged and skipped by the sensor that hit them.

use enginemon_hal::{BusError, PinError};

use crate::config::ConfigError;
use crate::dataflow::WiringError;
use crate::scheduler::SchedulerError;

/// Fatal configuration error raised before the scheduler starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    /// Producer/consumer connection rejected
    Wiring(WiringError),
    /// Scheduler registration rejected
    Scheduler(SchedulerError),
    /// Configuration registration or override failed
    Config(ConfigError),
    /// Invalid or already claimed pin
    Pin(PinError),
    /// Bus enumeration failed
    Bus(BusError),
    /// Bus controller endpoint table is full
    TooManyEndpoints,
    /// Two endpoints bound to the same device address
    DuplicateAddress,
    /// Read interval shorter than the hardware allows
    IntervalTooShort,
    /// Interval or capacity of zero
    InvalidInterval,
    /// Graph modification attempted after start
    AlreadyStarted,
}

impl From<WiringError> for SetupError {
    fn from(e: WiringError) -> Self {
        SetupError::Wiring(e)
    }
}

impl From<SchedulerError> for SetupError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::AlreadyStarted => SetupError::AlreadyStarted,
            other => SetupError::Scheduler(other),
        }
    }
}

impl From<ConfigError> for SetupError {
    fn from(e: ConfigError) -> Self {
        SetupError::Config(e)
    }
}

impl From<PinError> for SetupError {
    fn from(e: PinError) -> Self {
        SetupError::Pin(e)
    }
}

impl From<BusError> for SetupError {
    fn from(e: BusError) -> Self {
        SetupError::Bus(e)
    }
}
