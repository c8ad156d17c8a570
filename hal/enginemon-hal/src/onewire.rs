//! Shared one-wire sensor bus abstractions
//!
//! A one-wire bus carries several daisy-chained devices on a single data
//! line. Temperature conversion is slow (up to 750 ms at 12-bit resolution)
//! and can be started on every device at once, so the bus trait separates
//! the broadcast conversion from the per-device readback.

/// 64-bit ROM code identifying a device on the bus
///
/// Byte 0 is the family code, bytes 1-6 the serial number and byte 7 the
/// CRC8 of the first seven bytes (transmission order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(pub [u8; 8]);

impl DeviceAddress {
    /// Create an address from raw ROM bytes
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Family code (0x28 for DS18B20)
    pub const fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// Raw ROM bytes in transmission order
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

/// Errors from one-wire bus transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// No device answered the reset pulse
    NoPresence,
    /// Data read back failed its CRC check
    CrcMismatch,
    /// The addressed device did not respond
    NotFound,
    /// The data line could not be driven or sampled
    Pin,
    /// The bus is held low or a transaction never completed
    Timeout,
}

/// Multiplexed temperature bus
///
/// Implementations drive the physical bus protocol. The caller is
/// responsible for waiting [`SensorBus::conversion_time_ms`] between
/// [`SensorBus::start_conversion`] and [`SensorBus::read_temperature`].
pub trait SensorBus {
    /// Enumerate devices present on the bus
    ///
    /// Fills `found` in discovery order and returns the number written.
    /// Devices beyond the slice length are ignored.
    fn search(&mut self, found: &mut [DeviceAddress]) -> Result<usize, BusError>;

    /// Ask every device on the bus to start a conversion
    fn start_conversion(&mut self) -> Result<(), BusError>;

    /// Read the last converted temperature of one device, in °C
    fn read_temperature(&mut self, address: &DeviceAddress) -> Result<f32, BusError>;

    /// Worst-case conversion time in milliseconds
    fn conversion_time_ms(&self) -> u32 {
        750
    }
}
