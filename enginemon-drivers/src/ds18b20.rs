//! DS18B20 digital thermometer bus
//!
//! Implements [`SensorBus`] for a chain of DS18B20s on one one-wire link.
//! Conversion is broadcast with SKIP ROM so every device converts at once;
//! each device is then addressed with MATCH ROM to read its scratchpad.
//! Discovery writes the configured resolution into every device found, so
//! the conversion wait always matches what the devices actually do.

use enginemon_hal::{BusError, DeviceAddress, SensorBus};

use crate::onewire::{crc8, search, OneWireLink};

/// DS18B20 family code
pub const FAMILY_CODE: u8 = 0x28;

const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;
const WRITE_SCRATCHPAD: u8 = 0x4E;

/// Alarm registers written alongside the configuration; power-on values
const ALARM_HIGH: u8 = 0x4B;
const ALARM_LOW: u8 = 0x46;

/// Conversion resolution, from the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    /// Power-on default
    #[default]
    Bits12,
}

impl Resolution {
    /// Decode from scratchpad byte 4
    pub fn from_config(config: u8) -> Self {
        match (config >> 5) & 0x03 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Configuration register value selecting this resolution
    pub const fn config(self) -> u8 {
        let bits = match self {
            Resolution::Bits9 => 0,
            Resolution::Bits10 => 1,
            Resolution::Bits11 => 2,
            Resolution::Bits12 => 3,
        };
        (bits << 5) | 0x1F
    }

    /// Maximum conversion time in milliseconds
    pub const fn conversion_time_ms(self) -> u32 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    /// Mask of the valid bits in the raw temperature
    const fn mask(self) -> i16 {
        match self {
            Resolution::Bits9 => !0x07,
            Resolution::Bits10 => !0x03,
            Resolution::Bits11 => !0x01,
            Resolution::Bits12 => !0x00,
        }
    }
}

/// Decode a 9-byte scratchpad into °C
///
/// Checks the CRC and masks the undefined low bits for the configured
/// resolution. A scratchpad of all ones means nothing answered.
pub fn decode_scratchpad(scratchpad: &[u8; 9]) -> Result<f32, BusError> {
    if scratchpad.iter().all(|&b| b == 0xFF) {
        return Err(BusError::NotFound);
    }
    if crc8(&scratchpad[..8]) != scratchpad[8] {
        return Err(BusError::CrcMismatch);
    }
    let resolution = Resolution::from_config(scratchpad[4]);
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]) & resolution.mask();
    Ok(f32::from(raw) / 16.0)
}

/// Chain of DS18B20s on one link
pub struct Ds18b20Bus<L> {
    link: L,
    resolution: Resolution,
}

impl<L: OneWireLink> Ds18b20Bus<L> {
    /// Create a bus whose devices run at `resolution`
    pub fn new(link: L, resolution: Resolution) -> Self {
        Self { link, resolution }
    }

    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Write the bus resolution into one device's configuration register
    ///
    /// Lives in the scratchpad only; a power cycle restores the EEPROM value
    /// until the next discovery.
    fn configure(&mut self, address: &DeviceAddress) -> Result<(), BusError> {
        self.link.select(address)?;
        self.link.write_byte(WRITE_SCRATCHPAD)?;
        self.link
            .write_bytes(&[ALARM_HIGH, ALARM_LOW, self.resolution.config()])
    }
}

impl<L: OneWireLink> SensorBus for Ds18b20Bus<L> {
    /// Enumerate DS18B20s and program their resolution
    ///
    /// Other device families on the line are skipped.
    fn search(&mut self, found: &mut [DeviceAddress]) -> Result<usize, BusError> {
        let mut all = [DeviceAddress::default(); 16];
        let n = search(&mut self.link, &mut all)?;
        let mut count = 0;
        for address in all[..n]
            .iter()
            .filter(|a| a.family_code() == FAMILY_CODE)
        {
            if count == found.len() {
                break;
            }
            found[count] = *address;
            count += 1;
        }
        for address in &found[..count] {
            self.configure(address)?;
        }
        Ok(count)
    }

    fn start_conversion(&mut self) -> Result<(), BusError> {
        self.link.skip()?;
        self.link.write_byte(CONVERT_T)
    }

    fn read_temperature(&mut self, address: &DeviceAddress) -> Result<f32, BusError> {
        self.link.select(address)?;
        self.link.write_byte(READ_SCRATCHPAD)?;
        let mut scratchpad = [0u8; 9];
        self.link.read_bytes(&mut scratchpad)?;
        decode_scratchpad(&scratchpad)
    }

    fn conversion_time_ms(&self) -> u32 {
        self.resolution.conversion_time_ms()
    }
}
