//! One-wire link layer
//!
//! Bit-level access to a one-wire bus, plus the ROM search used to
//! enumerate devices. All multi-byte transfers are LSB first.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use enginemon_hal::{BusError, DeviceAddress};

/// ROM command: enumerate devices
pub const SEARCH_ROM: u8 = 0xF0;
/// ROM command: address one device
pub const MATCH_ROM: u8 = 0x55;
/// ROM command: address every device
pub const SKIP_ROM: u8 = 0xCC;

/// Standard-speed slot timings in microseconds
mod timing {
    pub const RESET_LOW: u32 = 480;
    pub const PRESENCE_SAMPLE: u32 = 70;
    pub const RESET_RECOVERY: u32 = 410;
    pub const WRITE_1_LOW: u32 = 6;
    pub const WRITE_1_RELEASE: u32 = 64;
    pub const WRITE_0_LOW: u32 = 60;
    pub const WRITE_0_RELEASE: u32 = 10;
    pub const READ_LOW: u32 = 6;
    pub const READ_SAMPLE: u32 = 9;
    pub const READ_RECOVERY: u32 = 55;
}

/// Bit-level one-wire bus access
pub trait OneWireLink {
    /// Issue a reset pulse; fails with [`BusError::NoPresence`] if no device answers
    fn reset(&mut self) -> Result<(), BusError>;

    fn write_bit(&mut self, bit: bool) -> Result<(), BusError>;

    fn read_bit(&mut self) -> Result<bool, BusError>;

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Reset and address a single device
    fn select(&mut self, address: &DeviceAddress) -> Result<(), BusError> {
        self.reset()?;
        self.write_byte(MATCH_ROM)?;
        self.write_bytes(address.as_bytes())
    }

    /// Reset and address every device
    fn skip(&mut self) -> Result<(), BusError> {
        self.reset()?;
        self.write_byte(SKIP_ROM)
    }
}

/// One-wire master driving an open-drain pin with busy-wait timing
///
/// `pin` must be configured open-drain with an external pull-up:
/// `set_low` drives the line, `set_high` releases it.
pub struct BitBangOneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Release the pin and delay
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    fn drive_low(&mut self) -> Result<(), BusError> {
        self.pin.set_low().map_err(|_| BusError::Pin)
    }

    fn let_go(&mut self) -> Result<(), BusError> {
        self.pin.set_high().map_err(|_| BusError::Pin)
    }

    fn line_low(&mut self) -> Result<bool, BusError> {
        self.pin.is_low().map_err(|_| BusError::Pin)
    }
}

impl<P, D> OneWireLink for BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn reset(&mut self) -> Result<(), BusError> {
        self.let_go()?;
        if self.line_low()? {
            return Err(BusError::Timeout);
        }
        self.drive_low()?;
        self.delay.delay_us(timing::RESET_LOW);
        self.let_go()?;
        self.delay.delay_us(timing::PRESENCE_SAMPLE);
        let present = self.line_low()?;
        self.delay.delay_us(timing::RESET_RECOVERY);
        if present {
            Ok(())
        } else {
            Err(BusError::NoPresence)
        }
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), BusError> {
        let (low, release) = if bit {
            (timing::WRITE_1_LOW, timing::WRITE_1_RELEASE)
        } else {
            (timing::WRITE_0_LOW, timing::WRITE_0_RELEASE)
        };
        self.drive_low()?;
        self.delay.delay_us(low);
        self.let_go()?;
        self.delay.delay_us(release);
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, BusError> {
        self.drive_low()?;
        self.delay.delay_us(timing::READ_LOW);
        self.let_go()?;
        self.delay.delay_us(timing::READ_SAMPLE);
        let bit = !self.line_low()?;
        self.delay.delay_us(timing::READ_RECOVERY);
        Ok(bit)
    }
}

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1, reflected)
///
/// Running the CRC over data followed by its CRC yields 0.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut current = byte;
        for _ in 0..8 {
            let mix = (crc ^ current) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            current >>= 1;
        }
    }
    crc
}

/// Enumerate every device on the bus
///
/// Binary-tree ROM search: at each bit position where devices disagree,
/// the 0 branch is taken first and the 1 branch on a later pass. Fills
/// `found` in discovery order and returns the number of devices written.
pub fn search<L: OneWireLink>(
    link: &mut L,
    found: &mut [DeviceAddress],
) -> Result<usize, BusError> {
    let mut rom = [0u8; 8];
    let mut last_discrepancy = 0u8;
    let mut count = 0;

    while count < found.len() {
        match link.reset() {
            Err(BusError::NoPresence) if count == 0 => return Ok(0),
            other => other?,
        }
        link.write_byte(SEARCH_ROM)?;

        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let id_bit = link.read_bit()?;
            let cmp_bit = link.read_bit()?;
            if id_bit && cmp_bit {
                // Every device dropped out
                return Err(BusError::NotFound);
            }

            let byte = usize::from((bit_number - 1) / 8);
            let mask = 1u8 << ((bit_number - 1) % 8);
            let direction = if id_bit != cmp_bit {
                id_bit
            } else {
                let take_one = if bit_number < last_discrepancy {
                    rom[byte] & mask != 0
                } else {
                    bit_number == last_discrepancy
                };
                if !take_one {
                    last_zero = bit_number;
                }
                take_one
            };

            if direction {
                rom[byte] |= mask;
            } else {
                rom[byte] &= !mask;
            }
            link.write_bit(direction)?;
        }

        if crc8(&rom[..7]) != rom[7] {
            return Err(BusError::CrcMismatch);
        }
        found[count] = DeviceAddress::new(rom);
        count += 1;

        last_discrepancy = last_zero;
        if last_discrepancy == 0 {
            break;
        }
    }

    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use proptest::prelude::*;

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Idle,
        RomCommand,
        Search { bit: u8, step: u8 },
        Match { bit: u8 },
        Function,
        ReadScratchpad { bit: u16 },
        WriteScratchpad { byte: usize },
    }

    /// One simulated device on the bus
    pub(crate) struct SimDevice {
        pub rom: [u8; 8],
        pub scratchpad: [u8; 9],
    }

    /// Wired-AND one-wire bus with any number of devices
    ///
    /// Understands search, match, skip, convert and both scratchpad
    /// transfers. A write updates bytes 2..5 and the CRC of every selected
    /// device.
    pub(crate) struct SimBus {
        pub devices: Vec<SimDevice>,
        active: Vec<bool>,
        mode: Mode,
        shift: u8,
        shift_bits: u8,
        pub resets: u32,
        pub conversions: u32,
    }

    impl SimBus {
        pub(crate) fn new(devices: Vec<SimDevice>) -> Self {
            let n = devices.len();
            Self {
                devices,
                active: vec![false; n],
                mode: Mode::Idle,
                shift: 0,
                shift_bits: 0,
                resets: 0,
                conversions: 0,
            }
        }

        fn rom_bit(rom: &[u8; 8], bit: u8) -> bool {
            rom[usize::from(bit / 8)] & (1 << (bit % 8)) != 0
        }

        /// Level on the line: low if any active device pulls it low
        fn wired_and(&self, f: impl Fn(&SimDevice) -> bool) -> bool {
            self.devices
                .iter()
                .zip(&self.active)
                .filter(|(_, active)| **active)
                .all(|(d, _)| f(d))
        }

        fn command(&mut self, byte: u8) {
            self.mode = match (self.mode, byte) {
                (Mode::RomCommand, SEARCH_ROM) => Mode::Search { bit: 0, step: 0 },
                (Mode::RomCommand, MATCH_ROM) => Mode::Match { bit: 0 },
                (Mode::RomCommand, SKIP_ROM) => Mode::Function,
                (Mode::Function, 0x44) => {
                    self.conversions += 1;
                    Mode::Idle
                }
                (Mode::Function, 0xBE) => Mode::ReadScratchpad { bit: 0 },
                (Mode::Function, 0x4E) => Mode::WriteScratchpad { byte: 2 },
                (Mode::WriteScratchpad { byte: n }, value) => {
                    for (d, _) in self
                        .devices
                        .iter_mut()
                        .zip(&self.active)
                        .filter(|(_, active)| **active)
                    {
                        d.scratchpad[n] = value;
                        d.scratchpad[8] = crc8(&d.scratchpad[..8]);
                    }
                    if n == 4 {
                        Mode::Idle
                    } else {
                        Mode::WriteScratchpad { byte: n + 1 }
                    }
                }
                _ => Mode::Idle,
            };
        }
    }

    impl OneWireLink for SimBus {
        fn reset(&mut self) -> Result<(), BusError> {
            self.resets += 1;
            self.active.iter_mut().for_each(|a| *a = true);
            self.mode = Mode::RomCommand;
            self.shift = 0;
            self.shift_bits = 0;
            if self.devices.is_empty() {
                Err(BusError::NoPresence)
            } else {
                Ok(())
            }
        }

        fn write_bit(&mut self, bit: bool) -> Result<(), BusError> {
            match self.mode {
                Mode::Search { bit: n, step: 2 } => {
                    for (d, active) in self.devices.iter().zip(self.active.iter_mut()) {
                        if Self::rom_bit(&d.rom, n) != bit {
                            *active = false;
                        }
                    }
                    self.mode = if n == 63 {
                        Mode::Idle
                    } else {
                        Mode::Search { bit: n + 1, step: 0 }
                    };
                }
                Mode::Match { bit: n } => {
                    for (d, active) in self.devices.iter().zip(self.active.iter_mut()) {
                        if Self::rom_bit(&d.rom, n) != bit {
                            *active = false;
                        }
                    }
                    self.mode = if n == 63 {
                        Mode::Function
                    } else {
                        Mode::Match { bit: n + 1 }
                    };
                }
                Mode::RomCommand | Mode::Function | Mode::WriteScratchpad { .. } => {
                    if bit {
                        self.shift |= 1 << self.shift_bits;
                    }
                    self.shift_bits += 1;
                    if self.shift_bits == 8 {
                        let byte = self.shift;
                        self.shift = 0;
                        self.shift_bits = 0;
                        self.command(byte);
                    }
                }
                _ => {}
            }
            Ok(())
        }

        fn read_bit(&mut self) -> Result<bool, BusError> {
            Ok(match self.mode {
                Mode::Search { bit: n, step: 0 } => {
                    self.mode = Mode::Search { bit: n, step: 1 };
                    self.wired_and(|d| Self::rom_bit(&d.rom, n))
                }
                Mode::Search { bit: n, step: 1 } => {
                    self.mode = Mode::Search { bit: n, step: 2 };
                    self.wired_and(|d| !Self::rom_bit(&d.rom, n))
                }
                Mode::ReadScratchpad { bit: n } => {
                    self.mode = Mode::ReadScratchpad { bit: n + 1 };
                    let (byte, shift) = (usize::from(n / 8), n % 8);
                    self.wired_and(|d| {
                        d.scratchpad
                            .get(byte)
                            .map_or(true, |b| b & (1 << shift) != 0)
                    })
                }
                _ => true,
            })
        }
    }

    pub(crate) fn rom(serial: u8) -> [u8; 8] {
        let mut r = [0x28, serial, 0x10, 0x5E, 0x00, 0x00, 0x00, 0x00];
        r[7] = crc8(&r[..7]);
        r
    }

    #[test]
    fn test_crc8_known_rom() {
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_search_finds_all_devices() {
        let serials = [0x01u8, 0x02, 0x81, 0x7F, 0x40];
        let devices = serials
            .iter()
            .map(|&s| SimDevice {
                rom: rom(s),
                scratchpad: [0; 9],
            })
            .collect();
        let mut bus = SimBus::new(devices);
        let mut found = [DeviceAddress::default(); 8];

        let n = search(&mut bus, &mut found).unwrap();
        assert_eq!(n, serials.len());
        for s in serials {
            assert!(found[..n].contains(&DeviceAddress::new(rom(s))));
        }
        assert_eq!(bus.resets as usize, serials.len());
    }

    #[test]
    fn test_search_empty_bus() {
        let mut bus = SimBus::new(Vec::new());
        let mut found = [DeviceAddress::default(); 4];
        assert_eq!(search(&mut bus, &mut found), Ok(0));
    }

    #[test]
    fn test_search_stops_when_slice_full() {
        let devices = (1..=4)
            .map(|s| SimDevice {
                rom: rom(s),
                scratchpad: [0; 9],
            })
            .collect();
        let mut bus = SimBus::new(devices);
        let mut found = [DeviceAddress::default(); 2];
        assert_eq!(search(&mut bus, &mut found), Ok(2));
        assert_ne!(found[0], found[1]);
    }

    proptest! {
        #[test]
        fn test_crc_of_data_and_crc_is_zero(data in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut framed = data.clone();
            framed.push(crc8(&data));
            prop_assert_eq!(crc8(&framed), 0);
        }

        #[test]
        fn test_search_any_device_set(
            serials in proptest::collection::btree_set(any::<u8>(), 1..8),
        ) {
            let devices = serials
                .iter()
                .map(|&s| SimDevice { rom: rom(s), scratchpad: [0; 9] })
                .collect();
            let mut bus = SimBus::new(devices);
            let mut found = [DeviceAddress::default(); 8];
            let n = search(&mut bus, &mut found).unwrap();
            prop_assert_eq!(n, serials.len());
            for s in serials {
                prop_assert!(found[..n].contains(&DeviceAddress::new(rom(s))));
            }
        }
    }

    /// Line shared by the fake pin and the fake delay
    struct Line {
        now_us: Cell<u32>,
        low_since: Cell<Option<u32>>,
        released_at: Cell<u32>,
        last_pulse_us: Cell<u32>,
        pulses: RefCell<Vec<u32>>,
        device_present: bool,
    }

    impl Line {
        fn new(device_present: bool) -> Self {
            Self {
                now_us: Cell::new(0),
                low_since: Cell::new(None),
                released_at: Cell::new(0),
                last_pulse_us: Cell::new(0),
                pulses: RefCell::new(Vec::new()),
                device_present,
            }
        }
    }

    struct FakePin<'l>(&'l Line);

    impl ErrorType for FakePin<'_> {
        type Error = Infallible;
    }

    impl OutputPin for FakePin<'_> {
        fn set_low(&mut self) -> Result<(), Infallible> {
            if self.0.low_since.get().is_none() {
                self.0.low_since.set(Some(self.0.now_us.get()));
            }
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            if let Some(since) = self.0.low_since.take() {
                let width = self.0.now_us.get() - since;
                self.0.last_pulse_us.set(width);
                self.0.released_at.set(self.0.now_us.get());
                self.0.pulses.borrow_mut().push(width);
            }
            Ok(())
        }
    }

    impl InputPin for FakePin<'_> {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            self.is_low().map(|low| !low)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            let line = self.0;
            if line.low_since.get().is_some() {
                return Ok(true);
            }
            let since_release = line.now_us.get() - line.released_at.get();
            let presence = line.device_present
                && line.last_pulse_us.get() >= 480
                && (15..=240).contains(&since_release);
            Ok(presence)
        }
    }

    struct FakeDelay<'l>(&'l Line);

    impl DelayNs for FakeDelay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            let line = self.0;
            line.now_us.set(line.now_us.get() + ns.div_ceil(1000));
        }
    }

    #[test]
    fn test_bitbang_presence() {
        let line = Line::new(true);
        let mut link = BitBangOneWire::new(FakePin(&line), FakeDelay(&line));
        assert_eq!(link.reset(), Ok(()));

        let empty = Line::new(false);
        let mut link = BitBangOneWire::new(FakePin(&empty), FakeDelay(&empty));
        assert_eq!(link.reset(), Err(BusError::NoPresence));
    }

    #[test]
    fn test_bitbang_write_slots() {
        let line = Line::new(true);
        let mut link = BitBangOneWire::new(FakePin(&line), FakeDelay(&line));
        link.write_byte(0x44).unwrap();

        // 0x44 LSB first: 0 0 1 0 0 0 1 0
        assert_eq!(*line.pulses.borrow(), vec![60, 60, 6, 60, 60, 60, 6, 60]);
    }

    #[test]
    fn test_bitbang_reads_released_line_as_one() {
        let line = Line::new(false);
        let mut link = BitBangOneWire::new(FakePin(&line), FakeDelay(&line));
        assert_eq!(link.read_byte(), Ok(0xFF));
    }
}
