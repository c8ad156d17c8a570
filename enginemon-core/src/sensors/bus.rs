//! Shared one-wire bus controller
//!
//! One controller per physical bus. Logical [`BusEndpoint`]s register
//! against it, each bound to a device address. Conversion is slow and
//! shared by every device, so the controller pipelines: each periodic run
//! first reads back the conversion started on the previous run, then
//! broadcasts a single new conversion for the whole bus. The first run
//! therefore emits nothing.

use core::cell::{Cell, RefCell};

use enginemon_hal::{DeviceAddress, SensorBus};
use crate::context::Context;
use crate::dataflow::{Producer, ValueProducer};
use crate::error::SetupError;
use crate::scheduler::{elapsed_ms, Millis, Reaction};
use crate::sinks::TelemetryBus;

/// Maximum logical endpoints per bus
pub const MAX_ENDPOINTS: usize = 8;

/// One device on a shared bus, as seen by the graph
///
/// Emits the device temperature in °C once per bus interval. A failed read
/// skips the emission for that interval.
pub struct BusEndpoint<'a> {
    address: Cell<Option<DeviceAddress>>,
    failures: Cell<u32>,
    output: Producer<'a, f32>,
}

impl<'a> Default for BusEndpoint<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BusEndpoint<'a> {
    /// Endpoint bound to whichever device discovery assigns it
    pub const fn new() -> Self {
        Self {
            address: Cell::new(None),
            failures: Cell::new(0),
            output: Producer::new(),
        }
    }

    /// Endpoint bound to a known device
    pub const fn with_address(address: DeviceAddress) -> Self {
        Self {
            address: Cell::new(Some(address)),
            failures: Cell::new(0),
            output: Producer::new(),
        }
    }

    pub fn address(&self) -> Option<DeviceAddress> {
        self.address.get()
    }

    /// Number of failed reads so far
    pub fn failures(&self) -> u32 {
        self.failures.get()
    }
}

impl<'a> ValueProducer<'a, f32> for BusEndpoint<'a> {
    fn output(&self) -> &Producer<'a, f32> {
        &self.output
    }
}

/// Drives a shared sensor bus on behalf of its endpoints
pub struct BusController<'a, B: SensorBus> {
    pin: u8,
    bus: RefCell<B>,
    read_interval_ms: u32,
    slots: [Cell<Option<&'a BusEndpoint<'a>>>; MAX_ENDPOINTS],
    registered: Cell<usize>,
    converting_since: Cell<Option<Millis>>,
    conversions: Cell<u32>,
}

impl<'a, B: SensorBus> BusController<'a, B> {
    /// Create a controller for the bus on `pin`, sampled every `read_interval_ms`
    ///
    /// The interval must leave room for a full conversion.
    pub fn new(pin: u8, bus: B, read_interval_ms: u32) -> Result<Self, SetupError> {
        if read_interval_ms == 0 {
            return Err(SetupError::InvalidInterval);
        }
        if read_interval_ms < bus.conversion_time_ms() {
            return Err(SetupError::IntervalTooShort);
        }
        Ok(Self {
            pin,
            bus: RefCell::new(bus),
            read_interval_ms,
            slots: [const { Cell::new(None) }; MAX_ENDPOINTS],
            registered: Cell::new(0),
            converting_since: Cell::new(None),
            conversions: Cell::new(0),
        })
    }

    /// Add a logical endpoint
    ///
    /// Two endpoints may not be bound to the same address.
    pub fn register(&self, endpoint: &'a BusEndpoint<'a>) -> Result<(), SetupError> {
        for existing in self.endpoints() {
            if core::ptr::eq(existing, endpoint) {
                return Err(SetupError::DuplicateAddress);
            }
            if existing.address().is_some() && existing.address() == endpoint.address() {
                return Err(SetupError::DuplicateAddress);
            }
        }
        let slot = self
            .slots
            .get(self.registered.get())
            .ok_or(SetupError::TooManyEndpoints)?;
        slot.set(Some(endpoint));
        self.registered.set(self.registered.get() + 1);
        Ok(())
    }

    /// Enumerate the bus and bind unbound endpoints to unclaimed devices
    ///
    /// Devices are assigned in discovery order to endpoints in registration
    /// order. Returns the number of endpoints newly bound.
    pub fn discover(&self) -> Result<usize, SetupError> {
        let mut found = [DeviceAddress::default(); MAX_ENDPOINTS];
        let count = self.bus.borrow_mut().search(&mut found)?.min(MAX_ENDPOINTS);
        info!("gpio {}: {} devices on bus", self.pin, count);

        let mut unclaimed = found[..count]
            .iter()
            .filter(|addr| !self.endpoints().any(|e| e.address() == Some(**addr)));

        let mut bound = 0;
        for endpoint in self.endpoints().filter(|e| e.address().is_none()) {
            match unclaimed.next() {
                Some(addr) => {
                    endpoint.address.set(Some(*addr));
                    bound += 1;
                }
                None => {
                    warn!("gpio {}: not enough devices for all endpoints", self.pin);
                    break;
                }
            }
        }
        Ok(bound)
    }

    /// Claim the bus pin and schedule the read cycle
    pub fn attach<T: TelemetryBus, const N: usize>(
        &'a self,
        ctx: &mut Context<'a, T, N>,
    ) -> Result<(), SetupError> {
        ctx.claim_pin(self.pin)?;
        ctx.register_periodic(self.read_interval_ms, self)?;
        Ok(())
    }

    /// Number of conversion commands issued
    pub fn conversions(&self) -> u32 {
        self.conversions.get()
    }

    pub fn endpoint_count(&self) -> usize {
        self.registered.get()
    }

    pub fn read_interval_ms(&self) -> u32 {
        self.read_interval_ms
    }

    /// Run `f` with the underlying bus
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.bus.borrow_mut())
    }

    fn endpoints(&self) -> impl Iterator<Item = &'a BusEndpoint<'a>> + '_ {
        self.slots[..self.registered.get()]
            .iter()
            .filter_map(Cell::get)
    }

    fn read_back(&self) {
        for endpoint in self.endpoints() {
            let Some(address) = endpoint.address() else {
                continue;
            };
            let reading = self.bus.borrow_mut().read_temperature(&address);
            match reading {
                Ok(celsius) => endpoint.output.emit(celsius),
                Err(e) => {
                    endpoint.failures.set(endpoint.failures.get().wrapping_add(1));
                    warn!("bus device {:?} read failed: {:?}", address, e);
                }
            }
        }
    }
}

impl<'a, B: SensorBus> Reaction for BusController<'a, B> {
    fn react(&self, now: Millis) {
        if let Some(started) = self.converting_since.take() {
            let waited = elapsed_ms(now, started);
            if waited >= self.bus.borrow().conversion_time_ms() {
                self.read_back();
            } else {
                warn!("gpio {}: conversion not ready after {} ms", self.pin, waited);
            }
        }

        let started = self.bus.borrow_mut().start_conversion();
        match started {
            Ok(()) => {
                self.converting_since.set(Some(now));
                self.conversions.set(self.conversions.get().wrapping_add(1));
            }
            Err(e) => warn!("gpio {}: conversion request failed: {:?}", self.pin, e),
        }
    }
}
