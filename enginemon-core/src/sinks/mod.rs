//! Terminal dataflow nodes
//!
//! Sinks consume values and hand them to the world outside the graph: the
//! telemetry bus or a physical output pin.

pub mod digital_output;
pub mod telemetry;

use core::cell::{Cell, RefCell};

use heapless::String;

pub use digital_output::DigitalOutput;
pub use telemetry::{TelemetryOutput, TelemetryOutputConfig, MAX_PATH_LEN};

/// Maximum length of a text telemetry value
pub const MAX_TEXT_LEN: usize = 32;

/// Typed telemetry value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Float(f32),
    Int(i32),
    Bool(bool),
    Text(String<MAX_TEXT_LEN>),
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.min(i32::MAX as u32) as i32)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String<MAX_TEXT_LEN>> for Value {
    fn from(v: String<MAX_TEXT_LEN>) -> Self {
        Value::Text(v)
    }
}

/// Descriptive data attached to a telemetry path
///
/// Advisory only: nothing in the graph reads it. The staleness timeout is
/// for the telemetry consumer to flag a path whose updates stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Metadata {
    pub units: Option<&'static str>,
    pub display_name: Option<&'static str>,
    pub short_name: Option<&'static str>,
    pub description: Option<&'static str>,
    /// Staleness timeout in milliseconds
    pub timeout_ms: Option<u32>,
}

impl Metadata {
    /// Empty metadata
    pub const fn new() -> Self {
        Self {
            units: None,
            display_name: None,
            short_name: None,
            description: None,
            timeout_ms: None,
        }
    }

    pub const fn units(mut self, units: &'static str) -> Self {
        self.units = Some(units);
        self
    }

    pub const fn display_name(mut self, name: &'static str) -> Self {
        self.display_name = Some(name);
        self
    }

    pub const fn short_name(mut self, name: &'static str) -> Self {
        self.short_name = Some(name);
        self
    }

    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub const fn timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = Some(ms);
        self
    }
}

/// External telemetry collaborator
///
/// Fire-and-forget: the graph never learns whether a publish reached the
/// server.
pub trait TelemetryBus {
    /// Publish `value` under `path`, with metadata when the sink has some to send
    fn publish(&mut self, path: &str, value: &Value, metadata: Option<&Metadata>);

    /// Push out anything buffered
    fn flush(&mut self) {}
}

/// Shared handle to the telemetry bus
///
/// Every [`TelemetryOutput`] publishes through the same handle.
pub struct Telemetry<B> {
    bus: RefCell<B>,
    published: Cell<u32>,
}

impl<B: TelemetryBus> Telemetry<B> {
    pub const fn new(bus: B) -> Self {
        Self {
            bus: RefCell::new(bus),
            published: Cell::new(0),
        }
    }

    /// Forward one value to the bus
    pub fn publish(&self, path: &str, value: &Value, metadata: Option<&Metadata>) {
        self.bus.borrow_mut().publish(path, value, metadata);
        self.published.set(self.published.get().wrapping_add(1));
    }

    pub fn flush(&self) {
        self.bus.borrow_mut().flush();
    }

    /// Total values published
    pub fn published(&self) -> u32 {
        self.published.get()
    }

    /// Run `f` with the underlying bus
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.bus.borrow_mut())
    }
}
