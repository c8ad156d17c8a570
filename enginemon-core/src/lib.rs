//! Board-agnostic reactive sensor dataflow for the engine monitor
//!
//! This crate contains everything between the hardware traits and the
//! telemetry bus:
//!
//! - Typed producer/consumer edges, checked when the graph is wired
//! - Cooperative scheduler driving periodic and interrupt-deferred work
//! - Sensor sources (debounced pulse counter, shared one-wire bus, digital
//!   and analog inputs)
//! - Transforms (count to frequency, linear, threshold, curve lookup)
//! - Sinks (telemetry output, digital alarm output)
//! - Persisted, live-updatable node configuration
//!
//! ```text
//!  PulseSource ──u32──► Frequency ──f32──► TelemetryOutput
//!  BusEndpoint ──f32──► Linear ──f32──┬──► TelemetryOutput
//!                                      └──► Threshold ──bool──► DigitalOutput
//! ```
//!
//! Every emission is pushed synchronously and depth-first from the
//! scheduler callback that produced it down to the terminal sinks.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod context;
pub mod dataflow;
pub mod error;
pub mod scheduler;
pub mod sensors;
pub mod sinks;
pub mod transforms;

pub use context::Context;
pub use dataflow::{Consumer, Producer, ValueProducer};
pub use error::SetupError;
pub use scheduler::{Millis, Reaction, Scheduler};

/// Commonly used traits, for glob import in wiring code
pub mod prelude {
    pub use crate::config::Configurable;
    pub use crate::dataflow::{Consumer, ValueProducer};
    pub use crate::scheduler::{EventSource, Reaction};
}
