//! Enginemon Hardware Abstraction Layer
//!
//! This crate defines the hardware boundary of the monitoring node. The
//! dataflow core only ever talks to hardware through these traits, so the
//! same sensor graph runs on the RP2040 board and against host fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Firmware (enginemon-firmware)          │
//! └─────────────────────────────────────────┘
//!          │                     │
//!          ▼                     ▼
//! ┌─────────────────┐   ┌─────────────────┐
//! │ enginemon-core  │   │enginemon-drivers│
//! └─────────────────┘   └─────────────────┘
//!          │                     │
//!          └──────────┬──────────┘
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  enginemon-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`adc::AdcReader`] - Analog sampling
//! - [`onewire::SensorBus`] - Shared one-wire temperature bus
//! - [`store::ConfigStore`] - Persisted configuration

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod gpio;
pub mod onewire;
pub mod store;

// Re-export key traits at crate root for convenience
pub use adc::{AdcError, AdcReader};
pub use gpio::{Edge, InputPin, OutputPin, PinAllocator, PinError, Pull};
pub use onewire::{BusError, DeviceAddress, SensorBus};
pub use store::{ConfigStore, StoreError};
