//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in enginemon-hal:
//!
//! - One-wire link layer, bit-banged over `embedded-hal` pins, with ROM search
//! - DS18B20 temperature bus ([`enginemon_hal::SensorBus`])
//! - RAM-backed configuration store ([`enginemon_hal::ConfigStore`])

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod ds18b20;
pub mod onewire;
pub mod store;
