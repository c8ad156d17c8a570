//! Telemetry over RTT
//!
//! Until the board has a network uplink, published values go to the defmt
//! log where the probe host picks them up.

use enginemon_core::sinks::{Metadata, TelemetryBus, Value};

/// Bus that logs every update
#[derive(Default)]
pub struct DefmtTelemetry {
    updates: u32,
}

impl DefmtTelemetry {
    pub const fn new() -> Self {
        Self { updates: 0 }
    }
}

impl TelemetryBus for DefmtTelemetry {
    fn publish(&mut self, path: &str, value: &Value, metadata: Option<&Metadata>) {
        self.updates = self.updates.wrapping_add(1);
        if let Some(meta) = metadata {
            defmt::info!(
                "meta {}: units={} name={} timeout={}ms",
                path,
                meta.units,
                meta.display_name,
                meta.timeout_ms
            );
        }
        match value {
            Value::Float(v) => defmt::info!("{} = {}", path, v),
            Value::Int(v) => defmt::info!("{} = {}", path, v),
            Value::Bool(v) => defmt::info!("{} = {}", path, v),
            Value::Text(v) => defmt::info!("{} = {}", path, v.as_str()),
        }
    }

    fn flush(&mut self) {
        defmt::info!("telemetry flushed after {} updates", self.updates);
    }
}
