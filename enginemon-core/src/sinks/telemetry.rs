//! Telemetry output sink

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

use heapless::String;
use serde::{Deserialize, Serialize};

use super::{Metadata, Telemetry, TelemetryBus, Value};
use crate::config::{decode, encode, ConfigError, Configurable};
use crate::dataflow::Consumer;

/// Maximum telemetry path length
pub const MAX_PATH_LEN: usize = 64;

/// Persisted telemetry output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryOutputConfig {
    pub path: String<MAX_PATH_LEN>,
}

/// Publishes every value it receives under a fixed path
///
/// Metadata goes out with the first emission and again after
/// [`request_metadata`](Self::request_metadata).
pub struct TelemetryOutput<'a, T, B: TelemetryBus> {
    telemetry: &'a Telemetry<B>,
    path: RefCell<String<MAX_PATH_LEN>>,
    config_key: Option<&'static str>,
    metadata: Option<Metadata>,
    metadata_pending: Cell<bool>,
    _value: PhantomData<fn(T)>,
}

impl<'a, T, B: TelemetryBus> TelemetryOutput<'a, T, B> {
    /// Create a sink publishing under `path`
    ///
    /// Paths longer than [`MAX_PATH_LEN`] are truncated.
    pub fn new(telemetry: &'a Telemetry<B>, path: &str) -> Self {
        Self {
            telemetry,
            path: RefCell::new(truncated(path)),
            config_key: None,
            metadata: None,
            metadata_pending: Cell::new(false),
            _value: PhantomData,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self.metadata_pending.set(true);
        self
    }

    /// Allow the path to be overridden from the config store
    pub fn with_config_key(mut self, key: &'static str) -> Self {
        self.config_key = Some(key);
        self
    }

    /// Send metadata again alongside the next emission
    pub fn request_metadata(&self) {
        if self.metadata.is_some() {
            self.metadata_pending.set(true);
        }
    }

    pub fn path(&self) -> String<MAX_PATH_LEN> {
        self.path.borrow().clone()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

fn truncated(path: &str) -> String<MAX_PATH_LEN> {
    let mut out = String::new();
    for c in path.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl<'a, T, B> Consumer<T> for TelemetryOutput<'a, T, B>
where
    T: Into<Value>,
    B: TelemetryBus,
{
    fn set(&self, value: T) {
        let value = value.into();
        let metadata = if self.metadata_pending.replace(false) {
            self.metadata.as_ref()
        } else {
            None
        };
        self.telemetry
            .publish(self.path.borrow().as_str(), &value, metadata);
    }
}

impl<'a, T, B: TelemetryBus> Configurable for TelemetryOutput<'a, T, B> {
    fn config_key(&self) -> Option<&str> {
        self.config_key
    }

    fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let config: TelemetryOutputConfig = decode(bytes)?;
        if config.path.is_empty() {
            return Err(ConfigError::InvalidValue);
        }
        *self.path.borrow_mut() = config.path;
        Ok(())
    }

    fn save(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        encode(
            &TelemetryOutputConfig {
                path: self.path(),
            },
            buf,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::RecordingBus;

    #[test]
    fn test_metadata_sent_once() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let out: TelemetryOutput<'_, f32, _> =
            TelemetryOutput::new(&telemetry, "propulsion.main.revolutions")
                .with_metadata(Metadata::new().units("Hz"));

        out.set(10.0);
        out.set(11.0);

        telemetry.with_bus(|bus| {
            assert_eq!(bus.records.len(), 2);
            assert_eq!(bus.records[0].path.as_str(), "propulsion.main.revolutions");
            assert_eq!(bus.records[0].metadata.and_then(|m| m.units), Some("Hz"));
            assert_eq!(bus.records[1].metadata, None);
            assert_eq!(bus.records[1].value, Value::Float(11.0));
        });
    }

    #[test]
    fn test_request_metadata_resends() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let out: TelemetryOutput<'_, bool, _> =
            TelemetryOutput::new(&telemetry, "notifications.alarm")
                .with_metadata(Metadata::new().units("boolean"));

        out.set(false);
        out.request_metadata();
        out.set(true);

        telemetry.with_bus(|bus| {
            assert!(bus.records[0].metadata.is_some());
            assert!(bus.records[1].metadata.is_some());
        });
    }

    #[test]
    fn test_no_metadata_without_request() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let out: TelemetryOutput<'_, u32, _> = TelemetryOutput::new(&telemetry, "a.count");
        out.request_metadata();
        out.set(4);

        telemetry.with_bus(|bus| {
            assert_eq!(bus.records[0].metadata, None);
            assert_eq!(bus.records[0].value, Value::Int(4));
        });
    }

    #[test]
    fn test_path_override() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let out: TelemetryOutput<'_, f32, _> =
            TelemetryOutput::new(&telemetry, "old.path").with_config_key("/temp/skPath");

        let mut buf = [0u8; 80];
        let config = TelemetryOutputConfig {
            path: String::try_from("new.path").unwrap(),
        };
        let len = encode(&config, &mut buf).unwrap();
        out.load(&buf[..len]).unwrap();
        out.set(1.0);

        telemetry.with_bus(|bus| assert_eq!(bus.records[0].path.as_str(), "new.path"));

        let empty = TelemetryOutputConfig { path: String::new() };
        let len = encode(&empty, &mut buf).unwrap();
        assert_eq!(out.load(&buf[..len]), Err(ConfigError::InvalidValue));
    }

    #[test]
    fn test_long_path_truncated() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let long = "x".repeat(100);
        let out: TelemetryOutput<'_, f32, _> = TelemetryOutput::new(&telemetry, &long);
        assert_eq!(out.path().len(), MAX_PATH_LEN);
    }
}
