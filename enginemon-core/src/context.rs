//! Application context
//!
//! Replaces a global application object: the context owns the scheduler,
//! the pin allocator and the configuration registry, and borrows the
//! telemetry handle. Nodes attach themselves to it during setup; once
//! [`Context::start`] has been called the graph is frozen.

use enginemon_hal::{ConfigStore, PinAllocator};

use crate::config::{ConfigError, ConfigRegistry, Configurable};
use crate::error::SetupError;
use crate::scheduler::{EventSource, Millis, Reaction, Scheduler, TaskId, MAX_TASKS};
use crate::sinks::{Telemetry, TelemetryBus};

/// Lifecycle of the context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Graph under construction
    Setup,
    /// Scheduler ticking
    Running,
    /// Shut down, ticks are ignored
    Stopped,
}

/// Explicit runtime context passed to every node during setup
pub struct Context<'a, B: TelemetryBus, const N: usize = MAX_TASKS> {
    scheduler: Scheduler<'a, N>,
    telemetry: &'a Telemetry<B>,
    pins: PinAllocator,
    config: ConfigRegistry<'a>,
    state: State,
}

impl<'a, B: TelemetryBus, const N: usize> Context<'a, B, N> {
    /// Create a context for an RP2040-sized pin space
    pub fn new(telemetry: &'a Telemetry<B>) -> Self {
        Self::with_pins(telemetry, PinAllocator::default())
    }

    /// Create a context with a board-specific pin allocator
    pub fn with_pins(telemetry: &'a Telemetry<B>, pins: PinAllocator) -> Self {
        Self {
            scheduler: Scheduler::new(),
            telemetry,
            pins,
            config: ConfigRegistry::new(),
            state: State::Setup,
        }
    }

    fn ensure_setup(&self) -> Result<(), SetupError> {
        match self.state {
            State::Setup => Ok(()),
            _ => Err(SetupError::AlreadyStarted),
        }
    }

    /// Claim a GPIO for exclusive use
    pub fn claim_pin(&mut self, pin: u8) -> Result<(), SetupError> {
        self.ensure_setup()?;
        self.pins.allocate(pin)?;
        debug!("claimed gpio {}", pin);
        Ok(())
    }

    pub fn register_periodic(
        &mut self,
        interval_ms: u32,
        reaction: &'a dyn Reaction,
    ) -> Result<TaskId, SetupError> {
        self.ensure_setup()?;
        Ok(self.scheduler.register_periodic(interval_ms, reaction)?)
    }

    pub fn register_event(
        &mut self,
        source: &'a dyn EventSource,
        reaction: &'a dyn Reaction,
    ) -> Result<TaskId, SetupError> {
        self.ensure_setup()?;
        Ok(self.scheduler.register_event(source, reaction)?)
    }

    pub fn register_tick(&mut self, reaction: &'a dyn Reaction) -> Result<TaskId, SetupError> {
        self.ensure_setup()?;
        Ok(self.scheduler.register_tick(reaction)?)
    }

    /// Register a configurable node and apply its stored override
    ///
    /// The store is queried once. A missing entry keeps the node's
    /// constructor defaults; an unreadable or invalid entry is logged and
    /// ignored. Returns whether an override was applied.
    pub fn register_config<S: ConfigStore>(
        &mut self,
        node: &'a dyn Configurable,
        store: &mut S,
    ) -> Result<bool, SetupError> {
        self.ensure_setup()?;
        if !self.config.register(node)? {
            return Ok(false);
        }
        let Some(key) = node.config_key() else {
            return Ok(false);
        };
        match self.config.load_from(key, store) {
            Ok(true) => {
                info!("config override loaded for {}", key);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                warn!("config override for {} ignored: {:?}", key, e);
                Ok(false)
            }
        }
    }

    /// Seal the graph and start all periodic intervals at `now`
    pub fn start(&mut self, now: Millis) -> Result<(), SetupError> {
        self.ensure_setup()?;
        self.scheduler.start(now);
        self.state = State::Running;
        info!(
            "started: {} tasks, {} pins, {} configurable nodes",
            self.scheduler.len(),
            self.pins.allocated_count(),
            self.config.len()
        );
        Ok(())
    }

    /// Run everything due at `now`
    ///
    /// The first tick of a context that was never started starts it.
    /// Returns the number of reactions invoked; always 0 after shutdown.
    pub fn tick(&mut self, now: Millis) -> usize {
        match self.state {
            State::Stopped => 0,
            State::Setup => {
                self.state = State::Running;
                self.scheduler.tick(now)
            }
            State::Running => self.scheduler.tick(now),
        }
    }

    /// Apply a live configuration update to the node registered under `key`
    pub fn push_config(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        self.config.apply(key, bytes)
    }

    /// Write the current configuration of `key` back to `store`
    pub fn persist_config<S: ConfigStore>(
        &self,
        key: &str,
        store: &mut S,
    ) -> Result<(), ConfigError> {
        self.config.persist(key, store)
    }

    /// Stop ticking and flush the telemetry bus
    pub fn shutdown(&mut self) {
        if self.state == State::Stopped {
            return;
        }
        self.state = State::Stopped;
        self.telemetry.flush();
        info!("shut down");
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn telemetry(&self) -> &'a Telemetry<B> {
        self.telemetry
    }

    pub fn scheduler(&self) -> &Scheduler<'a, N> {
        &self.scheduler
    }

    pub fn pins(&self) -> &PinAllocator {
        &self.pins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::registry::tests::TestStore;
    use crate::config::{encode, ConfigError};
    use crate::scheduler::InterruptFlag;
    use crate::sinks::tests::RecordingBus;
    use crate::transforms::{Linear, LinearConfig};
    use core::cell::Cell;
    use enginemon_hal::PinError;

    #[test]
    fn test_pin_claims() {
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);

        ctx.claim_pin(5).unwrap();
        assert_eq!(ctx.claim_pin(5), Err(SetupError::Pin(PinError::PinInUse(5))));
        assert_eq!(ctx.claim_pin(40), Err(SetupError::Pin(PinError::InvalidPin(40))));
    }

    #[test]
    fn test_lifecycle() {
        let hits = Cell::new(0u32);
        let bump = |_now: Millis| hits.set(hits.get() + 1);
        let flag = InterruptFlag::new();
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);

        ctx.register_periodic(100, &bump).unwrap();
        ctx.start(0).unwrap();
        assert_eq!(ctx.state(), State::Running);
        assert_eq!(ctx.register_event(&flag, &bump), Err(SetupError::AlreadyStarted));
        assert_eq!(ctx.claim_pin(1), Err(SetupError::AlreadyStarted));
        assert_eq!(ctx.start(5), Err(SetupError::AlreadyStarted));

        assert_eq!(ctx.tick(100), 1);
        ctx.shutdown();
        assert_eq!(ctx.tick(200), 0);
        assert_eq!(hits.get(), 1);
        telemetry.with_bus(|bus| assert_eq!(bus.flushes, 1));
    }

    #[test]
    fn test_first_tick_starts() {
        let bump = |_now: Millis| {};
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);
        ctx.register_tick(&bump).unwrap();

        assert_eq!(ctx.tick(0), 1);
        assert_eq!(ctx.state(), State::Running);
        assert_eq!(ctx.register_tick(&bump), Err(SetupError::AlreadyStarted));
    }

    #[test]
    fn test_config_override_applied() {
        let mut store = TestStore::new();
        let mut buf = [0u8; 32];
        let len = encode(&LinearConfig { scale: 2.0, offset: 1.0 }, &mut buf).unwrap();
        store.put("/room/linear", &buf[..len]);

        let linear = Linear::new(1.0, 0.0).with_config_key("/room/linear");
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);

        assert_eq!(ctx.register_config(&linear, &mut store), Ok(true));
        assert_eq!(linear.scale(), 2.0);
        assert_eq!(linear.offset(), 1.0);
    }

    #[test]
    fn test_corrupt_override_keeps_defaults() {
        let mut store = TestStore::new();
        store.put("/room/linear", &[0xFF, 0xFF]);

        let linear = Linear::new(1.0, 273.15).with_config_key("/room/linear");
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);

        assert_eq!(ctx.register_config(&linear, &mut store), Ok(false));
        assert_eq!(linear.offset(), 273.15);
    }

    #[test]
    fn test_live_update_and_persist() {
        let mut store = TestStore::new();
        let linear = Linear::new(1.0, 0.0).with_config_key("/room/linear");
        let other = Linear::new(1.0, 0.0).with_config_key("/room/linear");
        let telemetry = Telemetry::new(RecordingBus::default());
        let mut ctx: Context<'_, _> = Context::new(&telemetry);

        ctx.register_config(&linear, &mut store).unwrap();
        assert_eq!(
            ctx.register_config(&other, &mut store),
            Err(SetupError::Config(ConfigError::DuplicateKey))
        );
        ctx.start(0).unwrap();

        let mut buf = [0u8; 32];
        let len = encode(&LinearConfig { scale: 0.5, offset: 0.0 }, &mut buf).unwrap();
        ctx.push_config("/room/linear", &buf[..len]).unwrap();
        assert_eq!(linear.scale(), 0.5);

        ctx.persist_config("/room/linear", &mut store).unwrap();
        assert!(store.exists("/room/linear"));
        assert_eq!(
            ctx.push_config("/nowhere", &buf[..len]),
            Err(ConfigError::UnknownKey)
        );
    }
}
