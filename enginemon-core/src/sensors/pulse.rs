//! Interrupt-driven pulse counting
//!
//! The edge interrupt only touches a [`PulseCounter`]: a debounce check and
//! an atomic increment. The periodic [`PulseSource`] reaction drains the
//! count with an atomic swap and emits it, so the interrupt may preempt the
//! drain at any point without losing or double-counting edges.

use enginemon_hal::{Edge, Pull};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::context::Context;
use crate::dataflow::{Producer, ValueProducer};
use crate::error::SetupError;
use crate::scheduler::{elapsed_ms, Millis, Reaction};
use crate::sinks::TelemetryBus;

/// Edge counter shared with interrupt context
///
/// Intended to live in a `static`. All methods take `&self`.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU32,
    last_edge_ms: AtomicU32,
    seen_edge: AtomicBool,
    debounce_ms: AtomicU32,
}

impl PulseCounter {
    /// Create a counter with no debounce window
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            last_edge_ms: AtomicU32::new(0),
            seen_edge: AtomicBool::new(false),
            debounce_ms: AtomicU32::new(0),
        }
    }

    /// Set the debounce window; 0 disables debouncing
    pub fn set_debounce(&self, window_ms: u32) {
        self.debounce_ms.store(window_ms, Ordering::Relaxed);
    }

    pub fn debounce_ms(&self) -> u32 {
        self.debounce_ms.load(Ordering::Relaxed)
    }

    /// Record a hardware edge at `now`. Call from the edge interrupt.
    ///
    /// An edge closer than the debounce window to the last accepted edge
    /// is dropped. Returns whether the edge was counted.
    #[inline]
    pub fn on_edge(&self, now: Millis) -> bool {
        let window = self.debounce_ms.load(Ordering::Relaxed);
        if window > 0 {
            let seen = self.seen_edge.load(Ordering::Relaxed);
            let last = self.last_edge_ms.load(Ordering::Relaxed);
            if seen && elapsed_ms(now, last) < window {
                return false;
            }
            self.last_edge_ms.store(now, Ordering::Relaxed);
            self.seen_edge.store(true, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Take the accumulated count and reset it to zero
    pub fn drain(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Count accumulated since the last drain
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

/// Electrical and timing configuration of a pulse input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseInputConfig {
    pub pin: u8,
    pub edge: Edge,
    pub pull: Pull,
    /// Report interval
    pub read_delay_ms: u32,
    /// Minimum spacing between accepted edges
    pub debounce_ms: Option<u32>,
}

impl PulseInputConfig {
    pub const fn new(pin: u8, read_delay_ms: u32) -> Self {
        Self {
            pin,
            edge: Edge::Rising,
            pull: Pull::None,
            read_delay_ms,
            debounce_ms: None,
        }
    }

    pub const fn edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
        self
    }

    pub const fn pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub const fn debounce(mut self, window_ms: u32) -> Self {
        self.debounce_ms = Some(window_ms);
        self
    }
}

/// Periodically reports the pulse count of one input
///
/// Emits every interval, including 0 when no edges arrived.
pub struct PulseSource<'a> {
    counter: &'a PulseCounter,
    config: PulseInputConfig,
    output: Producer<'a, u32>,
}

impl<'a> PulseSource<'a> {
    /// Create a source reading `counter`, which the edge interrupt feeds
    pub fn new(counter: &'a PulseCounter, config: PulseInputConfig) -> Self {
        counter.set_debounce(config.debounce_ms.unwrap_or(0));
        Self {
            counter,
            config,
            output: Producer::new(),
        }
    }

    /// Claim the input pin and schedule the periodic report
    pub fn attach<B: TelemetryBus, const N: usize>(
        &'a self,
        ctx: &mut Context<'a, B, N>,
    ) -> Result<(), SetupError> {
        if self.config.read_delay_ms == 0 {
            return Err(SetupError::InvalidInterval);
        }
        ctx.claim_pin(self.config.pin)?;
        ctx.register_periodic(self.config.read_delay_ms, self)?;
        debug!(
            "pulse input on gpio {}: {:?} edge, every {} ms",
            self.config.pin,
            self.config.edge,
            self.config.read_delay_ms
        );
        Ok(())
    }

    pub fn interval_ms(&self) -> u32 {
        self.config.read_delay_ms
    }

    pub fn config(&self) -> &PulseInputConfig {
        &self.config
    }

    pub fn counter(&self) -> &'a PulseCounter {
        self.counter
    }
}

impl<'a> Reaction for PulseSource<'a> {
    fn react(&self, _now: Millis) {
        let count = self.counter.drain();
        trace!("gpio {}: {} pulses", self.config.pin, count);
        self.output.emit(count);
    }
}

impl<'a> ValueProducer<'a, u32> for PulseSource<'a> {
    fn output(&self) -> &Producer<'a, u32> {
        &self.output
    }
}
