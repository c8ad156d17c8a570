//! Pulse edge task

use embassy_rp::gpio::Input;
use embassy_time::Instant;
use enginemon_core::sensors::PulseCounter;
use enginemon_hal::Edge;

/// Count edges of the configured polarity into `counter`
///
/// Debounce happens inside [`PulseCounter::on_edge`]; rejected edges are
/// dropped silently.
#[embassy_executor::task]
pub async fn pulse_edge_task(mut pin: Input<'static>, edge: Edge, counter: &'static PulseCounter) {
    loop {
        match edge {
            Edge::Rising => pin.wait_for_rising_edge().await,
            Edge::Falling => pin.wait_for_falling_edge().await,
            Edge::Both => pin.wait_for_any_edge().await,
        }
        counter.on_edge(Instant::now().as_millis() as u32);
    }
}
