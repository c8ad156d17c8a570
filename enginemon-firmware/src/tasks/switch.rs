//! Alarm contact edge task

use embassy_rp::gpio::Input;
use enginemon_core::scheduler::InterruptFlag;
use portable_atomic::{AtomicBool, Ordering};

/// Latch the contact level on every change and flag the scheduler
#[embassy_executor::task]
pub async fn switch_edge_task(
    mut pin: Input<'static>,
    level: &'static AtomicBool,
    flag: &'static InterruptFlag,
) {
    level.store(pin.is_high(), Ordering::Release);
    flag.raise();
    loop {
        pin.wait_for_any_edge().await;
        level.store(pin.is_high(), Ordering::Release);
        flag.raise();
    }
}
