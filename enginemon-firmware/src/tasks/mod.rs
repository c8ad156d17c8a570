//! Embassy async tasks
//!
//! Edge tasks stand in for the GPIO interrupt handlers: they wake on the
//! pin edge and touch only atomics shared with the scheduler loop. They are
//! spawned on an interrupt executor, so an edge is handled even while the
//! scheduler loop is inside a blocking one-wire transaction.

pub mod pulse;
pub mod switch;

pub use pulse::pulse_edge_task;
pub use switch::switch_edge_task;
