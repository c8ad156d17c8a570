//! Sensor sources
//!
//! Sources are the leaves of the graph. Each one attaches itself to the
//! [`Context`](crate::context::Context), claiming its pins and registering
//! the reaction that samples it, and emits through its own producer.

pub mod analog;
pub mod bus;
pub mod digital;
pub mod pulse;

pub use analog::AnalogInput;
pub use bus::{BusController, BusEndpoint, MAX_ENDPOINTS};
pub use digital::{DigitalInputChange, DigitalInputState};
pub use pulse::{PulseCounter, PulseInputConfig, PulseSource};
