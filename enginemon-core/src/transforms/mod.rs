//! Value transforms
//!
//! Each transform is both a [`Consumer`](crate::dataflow::Consumer) of its
//! input type and a [`ValueProducer`](crate::dataflow::ValueProducer) of its
//! output type. Parameters live in `Cell`s so a live configuration update
//! applies to the next value without rewiring.

pub mod curve;
pub mod frequency;
pub mod linear;
pub mod threshold;

pub use curve::{CurveConfig, CurveInterpolator, Sample, MAX_SAMPLES};
pub use frequency::{Frequency, FrequencyConfig};
pub use linear::{Linear, LinearConfig};
pub use threshold::{Threshold, ThresholdConfig};
