//! Typed dataflow edges
//!
//! A [`Producer`] holds the latest value a node emitted and a fixed-size
//! list of non-owning references to its [`Consumer`]s. Connecting is only
//! possible between matching value types, so a count producer can never be
//! wired into a boolean sink: the mismatch is a compile error.
//!
//! Nodes are shared by reference (`&'a`) for the life of the graph and
//! mutate through `Cell`/`RefCell`; everything runs on the single scheduler
//! thread, so no locking is involved.

use core::cell::{Cell, RefCell};

/// Maximum consumers a single producer can fan out to
pub const MAX_SUBSCRIBERS: usize = 4;

/// Errors raised while wiring the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WiringError {
    /// Producer already feeds [`MAX_SUBSCRIBERS`] consumers
    TooManySubscribers,
    /// The same consumer is already connected to this producer
    AlreadyConnected,
}

/// A node input accepting values of type `T`
pub trait Consumer<T> {
    /// Accept a new value from upstream
    ///
    /// Called synchronously from the upstream producer's emission.
    fn set(&self, value: T);
}

/// Output side of a node emitting values of type `T`
///
/// Subscriber slots are plain `Cell`s so the producer has no drop glue and a
/// graph of locals can borrow itself.
pub struct Producer<'a, T> {
    /// Last emitted value (`None` until the first emission)
    value: RefCell<Option<T>>,
    /// Subscribed consumers, in connection order; `len` slots are filled
    outputs: [Cell<Option<&'a dyn Consumer<T>>>; MAX_SUBSCRIBERS],
    len: Cell<usize>,
}

impl<'a, T> Default for Producer<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> Producer<'a, T> {
    /// Create a producer with no value and no consumers
    pub const fn new() -> Self {
        Self {
            value: RefCell::new(None),
            outputs: [const { Cell::new(None) }; MAX_SUBSCRIBERS],
            len: Cell::new(0),
        }
    }

    /// Subscribe `consumer` to this producer
    ///
    /// Returns the consumer again so transforms can be chained:
    /// `source.connect_to(&transform)?.connect_to(&sink)?`.
    pub fn connect_to<C>(&self, consumer: &'a C) -> Result<&'a C, WiringError>
    where
        C: Consumer<T> + 'a,
    {
        let target = consumer as *const C as *const ();
        if self
            .consumers()
            .any(|c| core::ptr::eq(c as *const dyn Consumer<T> as *const (), target))
        {
            return Err(WiringError::AlreadyConnected);
        }
        let slot = self
            .outputs
            .get(self.len.get())
            .ok_or(WiringError::TooManySubscribers)?;
        slot.set(Some(consumer));
        self.len.set(self.len.get() + 1);
        Ok(consumer)
    }

    /// Number of connected consumers
    pub fn subscriber_count(&self) -> usize {
        self.len.get()
    }

    fn consumers(&self) -> impl Iterator<Item = &'a dyn Consumer<T>> + '_ {
        self.outputs[..self.len.get()].iter().filter_map(Cell::get)
    }
}

impl<'a, T: Clone> Producer<'a, T> {
    /// Store `value` and push it to every consumer, depth-first
    pub fn emit(&self, value: T) {
        *self.value.borrow_mut() = Some(value.clone());
        for consumer in self.consumers() {
            consumer.set(value.clone());
        }
    }

    /// Last emitted value
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

/// A node with a typed output
///
/// Implemented by every source and transform so wiring code can chain
/// `connect_to` calls without reaching into the node.
pub trait ValueProducer<'a, T: 'a> {
    /// The node's output
    fn output(&self) -> &Producer<'a, T>;

    /// Subscribe `consumer` to this node's output
    fn connect_to<C>(&self, consumer: &'a C) -> Result<&'a C, WiringError>
    where
        C: Consumer<T> + 'a,
    {
        self.output().connect_to(consumer)
    }

    /// Last value this node emitted
    fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.output().get()
    }
}

impl<'a, T: 'a> ValueProducer<'a, T> for Producer<'a, T> {
    fn output(&self) -> &Producer<'a, T> {
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Consumer that remembers the last value and how often it was set
    pub(crate) struct Probe<T: Copy> {
        pub last: Cell<Option<T>>,
        pub calls: Cell<u32>,
    }

    impl<T: Copy> Probe<T> {
        pub(crate) fn new() -> Self {
            Self {
                last: Cell::new(None),
                calls: Cell::new(0),
            }
        }
    }

    impl<T: Copy> Consumer<T> for Probe<T> {
        fn set(&self, value: T) {
            self.last.set(Some(value));
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn test_emit_fans_out() {
        let a = Probe::<u32>::new();
        let b = Probe::<u32>::new();
        let producer = Producer::new();

        producer.connect_to(&a).unwrap();
        producer.connect_to(&b).unwrap();
        producer.emit(7);

        assert_eq!(a.last.get(), Some(7));
        assert_eq!(b.last.get(), Some(7));
        assert_eq!(producer.get(), Some(7));
    }

    #[test]
    fn test_no_value_before_first_emit() {
        let producer: Producer<'_, f32> = Producer::new();
        assert_eq!(producer.get(), None);
        assert_eq!(producer.subscriber_count(), 0);
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let a = Probe::<bool>::new();
        let producer = Producer::new();

        producer.connect_to(&a).unwrap();
        assert_eq!(
            producer.connect_to(&a).err(),
            Some(WiringError::AlreadyConnected)
        );
        producer.emit(true);
        assert_eq!(a.calls.get(), 1);
    }

    #[test]
    fn test_fan_out_limit() {
        let probes: [Probe<u32>; MAX_SUBSCRIBERS + 1] = core::array::from_fn(|_| Probe::new());
        let producer = Producer::new();

        for probe in probes.iter().take(MAX_SUBSCRIBERS) {
            producer.connect_to(probe).unwrap();
        }
        assert_eq!(
            producer.connect_to(&probes[MAX_SUBSCRIBERS]).err(),
            Some(WiringError::TooManySubscribers)
        );
    }

    #[test]
    fn test_zero_is_a_value() {
        let a = Probe::<u32>::new();
        let producer = Producer::new();
        producer.connect_to(&a).unwrap();

        producer.emit(0);
        assert_eq!(a.last.get(), Some(0));
        assert_eq!(a.calls.get(), 1);
    }
}
