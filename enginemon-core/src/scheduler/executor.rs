//! Reaction executor
//!
//! Holds the registered reactions and decides, on each tick, which of them
//! are due. Registration is only allowed before [`Scheduler::start`]; once
//! running, the task table is fixed for the life of the process.

use super::{elapsed_ms, EventSource, Millis, Reaction};

/// Default capacity of the task table
pub const MAX_TASKS: usize = 16;

/// Scheduler registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// Task table is full
    TooManyTasks,
    /// A periodic interval of zero was requested
    InvalidInterval,
    /// Registration attempted after the scheduler started
    AlreadyStarted,
}

/// Handle to a registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(usize);

/// What makes a task due
enum Trigger<'a> {
    /// Every `interval_ms`, measured from the previous run
    Every { interval_ms: u32, last_ms: Millis },
    /// Whenever the event source has pending work
    Event(&'a dyn EventSource),
    /// On every tick
    Tick,
}

struct Task<'a> {
    trigger: Trigger<'a>,
    reaction: &'a dyn Reaction,
    runs: u32,
}

impl<'a> Task<'a> {
    fn run(&mut self, now: Millis) {
        self.reaction.react(now);
        self.runs = self.runs.wrapping_add(1);
    }
}

/// Cooperative single-threaded scheduler
///
/// Each [`tick`](Scheduler::tick) runs, in registration order:
/// 1. Reactions whose interrupt source has pending work
/// 2. Periodic reactions whose interval has elapsed
/// 3. Per-tick reactions
pub struct Scheduler<'a, const N: usize = MAX_TASKS> {
    tasks: [Option<Task<'a>>; N],
    len: usize,
    started: bool,
}

impl<'a, const N: usize> Default for Scheduler<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Create an empty scheduler
    pub const fn new() -> Self {
        Self {
            tasks: [const { None }; N],
            len: 0,
            started: false,
        }
    }

    /// Run `reaction` every `interval_ms`
    pub fn register_periodic(
        &mut self,
        interval_ms: u32,
        reaction: &'a dyn Reaction,
    ) -> Result<TaskId, SchedulerError> {
        if interval_ms == 0 {
            return Err(SchedulerError::InvalidInterval);
        }
        let trigger = Trigger::Every {
            interval_ms,
            last_ms: 0,
        };
        self.push(trigger, reaction)
    }

    /// Run `reaction` on the first tick after `source` reports pending work
    pub fn register_event(
        &mut self,
        source: &'a dyn EventSource,
        reaction: &'a dyn Reaction,
    ) -> Result<TaskId, SchedulerError> {
        self.push(Trigger::Event(source), reaction)
    }

    /// Run `reaction` on every tick
    pub fn register_tick(&mut self, reaction: &'a dyn Reaction) -> Result<TaskId, SchedulerError> {
        self.push(Trigger::Tick, reaction)
    }

    fn push(
        &mut self,
        trigger: Trigger<'a>,
        reaction: &'a dyn Reaction,
    ) -> Result<TaskId, SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        let slot = self
            .tasks
            .get_mut(self.len)
            .ok_or(SchedulerError::TooManyTasks)?;
        *slot = Some(Task {
            trigger,
            reaction,
            runs: 0,
        });
        let id = TaskId(self.len);
        self.len += 1;
        Ok(id)
    }

    /// Seal the task table and start all periodic intervals at `now`
    pub fn start(&mut self, now: Millis) {
        for task in self.tasks_mut() {
            if let Trigger::Every { last_ms, .. } = &mut task.trigger {
                *last_ms = now;
            }
        }
        self.started = true;
    }

    /// Run everything that is due at `now`
    ///
    /// Returns the number of reactions invoked. A scheduler that was never
    /// started is started by its first tick, which runs nothing periodic.
    pub fn tick(&mut self, now: Millis) -> usize {
        if !self.started {
            self.start(now);
        }

        let mut ran = 0;

        for task in self.tasks_mut() {
            if let Trigger::Event(source) = task.trigger {
                if source.take_pending() {
                    task.run(now);
                    ran += 1;
                }
            }
        }

        for task in self.tasks_mut() {
            if let Trigger::Every {
                interval_ms,
                ref mut last_ms,
            } = task.trigger
            {
                if elapsed_ms(now, *last_ms) >= interval_ms {
                    // Advance by whole intervals to avoid drift; if we fell
                    // more than one interval behind, resync instead of
                    // bursting.
                    *last_ms = last_ms.wrapping_add(interval_ms);
                    if elapsed_ms(now, *last_ms) >= interval_ms {
                        *last_ms = now;
                    }
                    task.run(now);
                    ran += 1;
                }
            }
        }

        for task in self.tasks_mut() {
            if matches!(task.trigger, Trigger::Tick) {
                task.run(now);
                ran += 1;
            }
        }

        ran
    }

    /// How many times a task has run
    pub fn runs(&self, id: TaskId) -> u32 {
        self.tasks
            .get(id.0)
            .and_then(Option::as_ref)
            .map_or(0, |t| t.runs)
    }

    /// Whether [`start`](Self::start) has been called
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no tasks are registered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task<'a>> + '_ {
        self.tasks[..self.len].iter_mut().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InterruptFlag;
    use core::cell::Cell;

    struct Counter {
        hits: Cell<u32>,
        last_now: Cell<Millis>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                hits: Cell::new(0),
                last_now: Cell::new(0),
            }
        }
    }

    impl Reaction for Counter {
        fn react(&self, now: Millis) {
            self.hits.set(self.hits.get() + 1);
            self.last_now.set(now);
        }
    }

    #[test]
    fn test_scheduler_creation() {
        let sched: Scheduler<'_> = Scheduler::new();
        assert!(sched.is_empty());
        assert!(!sched.is_started());
    }

    #[test]
    fn test_periodic_runs_on_interval() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        let id = sched.register_periodic(500, &counter).unwrap();
        sched.start(0);

        for now in (0..=2000).step_by(100) {
            sched.tick(now);
        }

        assert_eq!(counter.hits.get(), 4);
        assert_eq!(sched.runs(id), 4);
        assert_eq!(counter.last_now.get(), 2000);
    }

    #[test]
    fn test_periodic_does_not_drift() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_periodic(100, &counter).unwrap();
        sched.start(0);

        // Ticks arrive 30ms apart, so each run is a little late
        for now in (0..=1000).step_by(30) {
            sched.tick(now);
        }

        // 100, 200, ... 900 are all observed by the 990ms tick
        assert_eq!(counter.hits.get(), 9);
    }

    #[test]
    fn test_late_tick_does_not_burst() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_periodic(100, &counter).unwrap();
        sched.start(0);

        assert_eq!(sched.tick(1000), 1);
        assert_eq!(sched.tick(1001), 0);
        assert_eq!(sched.tick(1100), 1);
    }

    #[test]
    fn test_event_runs_once_per_raise() {
        let flag = InterruptFlag::new();
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_event(&flag, &counter).unwrap();
        sched.start(0);

        sched.tick(1);
        assert_eq!(counter.hits.get(), 0);

        flag.raise();
        flag.raise();
        sched.tick(2);
        sched.tick(3);
        assert_eq!(counter.hits.get(), 1);
    }

    #[test]
    fn test_tick_reaction_every_tick() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_tick(&counter).unwrap();

        for now in 0..5 {
            sched.tick(now);
        }
        assert_eq!(counter.hits.get(), 5);
    }

    #[test]
    fn test_closure_reaction() {
        let hits = Cell::new(0u32);
        let bump = |_now: Millis| hits.set(hits.get() + 1);
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_periodic(10, &bump).unwrap();
        sched.start(0);
        sched.tick(10);
        sched.tick(20);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_registration_errors() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_, 2> = Scheduler::new();

        assert_eq!(
            sched.register_periodic(0, &counter),
            Err(SchedulerError::InvalidInterval)
        );
        sched.register_tick(&counter).unwrap();
        sched.register_tick(&counter).unwrap();
        assert_eq!(
            sched.register_tick(&counter),
            Err(SchedulerError::TooManyTasks)
        );
    }

    #[test]
    fn test_no_registration_after_start() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.start(0);
        assert_eq!(
            sched.register_periodic(100, &counter),
            Err(SchedulerError::AlreadyStarted)
        );
    }

    #[test]
    fn test_task_ids_past_255() {
        let ticker = Counter::new();
        let periodic = Counter::new();
        let mut sched: Scheduler<'_, 300> = Scheduler::new();
        for _ in 0..299 {
            sched.register_tick(&ticker).unwrap();
        }
        let id = sched.register_periodic(1000, &periodic).unwrap();
        sched.start(0);

        sched.tick(500);
        sched.tick(1000);
        assert_eq!(sched.len(), 300);
        assert_eq!(sched.runs(id), 1);
        assert_eq!(sched.runs(TaskId(0)), 2);
    }

    #[test]
    fn test_periodic_across_clock_wrap() {
        let counter = Counter::new();
        let mut sched: Scheduler<'_> = Scheduler::new();
        sched.register_periodic(100, &counter).unwrap();
        let start = u32::MAX - 150;
        sched.start(start);

        sched.tick(start.wrapping_add(100));
        sched.tick(start.wrapping_add(200));
        assert_eq!(counter.hits.get(), 2);
    }
}
