//! Tick-driven task queue.
//!
//! Tasks are `(run_at_tick, closure)` pairs over a context `C`. Nothing runs
//! on another thread; [`tick`] advances the clock by one and runs every task
//! that is due, in the order it was queued.

use std::collections::HashSet;

/// Returned by repeating tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Continue,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

type OnceTask<C> = Box<dyn FnOnce(&mut C)>;
type RepeatingTask<C> = Box<dyn FnMut(&mut C) -> Repeat>;

enum Job<C> {
    Once(OnceTask<C>),
    Repeating { interval: u64, task: RepeatingTask<C> },
}

struct Entry<C> {
    id: u64,
    run_at: u64,
    job: Job<C>,
}

pub struct Scheduler<C> {
    now: u64,
    next_id: u64,
    queue: Vec<Entry<C>>,
    cancelled: HashSet<u64>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 0,
            queue: Vec::new(),
            cancelled: HashSet::new(),
        }
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    fn push(&mut self, run_at: u64, job: Job<C>) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Entry { id, run_at, job });
        TaskHandle(id)
    }

    /// Run on the next tick.
    pub fn run_now(&mut self, task: impl FnOnce(&mut C) + 'static) -> TaskHandle {
        self.run_later(0, task)
    }

    /// Run `delay` ticks after the next one.
    pub fn run_later(&mut self, delay: u64, task: impl FnOnce(&mut C) + 'static) -> TaskHandle {
        self.push(self.now + 1 + delay, Job::Once(Box::new(task)))
    }

    /// Run every `interval` ticks (minimum 1), starting on the next tick,
    /// until the task returns [`Repeat::Done`] or is cancelled.
    pub fn run_repeating(
        &mut self,
        interval: u64,
        task: impl FnMut(&mut C) -> Repeat + 'static,
    ) -> TaskHandle {
        let interval = interval.max(1);
        self.push(
            self.now + 1,
            Job::Repeating {
                interval,
                task: Box::new(task),
            },
        )
    }

    /// Drop a task before its next run. Unknown or finished handles are ignored.
    pub fn cancel(&mut self, handle: TaskHandle) {
        if self.queue.iter().any(|e| e.id == handle.0) {
            self.cancelled.insert(handle.0);
        }
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.queue.iter().any(|e| e.id == handle.0) && !self.cancelled.contains(&handle.0)
    }

    /// Number of queued, uncancelled tasks.
    pub fn pending(&self) -> usize {
        self.queue.iter().filter(|e| !self.cancelled.contains(&e.id)).count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    fn take_due(&mut self) -> Vec<Entry<C>> {
        self.now += 1;
        let now = self.now;
        let (mut due, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.queue).into_iter().partition(|e| e.run_at <= now);
        self.queue = rest;
        due.sort_by_key(|e| (e.run_at, e.id));
        due
    }
}

/// A context that owns the scheduler its tasks run against.
pub trait TaskHost: Sized {
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

/// Advance the host's clock by one tick and run every due task.
///
/// Tasks queued while this tick runs are never run in the same tick.
/// Returns the number of tasks run.
pub fn tick<C: TaskHost>(ctx: &mut C) -> usize {
    let due = ctx.scheduler().take_due();
    let mut ran = 0;
    for entry in due {
        if ctx.scheduler().cancelled.remove(&entry.id) {
            continue;
        }
        ran += 1;
        match entry.job {
            Job::Once(task) => task(ctx),
            Job::Repeating { interval, mut task } => {
                let outcome = task(ctx);
                let scheduler = ctx.scheduler();
                if scheduler.cancelled.remove(&entry.id) || outcome == Repeat::Done {
                    continue;
                }
                let run_at = scheduler.now + interval;
                scheduler.queue.push(Entry {
                    id: entry.id,
                    run_at,
                    job: Job::Repeating { interval, task },
                });
            }
        }
    }
    ran
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Host {
        scheduler: Scheduler<Host>,
        log: Vec<String>,
    }

    impl TaskHost for Host {
        fn scheduler(&mut self) -> &mut Scheduler<Self> {
            &mut self.scheduler
        }
    }

    #[test]
    fn test_delays_and_queue_order() {
        let mut host = Host::default();
        host.scheduler.run_later(2, |h: &mut Host| h.log.push("late".into()));
        host.scheduler.run_now(|h: &mut Host| h.log.push("first".into()));
        host.scheduler.run_now(|h: &mut Host| h.log.push("second".into()));

        assert_eq!(tick(&mut host), 2);
        assert_eq!(host.log, vec!["first", "second"]);
        tick(&mut host);
        assert_eq!(host.log.len(), 2);
        tick(&mut host);
        assert_eq!(host.log, vec!["first", "second", "late"]);
        assert!(host.scheduler.is_idle());
    }

    #[test]
    fn test_task_scheduled_during_tick_runs_next_tick() {
        let mut host = Host::default();
        host.scheduler.run_now(|h: &mut Host| {
            h.log.push("outer".into());
            h.scheduler.run_now(|h: &mut Host| h.log.push("inner".into()));
        });
        tick(&mut host);
        assert_eq!(host.log, vec!["outer"]);
        tick(&mut host);
        assert_eq!(host.log, vec!["outer", "inner"]);
    }

    #[test]
    fn test_repeating_until_done() {
        let mut host = Host::default();
        let mut runs = 0;
        host.scheduler.run_repeating(2, move |h: &mut Host| {
            runs += 1;
            h.log.push(format!("run {runs} at {}", h.scheduler.now()));
            if runs == 3 { Repeat::Done } else { Repeat::Continue }
        });
        for _ in 0..10 {
            tick(&mut host);
        }
        assert_eq!(host.log, vec!["run 1 at 1", "run 2 at 3", "run 3 at 5"]);
        assert!(host.scheduler.is_idle());
    }

    #[test]
    fn test_cancel_before_run() {
        let mut host = Host::default();
        let handle = host.scheduler.run_repeating(1, |h: &mut Host| {
            h.log.push("tick".into());
            Repeat::Continue
        });
        tick(&mut host);
        tick(&mut host);
        assert!(host.scheduler.is_scheduled(handle));
        host.scheduler.cancel(handle);
        assert!(!host.scheduler.is_scheduled(handle));
        tick(&mut host);
        assert_eq!(host.log.len(), 2);
        assert_eq!(host.scheduler.pending(), 0);
    }
}
