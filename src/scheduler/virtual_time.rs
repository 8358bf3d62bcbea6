//! Deterministic virtual-time scheduler

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{ Arc, Weak };
use std::time::Duration;
use parking_lot::Mutex;
use tracing::trace;

use super::{ Job, Scheduler };
use crate::disposable::Disposable;


type Key = (Duration, u64);


struct State {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<Key, Job>,
}


/// A scheduler whose clock only moves when told to.
///
/// Jobs run on the thread calling one of the `advance` methods. Jobs due at
/// the same instant run in the order they were scheduled, and jobs scheduled
/// by a running job are picked up by the same `advance` call if they fall due
/// within its range.
///
/// ```
/// # use reactant::{ Scheduler, TestScheduler };
/// # use std::sync::{ Arc, Mutex };
/// # use std::time::Duration;
/// let scheduler = TestScheduler::new();
/// let fired = Arc::new(Mutex::new(false));
/// scheduler.schedule_after(Duration::from_secs(5), Box::new({
///     let fired = fired.clone();
///     move || *fired.lock().unwrap() = true
/// }));
/// scheduler.advance_by(Duration::from_secs(4));
/// assert!(!*fired.lock().unwrap());
/// scheduler.advance_by(Duration::from_secs(1));
/// assert!(*fired.lock().unwrap());
/// ```
#[derive(Clone)]
pub struct TestScheduler {
    state: Arc<Mutex<State>>,
}

impl TestScheduler {
    /// Create a scheduler at time zero.
    pub fn new() -> TestScheduler {
        TestScheduler {
            state: Arc::new(Mutex::new(State {
                now: Duration::from_secs(0),
                next_seq: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// Run everything that is due now.
    pub fn advance(&self) {
        self.advance_by(Duration::from_secs(0));
    }

    /// Move the clock forward by `interval`, running everything due on the way.
    pub fn advance_by(&self, interval: Duration) {
        let target = self.now().checked_add(interval).unwrap_or(Duration::MAX);
        self.advance_to(target);
    }

    /// Move the clock to `target`, running everything due on the way. The
    /// clock never goes backwards.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let job = {
                let mut state = self.state.lock();
                let due = state.queue.keys().next().cloned()
                    .filter(|&(due, _)| due <= target);
                match due {
                    Some(key) => {
                        if key.0 > state.now {
                            state.now = key.0;
                        }
                        state.queue.remove(&key)
                    },
                    None => {
                        if target > state.now {
                            state.now = target;
                        }
                        None
                    },
                }
            };
            match job {
                Some(job) => {
                    trace!(now = ?self.now(), "test scheduler running job");
                    job();
                },
                None => break,
            }
        }
    }

    /// Run until no jobs are left, moving the clock as far as needed.
    pub fn run(&self) {
        loop {
            let last = self.state.lock().queue.keys().next_back().map(|&(due, _)| due);
            match last {
                Some(due) => self.advance_to(due),
                None => break,
            }
        }
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl Default for TestScheduler {
    fn default() -> TestScheduler { TestScheduler::new() }
}

impl fmt::Debug for TestScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TestScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl Scheduler for TestScheduler {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn schedule_after(&self, delay: Duration, job: Job) -> Disposable {
        let key = {
            let mut state = self.state.lock();
            let key = (state.now.checked_add(delay).unwrap_or(Duration::MAX), state.next_seq);
            state.next_seq += 1;
            state.queue.insert(key, job);
            key
        };
        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        Disposable::new(move || {
            if let Some(state) = weak.upgrade() {
                let job = state.lock().queue.remove(&key);
                drop(job);
            }
        })
    }
}


#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;
    use parking_lot::Mutex;
    use super::*;

    fn secs(n: u64) -> Duration { Duration::from_secs(n) }

    fn push_later(scheduler: &TestScheduler, delay: Duration, log: &Arc<Mutex<Vec<u32>>>, n: u32) -> Disposable {
        let log = log.clone();
        scheduler.schedule_after(delay, Box::new(move || log.lock().push(n)))
    }

    #[test]
    fn runs_in_due_order() {
        let scheduler = TestScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        push_later(&scheduler, secs(3), &log, 3);
        push_later(&scheduler, secs(1), &log, 1);
        push_later(&scheduler, secs(2), &log, 2);
        scheduler.advance_by(secs(2));
        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(scheduler.now(), secs(2));
        scheduler.run();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(scheduler.now(), secs(3));
    }

    #[test]
    fn same_instant_runs_in_schedule_order() {
        let scheduler = TestScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        for n in 0..5 {
            push_later(&scheduler, secs(1), &log, n);
        }
        scheduler.advance_by(secs(1));
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn disposed_job_does_not_run() {
        let scheduler = TestScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        let handle = push_later(&scheduler, secs(1), &log, 1);
        handle.dispose();
        assert_eq!(scheduler.pending(), 0);
        scheduler.run();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn jobs_scheduled_by_jobs() {
        let scheduler = TestScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        {
            let scheduler2 = scheduler.clone();
            let log = log.clone();
            scheduler.schedule_after(secs(1), Box::new(move || {
                log.lock().push(1);
                push_later(&scheduler2, secs(1), &log, 2);
            }));
        }
        scheduler.advance_by(secs(5));
        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(scheduler.now(), secs(5));
    }

    #[test]
    fn advance_runs_immediate_jobs() {
        let scheduler = TestScheduler::new();
        let log = Arc::new(Mutex::new(vec![]));
        {
            let log = log.clone();
            scheduler.schedule(Box::new(move || log.lock().push(0)));
        }
        assert!(log.lock().is_empty());
        scheduler.advance();
        assert_eq!(*log.lock(), vec![0]);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let scheduler = TestScheduler::new();
        scheduler.advance_to(secs(10));
        scheduler.advance_to(secs(3));
        assert_eq!(scheduler.now(), secs(10));
    }

    #[test]
    fn far_future_saturates() {
        let scheduler = TestScheduler::new();
        let ran = Arc::new(Mutex::new(false));
        scheduler.advance_by(secs(1));
        {
            let ran = ran.clone();
            scheduler.schedule_after(Duration::MAX, Box::new(move || *ran.lock() = true));
        }
        scheduler.advance_by(secs(10));
        assert!(!*ran.lock());
        scheduler.run();
        assert!(*ran.lock());
        assert_eq!(scheduler.now(), Duration::MAX);
        scheduler.advance_by(secs(1));
        assert_eq!(scheduler.now(), Duration::MAX);
    }
}
