//! Thread-backed timer queue

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::mem;
use std::sync::{ Arc, Weak };
use std::thread;
use std::time::{ Duration, Instant };
use parking_lot::{ Condvar, Mutex, MutexGuard };
use lazy_static::lazy_static;
use thiserror::Error;
use tracing::{ debug, trace };

use super::{ Job, Scheduler };
use crate::disposable::Disposable;


lazy_static! {
    /// The shared scheduler behind `QueueScheduler::main`.
    static ref MAIN: QueueScheduler = QueueScheduler::new("reactant.main")
        .expect("failed to start the main scheduler");
}


/// Errors raised when setting up a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread `{name}`")]
    Spawn {
        /// Name of the scheduler.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}


type Key = (Instant, u64);

/// Longer delays are cut down to this; such jobs never run in practice.
const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);


struct State {
    queue: BTreeMap<Key, Job>,
    next_seq: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

impl Shared {
    fn run(&self, name: &str) {
        let mut state = self.state.lock();
        while !state.shutdown {
            let next = state.queue.keys().next().cloned();
            match next {
                Some(key) if key.0 <= Instant::now() => {
                    if let Some(job) = state.queue.remove(&key) {
                        trace!(scheduler = name, "running job");
                        MutexGuard::unlocked(&mut state, job);
                    }
                },
                Some((due, _)) => {
                    self.wakeup.wait_until(&mut state, due);
                },
                None => self.wakeup.wait(&mut state),
            }
        }
        let discarded = mem::replace(&mut state.queue, BTreeMap::new());
        drop(state);
        debug!(scheduler = name, discarded = discarded.len(), "scheduler stopped");
    }

    fn enqueue(shared: &Arc<Shared>, name: &str, delay: Duration, job: Job) -> Disposable {
        let due = match Instant::now().checked_add(delay.min(MAX_DELAY)) {
            Some(due) => due,
            None => {
                trace!(scheduler = name, ?delay, "delay out of range, job dropped");
                return Disposable::disposed();
            },
        };
        let key = {
            let mut state = shared.state.lock();
            let key = (due, state.next_seq);
            state.next_seq += 1;
            state.queue.insert(key, job);
            key
        };
        shared.wakeup.notify_one();
        let weak: Weak<Shared> = Arc::downgrade(shared);
        Disposable::new(move || {
            if let Some(shared) = weak.upgrade() {
                let job = shared.state.lock().queue.remove(&key);
                drop(job);
            }
        })
    }
}


/// Stops the worker once the last scheduler handle is gone.
struct Worker {
    shared: Arc<Shared>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wakeup.notify_all();
    }
}


/// A serial queue running jobs on its own thread, in due order.
///
/// This plays the part of a GUI main queue: emission routines that schedule
/// work on it are called back on the worker thread, one job at a time.
/// Dropping the last clone of a scheduler stops its thread; jobs that have
/// not run by then are discarded.
///
/// A queued job holding a clone keeps the thread alive, even if that job
/// only ever reschedules itself. Jobs that need to schedule follow-up work
/// should capture the handle returned by `downgrade` instead.
#[derive(Clone)]
pub struct QueueScheduler {
    shared: Arc<Shared>,
    started: Instant,
    name: Arc<str>,
    #[allow(dead_code)]
    worker: Arc<Worker>,
}

impl QueueScheduler {
    /// Start a scheduler with a dedicated worker thread.
    pub fn new(name: &str) -> Result<QueueScheduler, SchedulerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: BTreeMap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let name: Arc<str> = Arc::from(name);
        thread::Builder::new()
            .name(name.to_string())
            .spawn({
                let shared = shared.clone();
                let name = name.clone();
                move || shared.run(&name)
            })
            .map_err(|source| SchedulerError::Spawn { name: name.to_string(), source })?;
        debug!(scheduler = &*name, "scheduler started");
        Ok(QueueScheduler {
            worker: Arc::new(Worker { shared: shared.clone() }),
            shared,
            started: Instant::now(),
            name,
        })
    }

    /// A process-wide scheduler, started on first use.
    ///
    /// It still has to be handed to whoever needs it; nothing in this crate
    /// picks it up implicitly.
    pub fn main() -> QueueScheduler {
        MAIN.clone()
    }

    /// The name of the worker thread.
    pub fn name(&self) -> &str { &self.name }

    /// A handle that schedules on this queue without keeping it running.
    pub fn downgrade(&self) -> WeakQueueScheduler {
        WeakQueueScheduler {
            worker: Arc::downgrade(&self.worker),
            started: self.started,
            name: self.name.clone(),
        }
    }
}

impl fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("name", &self.name)
            .field("pending", &self.shared.state.lock().queue.len())
            .finish()
    }
}

impl Scheduler for QueueScheduler {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn schedule_after(&self, delay: Duration, job: Job) -> Disposable {
        Shared::enqueue(&self.shared, &self.name, delay, job)
    }
}


/// A `QueueScheduler` handle that does not keep the worker thread alive.
///
/// Once every strong handle is gone, jobs scheduled through it are dropped
/// without running.
#[derive(Clone)]
pub struct WeakQueueScheduler {
    worker: Weak<Worker>,
    started: Instant,
    name: Arc<str>,
}

impl WeakQueueScheduler {
    /// A strong handle, if the worker is still running.
    pub fn upgrade(&self) -> Option<QueueScheduler> {
        let worker = self.worker.upgrade()?;
        Some(QueueScheduler {
            shared: worker.shared.clone(),
            started: self.started,
            name: self.name.clone(),
            worker,
        })
    }
}

impl fmt::Debug for WeakQueueScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WeakQueueScheduler")
            .field("name", &self.name)
            .field("running", &(self.worker.strong_count() > 0))
            .finish()
    }
}

impl Scheduler for WeakQueueScheduler {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn schedule_after(&self, delay: Duration, job: Job) -> Disposable {
        match self.worker.upgrade() {
            Some(worker) => Shared::enqueue(&worker.shared, &self.name, delay, job),
            None => {
                trace!(scheduler = &*self.name, "scheduler stopped, job dropped");
                Disposable::disposed()
            },
        }
    }
}
