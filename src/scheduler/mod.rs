//! Timing collaborators
//!
//! The engine itself never waits. Anything that has to happen later is handed
//! to a `Scheduler`, which emission routines receive explicitly.

use std::sync::Arc;
use std::time::Duration;

use crate::disposable::Disposable;


mod queue;
mod virtual_time;

pub use self::queue::{ QueueScheduler, SchedulerError, WeakQueueScheduler };
pub use self::virtual_time::TestScheduler;


/// A unit of work handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;


/// Runs work after some delay.
pub trait Scheduler: Send + Sync {
    /// Time elapsed since the scheduler was created.
    fn now(&self) -> Duration;

    /// Run `job` once `delay` has passed. Disposing the returned handle before
    /// that keeps the job from running.
    fn schedule_after(&self, delay: Duration, job: Job) -> Disposable;

    /// Run `job` as soon as possible, after anything already due.
    fn schedule(&self, job: Job) -> Disposable {
        self.schedule_after(Duration::from_secs(0), job)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn schedule_after(&self, delay: Duration, job: Job) -> Disposable {
        (**self).schedule_after(delay, job)
    }

    fn schedule(&self, job: Job) -> Disposable {
        (**self).schedule(job)
    }
}
