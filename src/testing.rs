//! Utilities for the test suite.

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;

use crate::event::{ Event, NoError };
use crate::observer::Observer;
use crate::producer::SignalProducer;
use crate::scheduler::{ Scheduler, TestScheduler };
use crate::signal::Signal;


/// Records every event it observes.
pub struct Recorder<T, E> {
    events: Arc<Mutex<Vec<Event<T, E>>>>,
}

impl<T, E> Clone for Recorder<T, E> {
    fn clone(&self) -> Recorder<T, E> {
        Recorder { events: self.events.clone() }
    }
}

impl<T, E> Recorder<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    pub fn new() -> Recorder<T, E> {
        Recorder { events: Arc::new(Mutex::new(vec![])) }
    }

    /// An observer appending to this recorder.
    pub fn observer(&self) -> Observer<T, E> {
        let events = self.events.clone();
        Observer::new(move |event| events.lock().push(event))
    }

    pub fn events(&self) -> Vec<Event<T, E>> {
        self.events.lock().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.events.lock().iter().filter_map(|e| e.value().cloned()).collect()
    }

    /// The terminal event, if one was recorded.
    pub fn terminal(&self) -> Option<Event<T, E>> {
        self.events.lock().iter().find(|e| e.is_terminal()).cloned()
    }
}


/// Attach a fresh recorder to a signal.
pub fn record<T, E>(signal: &Signal<T, E>) -> Recorder<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    let recorder = Recorder::new();
    signal.observe(recorder.observer());
    recorder
}


/// Sends `0..ticks`, one every `interval` starting right away, then completes.
///
/// Like most hand-written routines it only polls the lifetime when a tick
/// fires and reports interruption then.
pub fn ticker(scheduler: &TestScheduler, ticks: u32, interval: Duration) -> SignalProducer<u32, NoError> {
    let scheduler = scheduler.clone();
    SignalProducer::new(move |observer, lifetime| {
        for tick in 0..ticks {
            let observer = observer.clone();
            let lifetime = lifetime.clone();
            scheduler.schedule_after(interval * tick, Box::new(move || {
                if lifetime.has_ended() {
                    observer.send_interrupted();
                    return;
                }
                observer.send_value(tick);
                if tick + 1 == ticks {
                    observer.send_completed();
                }
            }));
        }
    })
}
