//! Push-based reactive streams
//!
//! *Reactant* models values that arrive over time as streams of events. It
//! provides a small set of primitives rather than an operator algebra: you
//! create streams, observe them, cancel them, and keep track of their latest
//! values.
//!
//!
//! # Primitives
//!
//! An `Event` is either a value, or one of three terminal events: failure,
//! completion and interruption. A stream delivers any number of values,
//! followed by at most one terminal event.
//!
//! A `Signal` is a hot stream. It exists independently of whoever observes
//! it, and delivers each event synchronously to every observer attached at
//! that moment. `Signal::pipe` returns a signal together with its input
//! `Observer`, through which events are sent.
//!
//! A `SignalProducer` is a cold stream. It describes how to produce events,
//! but does nothing until started. Each start creates a new signal and a new
//! `Lifetime`, and runs the producer's `Emitter` with them. Disposing the
//! `Disposable` returned by `start` ends that lifetime.
//!
//! A `Property` keeps the latest value of a signal around, so that it can be
//! read at any time. `MutableProperty` can be set directly.
//!
//! An `Action` runs one producer at a time for some input, and turns away
//! invocations arriving while it is busy.
//!
//!
//! # Example
//!
//! ```
//! use std::sync::{ Arc, Mutex };
//! use std::time::Duration;
//! use reactant::{ NoError, Property, Scheduler, SignalProducer, TestScheduler };
//!
//! // A producer counting up once a second, on a virtual clock
//! let scheduler = TestScheduler::new();
//! let counter = {
//!     let scheduler = scheduler.clone();
//!     SignalProducer::<u32, NoError>::new(move |observer, lifetime| {
//!         for n in 1..=3u32 {
//!             let observer = observer.clone();
//!             let lifetime = lifetime.clone();
//!             scheduler.schedule_after(Duration::from_secs(n.into()), Box::new(move || {
//!                 if lifetime.has_ended() {
//!                     return observer.send_interrupted();
//!                 }
//!                 observer.send_value(n);
//!                 if n == 3 {
//!                     observer.send_completed();
//!                 }
//!             }));
//!         }
//!     })
//! };
//!
//! // Every start is an independent run
//! let seen = Arc::new(Mutex::new(vec![]));
//! counter.start_with_values({
//!     let seen = seen.clone();
//!     move |n| seen.lock().unwrap().push(n)
//! });
//!
//! // A property tracks the latest value of another run
//! let latest = Property::from_producer(0, counter.clone());
//!
//! scheduler.advance_by(Duration::from_secs(2));
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! assert_eq!(latest.value(), 2);
//!
//! scheduler.run();
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
//! assert_eq!(latest.value(), 3);
//! ```
//!
//!
//! # Time and cancellation
//!
//! Nothing in this crate waits. Delayed work goes through a `Scheduler` that
//! is handed to emitters explicitly: `TestScheduler` for virtual time and
//! `QueueScheduler` for a worker thread.
//!
//! Cancellation is cooperative. Disposing a run ends its lifetime and
//! detaches the observer that started it, but work already handed to a
//! scheduler still runs. Emitters either check `Lifetime::has_ended` before
//! sending, or cancel their scheduled work from `Lifetime::observe_ended`.
//!
//!
//! # Threads
//!
//! All types are `Send + Sync`. A signal serializes delivery: events sent
//! while another event is being delivered, from an observer or from another
//! thread, are queued and delivered in order afterwards. No internal lock is
//! held while observers run, so observers may freely send, observe and
//! dispose.

#![warn(missing_docs)]

pub use crate::action::{ Action, ActionError };
pub use crate::disposable::{ CompositeDisposable, Disposable, ScopedDisposable };
pub use crate::event::{ Event, NoError };
pub use crate::lifetime::{ Lifetime, LifetimeToken };
pub use crate::observer::{ Observer, ObserverBuilder };
pub use crate::producer::{ Emitter, SignalProducer };
pub use crate::property::{ MutableProperty, Property };
pub use crate::scheduler::{ Job, QueueScheduler, Scheduler, SchedulerError, TestScheduler, WeakQueueScheduler };
pub use crate::signal::Signal;

mod source;
mod event;
mod disposable;
mod lifetime;
mod observer;
mod signal;
mod producer;
mod property;
mod action;
pub mod scheduler;

#[cfg(test)]
mod testing;
