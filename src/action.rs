//! Serialized commands
//!
//! An `Action` runs at most one producer at a time. Invocations arriving while
//! it is busy are turned away rather than queued, which suits user-triggered
//! work such as validating a form field: overlapping triggers collapse into
//! the run already underway.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use parking_lot::ReentrantMutex;
use thiserror::Error;
use tracing::debug;

use crate::disposable::Disposable;
use crate::event::{ Event, NoError };
use crate::observer::Observer;
use crate::producer::SignalProducer;
use crate::property::{ MutableProperty, Property };
use crate::signal::Signal;


/// Why an applied action did not produce its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ActionError<E> {
    /// The action was busy with another invocation.
    #[error("action is disabled")]
    Disabled,
    /// The inner producer failed.
    #[error("{0}")]
    Producer(E),
}

impl<E> ActionError<E> {
    /// The error of the inner producer, if that is what failed.
    pub fn producer_error(&self) -> Option<&E> {
        match *self {
            ActionError::Producer(ref e) => Some(e),
            ActionError::Disabled => None,
        }
    }
}


type Execute<I, O, E> = Box<dyn Fn(I) -> SignalProducer<O, E> + Send + Sync + 'static>;


struct Inner<I, O, E> {
    execute: Execute<I, O, E>,
    /// Held across a state change and the updates of both flags, so that
    /// concurrent transitions cannot interleave. Re-entrant, because flag
    /// observers may apply the action again.
    busy: ReentrantMutex<Cell<bool>>,
    is_executing: MutableProperty<bool>,
    is_enabled: MutableProperty<bool>,
    values: (Signal<O, NoError>, Observer<O, NoError>),
    errors: (Signal<E, NoError>, Observer<E, NoError>),
    events: (Signal<Event<O, E>, NoError>, Observer<Event<O, E>, NoError>),
    complete: Disposable,
}

impl<I, O, E> Inner<I, O, E>
    where O: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    /// Switch to executing. Fails if the action already is.
    fn begin(&self) -> bool {
        let busy = self.busy.lock();
        if busy.get() {
            return false;
        }
        busy.set(true);
        debug!("action executing");
        self.is_executing.set(true);
        self.is_enabled.set(false);
        true
    }

    /// Switch back to idle.
    fn finish(&self) {
        let busy = self.busy.lock();
        busy.set(false);
        debug!("action idle");
        self.is_executing.set(false);
        self.is_enabled.set(true);
    }

    /// Hand an event of the inner run to the output channels.
    fn forward(&self, event: &Event<O, E>) {
        match *event {
            Event::Value(ref value) => self.values.1.send_value(value.clone()),
            Event::Failed(ref error) => self.errors.1.send_value(error.clone()),
            _ => (),
        }
        self.events.1.send_value(event.clone());
    }
}

impl<I, O, E> Drop for Inner<I, O, E> {
    fn drop(&mut self) {
        self.complete.dispose();
    }
}


/// A command running one producer per invocation, one invocation at a time.
///
/// `apply` returns a producer. Starting it while the action is idle takes a
/// snapshot of the state, builds the inner producer from it and the input,
/// and starts it. Its values and errors are forwarded to `values` and
/// `errors`, all of its events to `events`, and everything to the starter as
/// well. Once the inner run terminates, the action is idle again.
///
/// Starting an applied producer while the action is executing does not build
/// the inner producer and leaves the output channels alone. Only the starter
/// of that invocation learns about it, through `ActionError::Disabled`.
///
/// The output channels complete when the last clone of the action, and the
/// last producer returned by `apply`, are gone.
///
/// ```
/// # use reactant::{ Action, NoError, SignalProducer };
/// # use std::sync::{ Arc, Mutex };
/// let double = Action::new(|n: i32| SignalProducer::<i32, NoError>::value(n * 2));
/// let seen = Arc::new(Mutex::new(vec![]));
/// double.values().observe_values({
///     let seen = seen.clone();
///     move |v| seen.lock().unwrap().push(v)
/// });
/// double.apply(2).start_detached();
/// double.apply(5).start_detached();
/// assert_eq!(*seen.lock().unwrap(), vec![4, 10]);
/// ```
pub struct Action<I, O, E = NoError> {
    inner: Arc<Inner<I, O, E>>,
}

impl<I, O, E> Clone for Action<I, O, E> {
    fn clone(&self) -> Action<I, O, E> {
        Action { inner: self.inner.clone() }
    }
}

impl<I, O, E> fmt::Debug for Action<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Action")
            .field("executing", &self.inner.busy.lock().get())
            .finish()
    }
}

impl<I, O, E> Action<I, O, E>
    where I: Clone + Send + Sync + 'static,
          O: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    /// Create an action building its producer from the input alone.
    pub fn new<F>(execute: F) -> Action<I, O, E>
        where F: Fn(I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        let values = Signal::pipe();
        let errors = Signal::pipe();
        let events = Signal::pipe();
        let complete = {
            let values = values.1.clone();
            let errors = errors.1.clone();
            let events = events.1.clone();
            Disposable::new(move || {
                values.send_completed();
                errors.send_completed();
                events.send_completed();
            })
        };
        Action {
            inner: Arc::new(Inner {
                execute: Box::new(execute),
                busy: ReentrantMutex::new(Cell::new(false)),
                is_executing: MutableProperty::new(false),
                is_enabled: MutableProperty::new(true),
                values,
                errors,
                events,
                complete,
            }),
        }
    }

    /// Create an action whose producer also depends on the value of `state`
    /// at the moment an invocation starts.
    pub fn with_state<S, F>(state: Property<S>, execute: F) -> Action<I, O, E>
        where S: Clone + Send + 'static,
              F: Fn(&S, I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        Action::new(move |input| execute(&state.value(), input))
    }

    /// A producer invoking the action with `input` once started.
    pub fn apply(&self, input: I) -> SignalProducer<O, ActionError<E>> {
        let inner = self.inner.clone();
        SignalProducer::new(move |observer, lifetime| {
            if !inner.begin() {
                debug!("action busy, invocation ignored");
                observer.send_failed(ActionError::Disabled);
                return;
            }
            let producer = (inner.execute)(input.clone());
            let forward = {
                let inner = inner.clone();
                Observer::new(move |event: Event<O, E>| {
                    inner.forward(&event);
                    if event.is_terminal() {
                        inner.finish();
                    }
                    observer.send(event.map_error(ActionError::Producer));
                })
            };
            let run = producer.start_with_signal(|signal, handle| {
                signal.observe(forward);
                handle
            });
            lifetime.observe_ended(move || run.dispose());
        })
    }

    /// Values of all invocations.
    pub fn values(&self) -> Signal<O, NoError> {
        self.inner.values.0.clone()
    }

    /// Failures of all invocations. Turned away invocations do not count.
    pub fn errors(&self) -> Signal<E, NoError> {
        self.inner.errors.0.clone()
    }

    /// Every event of every invocation.
    pub fn events(&self) -> Signal<Event<O, E>, NoError> {
        self.inner.events.0.clone()
    }

    /// Whether the action is idle and would accept an invocation.
    pub fn is_enabled(&self) -> Property<bool> {
        self.inner.is_enabled.property()
    }

    /// Whether an invocation is underway.
    pub fn is_executing(&self) -> Property<bool> {
        self.inner.is_executing.property()
    }
}
