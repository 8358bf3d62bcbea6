//! Current values derived from signals
//!
//! A `Property` is a signal with memory: it keeps the latest value seen on an
//! update channel, so that it can be read at any time.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use parking_lot::{ Mutex, ReentrantMutex };

use crate::disposable::{ Disposable, ScopedDisposable };
use crate::event::{ Event, NoError };
use crate::observer::Observer;
use crate::producer::SignalProducer;
use crate::signal::Signal;
use crate::source::with_weak;


struct Inner<T> {
    storage: Arc<Mutex<T>>,
    signal: Signal<T, NoError>,
    observation: ScopedDisposable,
    #[allow(dead_code)]
    run: Option<ScopedDisposable>,
}


/// A value that changes over time.
///
/// The value is updated whenever the update channel sends a value. Terminal
/// events on that channel stop the updates; the last value stays readable.
///
/// ```
/// # use reactant::{ NoError, Property, Signal };
/// let (signal, input) = Signal::<i32, NoError>::pipe();
/// let property = Property::new(0, signal);
/// input.send_value(3);
/// assert_eq!(property.value(), 3);
/// input.send_completed();
/// assert_eq!(property.value(), 3);
/// ```
pub struct Property<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Property<T> {
        Property { inner: self.inner.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.storage.lock())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Property<T> {
    /// Hold the latest value sent on `signal`, starting with `initial`.
    pub fn new(initial: T, signal: Signal<T, NoError>) -> Property<T> {
        Property::attach(initial, signal, None)
    }

    /// Start `producer` right away and hold its latest value.
    ///
    /// The run is disposed together with the last clone of the property.
    pub fn from_producer(initial: T, producer: SignalProducer<T, NoError>) -> Property<T> {
        producer.start_with_signal(|signal, handle| {
            Property::attach(initial, signal.clone(), Some(handle.scoped()))
        })
    }

    /// A property that never changes.
    pub fn constant(value: T) -> Property<T> {
        Property::attach(value, Signal::empty(), None)
    }

    fn attach(initial: T, signal: Signal<T, NoError>, run: Option<ScopedDisposable>) -> Property<T> {
        let storage = Arc::new(Mutex::new(initial));
        let observation = {
            let weak = Arc::downgrade(&storage);
            signal.subscribe(move |event| match event {
                Event::Value(value) => with_weak(&weak, |current| *current = value),
                _ => Ok(()),
            })
        };
        Property {
            inner: Arc::new(Inner {
                storage,
                signal,
                observation: observation.scoped(),
                run,
            }),
        }
    }

    /// The current value.
    pub fn value(&self) -> T {
        self.inner.storage.lock().clone()
    }

    /// The update channel. It does not replay the current value.
    pub fn signal(&self) -> Signal<T, NoError> {
        self.inner.signal.clone()
    }

    /// Stop following the update channel. The current value is kept.
    pub fn detach(&self) {
        self.inner.observation.handle().dispose();
    }

    /// A producer sending the value current at start, then every update.
    ///
    /// Once updates are over, runs complete right after the current value.
    /// An update racing with the start on another thread is never lost, but
    /// the run may see that value twice.
    pub fn producer(&self) -> SignalProducer<T, NoError> {
        let storage = self.inner.storage.clone();
        let signal = self.inner.signal.clone();
        SignalProducer::new(move |observer, lifetime| {
            let start = Arc::new(ReentrantMutex::new(RefCell::new(Start {
                sent: false,
                terminal: None,
            })));
            let forward = {
                let start = start.clone();
                let observer = observer.clone();
                Observer::new(move |event: Event<T, NoError>| {
                    let start = start.lock();
                    if start.borrow().sent {
                        observer.send(event);
                    } else if event.is_terminal() {
                        start.borrow_mut().terminal = Some(event);
                    }
                    // values before the start are already in storage
                })
            };
            // Attach first, so that every update either lands in storage
            // before the read below or reaches the run afterwards.
            let observation = signal.observe(forward);
            let start = start.lock();
            let current = storage.lock().clone();
            start.borrow_mut().sent = true;
            observer.send_value(current);
            let terminal = start.borrow_mut().terminal.take();
            if observation.is_disposed() {
                observer.send_completed();
            } else if let Some(terminal) = terminal {
                observer.send(terminal);
            }
            drop(start);
            lifetime.observe_ended(move || observation.dispose());
        })
    }
}


/// Progress of a run of `Property::producer`.
struct Start<T> {
    /// The current value went out; updates are forwarded from now on.
    sent: bool,
    /// A terminal event that arrived before the current value went out.
    terminal: Option<Event<T, NoError>>,
}


struct MutableInner<T> {
    property: Property<T>,
    input: Observer<T, NoError>,
    complete: Disposable,
}

impl<T> Drop for MutableInner<T> {
    fn drop(&mut self) {
        self.complete.dispose();
    }
}


/// A property that can be set directly.
///
/// Dropping the last clone completes the update channel. Read-only views
/// obtained through `property` stay valid and keep the last value.
///
/// ```
/// # use reactant::MutableProperty;
/// let counter = MutableProperty::new(0);
/// let view = counter.property();
/// counter.set(1);
/// counter.modify(|n| *n += 10);
/// assert_eq!(view.value(), 11);
/// ```
pub struct MutableProperty<T> {
    inner: Arc<MutableInner<T>>,
}

impl<T> Clone for MutableProperty<T> {
    fn clone(&self) -> MutableProperty<T> {
        MutableProperty { inner: self.inner.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MutableProperty")
            .field("value", &*self.inner.property.inner.storage.lock())
            .finish()
    }
}

impl<T: Clone + Send + 'static> MutableProperty<T> {
    /// Create a property holding `initial`.
    pub fn new(initial: T) -> MutableProperty<T> {
        let (signal, input) = Signal::pipe();
        let complete = {
            let input = input.clone();
            Disposable::new(move || input.send_completed())
        };
        MutableProperty {
            inner: Arc::new(MutableInner {
                property: Property::new(initial, signal),
                input,
                complete,
            }),
        }
    }

    /// The current value.
    pub fn value(&self) -> T {
        self.inner.property.value()
    }

    /// Replace the value and notify observers of the update channel.
    pub fn set(&self, value: T) {
        *self.inner.property.inner.storage.lock() = value.clone();
        self.inner.input.send_value(value);
    }

    /// Change the value in place and notify observers of the result.
    ///
    /// `f` runs with the value locked, so it must not read this property.
    pub fn modify<F, R>(&self, f: F) -> R
        where F: FnOnce(&mut T) -> R,
    {
        let (result, value) = {
            let mut storage = self.inner.property.inner.storage.lock();
            let result = f(&mut storage);
            (result, storage.clone())
        };
        self.inner.input.send_value(value);
        result
    }

    /// A read-only view of this property.
    pub fn property(&self) -> Property<T> {
        self.inner.property.clone()
    }

    /// The update channel.
    pub fn signal(&self) -> Signal<T, NoError> {
        self.inner.property.signal()
    }

    /// See `Property::producer`.
    pub fn producer(&self) -> SignalProducer<T, NoError> {
        self.inner.property.producer()
    }
}
