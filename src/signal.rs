//! Hot, multicast event channels

use std::collections::VecDeque;
use std::fmt;
use std::sync::{ Arc, Weak };
use parking_lot::{ Mutex, MutexGuard };
use tracing::trace;

use crate::disposable::Disposable;
use crate::event::{ Event, NoError };
use crate::lifetime::{ Lifetime, LifetimeToken };
use crate::observer::Observer;
use crate::source::{ deliver, CallbackResult, Slot, Source };


struct State<T, E> {
    source: Source<Event<T, E>>,
    queue: VecDeque<Event<T, E>>,
    /// Some thread is currently delivering events.
    sending: bool,
    /// A terminal event has been accepted; it may still be queued.
    closed: bool,
    /// The terminal event has been delivered.
    terminated: bool,
}

struct Core<T, E> {
    state: Mutex<State<T, E>>,
    token: LifetimeToken,
}

impl<T, E> Core<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    fn new() -> Core<T, E> {
        let (_, token) = Lifetime::make();
        Core {
            state: Mutex::new(State {
                source: Source::new(),
                queue: VecDeque::new(),
                sending: false,
                closed: false,
                terminated: false,
            }),
            token,
        }
    }

    /// Accept an event and, unless another call is already delivering,
    /// deliver everything queued.
    ///
    /// Events sent while a delivery is in progress, be it from within an
    /// observer or from another thread, are appended to the queue and handed
    /// out by the delivering call once the current event has reached every
    /// observer. Thus observers see events in send order and are never
    /// re-entered.
    fn send(&self, event: Event<T, E>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if event.is_terminal() {
            state.closed = true;
        }
        state.queue.push_back(event);
        if state.sending {
            return;
        }
        state.sending = true;
        let mut delivery = Delivery { state };
        let terminated = delivery.run();
        drop(delivery);
        if terminated {
            trace!("signal terminated");
            self.token.end();
        }
    }

    fn subscribe<F>(core: &Arc<Core<T, E>>, callback: F) -> Disposable
        where F: FnMut(Event<T, E>) -> CallbackResult + Send + 'static
    {
        let slot = {
            let mut state = core.state.lock();
            if state.terminated {
                return Disposable::disposed();
            }
            state.source.register(callback)
        };
        let key = slot.key();
        let slot: Weak<Slot<Event<T, E>>> = Arc::downgrade(&slot);
        let weak: Weak<Core<T, E>> = Arc::downgrade(core);
        Disposable::new(move || {
            // A terminal delivery may hold the slot after draining the source.
            if let Some(slot) = slot.upgrade() {
                slot.deactivate();
            }
            if let Some(core) = weak.upgrade() {
                let removed = core.state.lock().source.unregister(key);
                drop(removed);
            }
        })
    }
}


/// The state lock held by the delivering call.
///
/// Dropping it clears the `sending` flag, so a panicking observer does not
/// leave the signal mute.
struct Delivery<'a, T, E> {
    state: MutexGuard<'a, State<T, E>>,
}

impl<'a, T, E> Delivery<'a, T, E>
    where T: Clone,
          E: Clone,
{
    /// Deliver queued events until the queue runs dry or a terminal event
    /// went out. Returns whether it did.
    fn run(&mut self) -> bool {
        let state = &mut self.state;
        while let Some(event) = state.queue.pop_front() {
            let terminal = event.is_terminal();
            let slots = if terminal {
                state.terminated = true;
                state.queue.clear();
                state.source.drain()
            } else {
                state.source.snapshot()
            };
            let failed = MutexGuard::unlocked(state, || deliver(&slots, event));
            let removed = state.source.unregister_all(&failed);
            MutexGuard::unlocked(state, move || {
                drop(removed);
                drop(slots);
            });
            if terminal {
                return true;
            }
        }
        false
    }
}

impl<'a, T, E> Drop for Delivery<'a, T, E> {
    fn drop(&mut self) {
        self.state.sending = false;
    }
}


/// A hot, multicast stream of events.
///
/// A signal delivers each event synchronously to all observers attached at
/// that moment, in the order they were attached. Observers attached later do
/// not see earlier events. After a terminal event (failure, completion or
/// interruption) the signal is dead: every observer is detached and nothing
/// reaches new observers.
///
/// Signals are `Clone`. All clones refer to the same channel.
///
/// ```
/// # use reactant::{ NoError, Signal };
/// # use std::sync::{ Arc, Mutex };
/// let (signal, input) = Signal::<i32, NoError>::pipe();
/// let seen = Arc::new(Mutex::new(vec![]));
/// signal.observe_values({
///     let seen = seen.clone();
///     move |v| seen.lock().unwrap().push(v)
/// });
/// input.send_value(1);
/// input.send_value(2);
/// input.send_completed();
/// input.send_value(3); // ignored, the signal is dead
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub struct Signal<T, E = NoError> {
    core: Arc<Core<T, E>>,
}

impl<T, E> Clone for Signal<T, E> {
    fn clone(&self) -> Signal<T, E> {
        Signal { core: self.core.clone() }
    }
}

impl<T, E> fmt::Debug for Signal<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Signal")
            .field("observers", &state.source.len())
            .field("terminated", &state.terminated)
            .finish()
    }
}

impl<T, E> Signal<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    /// Create a signal together with the observer feeding it.
    ///
    /// A pipe never terminates by itself; only an explicit terminal event
    /// sent into the input ends it.
    pub fn pipe() -> (Signal<T, E>, Observer<T, E>) {
        let core = Arc::new(Core::new());
        let input = {
            let core = core.clone();
            Observer::new(move |event| core.send(event))
        };
        (Signal { core }, input)
    }

    /// Create a signal and hand its input to `generator` right away.
    ///
    /// The generator also receives the lifetime of the signal, which ends as
    /// soon as the signal terminates.
    pub fn new<G>(generator: G) -> Signal<T, E>
        where G: FnOnce(Observer<T, E>, &Lifetime),
    {
        let (signal, input) = Signal::pipe();
        let lifetime = signal.lifetime();
        generator(input, &lifetime);
        signal
    }

    /// A signal that never sends anything.
    pub fn never() -> Signal<T, E> {
        Signal::pipe().0
    }

    /// A signal that has already been interrupted.
    pub fn empty() -> Signal<T, E> {
        let (signal, input) = Signal::pipe();
        input.send_interrupted();
        signal
    }

    /// Attach an observer. Disposing the returned handle detaches it.
    ///
    /// Observing a terminated signal does nothing and returns a disposed
    /// handle.
    pub fn observe(&self, observer: Observer<T, E>) -> Disposable {
        self.subscribe(move |event| {
            observer.send(event);
            Ok(())
        })
    }

    /// Attach a raw callback. The callback is detached once it returns an
    /// error.
    pub(crate) fn subscribe<F>(&self, callback: F) -> Disposable
        where F: FnMut(Event<T, E>) -> CallbackResult + Send + 'static
    {
        Core::subscribe(&self.core, callback)
    }

    /// Observe the values only.
    pub fn observe_values<F>(&self, f: F) -> Disposable
        where F: Fn(T) + Send + Sync + 'static,
    {
        self.observe(Observer::builder().on_value(f).build())
    }

    /// Observe failure only.
    pub fn observe_failed<F>(&self, f: F) -> Disposable
        where F: Fn(E) + Send + Sync + 'static,
    {
        self.observe(Observer::builder().on_failed(f).build())
    }

    /// Observe completion only.
    pub fn observe_completed<F>(&self, f: F) -> Disposable
        where F: Fn() + Send + Sync + 'static,
    {
        self.observe(Observer::builder().on_completed(f).build())
    }

    /// Observe interruption only.
    pub fn observe_interrupted<F>(&self, f: F) -> Disposable
        where F: Fn() + Send + Sync + 'static,
    {
        self.observe(Observer::builder().on_interrupted(f).build())
    }

    /// The lifetime of the signal. It ends once a terminal event has been
    /// delivered.
    pub fn lifetime(&self) -> Lifetime {
        self.core.token.lifetime()
    }

    /// Whether a terminal event has been delivered.
    pub fn is_terminated(&self) -> bool {
        self.core.state.lock().terminated
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.core.state.lock().source.len()
    }
}
