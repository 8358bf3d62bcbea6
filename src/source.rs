//! Event sources and callbacks.
//!
//! This is a light-weight implementation of the observer pattern. Subjects are
//! modelled as the `Source` type and observers as boxed closures. A source
//! never calls its callbacks itself: it hands out a snapshot of them, so that
//! the caller can deliver without holding any lock and callbacks are free to
//! register or unregister while a delivery is underway.

use std::sync::{ Arc, Weak };
use std::sync::atomic::{ AtomicBool, Ordering };
use parking_lot::Mutex;


/// An error that can occur with a weakly referenced callback.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CallbackError {
    Disappeared,
}

/// Shorthand for common callback results.
pub type CallbackResult<T=()> = Result<T, CallbackError>;

/// A boxed callback.
type Callback<A> = Box<dyn FnMut(A) -> CallbackResult + Send + 'static>;


/// Perform some callback on a weak reference to a mutex and handle errors
/// gracefully.
pub fn with_weak<T, U, F: FnOnce(&mut T) -> U>(weak: &Weak<Mutex<T>>, f: F) -> CallbackResult<U> {
    weak.upgrade()
        .ok_or(CallbackError::Disappeared)
        .map(|mutex| f(&mut mutex.lock()))
}


/// Key of a registered callback.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct CallbackKey(u64);


/// A registered callback.
///
/// Unregistering a slot deactivates it immediately, so a snapshot taken before
/// will skip it.
pub struct Slot<A> {
    key: CallbackKey,
    active: AtomicBool,
    callback: Mutex<Callback<A>>,
}

impl<A> Slot<A> {
    /// Invoke the callback, unless the slot has been deactivated.
    pub fn call(&self, a: A) -> CallbackResult {
        if !self.active.load(Ordering::Acquire) {
            return Ok(());
        }
        (self.callback.lock())(a)
    }

    /// The key the slot was registered under.
    pub fn key(&self) -> CallbackKey { self.key }

    /// Stop the callback from being invoked, even through a snapshot or a
    /// drained batch that still holds the slot.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}


/// An event source.
pub struct Source<A> {
    slots: Vec<Arc<Slot<A>>>,
    next_key: u64,
}

impl<A> Source<A> {
    /// Create a new source.
    pub fn new() -> Source<A> {
        Source { slots: vec![], next_key: 0 }
    }

    /// Register a callback. The callback will be a mutable closure that takes
    /// an event and must return a result. To unsubscribe from further events,
    /// the callback has to return an error.
    pub fn register<F>(&mut self, callback: F) -> Arc<Slot<A>>
        where F: FnMut(A) -> CallbackResult + Send + 'static
    {
        let key = CallbackKey(self.next_key);
        self.next_key += 1;
        let slot = Arc::new(Slot {
            key,
            active: AtomicBool::new(true),
            callback: Mutex::new(Box::new(callback)),
        });
        self.slots.push(slot.clone());
        slot
    }

    /// Remove a callback. The removed slot is handed back, so that the caller
    /// can drop it after releasing any lock around the source.
    pub fn unregister(&mut self, key: CallbackKey) -> Option<Arc<Slot<A>>> {
        let index = self.slots.iter().position(|slot| slot.key == key)?;
        let slot = self.slots.remove(index);
        slot.deactivate();
        Some(slot)
    }

    /// Remove all callbacks with the given keys.
    pub fn unregister_all(&mut self, keys: &[CallbackKey]) -> Vec<Arc<Slot<A>>> {
        keys.iter().filter_map(|&key| self.unregister(key)).collect()
    }

    /// The currently registered callbacks, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<Slot<A>>> {
        self.slots.clone()
    }

    /// Remove and return all callbacks. They stay active, so that a final
    /// delivery can still reach them.
    pub fn drain(&mut self) -> Vec<Arc<Slot<A>>> {
        std::mem::replace(&mut self.slots, vec![])
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize { self.slots.len() }
}

impl<A> Default for Source<A> {
    fn default() -> Source<A> { Source::new() }
}


/// Deliver an event to a snapshot of callbacks in order. Returns the keys of
/// those callbacks that asked to be unsubscribed.
pub fn deliver<A: Clone>(slots: &[Arc<Slot<A>>], a: A) -> Vec<CallbackKey> {
    let mut failed = vec![];
    if let Some((last, init)) = slots.split_last() {
        for slot in init {
            if slot.call(a.clone()).is_err() {
                failed.push(slot.key());
            }
        }
        // process the last element without cloning
        if last.call(a).is_err() {
            failed.push(last.key());
        }
    }
    failed
}
