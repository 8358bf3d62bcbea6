//! Cooperative cancellation tokens

use std::fmt;
use std::mem;
use std::sync::{ Arc, Weak };
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use parking_lot::Mutex;
use tracing::trace;

use crate::disposable::Disposable;


type EndedCallback = Box<dyn FnOnce() + Send + 'static>;


struct Inner {
    ended: AtomicBool,
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, EndedCallback)>>,
}

impl Inner {
    fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = mem::replace(&mut *self.callbacks.lock(), vec![]);
        trace!(callbacks = callbacks.len(), "lifetime ended");
        for (_, callback) in callbacks {
            callback();
        }
    }
}


/// Observable end of some unit of work.
///
/// A lifetime starts out alive and ends at most once. Holders may poll
/// `has_ended` or register callbacks with `observe_ended`. Only the matching
/// `LifetimeToken` can end it.
///
/// ```
/// # use reactant::Lifetime;
/// let (lifetime, token) = Lifetime::make();
/// assert!(!lifetime.has_ended());
/// token.end();
/// assert!(lifetime.has_ended());
/// ```
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<Inner>,
}

impl Lifetime {
    /// Create a lifetime together with the token that ends it.
    pub fn make() -> (Lifetime, LifetimeToken) {
        let inner = Arc::new(Inner {
            ended: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            callbacks: Mutex::new(vec![]),
        });
        (Lifetime { inner: inner.clone() }, LifetimeToken { inner })
    }

    /// A lifetime that has already ended.
    pub fn ended() -> Lifetime {
        let (lifetime, token) = Lifetime::make();
        token.end();
        lifetime
    }

    /// Whether the lifetime is over.
    pub fn has_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    /// Run `callback` once the lifetime ends.
    ///
    /// If it has ended already, the callback runs immediately. Disposing the
    /// returned handle unregisters a callback that has not run yet.
    pub fn observe_ended<F>(&self, callback: F) -> Disposable
        where F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let rejected = {
            let mut callbacks = self.inner.callbacks.lock();
            if self.has_ended() {
                Some(callback)
            } else {
                callbacks.push((id, Box::new(callback)));
                None
            }
        };
        match rejected {
            Some(callback) => {
                callback();
                Disposable::disposed()
            },
            None => {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                Disposable::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.callbacks.lock().retain(|&(other, _)| other != id);
                    }
                })
            },
        }
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("has_ended", &self.has_ended())
            .finish()
    }
}


/// The ending side of a `Lifetime`.
#[derive(Clone)]
pub struct LifetimeToken {
    inner: Arc<Inner>,
}

impl LifetimeToken {
    /// End the lifetime and run its callbacks in registration order.
    /// Subsequent calls do nothing.
    pub fn end(&self) {
        self.inner.end();
    }

    /// The lifetime ended by this token.
    pub fn lifetime(&self) -> Lifetime {
        Lifetime { inner: self.inner.clone() }
    }
}

impl fmt::Debug for LifetimeToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LifetimeToken")
            .field("has_ended", &self.inner.ended.load(Ordering::Acquire))
            .finish()
    }
}
