//! Cancellation handles
//!
//! A `Disposable` wraps a single clean-up action that runs at most once, no
//! matter how many clones of the handle call `dispose`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, Ordering };
use parking_lot::Mutex;


type Action = Box<dyn FnOnce() + Send + 'static>;


struct Inner {
    disposed: AtomicBool,
    action: Mutex<Option<Action>>,
}


/// An idempotent handle to cancel some work or detach some observer.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<Inner>,
}

impl Disposable {
    /// Create a handle that runs `action` when first disposed.
    pub fn new<F: FnOnce() + Send + 'static>(action: F) -> Disposable {
        Disposable {
            inner: Arc::new(Inner {
                disposed: AtomicBool::new(false),
                action: Mutex::new(Some(Box::new(action))),
            }),
        }
    }

    /// A handle without any clean-up action.
    pub fn empty() -> Disposable {
        Disposable {
            inner: Arc::new(Inner {
                disposed: AtomicBool::new(false),
                action: Mutex::new(None),
            }),
        }
    }

    /// A handle that is already disposed.
    pub fn disposed() -> Disposable {
        let disposable = Disposable::empty();
        disposable.dispose();
        disposable
    }

    /// Run the clean-up action, unless that already happened.
    ///
    /// The action runs outside of any internal lock, so it may freely dispose
    /// other handles or this one again.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let action = self.inner.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Whether `dispose` has been called on this handle or one of its clones.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Tie the handle to a scope: it is disposed when the guard is dropped.
    pub fn scoped(self) -> ScopedDisposable {
        ScopedDisposable { inner: self }
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}


/// Disposes the wrapped handle on drop.
#[derive(Debug)]
pub struct ScopedDisposable {
    inner: Disposable,
}

impl ScopedDisposable {
    /// The wrapped handle.
    pub fn handle(&self) -> &Disposable { &self.inner }
}

impl Drop for ScopedDisposable {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}


/// A bag of handles disposed together, in insertion order.
#[derive(Clone)]
pub struct CompositeDisposable {
    handles: Arc<Mutex<Option<Vec<Disposable>>>>,
}

impl CompositeDisposable {
    /// Create an empty composite.
    pub fn new() -> CompositeDisposable {
        CompositeDisposable { handles: Arc::new(Mutex::new(Some(vec![]))) }
    }

    /// Add a handle. If the composite is already disposed, the handle is
    /// disposed right away.
    pub fn add(&self, disposable: Disposable) {
        let rejected = {
            let mut handles = self.handles.lock();
            match *handles {
                Some(ref mut handles) => { handles.push(disposable); None },
                None => Some(disposable),
            }
        };
        if let Some(disposable) = rejected {
            disposable.dispose();
        }
    }

    /// Dispose every handle added so far and every handle added later.
    pub fn dispose(&self) {
        let handles = self.handles.lock().take();
        for handle in handles.into_iter().flatten() {
            handle.dispose();
        }
    }

    /// Whether the composite has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.handles.lock().is_none()
    }

    /// A plain handle disposing the whole composite.
    pub fn handle(&self) -> Disposable {
        let this = self.clone();
        Disposable::new(move || this.dispose())
    }
}

impl Default for CompositeDisposable {
    fn default() -> CompositeDisposable { CompositeDisposable::new() }
}
