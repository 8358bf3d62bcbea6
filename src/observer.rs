//! Observers

use std::fmt;
use std::sync::Arc;

use crate::event::Event;


type Action<T, E> = Arc<dyn Fn(Event<T, E>) + Send + Sync + 'static>;


/// Receives the events of a signal.
///
/// An observer plays both roles of the observer pattern: it is what gets
/// attached to a signal to watch it, and it is the input side through which
/// events are sent into a signal created by `Signal::pipe`.
///
/// Observers are cheap to clone. Clones forward to the same action.
pub struct Observer<T, E> {
    action: Action<T, E>,
}

impl<T, E> Clone for Observer<T, E> {
    fn clone(&self) -> Observer<T, E> {
        Observer { action: self.action.clone() }
    }
}

impl<T, E> fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Observer")
    }
}

impl<T: 'static, E: 'static> Observer<T, E> {
    /// Create an observer handling every event with one function.
    pub fn new<F>(action: F) -> Observer<T, E>
        where F: Fn(Event<T, E>) + Send + Sync + 'static,
    {
        Observer { action: Arc::new(action) }
    }

    /// Build an observer from per-kind callbacks.
    ///
    /// ```
    /// # use reactant::{ NoError, Observer, Signal };
    /// # use std::sync::{ Arc, Mutex };
    /// let seen = Arc::new(Mutex::new(vec![]));
    /// let observer = Observer::<i32, NoError>::builder()
    ///     .on_value({ let seen = seen.clone(); move |v| seen.lock().unwrap().push(v) })
    ///     .on_completed(|| ())
    ///     .build();
    /// let (signal, input) = Signal::pipe();
    /// signal.observe(observer);
    /// input.send_value(4);
    /// assert_eq!(*seen.lock().unwrap(), vec![4]);
    /// ```
    pub fn builder() -> ObserverBuilder<T, E> {
        ObserverBuilder {
            value: None,
            failed: None,
            completed: None,
            interrupted: None,
        }
    }

    /// An observer ignoring everything.
    pub fn ignore() -> Observer<T, E> {
        Observer::new(|_| ())
    }

    /// Send an event.
    pub fn send(&self, event: Event<T, E>) {
        (self.action)(event)
    }

    /// Send a value.
    pub fn send_value(&self, value: T) {
        self.send(Event::Value(value));
    }

    /// Send a failure. Terminal.
    pub fn send_failed(&self, error: E) {
        self.send(Event::Failed(error));
    }

    /// Send completion. Terminal.
    pub fn send_completed(&self) {
        self.send(Event::Completed);
    }

    /// Send interruption. Terminal.
    pub fn send_interrupted(&self) {
        self.send(Event::Interrupted);
    }
}


/// Builder for observers made of per-kind callbacks.
pub struct ObserverBuilder<T, E> {
    value: Option<Box<dyn Fn(T) + Send + Sync + 'static>>,
    failed: Option<Box<dyn Fn(E) + Send + Sync + 'static>>,
    completed: Option<Box<dyn Fn() + Send + Sync + 'static>>,
    interrupted: Option<Box<dyn Fn() + Send + Sync + 'static>>,
}

impl<T: 'static, E: 'static> ObserverBuilder<T, E> {
    /// Handle values.
    pub fn on_value<F: Fn(T) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.value = Some(Box::new(f));
        self
    }

    /// Handle failure.
    pub fn on_failed<F: Fn(E) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.failed = Some(Box::new(f));
        self
    }

    /// Handle completion.
    pub fn on_completed<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.completed = Some(Box::new(f));
        self
    }

    /// Handle interruption.
    pub fn on_interrupted<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.interrupted = Some(Box::new(f));
        self
    }

    /// Finish the observer. Events without a callback are ignored.
    pub fn build(self) -> Observer<T, E> {
        let ObserverBuilder { value, failed, completed, interrupted } = self;
        Observer::new(move |event| match event {
            Event::Value(v) => if let Some(ref f) = value { f(v) },
            Event::Failed(e) => if let Some(ref f) = failed { f(e) },
            Event::Completed => if let Some(ref f) = completed { f() },
            Event::Interrupted => if let Some(ref f) = interrupted { f() },
        })
    }
}


#[cfg(test)]
mod test {
    use std::sync::Arc;
    use parking_lot::Mutex;
    use super::*;

    #[test]
    fn builder_dispatches_by_kind() {
        let log = Arc::new(Mutex::new(vec![]));
        let observer = {
            let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
            Observer::<i32, &'static str>::builder()
                .on_value(move |v| l1.lock().push(format!("value {}", v)))
                .on_failed(move |e| l2.lock().push(format!("failed {}", e)))
                .on_completed(move || l3.lock().push("completed".to_string()))
                .on_interrupted(move || l4.lock().push("interrupted".to_string()))
                .build()
        };
        observer.send_value(1);
        observer.send_failed("oops");
        observer.send_completed();
        observer.send_interrupted();
        assert_eq!(*log.lock(), vec![
            "value 1", "failed oops", "completed", "interrupted",
        ]);
    }

    #[test]
    fn missing_callbacks_are_ignored() {
        let observer = Observer::<i32, ()>::builder().build();
        observer.send_value(1);
        observer.send_completed();
    }

    #[test]
    fn clones_share_action() {
        let hits = Arc::new(Mutex::new(0));
        let observer = {
            let hits = hits.clone();
            Observer::<(), ()>::new(move |_| *hits.lock() += 1)
        };
        observer.clone().send_value(());
        observer.send_value(());
        assert_eq!(*hits.lock(), 2);
    }
}
