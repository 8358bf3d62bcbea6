//! Events carried by signals

use std::convert::Infallible;


/// Error type of signals that can not fail.
pub type NoError = Infallible;


/// A single event travelling through a signal.
///
/// Only `Value` events may occur repeatedly. The other three variants are
/// terminal: a signal delivers at most one of them and nothing afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event<T, E> {
    /// A value was produced.
    Value(T),
    /// The stream failed with an error.
    Failed(E),
    /// The stream finished successfully.
    Completed,
    /// The stream was cancelled before finishing.
    Interrupted,
}

impl<T, E> Event<T, E> {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(*self, Event::Value(_))
    }

    /// The carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match *self {
            Event::Value(ref value) => Some(value),
            _ => None,
        }
    }

    /// The carried error, if any.
    pub fn error(&self) -> Option<&E> {
        match *self {
            Event::Failed(ref error) => Some(error),
            _ => None,
        }
    }

    /// Turn the event into its value, dropping anything else.
    pub fn into_value(self) -> Option<T> {
        match self {
            Event::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the carried value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Event<U, E> {
        match self {
            Event::Value(value) => Event::Value(f(value)),
            Event::Failed(error) => Event::Failed(error),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }

    /// Transform the carried error.
    pub fn map_error<F2, G: FnOnce(E) -> F2>(self, g: G) -> Event<T, F2> {
        match self {
            Event::Value(value) => Event::Value(value),
            Event::Failed(error) => Event::Failed(g(error)),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }
}
