//! Cold stream blueprints

use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::disposable::Disposable;
use crate::event::NoError;
use crate::lifetime::Lifetime;
use crate::observer::Observer;
use crate::signal::Signal;


/// The emission routine of a producer.
///
/// It is called once per start with the input side of that run's signal and
/// the run's lifetime. The routine may send right away or hand the observer
/// to a scheduler. It is responsible for eventually sending a terminal event,
/// unless the stream is meant to be infinite, and should check the lifetime
/// before sending from delayed work.
///
/// Closures of the right shape are emitters already.
pub trait Emitter<T, E>: Send + Sync + 'static {
    /// Run the routine for a single start.
    fn emit(&self, observer: Observer<T, E>, lifetime: &Lifetime);
}

impl<T, E, F> Emitter<T, E> for F
    where F: Fn(Observer<T, E>, &Lifetime) + Send + Sync + 'static,
{
    fn emit(&self, observer: Observer<T, E>, lifetime: &Lifetime) {
        self(observer, lifetime)
    }
}


/// Everything belonging to one started run.
struct Run<T, E> {
    signal: Signal<T, E>,
    input: Observer<T, E>,
    lifetime: Lifetime,
    handle: Disposable,
}


/// A cold, restartable description of a stream.
///
/// A producer does nothing until it is started. Every start builds a fresh
/// signal and a fresh lifetime and runs the emission routine for them, so
/// runs never share state, unless the routine captured some explicitly.
///
/// ```
/// # use reactant::{ NoError, Observer, SignalProducer };
/// # use std::sync::{ Arc, Mutex };
/// let producer = SignalProducer::<i32, NoError>::new(|observer, _lifetime| {
///     observer.send_value(1);
///     observer.send_value(2);
///     observer.send_completed();
/// });
/// let seen = Arc::new(Mutex::new(vec![]));
/// for _ in 0..2 {
///     let seen = seen.clone();
///     producer.start_with_values(move |v| seen.lock().unwrap().push(v));
/// }
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1, 2]);
/// ```
pub struct SignalProducer<T, E = NoError> {
    emitter: Arc<dyn Emitter<T, E>>,
}

impl<T, E> Clone for SignalProducer<T, E> {
    fn clone(&self) -> SignalProducer<T, E> {
        SignalProducer { emitter: self.emitter.clone() }
    }
}

impl<T, E> fmt::Debug for SignalProducer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SignalProducer")
    }
}

impl<T, E> SignalProducer<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static,
{
    /// Create a producer from a closure.
    pub fn new<F>(routine: F) -> SignalProducer<T, E>
        where F: Fn(Observer<T, E>, &Lifetime) + Send + Sync + 'static,
    {
        SignalProducer::from_emitter(routine)
    }

    /// Create a producer from any emitter.
    pub fn from_emitter<X: Emitter<T, E>>(emitter: X) -> SignalProducer<T, E> {
        SignalProducer { emitter: Arc::new(emitter) }
    }

    /// Sends a single value, then completes.
    pub fn value(value: T) -> SignalProducer<T, E>
        where T: Sync,
    {
        SignalProducer::new(move |observer, _| {
            observer.send_value(value.clone());
            observer.send_completed();
        })
    }

    /// Sends all values in order, then completes.
    pub fn from_values<I>(values: I) -> SignalProducer<T, E>
        where I: IntoIterator<Item=T>,
              T: Sync,
    {
        let values: Vec<T> = values.into_iter().collect();
        SignalProducer::new(move |observer, _| {
            for value in &values {
                observer.send_value(value.clone());
            }
            observer.send_completed();
        })
    }

    /// Fails right away.
    pub fn failed(error: E) -> SignalProducer<T, E>
        where E: Sync,
    {
        SignalProducer::new(move |observer, _| observer.send_failed(error.clone()))
    }

    /// Completes right away.
    pub fn empty() -> SignalProducer<T, E> {
        SignalProducer::new(|observer, _| observer.send_completed())
    }

    /// Never sends anything.
    pub fn never() -> SignalProducer<T, E> {
        SignalProducer::new(|_, _| ())
    }

    /// Every start observes the given hot signal until the run is disposed.
    pub fn from_signal(signal: Signal<T, E>) -> SignalProducer<T, E> {
        SignalProducer::new(move |observer, lifetime| {
            let observation = signal.observe(observer);
            lifetime.observe_ended(move || observation.dispose());
        })
    }

    /// Set up a run without invoking the emitter yet.
    ///
    /// The handle ends the lifetime first, so that routines reacting to it
    /// synchronously still reach `observer`, then detaches `observer`, then
    /// interrupts the signal so that late sends become no-ops.
    fn prepare(&self, observer: Option<Observer<T, E>>) -> Run<T, E> {
        let (signal, input) = Signal::pipe();
        let (lifetime, token) = Lifetime::make();
        let detach = observer.map(|observer| signal.observe(observer));
        signal.lifetime().observe_ended({
            let token = token.clone();
            move || token.end()
        });
        let handle = {
            let input = input.clone();
            Disposable::new(move || {
                trace!("producer run disposed");
                token.end();
                if let Some(detach) = detach {
                    detach.dispose();
                }
                input.send_interrupted();
            })
        };
        Run { signal, input, lifetime, handle }
    }

    /// Start a run delivering to `observer`.
    ///
    /// Disposing the returned handle ends the run's lifetime and detaches the
    /// observer. Work already handed to a scheduler is not preempted: the
    /// routine has to check the lifetime, or cancel that work when the
    /// lifetime ends.
    pub fn start(&self, observer: Observer<T, E>) -> Disposable {
        let Run { input, lifetime, handle, .. } = self.prepare(Some(observer));
        trace!("producer started");
        self.emitter.emit(input, &lifetime);
        handle
    }

    /// Start a run nobody observes.
    pub fn start_detached(&self) -> Disposable {
        self.start_with_signal(|_, handle| handle)
    }

    /// Start a run, observing its values only.
    pub fn start_with_values<F>(&self, f: F) -> Disposable
        where F: Fn(T) + Send + Sync + 'static,
    {
        self.start(Observer::builder().on_value(f).build())
    }

    /// Start a run, handing its signal and handle to `setup` before the
    /// emitter runs. Whatever `setup` attaches sees every event of the run.
    pub fn start_with_signal<F, R>(&self, setup: F) -> R
        where F: FnOnce(&Signal<T, E>, Disposable) -> R,
    {
        let Run { signal, input, lifetime, handle } = self.prepare(None);
        let result = setup(&signal, handle);
        trace!("producer started");
        self.emitter.emit(input, &lifetime);
        result
    }
}


#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;
    use parking_lot::Mutex;
    use quickcheck::quickcheck;

    use crate::event::Event;
    use crate::scheduler::{ Scheduler, TestScheduler };
    use crate::testing::{ ticker, Recorder };
    use super::*;

    fn secs(n: u64) -> Duration { Duration::from_secs(n) }

    #[test]
    fn nothing_happens_before_start() {
        let calls = Arc::new(Mutex::new(0));
        let _producer = {
            let calls = calls.clone();
            SignalProducer::<(), ()>::new(move |_, _| *calls.lock() += 1)
        };
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn each_start_runs_the_routine() {
        let calls = Arc::new(Mutex::new(0));
        let producer = {
            let calls = calls.clone();
            SignalProducer::<(), ()>::new(move |observer, _| {
                *calls.lock() += 1;
                observer.send_completed();
            })
        };
        producer.start_detached();
        producer.clone().start_detached();
        assert_eq!(*calls.lock(), 2);
    }

    #[test]
    fn synchronous_values() {
        let recorder = Recorder::new();
        SignalProducer::<i32, ()>::from_values(vec![1, 2, 3]).start(recorder.observer());
        assert_eq!(recorder.events(), vec![
            Event::Value(1), Event::Value(2), Event::Value(3), Event::Completed,
        ]);
    }

    #[test]
    fn constructors() {
        let value = Recorder::new();
        SignalProducer::<i32, ()>::value(7).start(value.observer());
        assert_eq!(value.events(), vec![Event::Value(7), Event::Completed]);

        let failed = Recorder::new();
        SignalProducer::<i32, &'static str>::failed("nope").start(failed.observer());
        assert_eq!(failed.events(), vec![Event::Failed("nope")]);

        let empty = Recorder::new();
        SignalProducer::<i32, ()>::empty().start(empty.observer());
        assert_eq!(empty.events(), vec![Event::Completed]);

        let never = Recorder::new();
        let handle = SignalProducer::<i32, ()>::never().start(never.observer());
        assert!(never.events().is_empty());
        handle.dispose();
        assert!(never.events().is_empty());
    }

    #[test]
    fn runs_are_independent() {
        let scheduler = TestScheduler::new();
        let producer = ticker(&scheduler, 3, secs(1));
        let first = Recorder::new();
        producer.start(first.observer());
        scheduler.advance_by(secs(1));
        let second = Recorder::new();
        producer.start(second.observer());
        scheduler.run();
        assert_eq!(first.values(), vec![0, 1, 2]);
        assert_eq!(second.values(), vec![0, 1, 2]);
        assert_eq!(first.terminal(), Some(Event::Completed));
        assert_eq!(second.terminal(), Some(Event::Completed));
    }

    #[test]
    fn disposing_one_run_leaves_the_other() {
        let scheduler = TestScheduler::new();
        let producer = ticker(&scheduler, 3, secs(1));
        let first = Recorder::new();
        let second = Recorder::new();
        let handle = producer.start(first.observer());
        producer.start(second.observer());
        scheduler.advance_by(secs(1));
        handle.dispose();
        scheduler.run();
        assert_eq!(first.events(), vec![Event::Value(0), Event::Value(1)]);
        assert_eq!(second.values(), vec![0, 1, 2]);
    }

    #[test]
    fn independent_runs_with_shared_input() {
        fn check(values: Vec<i32>) -> bool {
            let shared = Arc::new(values.clone());
            let producer = SignalProducer::<i32, ()>::new(move |observer, _| {
                for v in shared.iter() { observer.send_value(*v); }
                observer.send_completed();
            });
            let a = Recorder::new();
            let b = Recorder::new();
            producer.start(a.observer());
            producer.start(b.observer());
            a.values() == values && b.values() == values && a.events() == b.events()
        }
        quickcheck(check as fn(Vec<i32>) -> bool);
    }

    #[test]
    fn lifetime_ends_when_run_terminates() {
        let captured: Arc<Mutex<Option<Lifetime>>> = Arc::new(Mutex::new(None));
        let producer = {
            let captured = captured.clone();
            SignalProducer::<(), ()>::new(move |observer, lifetime| {
                *captured.lock() = Some(lifetime.clone());
                observer.send_completed();
            })
        };
        let handle = producer.start_detached();
        assert!(captured.lock().as_ref().unwrap().has_ended());
        assert!(!handle.is_disposed());
    }

    #[test]
    fn dispose_ends_lifetime() {
        let captured: Arc<Mutex<Option<Lifetime>>> = Arc::new(Mutex::new(None));
        let producer = {
            let captured = captured.clone();
            SignalProducer::<(), ()>::new(move |_, lifetime| {
                *captured.lock() = Some(lifetime.clone());
            })
        };
        let handle = producer.start_detached();
        let lifetime = captured.lock().take().unwrap();
        assert!(!lifetime.has_ended());
        handle.dispose();
        assert!(lifetime.has_ended());
    }

    #[test]
    fn polling_routine_after_dispose_reaches_nobody() {
        let scheduler = TestScheduler::new();
        let producer = ticker(&scheduler, 10, secs(5));
        let recorder = Recorder::new();
        let handle = producer.start(recorder.observer());
        handle.dispose();
        scheduler.run();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn reacting_routine_delivers_one_interruption() {
        let scheduler = TestScheduler::new();
        let producer = {
            let scheduler = scheduler.clone();
            SignalProducer::<u32, NoError>::new(move |observer, lifetime| {
                {
                    let observer = observer.clone();
                    lifetime.observe_ended(move || observer.send_interrupted());
                }
                for i in 0..10u32 {
                    let observer = observer.clone();
                    let lifetime = lifetime.clone();
                    scheduler.schedule_after(secs(5) * i, Box::new(move || {
                        if lifetime.has_ended() {
                            observer.send_interrupted();
                            return;
                        }
                        observer.send_value(i);
                    }));
                }
            })
        };
        let recorder = Recorder::new();
        let handle = producer.start(recorder.observer());
        handle.dispose();
        scheduler.run();
        assert_eq!(recorder.events(), vec![Event::Interrupted]);
    }

    #[test]
    fn dispose_mid_run_with_polling_routine() {
        // Disposed between the second and the third tick.
        let scheduler = TestScheduler::new();
        let producer = ticker(&scheduler, 10, secs(5));
        let recorder = Recorder::new();
        let handle = producer.start(recorder.observer());
        scheduler.schedule_after(secs(7), Box::new(move || handle.dispose()));
        scheduler.run();
        assert_eq!(recorder.events(), vec![Event::Value(0), Event::Value(1)]);
    }

    #[test]
    fn strict_cancellation_drops_timers() {
        let scheduler = TestScheduler::new();
        let producer = {
            let scheduler = scheduler.clone();
            SignalProducer::<(), NoError>::new(move |observer, lifetime| {
                let timer = scheduler.schedule_after(secs(5), Box::new(move || {
                    observer.send_value(());
                }));
                lifetime.observe_ended(move || timer.dispose());
            })
        };
        let recorder = Recorder::new();
        let handle = producer.start(recorder.observer());
        assert_eq!(scheduler.pending(), 1);
        handle.dispose();
        assert_eq!(scheduler.pending(), 0);
        scheduler.run();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn start_with_signal_sees_all_events() {
        let recorder = Recorder::new();
        let handle = SignalProducer::<i32, ()>::value(3).start_with_signal(|signal, handle| {
            signal.observe(recorder.observer());
            handle
        });
        assert_eq!(recorder.events(), vec![Event::Value(3), Event::Completed]);
        assert!(!handle.is_disposed());
    }

    #[test]
    fn start_with_signal_dispose_interrupts() {
        let recorder = Recorder::new();
        let handle = SignalProducer::<i32, ()>::never().start_with_signal(|signal, handle| {
            signal.observe(recorder.observer());
            handle
        });
        handle.dispose();
        assert_eq!(recorder.events(), vec![Event::Interrupted]);
    }

    #[test]
    fn from_signal_observes_per_start() {
        let (signal, input) = Signal::<i32, ()>::pipe();
        let producer = SignalProducer::from_signal(signal.clone());
        let recorder = Recorder::new();
        let handle = producer.start(recorder.observer());
        input.send_value(1);
        assert_eq!(signal.observer_count(), 1);
        handle.dispose();
        assert_eq!(signal.observer_count(), 0);
        input.send_value(2);
        assert_eq!(recorder.values(), vec![1]);
    }

    #[test]
    fn custom_emitter() {
        struct Countdown(u32);

        impl Emitter<u32, NoError> for Countdown {
            fn emit(&self, observer: Observer<u32, NoError>, _: &Lifetime) {
                for n in (0..=self.0).rev() {
                    observer.send_value(n);
                }
                observer.send_completed();
            }
        }

        let recorder = Recorder::new();
        SignalProducer::from_emitter(Countdown(3)).start(recorder.observer());
        assert_eq!(recorder.values(), vec![3, 2, 1, 0]);
    }
}
