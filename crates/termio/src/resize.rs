// SPDX-License-Identifier: MIT
//
// Resize monitor — notifies subscribers when the terminal changes size.
//
// Two detection strategies, picked by the backend's `ResizeSource`:
//
//   Signal (Unix)  — a signal-hook iterator thread blocks on SIGWINCH and
//                    re-queries the size on every delivery. Created when the
//                    first subscriber arrives, closed when the last leaves.
//
//   Poll           — one long-lived worker parked on a condvar. While at
//                    least one subscriber exists it wakes, re-queries the
//                    size, notifies, sleeps the debounce interval, and goes
//                    round again. With no subscribers it sleeps on the
//                    condvar and costs nothing. It exits when the monitor
//                    is dropped.
//
// The size observed at construction is the baseline, so subscribing never
// looks like a change by itself. Subscribers hear about a size only when it
// differs from the last one observed. Callbacks run on the detection thread
// with no internal lock held, so a callback may subscribe or unsubscribe.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::ResizeSource;
use crate::size::Size;

type Callback = Arc<dyn Fn(Size) + Send + Sync>;

/// Source of the current size, usually the driver's fallback query.
pub type SizeQuery = Box<dyn Fn() -> Option<Size> + Send + Sync>;

// ─── Shared state ────────────────────────────────────────────────────────────

#[cfg(unix)]
struct SignalWatcher {
    handle: signal_hook::iterator::Handle,
}

#[derive(Default)]
struct State {
    subscribers: Vec<(u64, Callback)>,
    next_id: u64,
    last: Option<Size>,
    polling: bool,
    shutdown: bool,
    worker: Option<JoinHandle<()>>,
    #[cfg(unix)]
    watcher: Option<SignalWatcher>,
}

struct Inner {
    query: SizeQuery,
    source: ResizeSource,
    interval: Duration,
    state: Mutex<State>,
    toggle: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-query the size and notify if it changed. Returns whether it did.
    fn refresh(&self) -> bool {
        let Some(size) = (self.query)() else {
            return false;
        };

        let callbacks: Vec<Callback> = {
            let mut state = self.lock();
            if state.last == Some(size) {
                return false;
            }
            state.last = Some(size);
            state.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        tracing::debug!(%size, subscribers = callbacks.len(), "terminal resized");
        for callback in callbacks {
            callback(size);
        }
        true
    }

    fn enable(self: &Arc<Self>, state: &mut State) {
        #[cfg(unix)]
        if let ResizeSource::Signal(signal) = self.source {
            match self.watch_signal(signal) {
                Ok(watcher) => {
                    tracing::debug!(signal, "resize monitoring enabled");
                    state.watcher = Some(watcher);
                    return;
                }
                Err(err) => {
                    tracing::warn!(%err, "cannot watch resize signal, polling instead");
                }
            }
        }

        state.polling = true;
        if state.worker.is_none() {
            let inner = Arc::clone(self);
            match thread::Builder::new()
                .name("termio-resize".into())
                .spawn(move || inner.poll_loop())
            {
                Ok(worker) => state.worker = Some(worker),
                Err(err) => {
                    tracing::warn!(%err, "cannot spawn resize poller");
                    state.polling = false;
                    return;
                }
            }
        }
        tracing::debug!(interval = ?self.interval, "resize polling enabled");
        self.toggle.notify_all();
    }

    fn disable(state: &mut State) {
        state.polling = false;
        #[cfg(unix)]
        if let Some(watcher) = state.watcher.take() {
            watcher.handle.close();
        }
        tracing::debug!("resize monitoring disabled");
    }

    fn poll_loop(&self) {
        loop {
            {
                let state = self
                    .toggle
                    .wait_while(self.lock(), |s| !s.polling && !s.shutdown)
                    .unwrap_or_else(PoisonError::into_inner);
                if state.shutdown {
                    return;
                }
            }

            self.refresh();

            let (state, _) = self
                .toggle
                .wait_timeout_while(self.lock(), self.interval, |s| !s.shutdown)
                .unwrap_or_else(PoisonError::into_inner);
            if state.shutdown {
                return;
            }
        }
    }

    #[cfg(unix)]
    fn watch_signal(self: &Arc<Self>, signal: libc::c_int) -> std::io::Result<SignalWatcher> {
        let mut signals = signal_hook::iterator::Signals::new([signal])?;
        let handle = signals.handle();
        let inner = Arc::downgrade(self);

        thread::Builder::new()
            .name("termio-sigwinch".into())
            .spawn(move || {
                for _ in signals.forever() {
                    match Weak::upgrade(&inner) {
                        Some(inner) => {
                            inner.refresh();
                        }
                        None => break,
                    }
                }
            })?;

        Ok(SignalWatcher { handle })
    }
}

// ─── ResizeMonitor ───────────────────────────────────────────────────────────

/// Delivers terminal size changes to subscribers.
pub struct ResizeMonitor {
    inner: Arc<Inner>,
}

impl ResizeMonitor {
    /// Create a monitor, capturing the current size from `query` as the
    /// baseline. Nothing runs until the first subscription.
    #[must_use]
    pub fn new(source: ResizeSource, interval: Duration, query: SizeQuery) -> Self {
        let last = query();
        Self {
            inner: Arc::new(Inner {
                query,
                source,
                interval,
                state: Mutex::new(State {
                    last,
                    ..State::default()
                }),
                toggle: Condvar::new(),
            }),
        }
    }

    /// Register `callback` to be called with each new size.
    ///
    /// The first subscription enables monitoring; dropping the returned
    /// [`ResizeSubscription`] unregisters, and the last one to go disables
    /// it again.
    pub fn subscribe(&self, callback: impl Fn(Size) + Send + Sync + 'static) -> ResizeSubscription {
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        let callback: Callback = Arc::new(callback);
        state.subscribers.push((id, callback));
        if state.subscribers.len() == 1 {
            self.inner.enable(&mut state);
        }

        ResizeSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Re-query the size now and notify subscribers if it changed.
    ///
    /// Returns whether a change was observed.
    pub fn refresh(&self) -> bool {
        self.inner.refresh()
    }

    /// The most recently observed size.
    #[must_use]
    pub fn last_size(&self) -> Option<Size> {
        self.inner.lock().last
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Whether monitoring is running.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        let state = self.inner.lock();
        #[cfg(unix)]
        if state.watcher.is_some() {
            return true;
        }
        state.polling
    }

    /// The configured debounce interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

impl std::fmt::Debug for ResizeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeMonitor")
            .field("source", &self.inner.source)
            .field("interval", &self.inner.interval)
            .field("last_size", &self.last_size())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Drop for ResizeMonitor {
    fn drop(&mut self) {
        let worker = {
            let mut state = self.inner.lock();
            Inner::disable(&mut state);
            state.shutdown = true;
            state.worker.take()
        };
        self.inner.toggle.notify_all();

        if let Some(worker) = worker {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

// ─── ResizeSubscription ──────────────────────────────────────────────────────

/// Keeps a resize callback registered; unregisters on drop.
#[derive(Debug)]
#[must_use = "dropping the subscription unregisters the callback"]
pub struct ResizeSubscription {
    inner: Weak<Inner>,
    id: u64,
}

impl Drop for ResizeSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut state = inner.lock();
        state.subscribers.retain(|(id, _)| *id != self.id);
        if state.subscribers.is_empty() && !state.shutdown {
            Inner::disable(&mut state);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(5);

    fn monitor(size: &Arc<Mutex<Option<Size>>>) -> ResizeMonitor {
        let size = Arc::clone(size);
        ResizeMonitor::new(
            ResizeSource::Poll,
            INTERVAL,
            Box::new(move || *size.lock().unwrap()),
        )
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(Size) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (count, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(INTERVAL);
        }
        false
    }

    #[test]
    fn baseline_is_captured_at_construction() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        assert_eq!(monitor.last_size(), Some(Size::new(80, 24)));
        assert!(!monitor.is_enabled());
    }

    #[test]
    fn first_subscription_is_not_a_change() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let (count, callback) = counter();

        let _sub = monitor.subscribe(callback);
        assert!(monitor.is_enabled());
        thread::sleep(INTERVAL * 10);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_notification_per_change() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = monitor.subscribe(move |s| sink.lock().unwrap().push(s));

        *size.lock().unwrap() = Some(Size::new(100, 30));
        assert!(wait_for(|| seen.lock().unwrap().len() == 1));
        thread::sleep(INTERVAL * 10);
        assert_eq!(*seen.lock().unwrap(), vec![Size::new(100, 30)]);

        *size.lock().unwrap() = Some(Size::new(120, 40));
        assert!(wait_for(|| seen.lock().unwrap().len() == 2));
        assert_eq!(monitor.last_size(), Some(Size::new(120, 40)));
    }

    #[test]
    fn unknown_size_is_not_a_change() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        *size.lock().unwrap() = None;
        assert!(!monitor.refresh());
        assert_eq!(monitor.last_size(), Some(Size::new(80, 24)));
    }

    #[test]
    fn manual_refresh_notifies_once() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = ResizeMonitor::new(ResizeSource::Poll, Duration::from_secs(60), {
            let size = Arc::clone(&size);
            Box::new(move || *size.lock().unwrap())
        });
        let (count, callback) = counter();
        let _sub = monitor.subscribe(callback);

        *size.lock().unwrap() = Some(Size::new(10, 10));
        // The poller may have raced us to it; either way exactly one fires.
        monitor.refresh();
        assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));
        assert!(!monitor.refresh());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_unsubscribe_disables() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let (_, first) = counter();
        let (_, second) = counter();

        let a = monitor.subscribe(first);
        let b = monitor.subscribe(second);
        assert_eq!(monitor.subscriber_count(), 2);

        drop(a);
        assert!(monitor.is_enabled());
        drop(b);
        assert_eq!(monitor.subscriber_count(), 0);
        assert!(!monitor.is_enabled());
    }

    #[test]
    fn unsubscribed_callbacks_are_not_called() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let (count, callback) = counter();
        drop(monitor.subscribe(callback));

        *size.lock().unwrap() = Some(Size::new(1, 1));
        monitor.refresh();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resubscribe_after_disable() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let (_, first) = counter();
        drop(monitor.subscribe(first));

        let (count, second) = counter();
        let _sub = monitor.subscribe(second);
        *size.lock().unwrap() = Some(Size::new(90, 20));
        assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn subscription_outliving_monitor_is_harmless() {
        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = monitor(&size);
        let (_, callback) = counter();
        let sub = monitor.subscribe(callback);
        drop(monitor);
        drop(sub);
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial(sigwinch)]
    fn sigwinch_notifies_once_per_change() {
        use signal_hook::consts::SIGWINCH;
        use signal_hook::low_level::raise;

        let size = Arc::new(Mutex::new(Some(Size::new(80, 24))));
        let monitor = {
            let size = Arc::clone(&size);
            ResizeMonitor::new(
                ResizeSource::Signal(SIGWINCH),
                Duration::from_secs(60),
                Box::new(move || *size.lock().unwrap()),
            )
        };

        for round in 0..3u16 {
            let (count, callback) = counter();
            let subscription = monitor.subscribe(callback);
            assert!(monitor.inner.lock().watcher.is_some());

            let next = Size::new(100 + round, 40);
            *size.lock().unwrap() = Some(next);
            raise(SIGWINCH).unwrap();
            assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));

            // Same size again: the signal arrives but nobody is told.
            raise(SIGWINCH).unwrap();
            thread::sleep(Duration::from_millis(50));
            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert_eq!(monitor.last_size(), Some(next));

            drop(subscription);
            assert!(monitor.inner.lock().watcher.is_none());
            assert!(!monitor.is_enabled());
        }
    }
}
