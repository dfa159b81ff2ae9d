//! # Observer Registries
//!
//! Each client owns three ordered callback lists (message, error, close).
//! Registration hands back a [`Subscription`] whose `dispose()` removes
//! exactly that registration; disposing twice is a no-op.
//!
//! Callbacks are always invoked from a snapshot taken outside the lock, so
//! an observer may register or dispose other observers while it runs.

use crate::error::TransportError;
use crate::events::DeploymentEvent;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

pub type MessageObserver = dyn Fn(&DeploymentEvent) + Send + Sync;
pub type ErrorObserver = dyn Fn(&TransportError) + Send + Sync;
pub type CloseObserver = dyn Fn() + Send + Sync;

/// Which of the three lists a registration lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    Message,
    Error,
    Close,
}

// ─── Ordered List ───────────────────────────────────────────────

struct ObserverList<F: ?Sized> {
    entries: Vec<(u64, Arc<F>)>,
}

impl<F: ?Sized> ObserverList<F> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn push(&mut self, id: u64, observer: Arc<F>) {
        self.entries.push((id, observer));
    }

    fn remove(&mut self, id: u64) {
        if let Some(index) = self.entries.iter().position(|(entry, _)| *entry == id) {
            self.entries.remove(index);
        }
    }

    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.iter().map(|(_, o)| Arc::clone(o)).collect()
    }
}

// ─── Registry ───────────────────────────────────────────────────

pub(crate) struct Observers {
    next_id: u64,
    messages: ObserverList<MessageObserver>,
    errors: ObserverList<ErrorObserver>,
    closes: ObserverList<CloseObserver>,
}

impl Observers {
    fn new() -> Self {
        Self {
            next_id: 0,
            messages: ObserverList::new(),
            errors: ObserverList::new(),
            closes: ObserverList::new(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, kind: ObserverKind, id: u64) {
        match kind {
            ObserverKind::Message => self.messages.remove(id),
            ObserverKind::Error => self.errors.remove(id),
            ObserverKind::Close => self.closes.remove(id),
        }
    }

    fn clear(&mut self) {
        self.messages.entries.clear();
        self.errors.entries.clear();
        self.closes.entries.clear();
    }
}

/// Shared handle to a client's observer lists.
#[derive(Clone)]
pub(crate) struct ObserverRegistry {
    inner: Arc<Mutex<Observers>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Observers::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Observers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_message(&self, observer: Arc<MessageObserver>) -> Subscription {
        let mut observers = self.lock();
        let id = observers.allocate_id();
        observers.messages.push(id, observer);
        self.subscription(ObserverKind::Message, id)
    }

    pub(crate) fn add_error(&self, observer: Arc<ErrorObserver>) -> Subscription {
        let mut observers = self.lock();
        let id = observers.allocate_id();
        observers.errors.push(id, observer);
        self.subscription(ObserverKind::Error, id)
    }

    pub(crate) fn add_close(&self, observer: Arc<CloseObserver>) -> Subscription {
        let mut observers = self.lock();
        let id = observers.allocate_id();
        observers.closes.push(id, observer);
        self.subscription(ObserverKind::Close, id)
    }

    fn subscription(&self, kind: ObserverKind, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self, kind: ObserverKind) -> usize {
        let observers = self.lock();
        match kind {
            ObserverKind::Message => observers.messages.entries.len(),
            ObserverKind::Error => observers.errors.entries.len(),
            ObserverKind::Close => observers.closes.entries.len(),
        }
    }

    pub(crate) fn notify_message(&self, event: &DeploymentEvent) {
        let snapshot = self.lock().messages.snapshot();
        for observer in snapshot {
            isolate(ObserverKind::Message, || observer(event));
        }
    }

    pub(crate) fn notify_error(&self, err: &TransportError) {
        let snapshot = self.lock().errors.snapshot();
        for observer in snapshot {
            isolate(ObserverKind::Error, || observer(err));
        }
    }

    pub(crate) fn notify_close(&self) {
        let snapshot = self.lock().closes.snapshot();
        for observer in snapshot {
            isolate(ObserverKind::Close, || observer());
        }
    }
}

/// Runs one observer inside its own panic boundary.
fn isolate(kind: ObserverKind, call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!("{:?} observer panicked; continuing with the remaining observers", kind);
    }
}

// ─── Subscription ───────────────────────────────────────────────

/// Disposer returned by `on_message`, `on_error` and `on_close`.
///
/// Dropping a `Subscription` does **not** unregister the observer; call
/// [`Subscription::dispose`].
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Mutex<Observers>>,
    kind: ObserverKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> ObserverKind {
        self.kind
    }

    /// Removes the registration. Safe to call any number of times, and
    /// after the client itself is gone.
    pub fn dispose(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<MessageObserver>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let observer: Arc<MessageObserver> = Arc::new(move |_: &DeploymentEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, observer)
    }

    fn complete() -> DeploymentEvent {
        DeploymentEvent::Complete(serde_json::Value::Null)
    }

    #[test]
    fn dispose_removes_only_its_own_registration() {
        let registry = ObserverRegistry::new();
        let (first_count, first) = counter();
        let (second_count, second) = counter();

        let first_sub = registry.add_message(Arc::clone(&first));
        // same callback registered twice: disposing one keeps the other
        let _dup = registry.add_message(first);
        let _second_sub = registry.add_message(second);

        first_sub.dispose();
        first_sub.dispose();
        assert_eq!(registry.len(ObserverKind::Message), 2);

        registry.notify_message(&complete());
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn calls_in_registration_order() {
        let registry = ObserverRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            registry.add_message(Arc::new(move |_: &DeploymentEvent| {
                order.lock().unwrap().push(n);
            }));
        }

        registry.notify_message(&complete());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_observer_does_not_stop_dispatch() {
        let registry = ObserverRegistry::new();
        registry.add_close(Arc::new(|| panic!("consumer bug")));
        let closes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&closes);
        registry.add_close(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify_close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_may_dispose_itself_during_dispatch() {
        let registry = ObserverRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let sub = registry.add_message(Arc::new(move |_: &DeploymentEvent| {
            if let Some(sub) = inner.lock().unwrap().as_ref() {
                sub.dispose();
            }
        }));
        *slot.lock().unwrap() = Some(sub);

        registry.notify_message(&complete());
        assert_eq!(registry.len(ObserverKind::Message), 0);
    }

    #[test]
    fn clear_empties_every_list() {
        let registry = ObserverRegistry::new();
        let (_, message) = counter();
        registry.add_message(message);
        registry.add_error(Arc::new(|_: &TransportError| {}));
        registry.add_close(Arc::new(|| {}));

        registry.clear();
        for kind in [ObserverKind::Message, ObserverKind::Error, ObserverKind::Close] {
            assert_eq!(registry.len(kind), 0);
        }
    }
}
