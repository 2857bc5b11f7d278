//! A small typed event bus for session lifecycle notifications.
//!
//! The catalog is closed — `Event` is an enum, not an arbitrary string name
//! — and listeners are plain closures. Duplicate registration, per-listener
//! isolation (one listener's panic or early return never stops the rest
//! from running) and removal by handle are the three properties this module
//! exists to provide.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::codec::Value;

/// The fixed catalog of events a session can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Open,
    Close,
    Error,
    Message,
    Reconnecting,
    Reconnected,
    ReconnectFailed,
}

const EVENT_COUNT: usize = 7;

fn event_index(e: Event) -> usize {
    match e {
        Event::Open => 0,
        Event::Close => 1,
        Event::Error => 2,
        Event::Message => 3,
        Event::Reconnecting => 4,
        Event::Reconnected => 5,
        Event::ReconnectFailed => 6,
    }
}

/// Payload handed to a listener. Shape depends on the event: `Open`/`Close`
/// carry no data, `Error` carries a message, `Message` carries the decoded
/// frame, `Reconnecting`/`Reconnected`/`ReconnectFailed` carry the attempt
/// count.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Text(String),
    Value(Value),
    Attempt(u32),
}

type Listener = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// A handle returned by `on`/`once`, usable to remove that one listener via
/// [`EventBus::off`]. Two handles are never equal unless one was cloned
/// from the other — registering the "same" closure twice yields two
/// distinct, independently-removable listeners, matching call-by-value
/// registration semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

struct Registration {
    id: ListenerId,
    listener: Listener,
    once: bool,
}

/// The event bus itself. Cheap to clone: internals are behind an `Arc`, so
/// every clone observes the same listener set.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    slots: [Mutex<Vec<Registration>>; EVENT_COUNT],
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Default::default(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn alloc_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a listener that runs on every future emission of `event`.
    pub fn on(&self, event: Event, listener: impl Fn(&EventPayload) + Send + Sync + 'static) -> ListenerId {
        let id = self.alloc_id();
        self.inner.slots[event_index(event)].lock().push(Registration {
            id,
            listener: Arc::new(listener),
            once: false,
        });
        id
    }

    /// Register a listener that runs at most once, then removes itself.
    pub fn once(&self, event: Event, listener: impl Fn(&EventPayload) + Send + Sync + 'static) -> ListenerId {
        let id = self.alloc_id();
        self.inner.slots[event_index(event)].lock().push(Registration {
            id,
            listener: Arc::new(listener),
            once: true,
        });
        id
    }

    /// Remove one listener by the handle `on`/`once` returned. No-op if
    /// already removed (by a prior `off` or by having already fired once).
    pub fn off(&self, event: Event, id: ListenerId) {
        self.inner.slots[event_index(event)].lock().retain(|r| r.id != id);
    }

    /// Remove every listener registered for one event.
    pub fn clear_event(&self, event: Event) {
        self.inner.slots[event_index(event)].lock().clear();
    }

    /// Remove every listener for every event.
    pub fn clear_all(&self) {
        for slot in &self.inner.slots {
            slot.lock().clear();
        }
    }

    /// Invoke every listener currently registered for `event`, in
    /// registration order, passing each the same payload. `once` listeners
    /// are removed after this call; a listener that panics does not stop
    /// the remaining listeners from running or poison the bus (the lock is
    /// released before invocation).
    pub fn emit(&self, event: Event, payload: EventPayload) {
        let listeners: Vec<Registration> = {
            let mut slot = self.inner.slots[event_index(event)].lock();
            let fired = std::mem::take(&mut *slot);
            let (keep, fire): (Vec<_>, Vec<_>) = fired.into_iter().partition(|r| !r.once);
            *slot = keep;
            fire
        };
        for reg in &listeners {
            (reg.listener)(&payload);
        }
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: Event) -> usize {
        self.inner.slots[event_index(event)].lock().len()
    }
}
