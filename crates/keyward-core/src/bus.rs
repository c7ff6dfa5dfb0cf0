//! Notification bus.
//!
//! Publishers hand an event to the bus; the bus posts one delivery callback
//! per event on the frame loop. Subscribers are looked up when the callback
//! runs, not when the event was published.
//!
//! # Invariants
//!
//! - Delivery never happens inside `publish`
//! - Events published in the same frame are delivered in publish order
//! - Each subscriber sees each event at most once
//! - A subscriber removed before (or during) a delivery does not see it
//! - No replay: events are not kept after delivery

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{event::SessionEvent, frame::FrameHandle};

type Handler = Rc<dyn Fn(&SessionEvent)>;

/// Identifies one subscription on a [`Bus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct BusInner {
    frames: FrameHandle,
    subscribers: RefCell<Vec<(SubscriptionId, Handler)>>,
    next_id: Cell<u64>,
}

impl BusInner {
    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers.borrow().iter().any(|(sub, _)| *sub == id)
    }

    fn deliver(&self, event: &SessionEvent) {
        // Handlers may subscribe or unsubscribe while we iterate.
        let snapshot: Vec<(SubscriptionId, Handler)> = self.subscribers.borrow().clone();

        tracing::trace!(subscribers = snapshot.len(), "delivering {}", event);

        for (id, handler) in snapshot {
            if self.is_subscribed(id) {
                handler(event);
            }
        }
    }
}

/// Deferred publish/subscribe channel for [`SessionEvent`]s.
///
/// Cloning is cheap and every clone refers to the same subscriber list.
#[derive(Clone)]
pub struct Bus {
    inner: Rc<BusInner>,
}

impl Bus {
    /// Create a bus that delivers on `frames`.
    pub fn new(frames: FrameHandle) -> Self {
        Self {
            inner: Rc::new(BusInner {
                frames,
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Register a handler for every event delivered from now on.
    pub fn subscribe(&self, handler: impl Fn(&SessionEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.subscribers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not subscribed.
    ///
    /// The handler is dropped after the subscriber list is released, so its
    /// captured state may touch the bus while being dropped.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed: Vec<(SubscriptionId, Handler)> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            let (gone, keep): (Vec<_>, Vec<_>) =
                subscribers.drain(..).partition(|(sub, _)| *sub == id);
            *subscribers = keep;
            gone
        };
        !removed.is_empty()
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Schedule delivery of `event` on the next frame.
    pub fn publish(&self, event: SessionEvent) {
        tracing::debug!("publishing {}", event);

        let bus: Weak<BusInner> = Rc::downgrade(&self.inner);
        self.inner.frames.post(Box::new(move || {
            if let Some(bus) = bus.upgrade() {
                bus.deliver(&event);
            }
        }));
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").field("subscribers", &self.subscriber_count()).finish()
    }
}
