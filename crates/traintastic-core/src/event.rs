//! Multicast event dispatch with deterministic subscriber ordering.
//!
//! Subscribers receive a deterministic argument tuple in subscription
//! order; disconnecting during dispatch never affects the pass already in
//! flight. The guarantee is implemented by snapshotting the subscriber
//! list at the start of `emit` — a handler connected mid-dispatch is only
//! visible to the *next* emission, and a handler disconnected mid-dispatch
//! is skipped the moment its slot is read, not retroactively.

use parking_lot::Mutex;
use std::sync::Arc;

type Callback<Args> = Box<dyn FnMut(Args) + Send>;
type Slot<Args> = Arc<Mutex<Option<Callback<Args>>>>;

pub struct Event<Args: Clone> {
    subscribers: Mutex<Vec<Slot<Args>>>,
}

impl<Args: Clone> Default for Event<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone> Event<Args> {
    pub fn new() -> Self {
        Event {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes `f`, returning a handle that detaches it on `disconnect`
    /// (or on drop, via [`Subscription`]'s `Drop` impl keeping it alive —
    /// callers that want fire-and-forget subscriptions must `.forget()`).
    pub fn connect<F>(&self, f: F) -> Subscription<Args>
    where
        F: FnMut(Args) + Send + 'static,
    {
        let slot: Slot<Args> = Arc::new(Mutex::new(Some(Box::new(f))));
        self.subscribers.lock().push(slot.clone());
        Subscription { slot }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().iter().filter(|s| s.lock().is_some()).count()
    }

    /// Dispatches `args` to every subscriber live at the start of this call.
    pub fn emit(&self, args: Args) {
        let snapshot: Vec<Slot<Args>> = self.subscribers.lock().clone();
        for slot in &snapshot {
            let mut guard = slot.lock();
            if let Some(cb) = guard.as_mut() {
                cb(args.clone());
            }
        }
        self.subscribers.lock().retain(|s| s.lock().is_some());
    }
}

/// A live subscription to an [`Event`]. Disconnect explicitly with
/// [`Subscription::disconnect`]; subscriptions do not auto-disconnect on
/// drop (matching the reference runtime, where connections are held in a
/// `std::vector` for the lifetime of the owning object and disconnected
/// together in that object's destructor).
#[derive(Clone)]
pub struct Subscription<Args: Clone> {
    slot: Slot<Args>,
}

impl<Args: Clone> Subscription<Args> {
    pub fn disconnect(&self) {
        *self.slot.lock() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribers_fire_in_order() {
        let event: Event<i32> = Event::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let _s1 = event.connect(move |v| o1.lock().push(("a", v)));
        let o2 = order.clone();
        let _s2 = event.connect(move |v| o2.lock().push(("b", v)));

        event.emit(7);
        assert_eq!(*order.lock(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn disconnect_before_dispatch_is_skipped() {
        let event: Event<i32> = Event::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = event.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.disconnect();
        event.emit(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disconnect_mid_dispatch_skips_later_handler() {
        let event: Event<i32> = Event::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // Capture the second subscription so the first handler can disconnect it.
        let sub_slot: Arc<Mutex<Option<Subscription<i32>>>> = Arc::new(Mutex::new(None));
        let sub_slot_for_first = sub_slot.clone();
        let _s1 = event.connect(move |_| {
            if let Some(s) = sub_slot_for_first.lock().as_ref() {
                s.disconnect();
            }
        });
        let c = calls.clone();
        let s2 = event.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        *sub_slot.lock() = Some(s2);

        event.emit(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn connect_during_dispatch_does_not_join_current_pass() {
        let event: Arc<Event<i32>> = Arc::new(Event::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let late_sub: Arc<Mutex<Option<Subscription<i32>>>> = Arc::new(Mutex::new(None));

        let event_for_first = event.clone();
        let c = calls.clone();
        let late_sub_for_first = late_sub.clone();
        let _s1 = event.connect(move |_| {
            let c2 = c.clone();
            let sub = event_for_first.connect(move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
            });
            *late_sub_for_first.lock() = Some(sub);
        });

        event.emit(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        event.emit(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
