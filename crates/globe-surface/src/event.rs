//! Synchronous observer lists with handle-based teardown.
//!
//! [`EventSource::subscribe`] returns a [`Subscription`]; the listener stays
//! registered until the handle is dropped or [`Subscription::unsubscribe`] is
//! called. Listeners run on the raising thread, in registration order.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Registry<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A list of listeners for events of type `T`.
pub struct EventSource<T: 'static> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: 'static> EventSource<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. It is removed when the returned handle drops.
    #[must_use = "the listener is removed as soon as the subscription is dropped"]
    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            let listener: Listener<T> = Rc::new(RefCell::new(listener));
            registry.listeners.push((id, listener));
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().listeners.retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    /// Call every listener with `event`.
    ///
    /// Listeners may subscribe or drop subscriptions while being called; a
    /// listener removed during the raise is not called afterwards, and one
    /// added during the raise first hears the next event.
    pub fn raise(&self, event: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|(id, l)| (*id, Rc::clone(l)))
            .collect();

        for (id, listener) in snapshot {
            let still_registered = self
                .registry
                .borrow()
                .listeners
                .iter()
                .any(|(i, _)| *i == id);
            if !still_registered {
                continue;
            }
            // A listener that raises this same event again is not re-entered.
            if let Ok(mut listener) = listener.try_borrow_mut() {
                listener(event);
            }
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }
}

impl<T: 'static> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> std::fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_raise_in_registration_order() {
        let source = EventSource::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&log);
        let _first = source.subscribe(move |v| a.borrow_mut().push(("first", *v)));
        let b = Rc::clone(&log);
        let _second = source.subscribe(move |v| b.borrow_mut().push(("second", *v)));

        source.raise(&7);
        assert_eq!(*log.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let source = EventSource::<()>::new();
        let count = Rc::new(Cell::new(0));

        let c = Rc::clone(&count);
        let subscription = source.subscribe(move |()| c.set(c.get() + 1));
        source.raise(&());
        drop(subscription);
        source.raise(&());

        assert_eq!(count.get(), 1);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let source = EventSource::<()>::new();
        let subscription = source.subscribe(|()| {});
        assert_eq!(source.listener_count(), 1);
        subscription.unsubscribe();
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_source() {
        let source = EventSource::<()>::new();
        let subscription = source.subscribe(|()| {});
        drop(source);
        drop(subscription);
    }

    #[test]
    fn test_listener_removed_during_raise_is_skipped() {
        let source = EventSource::<()>::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let called = Rc::new(Cell::new(false));

        let v = Rc::clone(&victim);
        let _killer = source.subscribe(move |()| {
            v.borrow_mut().take();
        });
        let c = Rc::clone(&called);
        *victim.borrow_mut() = Some(source.subscribe(move |()| c.set(true)));

        source.raise(&());
        assert!(!called.get());
    }
}
