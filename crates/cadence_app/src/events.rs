//! Named event dispatch
//!
//! Listeners for each event name are kept in an [`UpdateList`], so a listener
//! may register or remove listeners (including itself) while an event is
//! being delivered. Dispatching an event from inside one of its own listeners
//! does nothing; use [`EventDispatcher::defer`] to queue it for the next
//! [`EventDispatcher::dispatch_deferred`].
//!
//! The dispatcher is an ordinary value. The app creates one and publishes it
//! through the root [`Context`](crate::Context) under [`EVENT_DISPATCH_KEY`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cadence_core::{EntryId, UpdateList};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{AppError, Result};

/// Context key under which the app publishes its dispatcher
pub const EVENT_DISPATCH_KEY: &str = "event_dispatch";

type Listener<D> = Box<dyn FnMut(&D)>;

struct DispatcherInner<D> {
    listeners: RefCell<FxHashMap<String, Rc<UpdateList<Listener<D>>>>>,
    deferred: RefCell<Vec<(String, D)>>,
    disposed: Cell<bool>,
}

/// Delivers named events to registered listeners in registration order
///
/// Cloning yields another handle to the same dispatcher.
pub struct EventDispatcher<D = Value> {
    inner: Rc<DispatcherInner<D>>,
}

impl<D: 'static> EventDispatcher<D> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DispatcherInner {
                listeners: RefCell::new(FxHashMap::default()),
                deferred: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Register `callback` for `event`
    pub fn listen<F>(&self, event: &str, callback: F) -> EntryId
    where
        F: FnMut(&D) + 'static,
    {
        if self.inner.disposed.get() {
            tracing::warn!(event, "listener added to a disposed event dispatcher");
            return EntryId::default();
        }
        let list = self
            .inner
            .listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .clone();
        list.add(Box::new(callback))
    }

    /// Remove the listener registered under `id`
    pub fn unlisten(&self, event: &str, id: EntryId) -> bool {
        let Some(list) = self.listeners_of(event) else {
            return false;
        };
        let removed = list.remove(id);
        self.prune(event, &list);
        removed
    }

    /// Deliver `details` to every listener of `event` registered so far
    pub fn dispatch(&self, event: &str, details: &D) {
        let Some(list) = self.listeners_of(event) else {
            return;
        };
        trace!(event, listeners = list.len(), "dispatching event");
        list.update(
            |listener| {
                listener(details);
                false
            },
            false,
        );
        // listeners may have removed themselves during delivery
        self.prune(event, &list);
    }

    /// Queue an event for the next [`dispatch_deferred`](Self::dispatch_deferred)
    pub fn defer(&self, event: &str, details: D) {
        self.inner
            .deferred
            .borrow_mut()
            .push((event.to_string(), details));
    }

    /// Deliver every queued event in the order it was deferred
    ///
    /// Events deferred while this runs wait for the next call.
    pub fn dispatch_deferred(&self) {
        let queued = std::mem::take(&mut *self.inner.deferred.borrow_mut());
        for (event, details) in queued {
            self.dispatch(&event, &details);
        }
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners_of(event)
            .is_some_and(|list| !list.is_clear())
    }

    pub fn deferred_len(&self) -> usize {
        self.inner.deferred.borrow().len()
    }

    /// Drop every listener and queued event
    pub fn dispose(&self) -> Result<()> {
        if self.inner.disposed.replace(true) {
            return Err(AppError::AlreadyDisposed("event dispatcher"));
        }
        debug!("disposing event dispatcher");
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        let deferred = std::mem::take(&mut *self.inner.deferred.borrow_mut());
        drop((listeners, deferred));
        Ok(())
    }

    /// Forget the list for `event` once it is empty and idle
    fn prune(&self, event: &str, list: &Rc<UpdateList<Listener<D>>>) {
        if !list.is_clear() || list.is_iterating() {
            return;
        }
        let mut listeners = self.inner.listeners.borrow_mut();
        if listeners
            .get(event)
            .is_some_and(|current| Rc::ptr_eq(current, list))
        {
            listeners.remove(event);
        }
    }

    fn listeners_of(&self, event: &str) -> Option<Rc<UpdateList<Listener<D>>>> {
        self.inner.listeners.borrow().get(event).cloned()
    }
}

impl<D> Clone for EventDispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: 'static> Default for EventDispatcher<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for EventDispatcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.inner.listeners.borrow().len())
            .field("deferred", &self.inner.deferred.borrow().len())
            .finish()
    }
}

/// A listener registration that can be paused and later removed
pub struct EventListener<D: 'static = Value> {
    dispatcher: Option<EventDispatcher<D>>,
    event: String,
    id: EntryId,
    enabled: Rc<Cell<bool>>,
}

impl<D: 'static> EventListener<D> {
    pub fn new<F>(dispatcher: &EventDispatcher<D>, event: &str, mut callback: F) -> Self
    where
        F: FnMut(&D) + 'static,
    {
        let enabled = Rc::new(Cell::new(true));
        let gate = enabled.clone();
        let id = dispatcher.listen(event, move |details| {
            if gate.get() {
                callback(details);
            }
        });
        Self {
            dispatcher: Some(dispatcher.clone()),
            event: event.to_string(),
            id,
            enabled,
        }
    }

    /// Pause or resume delivery without giving up the registration
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Remove the registration; later calls do nothing
    pub fn dispose(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.unlisten(&self.event, self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.dispatcher.is_none()
    }
}

impl<D: 'static> fmt::Debug for EventListener<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("event", &self.event)
            .field("enabled", &self.enabled.get())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
