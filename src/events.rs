//! Change notifications and the scoped regions that defer or suppress them.
//!
//! Events are produced by store mutations and delivered synchronously to the
//! subscribers of a [`crate::memory::Memory`]. A session may enter an
//! events-pending region, where delivery is postponed until the outermost
//! region ends, or an events-blocking region, where events are dropped.

use std::fmt;
use std::sync::Arc;

use crate::store::GraphStore;
use crate::types::{ElementAddr, ElementType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ConnectorAdded { connector: ElementAddr, ty: ElementType, source: ElementAddr, target: ElementAddr },
    ConnectorRemoved { connector: ElementAddr, source: ElementAddr, target: ElementAddr },
    ElementErased { element: ElementAddr },
    ContentChanged { link: ElementAddr },
}

impl StoreEvent {
    /// The element the event is about.
    pub fn subject(&self) -> ElementAddr {
        match self {
            StoreEvent::ConnectorAdded { connector, .. } => *connector,
            StoreEvent::ConnectorRemoved { connector, .. } => *connector,
            StoreEvent::ElementErased { element } => *element,
            StoreEvent::ContentChanged { link } => *link,
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ------------- Subscribers -------------
#[derive(Default)]
pub struct Subscribers {
    next: u64,
    list: Vec<(SubscriptionId, Subscriber)>,
}

impl Subscribers {
    pub fn new() -> Self { Self::default() }
    pub fn add(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.next += 1;
        let id = SubscriptionId(self.next);
        self.list.push((id, subscriber));
        id
    }
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.list.len();
        self.list.retain(|(i, _)| *i != id);
        self.list.len() != before
    }
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.list.iter().map(|(_, s)| Arc::clone(s)).collect()
    }
    pub fn len(&self) -> usize { self.list.len() }
    pub fn is_empty(&self) -> bool { self.list.is_empty() }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Subscribers({})", self.list.len())
    }
}

// ------------- EventGate -------------
/// Per-session delivery state.
#[derive(Debug, Default)]
pub struct EventGate {
    pending: usize,
    blocking: usize,
    queue: Vec<StoreEvent>,
}

impl EventGate {
    pub fn new() -> Self { Self::default() }
    /// Returns the events that may be delivered right away.
    pub fn admit(&mut self, events: Vec<StoreEvent>) -> Vec<StoreEvent> {
        if self.blocking > 0 {
            Vec::new()
        } else if self.pending > 0 {
            self.queue.extend(events);
            Vec::new()
        } else {
            events
        }
    }
    pub fn begin_pending(&mut self) { self.pending += 1; }
    /// Returns the queued events once the outermost pending region ends.
    pub fn end_pending(&mut self) -> Vec<StoreEvent> {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 { std::mem::take(&mut self.queue) } else { Vec::new() }
    }
    pub fn begin_blocking(&mut self) { self.blocking += 1; }
    pub fn end_blocking(&mut self) { self.blocking = self.blocking.saturating_sub(1); }
    pub fn is_pending(&self) -> bool { self.pending > 0 }
    pub fn is_blocking(&self) -> bool { self.blocking > 0 }
}

// ------------- Guards -------------
/// Defers event delivery for `store` until dropped.
pub struct EventsPendingGuard<'s, S: GraphStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GraphStore + ?Sized> EventsPendingGuard<'s, S> {
    pub fn new(store: &'s S) -> Self {
        store.begin_events_pending();
        Self { store }
    }
}

impl<S: GraphStore + ?Sized> Drop for EventsPendingGuard<'_, S> {
    fn drop(&mut self) { self.store.end_events_pending(); }
}

/// Drops every event produced through `store` until dropped.
pub struct EventsBlockingGuard<'s, S: GraphStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GraphStore + ?Sized> EventsBlockingGuard<'s, S> {
    pub fn new(store: &'s S) -> Self {
        store.begin_events_blocking();
        Self { store }
    }
}

impl<S: GraphStore + ?Sized> Drop for EventsBlockingGuard<'_, S> {
    fn drop(&mut self) { self.store.end_events_blocking(); }
}
