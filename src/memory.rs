//! In-process graph store.
//!
//! A [`Memory`] owns the graph and the event subscribers; it is cheap to clone
//! and may be shared between threads. Work is done through a [`Session`], which
//! implements [`GraphStore`] and carries the per-caller event delivery state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

// used to keep the one-to-one mapping between system identifiers and elements
use bimap::BiMap;

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

use lazy_static::lazy_static;
use regex::Regex;
use roaring::RoaringTreemap;
use tracing::{debug, trace};

use crate::content::LinkContent;
use crate::error::{PatternError, Result};
use crate::events::{EventGate, StoreEvent, Subscriber, Subscribers, SubscriptionId};
use crate::settings::Settings;
use crate::store::{Constraint, ElementCounts, GraphStore, Triple};
use crate::types::{ElementAddr, ElementType};

pub type AddrHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

lazy_static! {
    static ref SYSTEM_IDENTIFIER: Regex =
        Regex::new(r"^[a-zA-Z0-9_.\-]+$").expect("system identifier pattern");
}

pub fn is_valid_system_identifier(idtf: &str) -> bool {
    SYSTEM_IDENTIFIER.is_match(idtf)
}

// ------------- AddrGenerator -------------
#[derive(Debug, Default)]
pub struct AddrGenerator {
    lower_bound: u64,
    released: Vec<ElementAddr>,
}

impl AddrGenerator {
    pub fn new() -> Self { Self::default() }
    // Erased addresses are handed out again, but never while the element is alive.
    pub fn release(&mut self, addr: ElementAddr) {
        self.released.push(addr);
    }
    pub fn generate(&mut self) -> ElementAddr {
        self.released.pop().unwrap_or_else(|| {
            self.lower_bound += 1;
            ElementAddr::new(self.lower_bound)
        })
    }
}

// ------------- Element -------------
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBody {
    Node,
    Link(Option<LinkContent>),
    Connector { source: ElementAddr, target: ElementAddr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    ty: ElementType,
    body: ElementBody,
}

impl Element {
    pub fn ty(&self) -> ElementType { self.ty }
    pub fn body(&self) -> &ElementBody { &self.body }
    pub fn ends(&self) -> Option<(ElementAddr, ElementAddr)> {
        match self.body {
            ElementBody::Connector { source, target } => Some((source, target)),
            _ => None,
        }
    }
}

// ------------- Lookups -------------
/// Insertion ordered multimap, so iteration order follows creation order.
#[derive(Debug)]
pub struct Lookup<K, V, H = AddrHasher> {
    index: HashMap<K, Vec<V>, H>,
}

impl<K: Eq + std::hash::Hash, V: PartialEq + Copy, H: std::hash::BuildHasher + Default> Lookup<K, V, H> {
    pub fn new() -> Self {
        Self { index: HashMap::<K, Vec<V>, H>::default() }
    }
    pub fn insert(&mut self, key: K, value: V) {
        self.index.entry(key).or_default().push(value);
    }
    pub fn remove(&mut self, key: &K, value: V) {
        if let Some(values) = self.index.get_mut(key) {
            values.retain(|v| *v != value);
        }
    }
    pub fn drop_key(&mut self, key: &K) -> Vec<V> {
        self.index.remove(key).unwrap_or_default()
    }
    pub fn lookup(&self, key: &K) -> &[V] {
        self.index.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl<K: Eq + std::hash::Hash, V: PartialEq + Copy, H: std::hash::BuildHasher + Default> Default for Lookup<K, V, H> {
    fn default() -> Self { Self::new() }
}

// ------------- Graph -------------
#[derive(Debug, Default)]
pub struct Graph {
    generator: AddrGenerator,
    elements: HashMap<ElementAddr, Element, AddrHasher>,
    outgoing: Lookup<ElementAddr, ElementAddr>,
    incoming: Lookup<ElementAddr, ElementAddr>,
    identifiers: BiMap<String, ElementAddr>,
    content_index: HashMap<blake3::Hash, RoaringTreemap, OtherHasher>,
}

impl Graph {
    pub fn new() -> Self { Self::default() }

    fn element(&self, addr: ElementAddr) -> Result<&Element> {
        self.elements
            .get(&addr)
            .ok_or_else(|| PatternError::ItemNotFound(format!("element {} does not exist", addr)))
    }

    fn insert(&mut self, ty: ElementType, body: ElementBody) -> ElementAddr {
        let addr = self.generator.generate();
        self.elements.insert(addr, Element { ty, body });
        addr
    }

    pub fn create_node(&mut self, ty: ElementType) -> Result<ElementAddr> {
        if !ty.is_unknown() && (!ty.is_node() || ty.is_connector() || ty.is_link()) {
            return Err(PatternError::InvalidType(format!("{} is not a node type", ty)));
        }
        Ok(self.insert(ty | ElementType::NODE, ElementBody::Node))
    }

    pub fn create_link(&mut self, ty: ElementType) -> Result<ElementAddr> {
        if !ty.is_unknown() && (!ty.is_link() || ty.is_connector() || ty.is_node()) {
            return Err(PatternError::InvalidType(format!("{} is not a link type", ty)));
        }
        Ok(self.insert(ty | ElementType::LINK, ElementBody::Link(None)))
    }

    pub fn create_connector(
        &mut self,
        ty: ElementType,
        source: ElementAddr,
        target: ElementAddr,
    ) -> Result<(ElementAddr, StoreEvent)> {
        if !ty.is_connector() || ty.is_node() || ty.is_link() {
            return Err(PatternError::InvalidType(format!("{} is not a connector type", ty)));
        }
        self.element(source)?;
        self.element(target)?;
        let connector = self.insert(ty, ElementBody::Connector { source, target });
        self.outgoing.insert(source, connector);
        self.incoming.insert(target, connector);
        Ok((connector, StoreEvent::ConnectorAdded { connector, ty, source, target }))
    }

    pub fn erase(&mut self, addr: ElementAddr) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        if !self.elements.contains_key(&addr) {
            return events;
        }
        // every connector reachable through incidence goes with the element
        let mut order = Vec::new();
        let mut seen = RoaringTreemap::new();
        let mut stack = vec![addr];
        while let Some(current) = stack.pop() {
            if seen.insert(current.hash()) {
                order.push(current);
                stack.extend_from_slice(self.outgoing.lookup(&current));
                stack.extend_from_slice(self.incoming.lookup(&current));
            }
        }
        for current in order.into_iter().rev() {
            self.remove_one(current, &mut events);
        }
        events
    }

    fn remove_one(&mut self, addr: ElementAddr, events: &mut Vec<StoreEvent>) {
        let Some(element) = self.elements.remove(&addr) else { return };
        match element.body {
            ElementBody::Connector { source, target } => {
                self.outgoing.remove(&source, addr);
                self.incoming.remove(&target, addr);
                events.push(StoreEvent::ConnectorRemoved { connector: addr, source, target });
            }
            ElementBody::Link(Some(ref content)) => self.unindex_content(addr, content),
            _ => (),
        }
        self.outgoing.drop_key(&addr);
        self.incoming.drop_key(&addr);
        self.identifiers.remove_by_right(&addr);
        self.generator.release(addr);
        events.push(StoreEvent::ElementErased { element: addr });
    }

    pub fn set_element_subtype(&mut self, addr: ElementAddr, ty: ElementType) -> Result<()> {
        let element = self
            .elements
            .get_mut(&addr)
            .ok_or_else(|| PatternError::ItemNotFound(format!("element {} does not exist", addr)))?;
        if ty.kind() != element.ty.kind() && !ty.kind().is_unknown() {
            return Err(PatternError::InvalidType(format!(
                "cannot change {} into {}",
                element.ty, ty
            )));
        }
        element.ty = ty | element.ty.kind();
        Ok(())
    }

    fn admits(&self, constraint: &Constraint, addr: ElementAddr) -> bool {
        match constraint {
            Constraint::Fixed(fixed) => *fixed == addr,
            Constraint::Type(_) => self
                .elements
                .get(&addr)
                .is_some_and(|e| constraint.admits(addr, e.ty)),
        }
    }

    pub fn iter3(&self, source: Constraint, connector: Constraint, target: Constraint) -> Vec<Triple> {
        let candidates: Vec<ElementAddr> = match (source, connector, target) {
            (_, Constraint::Fixed(c), _) => vec![c],
            (Constraint::Fixed(s), _, _) => {
                let mut list = self.outgoing.lookup(&s).to_vec();
                list.extend(self.common_edges(self.incoming.lookup(&s)));
                list
            }
            (_, _, Constraint::Fixed(t)) => {
                let mut list = self.incoming.lookup(&t).to_vec();
                list.extend(self.common_edges(self.outgoing.lookup(&t)));
                list
            }
            _ => {
                let mut all: Vec<ElementAddr> = self
                    .elements
                    .iter()
                    .filter(|(_, e)| e.ends().is_some())
                    .map(|(a, _)| *a)
                    .collect();
                all.sort_unstable();
                all
            }
        };
        let mut seen = RoaringTreemap::new();
        let mut found = Vec::new();
        for c in candidates {
            if !seen.insert(c.hash()) {
                continue;
            }
            let Some(element) = self.elements.get(&c) else { continue };
            let Some((s, t)) = element.ends() else { continue };
            if !connector.admits(c, element.ty) {
                continue;
            }
            if self.admits(&source, s) && self.admits(&target, t) {
                found.push([s, c, t]);
            }
            // common edges have no direction
            if element.ty.is_common_edge() && s != t && self.admits(&source, t) && self.admits(&target, s) {
                found.push([t, c, s]);
            }
        }
        found
    }

    fn common_edges<'a>(&'a self, connectors: &'a [ElementAddr]) -> impl Iterator<Item = ElementAddr> + 'a {
        connectors
            .iter()
            .copied()
            .filter(|c| self.elements.get(c).is_some_and(|e| e.ty.is_common_edge()))
    }

    pub fn outgoing_count(&self, addr: ElementAddr) -> usize {
        self.outgoing.lookup(&addr).len()
    }

    // ------------- identifiers -------------
    pub fn set_system_identifier(&mut self, addr: ElementAddr, idtf: &str) -> Result<()> {
        if !is_valid_system_identifier(idtf) {
            return Err(PatternError::InvalidParams(format!("invalid system identifier '{}'", idtf)));
        }
        self.element(addr)?;
        if let Some(owner) = self.identifiers.get_by_left(idtf) {
            if *owner != addr {
                return Err(PatternError::InvalidParams(format!(
                    "system identifier '{}' already belongs to {}",
                    idtf, owner
                )));
            }
        }
        self.identifiers.insert(idtf.to_owned(), addr);
        Ok(())
    }

    pub fn find_by_system_identifier(&self, idtf: &str) -> Option<ElementAddr> {
        self.identifiers.get_by_left(idtf).copied()
    }

    pub fn system_identifier_of(&self, addr: ElementAddr) -> Option<String> {
        self.identifiers.get_by_right(&addr).cloned()
    }

    // ------------- content -------------
    pub fn set_link_content(&mut self, link: ElementAddr, content: LinkContent) -> Result<StoreEvent> {
        let element = self
            .elements
            .get_mut(&link)
            .ok_or_else(|| PatternError::ItemNotFound(format!("element {} does not exist", link)))?;
        let ElementBody::Link(slot) = &mut element.body else {
            return Err(PatternError::InvalidType(format!("{} is not a link", link)));
        };
        let previous = slot.replace(content.clone());
        if let Some(previous) = previous {
            self.unindex_content(link, &previous);
        }
        self.content_index.entry(content.digest()).or_default().insert(link.hash());
        Ok(StoreEvent::ContentChanged { link })
    }

    fn unindex_content(&mut self, link: ElementAddr, content: &LinkContent) {
        let digest = content.digest();
        if let Some(links) = self.content_index.get_mut(&digest) {
            links.remove(link.hash());
            if links.is_empty() {
                self.content_index.remove(&digest);
            }
        }
    }

    pub fn link_content(&self, link: ElementAddr) -> Result<Option<LinkContent>> {
        match &self.element(link)?.body {
            ElementBody::Link(content) => Ok(content.clone()),
            _ => Err(PatternError::InvalidType(format!("{} is not a link", link))),
        }
    }

    pub fn find_links_by_content(&self, content: &LinkContent) -> Vec<ElementAddr> {
        self.content_index
            .get(&content.digest())
            .map(|links| links.iter().map(ElementAddr::from_hash).collect())
            .unwrap_or_default()
    }

    pub fn find_links_by_content_prefix(&self, prefix: &str) -> Vec<ElementAddr> {
        let mut found: Vec<ElementAddr> = self
            .elements
            .iter()
            .filter_map(|(addr, e)| match &e.body {
                ElementBody::Link(Some(LinkContent::String(s))) if s.starts_with(prefix) => Some(*addr),
                _ => None,
            })
            .collect();
        found.sort_unstable();
        found
    }

    pub fn counts(&self) -> ElementCounts {
        let mut counts = ElementCounts::default();
        for element in self.elements.values() {
            match element.body {
                ElementBody::Node => counts.nodes += 1,
                ElementBody::Link(_) => counts.links += 1,
                ElementBody::Connector { .. } => counts.connectors += 1,
            }
        }
        counts
    }
}

// ------------- Memory -------------
#[derive(Debug, Clone, Default)]
pub struct Memory {
    // owns the graph with its generator and indexes
    pub graph: Arc<Mutex<Graph>>,
    // owns the registered event subscribers
    pub subscribers: Arc<RwLock<Subscribers>>,
}

impl Memory {
    pub fn new() -> Self { Self::default() }

    /// Creates a memory with the configured keynodes already resolved.
    pub fn with_settings(settings: &Settings) -> Result<Self> {
        let memory = Self::new();
        let session = memory.session();
        for idtf in &settings.keynodes {
            session.resolve_system_identifier(idtf, ElementType::CONST_NODE)?;
        }
        debug!(keynodes = settings.keynodes.len(), "memory initialized");
        Ok(memory)
    }

    pub fn graph(&self) -> Arc<Mutex<Graph>> {
        Arc::clone(&self.graph)
    }
    pub fn session(&self) -> Session {
        Session { memory: self.clone(), gate: RefCell::new(EventGate::new()) }
    }
    pub fn subscribe<F>(&self, subscriber: F) -> Result<SubscriptionId>
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let subscriber: Subscriber = Arc::new(subscriber);
        Ok(self.subscribers.write()?.add(subscriber))
    }
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        Ok(self.subscribers.write()?.remove(id))
    }

    fn deliver(&self, events: Vec<StoreEvent>) {
        if events.is_empty() {
            return;
        }
        let subscribers = match self.subscribers.read() {
            Ok(s) => s.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        };
        for event in &events {
            trace!(?event, "delivering");
            for subscriber in &subscribers {
                subscriber(event);
            }
        }
    }
}

// ------------- Session -------------
#[derive(Debug)]
pub struct Session {
    memory: Memory,
    gate: RefCell<EventGate>,
}

impl Session {
    pub fn memory(&self) -> &Memory { &self.memory }

    fn graph(&self) -> Result<MutexGuard<'_, Graph>> {
        Ok(self.memory.graph.lock()?)
    }

    fn publish(&self, events: Vec<StoreEvent>) {
        let admitted = self.gate.borrow_mut().admit(events);
        self.memory.deliver(admitted);
    }
}

impl GraphStore for Session {
    fn create_node(&self, ty: ElementType) -> Result<ElementAddr> {
        self.graph()?.create_node(ty)
    }
    fn create_link(&self, ty: ElementType) -> Result<ElementAddr> {
        self.graph()?.create_link(ty)
    }
    fn create_connector(&self, ty: ElementType, source: ElementAddr, target: ElementAddr) -> Result<ElementAddr> {
        let (connector, event) = self.graph()?.create_connector(ty, source, target)?;
        self.publish(vec![event]);
        Ok(connector)
    }
    fn erase(&self, addr: ElementAddr) -> Result<bool> {
        let events = self.graph()?.erase(addr);
        let erased = !events.is_empty();
        self.publish(events);
        Ok(erased)
    }
    fn is_element(&self, addr: ElementAddr) -> bool {
        match self.memory.graph.lock() {
            Ok(graph) => graph.elements.contains_key(&addr),
            Err(poisoned) => poisoned.into_inner().elements.contains_key(&addr),
        }
    }
    fn element_type(&self, addr: ElementAddr) -> Result<ElementType> {
        Ok(self.graph()?.element(addr)?.ty)
    }
    fn set_element_subtype(&self, addr: ElementAddr, ty: ElementType) -> Result<()> {
        self.graph()?.set_element_subtype(addr, ty)
    }
    fn connector_ends(&self, connector: ElementAddr) -> Result<(ElementAddr, ElementAddr)> {
        self.graph()?
            .element(connector)?
            .ends()
            .ok_or_else(|| PatternError::InvalidType(format!("{} is not a connector", connector)))
    }
    fn iter3(&self, source: Constraint, connector: Constraint, target: Constraint) -> Result<Vec<Triple>> {
        Ok(self.graph()?.iter3(source, connector, target))
    }
    fn outgoing_count(&self, addr: ElementAddr) -> Result<usize> {
        Ok(self.graph()?.outgoing_count(addr))
    }
    fn find_by_system_identifier(&self, idtf: &str) -> Result<Option<ElementAddr>> {
        Ok(self.graph()?.find_by_system_identifier(idtf))
    }
    fn resolve_system_identifier(&self, idtf: &str, ty: ElementType) -> Result<ElementAddr> {
        let mut graph = self.graph()?;
        if let Some(addr) = graph.find_by_system_identifier(idtf) {
            return Ok(addr);
        }
        if !is_valid_system_identifier(idtf) {
            return Err(PatternError::InvalidParams(format!("invalid system identifier '{}'", idtf)));
        }
        let addr = graph.create_node(ty)?;
        graph.set_system_identifier(addr, idtf)?;
        Ok(addr)
    }
    fn set_system_identifier(&self, addr: ElementAddr, idtf: &str) -> Result<()> {
        self.graph()?.set_system_identifier(addr, idtf)
    }
    fn system_identifier_of(&self, addr: ElementAddr) -> Result<Option<String>> {
        Ok(self.graph()?.system_identifier_of(addr))
    }
    fn set_link_content(&self, link: ElementAddr, content: LinkContent) -> Result<()> {
        let event = self.graph()?.set_link_content(link, content)?;
        self.publish(vec![event]);
        Ok(())
    }
    fn link_content(&self, link: ElementAddr) -> Result<Option<LinkContent>> {
        self.graph()?.link_content(link)
    }
    fn find_links_by_content(&self, content: &LinkContent) -> Result<Vec<ElementAddr>> {
        Ok(self.graph()?.find_links_by_content(content))
    }
    fn find_links_by_content_prefix(&self, prefix: &str) -> Result<Vec<ElementAddr>> {
        Ok(self.graph()?.find_links_by_content_prefix(prefix))
    }
    fn element_counts(&self) -> Result<ElementCounts> {
        Ok(self.graph()?.counts())
    }
    fn begin_events_pending(&self) {
        self.gate.borrow_mut().begin_pending();
    }
    fn end_events_pending(&self) {
        let flushed = self.gate.borrow_mut().end_pending();
        self.memory.deliver(flushed);
    }
    fn begin_events_blocking(&self) {
        self.gate.borrow_mut().begin_blocking();
    }
    fn end_events_blocking(&self) {
        self.gate.borrow_mut().end_blocking();
    }
}
