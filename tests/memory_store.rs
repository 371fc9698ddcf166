use std::sync::{Arc, Mutex};

use sc_pattern::content::LinkContent;
use sc_pattern::error::PatternError;
use sc_pattern::events::{EventsBlockingGuard, EventsPendingGuard, StoreEvent};
use sc_pattern::memory::{Memory, Session};
use sc_pattern::store::{Constraint, GraphStore};
use sc_pattern::types::{ElementAddr, ElementType};

fn node(session: &Session) -> ElementAddr {
    session.create_node(ElementType::CONST_NODE).expect("node")
}

fn arc(session: &Session, source: ElementAddr, target: ElementAddr) -> ElementAddr {
    session.create_connector(ElementType::CONST_PERM_POS_ARC, source, target).expect("arc")
}

fn recorder(memory: &Memory) -> Arc<Mutex<Vec<StoreEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    memory
        .subscribe(move |event| sink.lock().expect("events").push(event.clone()))
        .expect("subscribe");
    seen
}

#[test]
fn erase_takes_incident_connectors_along() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let relation = node(&session);
    let ab = arc(&session, a, b);
    let attribute = arc(&session, relation, ab);

    assert!(session.erase(a).expect("erase"));
    assert!(!session.is_element(ab));
    assert!(!session.is_element(attribute), "connector of a connector goes too");
    assert!(session.is_element(b));
    assert!(session.is_element(relation));
    assert_eq!(session.outgoing_count(relation).expect("count"), 0);
    assert_eq!(session.element_counts().expect("counts").connectors, 0);

    assert!(!session.erase(a).expect("erase"), "already gone");
}

#[test]
fn creation_checks_types_and_endpoints() {
    let memory = Memory::new();
    let session = memory.session();
    assert!(matches!(session.create_node(ElementType::CONST_LINK), Err(PatternError::InvalidType(_))));
    assert!(matches!(session.create_link(ElementType::CONST_NODE), Err(PatternError::InvalidType(_))));

    let a = node(&session);
    let b = node(&session);
    assert!(matches!(
        session.create_connector(ElementType::CONST_NODE, a, b),
        Err(PatternError::InvalidType(_))
    ));
    session.erase(b).expect("erase");
    assert!(session.create_connector(ElementType::CONST_PERM_POS_ARC, a, b).is_err());
    assert!(matches!(session.element_type(b), Err(PatternError::ItemNotFound(_))));
    assert!(session.connector_ends(a).is_err(), "a node has no ends");
}

#[test]
fn system_identifiers() {
    let memory = Memory::new();
    let session = memory.session();
    let first = session.resolve_system_identifier("concept_book", ElementType::CONST_NODE_CLASS).expect("resolve");
    let again = session.resolve_system_identifier("concept_book", ElementType::CONST_NODE).expect("resolve");
    assert_eq!(first, again);
    assert_eq!(session.element_type(first).expect("type"), ElementType::CONST_NODE_CLASS);
    assert_eq!(session.system_identifier_of(first).expect("idtf"), Some(String::from("concept_book")));

    let other = node(&session);
    assert!(matches!(
        session.set_system_identifier(other, "concept_book"),
        Err(PatternError::InvalidParams(_))
    ));
    assert!(session.set_system_identifier(other, "has spaces").is_err());
    assert!(session.resolve_system_identifier("", ElementType::CONST_NODE).is_err());

    session.erase(first).expect("erase");
    assert_eq!(session.find_by_system_identifier("concept_book").expect("find"), None);
    session.set_system_identifier(other, "concept_book").expect("identifier is free again");
}

#[test]
fn link_contents_are_indexed() {
    let memory = Memory::new();
    let session = memory.session();
    let first = session.create_link(ElementType::CONST_LINK).expect("link");
    let second = session.create_link(ElementType::CONST_LINK).expect("link");
    session.set_link_content(first, LinkContent::from("apple pie")).expect("content");
    session.set_link_content(second, LinkContent::from("apple")).expect("content");

    assert_eq!(session.link_content(first).expect("content"), Some(LinkContent::from("apple pie")));
    assert_eq!(session.find_links_by_content(&LinkContent::from("apple")).expect("find"), vec![second]);
    assert_eq!(session.find_links_by_content_prefix("apple").expect("find"), vec![first, second]);
    assert!(session.find_links_by_content(&LinkContent::Int(5)).expect("find").is_empty());

    session.set_link_content(second, LinkContent::Int(5)).expect("content");
    assert!(session.find_links_by_content(&LinkContent::from("apple")).expect("find").is_empty(), "old content unindexed");
    assert_eq!(session.find_links_by_content(&LinkContent::Int(5)).expect("find"), vec![second]);

    let n = node(&session);
    assert!(session.set_link_content(n, LinkContent::from("x")).is_err());
}

#[test]
fn subtype_changes_keep_the_kind() {
    let memory = Memory::new();
    let session = memory.session();
    let n = session.create_node(ElementType::VAR_NODE).expect("node");
    session.set_element_subtype(n, ElementType::CONST_NODE_CLASS).expect("subtype");
    assert_eq!(session.element_type(n).expect("type"), ElementType::CONST_NODE_CLASS);
    assert!(matches!(
        session.set_element_subtype(n, ElementType::CONST_PERM_POS_ARC),
        Err(PatternError::InvalidType(_))
    ));
}

#[test]
fn constrained_iteration() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let relation = node(&session);
    let ab = arc(&session, a, b);
    let edge = session.create_connector(ElementType::CONST_COMMON_EDGE, a, relation).expect("edge");
    let attribute = arc(&session, relation, ab);

    let from_a = session
        .iter3(a.into(), ElementType::UNKNOWN.into(), Constraint::any())
        .expect("iter");
    assert_eq!(from_a.len(), 2);
    assert!(from_a.contains(&[a, ab, b]));
    assert!(from_a.contains(&[a, edge, relation]));

    let into_a = session
        .iter3(Constraint::any(), ElementType::VAR_COMMON_EDGE.into(), a.into())
        .expect("iter");
    assert!(into_a.is_empty(), "constancy must match");
    let into_a = session
        .iter3(Constraint::any(), ElementType::CONST_COMMON_EDGE.into(), a.into())
        .expect("iter");
    assert_eq!(into_a, vec![[relation, edge, a]], "common edges work from both ends");

    let quintuples = session
        .iter5(a.into(), ElementType::CONST_PERM_POS_ARC.into(), Constraint::any(), Constraint::any(), relation.into())
        .expect("iter");
    assert_eq!(quintuples, vec![[a, ab, b, attribute, relation]]);

    assert!(session.has_connector(a, b, ElementType::CONST_PERM_POS_ARC).expect("lookup"));
    assert!(!session.has_connector(b, a, ElementType::CONST_PERM_POS_ARC).expect("lookup"));
    assert_eq!(session.outgoing_count(a).expect("count"), 2);

    let counts = session.element_counts().expect("counts");
    assert_eq!((counts.nodes, counts.links, counts.connectors), (3, 0, 3));
    assert_eq!(counts.total(), 6);
}

#[test]
fn events_reach_subscribers() {
    let memory = Memory::new();
    let session = memory.session();
    let seen = recorder(&memory);
    let a = node(&session);
    let b = node(&session);
    let ab = arc(&session, a, b);

    assert_eq!(
        seen.lock().expect("events").as_slice(),
        &[StoreEvent::ConnectorAdded { connector: ab, ty: ElementType::CONST_PERM_POS_ARC, source: a, target: b }]
    );
    session.erase(ab).expect("erase");
    let events = seen.lock().expect("events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[1], StoreEvent::ConnectorRemoved { connector: ab, source: a, target: b });
    assert_eq!(events[2].subject(), ab);
}

#[test]
fn blocking_regions_drop_events() {
    let memory = Memory::new();
    let session = memory.session();
    let seen = recorder(&memory);
    let a = node(&session);
    {
        let _guard = EventsBlockingGuard::new(&session);
        arc(&session, a, a);
    }
    assert!(seen.lock().expect("events").is_empty());
    arc(&session, a, a);
    assert_eq!(seen.lock().expect("events").len(), 1);
}

#[test]
fn nested_pending_regions_flush_once() {
    let memory = Memory::new();
    let session = memory.session();
    let seen = recorder(&memory);
    let a = node(&session);
    {
        let _outer = EventsPendingGuard::new(&session);
        {
            let _inner = EventsPendingGuard::new(&session);
            arc(&session, a, a);
        }
        assert!(seen.lock().expect("events").is_empty(), "still inside the outer region");
        arc(&session, a, a);
    }
    assert_eq!(seen.lock().expect("events").len(), 2);

    // other sessions are not affected by this session's regions
    let other = memory.session();
    let _pending = EventsPendingGuard::new(&session);
    arc(&other, a, a);
    assert_eq!(seen.lock().expect("events").len(), 3);
}

#[test]
fn unsubscribed_callbacks_stay_quiet() {
    let memory = Memory::new();
    let session = memory.session();
    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    let id = memory.subscribe(move |_| *sink.lock().expect("count") += 1).expect("subscribe");
    let a = node(&session);
    arc(&session, a, a);
    assert!(memory.unsubscribe(id).expect("unsubscribe"));
    assert!(!memory.unsubscribe(id).expect("unsubscribe"));
    arc(&session, a, a);
    assert_eq!(*seen.lock().expect("count"), 1);
}
