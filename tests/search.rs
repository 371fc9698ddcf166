use std::collections::BTreeSet;

use sc_pattern::error::PatternError;
use sc_pattern::generate::generate;
use sc_pattern::memory::{Memory, Session};
use sc_pattern::params::Substitutions;
use sc_pattern::pattern::{Pattern, WithAlias};
use sc_pattern::row::MatchRow;
use sc_pattern::search::{Search, SearchRequest, search};
use sc_pattern::store::GraphStore;
use sc_pattern::types::{ElementAddr, ElementType};

fn node(session: &Session) -> ElementAddr {
    session.create_node(ElementType::CONST_NODE).expect("node")
}

fn arc(session: &Session, source: ElementAddr, target: ElementAddr) -> ElementAddr {
    session.create_connector(ElementType::CONST_PERM_POS_ARC, source, target).expect("arc")
}

fn members_of(pattern_source: ElementAddr) -> Pattern {
    let mut pattern = Pattern::new();
    pattern
        .triple(pattern_source, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("x"))
        .expect("pattern");
    pattern
}

/// Every alias of the pattern resolves to one element per row.
fn assert_alias_consistency(pattern: &Pattern, row: &MatchRow) {
    for triple in pattern.triples() {
        for (column, item) in triple.items().iter().enumerate() {
            if let Some(alias) = item.alias() {
                assert_eq!(row.get(alias), row.get_index(triple.index() * 3 + column), "alias {}", alias);
            }
        }
    }
}

#[test]
fn finds_one_row_then_two() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    arc(&session, a, b);
    let pattern = members_of(a);

    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(b));

    let c = node(&session);
    arc(&session, a, c);
    let rows = search(&session, &pattern).expect("search");
    let found: BTreeSet<ElementAddr> = rows.iter().filter_map(|r| r.get("x")).collect();
    assert_eq!(found, BTreeSet::from([b, c]));
}

#[test]
fn type_constraints_filter_candidates() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let link = session.create_link(ElementType::CONST_LINK).expect("link");
    let b = node(&session);
    arc(&session, a, link);
    arc(&session, a, b);
    session.create_connector(ElementType::CONST_PERM_NEG_ARC, a, node(&session)).expect("negative arc");

    let rows = search(&session, &members_of(a)).expect("search");
    assert_eq!(rows.len(), 1, "links and negative arcs do not match");
    assert_eq!(rows[0].get("x"), Some(b));
}

#[test]
fn shared_alias_binds_one_element() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let n1 = node(&session);
    let n2 = node(&session);
    arc(&session, a, n1);
    arc(&session, a, n2);
    arc(&session, b, n2);

    let mut pattern = Pattern::new();
    pattern
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern")
        .triple(b, ElementType::VAR_PERM_POS_ARC, "_x")
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_x"), Some(n2));
    assert_alias_consistency(&pattern, &rows[0]);
}

#[test]
fn structurally_equal_triples_take_distinct_connectors() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    arc(&session, a, b);

    let mut pattern = Pattern::new();
    pattern
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern")
        .triple(a, ElementType::VAR_PERM_POS_ARC, "_x")
        .expect("pattern");
    assert!(search(&session, &pattern).expect("search").is_empty(), "one arc cannot fill two slots");

    arc(&session, a, b);
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1, "one set of arcs, one row");
    let row = &rows[0];
    assert_ne!(row[1], row[4]);
}

#[test]
fn distinct_triples_never_share_a_connector() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);

    let mut pattern = Pattern::new();
    pattern
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE_MATERIAL.with_alias("_b"))
        .expect("pattern")
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_c"))
        .expect("pattern");
    let generated = generate(&session, &pattern).expect("generate");

    // "_c" also admits the material node, but only through the arc "_b" already holds
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1, "one row per set of distinct connectors");
    assert_eq!(rows[0].addrs(), generated.addrs());
    assert_eq!(rows[0].get("_b"), generated.get("_b"));
    assert_eq!(rows[0].get("_c"), generated.get("_c"));
    assert_ne!(rows[0][1], rows[0][4]);
}

#[test]
fn equal_anonymous_triples_are_not_permuted() {
    let memory = Memory::new();
    let session = memory.session();
    let set = node(&session);
    for _ in 0..6 {
        let member = node(&session);
        arc(&session, set, member);
    }
    let mut pattern = Pattern::new();
    for _ in 0..5 {
        pattern.triple(set, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE).expect("pattern");
    }
    let rows = search(&session, &pattern).expect("search");
    // choosing 5 of 6 arcs
    assert_eq!(rows.len(), 6);
    for row in &rows {
        let connectors: BTreeSet<ElementAddr> = (0..5).map(|t| row[t * 3 + 1]).collect();
        assert_eq!(connectors.len(), 5);
    }
}

#[test]
fn common_edges_match_from_either_end() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    session.create_connector(ElementType::CONST_COMMON_EDGE, a, b).expect("edge");

    for (from, other) in [(a, b), (b, a)] {
        let mut pattern = Pattern::new();
        pattern
            .triple(from, ElementType::VAR_COMMON_EDGE, ElementType::VAR_NODE.with_alias("_other"))
            .expect("pattern");
        let rows = search(&session, &pattern).expect("search");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("_other"), Some(other));
    }
}

#[test]
fn self_loops() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    arc(&session, a, a);
    arc(&session, a, b);

    let mut pattern = Pattern::new();
    pattern
        .triple(ElementType::VAR_NODE.with_alias("_x"), ElementType::VAR_PERM_POS_ARC, "_x")
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_x"), Some(a));
}

#[test]
fn cyclic_patterns_terminate() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let x = node(&session);
    let y = node(&session);
    arc(&session, a, x);
    arc(&session, x, y);
    arc(&session, y, a);
    arc(&session, a, y);

    let mut pattern = Pattern::new();
    pattern
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern")
        .triple("_x", ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_y"))
        .expect("pattern")
        .triple("_y", ElementType::VAR_PERM_POS_ARC, a)
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_x"), Some(x));
    assert_eq!(rows[0].get("_y"), Some(y));
}

#[test]
fn connectors_as_targets() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let relation = session.create_node(ElementType::CONST_NODE_NOROLE).expect("relation");
    let c = arc(&session, a, b);
    arc(&session, relation, c);
    arc(&session, a, node(&session));

    let mut pattern = Pattern::new();
    pattern
        .triple_with_relation(
            a,
            ElementType::VAR_PERM_POS_ARC,
            ElementType::VAR_NODE.with_alias("_b"),
            ElementType::VAR_PERM_POS_ARC,
            relation,
        )
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_repl_1"), Some(c));
    assert_eq!(rows[0].get("_b"), Some(b));
}

#[test]
fn fixed_connector() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let c = arc(&session, a, b);
    arc(&session, b, a);

    let mut pattern = Pattern::new();
    pattern
        .triple(ElementType::VAR_NODE.with_alias("_s"), c, ElementType::VAR_NODE.with_alias("_t"))
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].get("_s"), rows[0].get("_t")), (Some(a), Some(b)));
}

#[test]
fn disconnected_components_are_combined() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    arc(&session, a, node(&session));
    arc(&session, b, node(&session));
    arc(&session, b, node(&session));

    let mut pattern = Pattern::new();
    pattern
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern")
        .triple(b, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_y"))
        .expect("pattern");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 2, "one x times two y");
    assert!(rows.iter().all(|r| r.iter().all(|addr| addr.is_valid())), "every triple bound");
}

#[test]
fn scope_restricts_matches() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let c = node(&session);
    let inside = arc(&session, a, b);
    arc(&session, a, c);
    let structure = session.create_node(ElementType::CONST_NODE_STRUCT).expect("structure");
    for member in [a, b, inside] {
        arc(&session, structure, member);
    }

    let pattern = members_of(a);
    let rows = Search::new(&session, &pattern).within(structure).collect().expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(b));
}

#[test]
fn triple_and_row_filters() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let c = node(&session);
    arc(&session, a, b);
    arc(&session, a, c);
    let pattern = members_of(a);

    let rows = Search::new(&session, &pattern)
        .filter_triples(|_, _, target| target != c)
        .collect()
        .expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(b));

    let rows = Search::new(&session, &pattern)
        .filter_rows(|row| row.get("x") == Some(c))
        .collect()
        .expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(c));
}

#[test]
fn callbacks_can_stop_or_fail() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    for _ in 0..4 {
        let member = node(&session);
        arc(&session, a, member);
    }
    let pattern = members_of(a);

    let mut seen = 0;
    let found = Search::new(&session, &pattern)
        .for_each_until(|_| {
            seen += 1;
            SearchRequest::Stop
        })
        .expect("stopped search");
    assert!(found);
    assert_eq!(seen, 1);

    let failed = Search::new(&session, &pattern).for_each_until(|_| SearchRequest::Error);
    assert!(matches!(failed, Err(PatternError::InvalidState(_))));

    let mut all = 0;
    let found = Search::new(&session, &pattern).for_each(|_| all += 1).expect("search");
    assert!(found);
    assert_eq!(all, 4);
}

#[test]
fn empty_results() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    assert!(search(&session, &Pattern::new()).expect("empty pattern").is_empty());
    let found = Search::new(&session, &members_of(a)).for_each(|_| ()).expect("search");
    assert!(!found);
}

#[test]
fn substituted_items_become_fixed() {
    let memory = Memory::new();
    let session = memory.session();
    let a = node(&session);
    let b = node(&session);
    let c = node(&session);
    arc(&session, a, b);
    arc(&session, a, c);

    let mut substitutions = Substitutions::new();
    substitutions.add("x", c).expect("substitution");
    let pattern = members_of(a).substituted(&session, &substitutions).expect("substituted");
    let rows = search(&session, &pattern).expect("search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(c));

    let mut unknown = Substitutions::new();
    unknown.add("nothing", c).expect("substitution");
    assert!(matches!(members_of(a).substituted(&session, &unknown), Err(PatternError::InvalidParams(_))));
}
