use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sc_pattern::builder::from_members;
use sc_pattern::generate::generate;
use sc_pattern::memory::{Memory, Session};
use sc_pattern::pattern::{Pattern, WithAlias};
use sc_pattern::search::search;
use sc_pattern::store::GraphStore;
use sc_pattern::types::{ElementAddr, ElementType};

// a class with `members` elements, each linked to a few random others
fn populate(session: &Session, members: usize) -> (ElementAddr, ElementAddr) {
    let mut rng = StdRng::seed_from_u64(42);
    let class = session.create_node(ElementType::CONST_NODE_CLASS).expect("class");
    let relation = session.create_node(ElementType::CONST_NODE_NOROLE).expect("relation");
    let nodes: Vec<ElementAddr> = (0..members)
        .map(|_| session.create_node(ElementType::CONST_NODE).expect("node"))
        .collect();
    for node in &nodes {
        session.create_connector(ElementType::CONST_PERM_POS_ARC, class, *node).expect("arc");
        for _ in 0..3 {
            let other = nodes[rng.gen_range(0..nodes.len())];
            let link = session.create_connector(ElementType::CONST_COMMON_ARC, *node, other).expect("arc");
            if rng.gen_bool(0.3) {
                session.create_connector(ElementType::CONST_PERM_POS_ARC, relation, link).expect("arc");
            }
        }
    }
    (class, relation)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let memory = Memory::new();
    let session = memory.session();
    let (class, relation) = populate(&session, 1_000);

    let mut members = Pattern::new();
    members
        .triple(class, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern");
    c.bench_function("search fan 1k", |b| b.iter(|| search(&session, black_box(&members))));

    let mut related = members.clone();
    related
        .triple("_x", ElementType::VAR_COMMON_ARC.with_alias("_link"), ElementType::VAR_NODE.with_alias("_y"))
        .expect("pattern")
        .triple(relation, ElementType::VAR_PERM_POS_ARC, "_link")
        .expect("pattern")
        .triple(class, ElementType::VAR_PERM_POS_ARC, "_y")
        .expect("pattern");
    c.bench_function("search related 1k", |b| b.iter(|| search(&session, black_box(&related))));

    let scratch = Memory::new();
    let scratch_session = scratch.session();
    let a = scratch_session.create_node(ElementType::CONST_NODE).expect("node");
    let mut construction = Pattern::new();
    construction
        .triple(a, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
        .expect("pattern")
        .triple("_x", ElementType::VAR_COMMON_ARC, ElementType::VAR_LINK)
        .expect("pattern");
    c.bench_function("generate 2 triples", |b| b.iter(|| generate(&scratch_session, black_box(&construction))));

    let elements: Vec<ElementAddr> = session
        .iter3(class.into(), ElementType::CONST_PERM_POS_ARC.into(), ElementType::UNKNOWN.into())
        .expect("iter")
        .into_iter()
        .take(100)
        .flat_map(|[s, c, t]| [s, c, t])
        .collect();
    c.bench_function("build from 100 members", |b| b.iter(|| from_members(&session, black_box(&elements), None)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
