//! Triple ordering for search and connector ordering for reconstruction.
//!
//! A [`SearchPlan`] is derived from an immutable [`Pattern`] once per search.
//! It classifies triples by how constrained they are, groups structurally
//! equal triples, and records which triples share an alias so the search can
//! move from a bound triple to the triples it constrains.
//!
//! Classes, most constrained first:
//! * `Afa` the connector is fixed,
//! * `Faf` both endpoints are fixed,
//! * `Aaf` the target is fixed,
//! * `Pfae` the `Fan` group whose fixed source has the fewest outgoing connectors,
//! * `Fae` the source is fixed,
//! * `Fan` the source is fixed and the target alias has a known non-connector type,
//! * `Aaa` nothing is fixed.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use roaring::RoaringBitmap;
use tracing::debug;

use crate::error::{PatternError, Result};
use crate::memory::OtherHasher;
use crate::pattern::{Pattern, PatternItem, PatternTriple};
use crate::store::GraphStore;
use crate::types::{ElementAddr, ElementType};

// ------------- TripleClass -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TripleClass {
    Afa,
    Faf,
    Aaf,
    Pfae,
    Fae,
    Fan,
    Aaa,
}

/// What makes two triples interchangeable during search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemShape {
    addr: Option<ElementAddr>,
    ty: ElementType,
    alias: Option<String>,
}

fn shape(pattern: &Pattern, item: &PatternItem) -> ItemShape {
    ItemShape {
        addr: pattern.fixed_addr(item),
        ty: pattern.item_type(item),
        alias: item.alias().map(str::to_owned),
    }
}

fn classify(pattern: &Pattern, triple: &PatternTriple) -> TripleClass {
    let fixed_source = pattern.is_fixed(triple.source());
    let fixed_target = pattern.is_fixed(triple.target());
    if pattern.is_fixed(triple.connector()) {
        TripleClass::Afa
    } else if fixed_source && fixed_target {
        TripleClass::Faf
    } else if fixed_target {
        TripleClass::Aaf
    } else if fixed_source {
        let target_type = triple.target().alias().map(|a| pattern.alias_type(a));
        match target_type {
            Some(ty) if !ty.is_unknown() && !ty.is_connector() => TripleClass::Fan,
            _ => TripleClass::Fae,
        }
    } else {
        TripleClass::Aaa
    }
}

/// Aliases and fixed elements through which a triple is connected to others.
fn dependency_keys(pattern: &Pattern, triple: &PatternTriple) -> Vec<String> {
    let mut keys = Vec::new();
    for item in triple.items() {
        if let Some(alias) = item.alias() {
            keys.push(alias.to_owned());
        }
        if let Some(addr) = pattern.fixed_addr(item) {
            keys.push(addr.implicit_alias());
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

// ------------- SearchPlan -------------
#[derive(Debug, Clone)]
pub struct SearchPlan {
    classes: Vec<TripleClass>,
    groups: Vec<Vec<usize>>,
    group_of: Vec<usize>,
    // group ids, most constrained class first
    order: Vec<usize>,
    keys: Vec<Vec<String>>,
    dependencies: Vec<BTreeMap<String, BTreeSet<usize>>>,
    neighbors: Vec<BTreeSet<usize>>,
    cycled: RoaringBitmap,
}

impl SearchPlan {
    pub fn build<S: GraphStore + ?Sized>(pattern: &Pattern, store: &S) -> Result<Self> {
        let n = pattern.len();
        let triples = pattern.triples();

        let mut group_index: HashMap<[ItemShape; 3], usize, OtherHasher> = HashMap::default();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of = vec![0; n];
        for triple in triples {
            let key = [
                shape(pattern, triple.source()),
                shape(pattern, triple.connector()),
                shape(pattern, triple.target()),
            ];
            let g = *group_index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(triple.index());
            group_of[triple.index()] = g;
        }

        let mut group_classes: Vec<TripleClass> = groups.iter().map(|g| classify(pattern, &triples[g[0]])).collect();
        let mut cheapest: Option<(usize, usize)> = None;
        for (g, class) in group_classes.iter().enumerate() {
            if *class != TripleClass::Fan {
                continue;
            }
            let Some(source) = pattern.fixed_addr(triples[groups[g][0]].source()) else { continue };
            let count = store.outgoing_count(source)?;
            if cheapest.is_none_or(|(c, _)| count < c) {
                cheapest = Some((count, g));
            }
        }
        if let Some((_, g)) = cheapest {
            group_classes[g] = TripleClass::Pfae;
        }
        let classes: Vec<TripleClass> = (0..n).map(|t| group_classes[group_of[t]]).collect();
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_key(|g| (group_classes[*g], groups[*g][0]));

        let keys: Vec<Vec<String>> = triples.iter().map(|t| dependency_keys(pattern, t)).collect();
        let mut by_key: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (t, triple_keys) in keys.iter().enumerate() {
            for key in triple_keys {
                by_key.entry(key.as_str()).or_default().push(t);
            }
        }
        let mut dependencies = vec![BTreeMap::new(); n];
        let mut neighbors = vec![BTreeSet::new(); n];
        for (key, sharing) in &by_key {
            for &t in sharing {
                let others: BTreeSet<usize> = sharing.iter().copied().filter(|o| *o != t).collect();
                if !others.is_empty() {
                    neighbors[t].extend(others.iter().copied());
                    dependencies[t].insert(key.to_string(), others);
                }
            }
        }

        let mut cycled = RoaringBitmap::new();
        for (t, triple) in triples.iter().enumerate() {
            if !matches!(classes[t], TripleClass::Fan | TripleClass::Pfae) || !pattern.is_fixed(triple.source()) {
                continue;
            }
            if let Some(path) = find_cycle(&by_key, &keys, t) {
                cycled.insert(t as u32);
                cycled.extend(path.into_iter().map(|p| p as u32));
            }
        }
        for t in cycled.iter() {
            dependencies[t as usize].clear();
        }

        let plan = Self { classes, groups, group_of, order, keys, dependencies, neighbors, cycled };
        debug!(
            triples = n,
            groups = plan.groups.len(),
            cycled = plan.cycled.len(),
            components = plan.components(),
            "search plan built"
        );
        Ok(plan)
    }

    pub fn len(&self) -> usize { self.classes.len() }
    pub fn is_empty(&self) -> bool { self.classes.is_empty() }
    pub fn class_of(&self, triple: usize) -> TripleClass { self.classes[triple] }
    pub fn classes(&self) -> &[TripleClass] { &self.classes }
    pub fn groups(&self) -> &[Vec<usize>] { &self.groups }
    pub fn group(&self, triple: usize) -> &[usize] { &self.groups[self.group_of[triple]] }
    pub fn keys(&self, triple: usize) -> &[String] { &self.keys[triple] }
    /// Triples sharing `key` with `triple`, unless the edge was pruned by cycle detection.
    pub fn dependents(&self, triple: usize, key: &str) -> Option<&BTreeSet<usize>> {
        self.dependencies[triple].get(key)
    }
    pub fn is_cycled(&self, triple: usize) -> bool { self.cycled.contains(triple as u32) }
    pub fn cycled(&self) -> &RoaringBitmap { &self.cycled }

    /// The member of the triple's equal group that precedes it.
    pub fn previous_in_group(&self, triple: usize) -> Option<usize> {
        let group = self.group(triple);
        let position = group.iter().position(|t| *t == triple)?;
        position.checked_sub(1).map(|p| group[p])
    }
    /// Number of members of the triple's equal group that follow it.
    pub fn later_in_group(&self, triple: usize) -> usize {
        let group = self.group(triple);
        group.iter().position(|t| *t == triple).map_or(0, |p| group.len() - p - 1)
    }

    /// Number of connected components formed by shared aliases and fixed elements.
    pub fn components(&self) -> usize {
        let mut seen = RoaringBitmap::new();
        let mut components = 0;
        for start in 0..self.len() {
            if seen.contains(start as u32) {
                continue;
            }
            components += 1;
            let mut queue = VecDeque::from([start]);
            seen.insert(start as u32);
            while let Some(t) = queue.pop_front() {
                for n in &self.neighbors[t] {
                    if seen.insert(*n as u32) {
                        queue.push_back(*n);
                    }
                }
            }
        }
        components
    }

    /// Picks the next triple to bind given the already bound ones.
    ///
    /// Triples reachable from bound triples come first, preferring those with
    /// more resolved items, then the more constrained class. When nothing is
    /// reachable the next component starts from its most constrained group.
    /// The result is always the first unbound member of its equal group.
    pub fn next_triple(&self, bound: &RoaringBitmap, resolved: impl Fn(usize) -> usize) -> Option<usize> {
        let unbound = |t: &usize| !bound.contains(*t as u32);
        let mut candidates = BTreeSet::new();
        for b in bound.iter() {
            let b = b as usize;
            for deps in self.dependencies[b].values() {
                candidates.extend(deps.iter().copied().filter(unbound));
            }
        }
        if candidates.is_empty() {
            for b in bound.iter() {
                candidates.extend(self.neighbors[b as usize].iter().copied().filter(unbound));
            }
        }
        let chosen = if candidates.is_empty() {
            self.order
                .iter()
                .find_map(|g| self.groups[*g].iter().copied().find(unbound))?
        } else {
            candidates
                .into_iter()
                .max_by_key(|t| (resolved(*t), Reverse(self.classes[*t]), Reverse(*t)))?
        };
        self.group(chosen).iter().copied().find(unbound)
    }
}

/// Looks for a path between two keys of `triple` that avoids `triple` itself.
/// Returns the triples on that path.
fn find_cycle(by_key: &BTreeMap<&str, Vec<usize>>, keys: &[Vec<String>], triple: usize) -> Option<Vec<usize>> {
    let own = &keys[triple];
    for (i, from) in own.iter().enumerate() {
        for to in &own[i + 1..] {
            if let Some(path) = find_path(by_key, keys, triple, from, to) {
                return Some(path);
            }
        }
    }
    None
}

fn find_path(
    by_key: &BTreeMap<&str, Vec<usize>>,
    keys: &[Vec<String>],
    avoid: usize,
    from: &str,
    to: &str,
) -> Option<Vec<usize>> {
    let mut parent: HashMap<&str, (usize, &str), OtherHasher> = HashMap::default();
    let mut queue = VecDeque::from([from]);
    let mut visited = BTreeSet::from([from]);
    while let Some(key) = queue.pop_front() {
        for &t in by_key.get(key).into_iter().flatten() {
            if t == avoid {
                continue;
            }
            for next in &keys[t] {
                let next = next.as_str();
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, (t, key));
                if next == to {
                    let mut path = Vec::new();
                    let mut cursor = to;
                    while let Some((via, previous)) = parent.get(cursor) {
                        path.push(*via);
                        cursor = *previous;
                    }
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
    }
    None
}

// ------------- Connector power -------------
/// Groups connectors into buckets so that a connector whose endpoint is another
/// connector of the set lands in a later bucket than that endpoint. Bucket `p`
/// holds the connectors whose longest chain of such dependencies has length `p`.
/// Connectors inside a bucket are sorted by identifier.
pub fn connector_power_buckets(
    connectors: &BTreeMap<ElementAddr, (ElementAddr, ElementAddr)>,
) -> Result<Vec<Vec<ElementAddr>>> {
    let mut memo: HashMap<ElementAddr, usize, OtherHasher> = HashMap::default();
    let mut visiting = BTreeSet::new();
    let mut buckets: Vec<Vec<ElementAddr>> = Vec::new();
    for connector in connectors.keys() {
        let power = connector_power(*connector, connectors, &mut memo, &mut visiting)?;
        if buckets.len() <= power {
            buckets.resize_with(power + 1, Vec::new);
        }
        buckets[power].push(*connector);
    }
    Ok(buckets)
}

fn connector_power(
    connector: ElementAddr,
    connectors: &BTreeMap<ElementAddr, (ElementAddr, ElementAddr)>,
    memo: &mut HashMap<ElementAddr, usize, OtherHasher>,
    visiting: &mut BTreeSet<ElementAddr>,
) -> Result<usize> {
    if let Some(power) = memo.get(&connector) {
        return Ok(*power);
    }
    if !visiting.insert(connector) {
        return Err(PatternError::InvalidState(format!("connector {} depends on itself", connector)));
    }
    let mut power = 0;
    if let Some((source, target)) = connectors.get(&connector) {
        for end in [*source, *target] {
            if end != connector && connectors.contains_key(&end) {
                power = power.max(connector_power(end, connectors, memo, visiting)? + 1);
            }
        }
    }
    visiting.remove(&connector);
    memo.insert(connector, power);
    Ok(power)
}
