//! Backtracking search of pattern matches.
//!
//! Each recursion level binds exactly one triple, so the depth never exceeds
//! the number of triples in the pattern, whatever cycles the pattern contains.
//! The partial binding is an immutable snapshot: every candidate gets its own
//! extended copy, and early termination travels back up as a [`Flow`] value.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use roaring::{RoaringBitmap, RoaringTreemap};
use tracing::{debug, trace};

use crate::error::{PatternError, Result};
use crate::memory::OtherHasher;
use crate::pattern::{AliasTable, CONNECTOR, Pattern, PatternItem, PatternTriple};
use crate::plan::SearchPlan;
use crate::row::MatchRow;
use crate::store::{Constraint, GraphStore, Triple};
use crate::types::{ElementAddr, ElementType};

/// Answer of a row callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRequest {
    Continue,
    Stop,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

type TripleFilter<'a> = Box<dyn Fn(ElementAddr, ElementAddr, ElementAddr) -> bool + 'a>;
type RowFilter<'a> = Box<dyn Fn(&MatchRow) -> bool + 'a>;

// ------------- Search -------------
pub struct Search<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    pattern: &'a Pattern,
    scope: Option<ElementAddr>,
    triple_filter: Option<TripleFilter<'a>>,
    row_filter: Option<RowFilter<'a>>,
}

impl<'a, S: GraphStore + ?Sized> Search<'a, S> {
    pub fn new(store: &'a S, pattern: &'a Pattern) -> Self {
        Self { store, pattern, scope: None, triple_filter: None, row_filter: None }
    }

    /// Restricts every matched element to members of `structure`.
    pub fn within(mut self, structure: ElementAddr) -> Self {
        self.scope = Some(structure);
        self
    }

    /// Rejects store triples for which `filter(source, connector, target)` is false.
    pub fn filter_triples<F>(mut self, filter: F) -> Self
    where
        F: Fn(ElementAddr, ElementAddr, ElementAddr) -> bool + 'a,
    {
        self.triple_filter = Some(Box::new(filter));
        self
    }

    /// Rejects complete rows for which `filter` is false.
    pub fn filter_rows<F>(mut self, filter: F) -> Self
    where
        F: Fn(&MatchRow) -> bool + 'a,
    {
        self.row_filter = Some(Box::new(filter));
        self
    }

    pub fn collect(&self) -> Result<Vec<MatchRow>> {
        let mut rows = Vec::new();
        self.run(&mut |row| {
            rows.push(row.clone());
            SearchRequest::Continue
        })?;
        Ok(rows)
    }

    /// Calls `callback` for every row. Returns whether any row was found.
    pub fn for_each<F: FnMut(&MatchRow)>(&self, mut callback: F) -> Result<bool> {
        let found = self.run(&mut |row| {
            callback(row);
            SearchRequest::Continue
        })?;
        Ok(found > 0)
    }

    /// Calls `callback` for every row until it asks to stop. A [`SearchRequest::Error`]
    /// ends the search with an error.
    pub fn for_each_until<F: FnMut(&MatchRow) -> SearchRequest>(&self, mut callback: F) -> Result<bool> {
        let found = self.run(&mut callback)?;
        Ok(found > 0)
    }

    fn run(&self, sink: &mut dyn FnMut(&MatchRow) -> SearchRequest) -> Result<usize> {
        if self.pattern.is_empty() {
            return Ok(0);
        }
        let plan = SearchPlan::build(self.pattern, self.store)?;
        let scope = match self.scope {
            Some(structure) => Some(self.members(structure)?),
            None => None,
        };
        let matcher = Matcher {
            search: self,
            plan: &plan,
            scope: scope.as_ref(),
            aliases: Arc::new(self.pattern.aliases().clone()),
            emitted: Cell::new(0),
        };
        let flow = matcher.expand(&PartialRow::new(self.pattern.len()), sink)?;
        let emitted = matcher.emitted.get();
        debug!(triples = self.pattern.len(), rows = emitted, stopped = (flow == Flow::Stop), "search finished");
        Ok(emitted)
    }

    fn members(&self, structure: ElementAddr) -> Result<RoaringTreemap> {
        let mut members = RoaringTreemap::new();
        for [_, _, member] in self.store.iter3(
            Constraint::Fixed(structure),
            Constraint::Type(ElementType::CONST_PERM_POS_ARC),
            Constraint::any(),
        )? {
            members.insert(member.hash());
        }
        Ok(members)
    }
}

/// Collects every match of `pattern`.
pub fn search<S: GraphStore + ?Sized>(store: &S, pattern: &Pattern) -> Result<Vec<MatchRow>> {
    Search::new(store, pattern).collect()
}

// ------------- PartialRow -------------
#[derive(Debug, Clone)]
struct PartialRow {
    slots: Vec<ElementAddr>,
    aliases: HashMap<String, ElementAddr, OtherHasher>,
    bound: RoaringBitmap,
    used_connectors: RoaringTreemap,
    remaining: usize,
}

impl PartialRow {
    fn new(triples: usize) -> Self {
        Self {
            slots: vec![ElementAddr::INVALID; triples * 3],
            aliases: HashMap::default(),
            bound: RoaringBitmap::new(),
            used_connectors: RoaringTreemap::new(),
            remaining: triples,
        }
    }

    fn is_resolved(&self, pattern: &Pattern, item: &PatternItem) -> bool {
        pattern.is_fixed(item) || item.alias().is_some_and(|a| self.aliases.contains_key(a))
    }

    /// The row extended with `found` for `triple`, or `None` when an alias
    /// would be bound to two different elements.
    fn bind(&self, triple: &PatternTriple, found: Triple) -> Option<PartialRow> {
        let mut next = self.clone();
        for (column, (item, addr)) in triple.items().iter().zip(found).enumerate() {
            if let Some(alias) = item.alias() {
                match next.aliases.get(alias) {
                    Some(bound) if *bound != addr => return None,
                    Some(_) => (),
                    None => {
                        next.aliases.insert(alias.to_owned(), addr);
                    }
                }
            }
            next.slots[triple.index() * 3 + column] = addr;
        }
        next.used_connectors.insert(found[CONNECTOR].hash());
        next.bound.insert(triple.index() as u32);
        next.remaining -= 1;
        Some(next)
    }
}

// ------------- Matcher -------------
struct Matcher<'m, 'a, S: GraphStore + ?Sized> {
    search: &'m Search<'a, S>,
    plan: &'m SearchPlan,
    scope: Option<&'m RoaringTreemap>,
    aliases: Arc<AliasTable>,
    emitted: Cell<usize>,
}

impl<S: GraphStore + ?Sized> Matcher<'_, '_, S> {
    fn constraint(&self, item: &PatternItem, row: &PartialRow) -> Constraint {
        let pattern = self.search.pattern;
        if let Some(addr) = pattern.fixed_addr(item) {
            return Constraint::Fixed(addr);
        }
        if let Some(addr) = item.alias().and_then(|a| row.aliases.get(a)) {
            return Constraint::Fixed(*addr);
        }
        Constraint::Type(pattern.item_type(item).up_const())
    }

    fn in_scope(&self, found: &Triple) -> bool {
        match self.scope {
            Some(members) => found.iter().all(|a| members.contains(a.hash())),
            None => true,
        }
    }

    fn expand(&self, row: &PartialRow, sink: &mut dyn FnMut(&MatchRow) -> SearchRequest) -> Result<Flow> {
        if row.remaining == 0 {
            return self.emit(row, sink);
        }
        let pattern = self.search.pattern;
        let resolved = |t: usize| {
            pattern.triples()[t].items().iter().filter(|i| row.is_resolved(pattern, i)).count()
        };
        let Some(index) = self.plan.next_triple(&row.bound, resolved) else {
            return Err(PatternError::InvalidState(format!(
                "no triple left to bind with {} remaining",
                row.remaining
            )));
        };
        let triple = &pattern.triples()[index];
        let [source, connector, target] = [
            self.constraint(triple.source(), row),
            self.constraint(triple.connector(), row),
            self.constraint(triple.target(), row),
        ];

        let mut candidates: Vec<Triple> = Vec::new();
        for found in self.search.store.iter3(source, connector, target)? {
            if !self.in_scope(&found) {
                continue;
            }
            if let Some(filter) = &self.search.triple_filter {
                if !filter(found[0], found[1], found[2]) {
                    continue;
                }
            }
            if !connector.is_fixed() && row.used_connectors.contains(found[CONNECTOR].hash()) {
                continue;
            }
            candidates.push(found);
        }

        // Interchangeable triples take their connectors in increasing order, so a
        // set of connectors is bound once instead of once per permutation.
        let ordered = triple.connector().alias().is_none() && self.plan.group(index).len() > 1;
        let mut later = 0;
        if ordered {
            if let Some(previous) = self.plan.previous_in_group(index) {
                let floor = row.slots[previous * 3 + CONNECTOR];
                candidates.retain(|found| found[CONNECTOR] > floor);
            }
            candidates.sort_by_key(|found| found[CONNECTOR]);
            later = self.plan.later_in_group(index);
        }
        trace!(triple = index, candidates = candidates.len(), "expanding");

        for found in &candidates {
            if later > 0 {
                let larger = candidates.len() - candidates.partition_point(|f| f[CONNECTOR] <= found[CONNECTOR]);
                if larger < later {
                    break;
                }
            }
            let Some(next) = row.bind(triple, *found) else { continue };
            if self.expand(&next, sink)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn emit(&self, row: &PartialRow, sink: &mut dyn FnMut(&MatchRow) -> SearchRequest) -> Result<Flow> {
        let result = MatchRow::new(row.slots.clone(), Arc::clone(&self.aliases));
        if let Some(filter) = &self.search.row_filter {
            if !filter(&result) {
                return Ok(Flow::Continue);
            }
        }
        self.emitted.set(self.emitted.get() + 1);
        match sink(&result) {
            SearchRequest::Continue => Ok(Flow::Continue),
            SearchRequest::Stop => Ok(Flow::Stop),
            SearchRequest::Error => Err(PatternError::InvalidState(String::from("search aborted by row callback"))),
        }
    }
}
