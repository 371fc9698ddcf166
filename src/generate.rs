//! Materializing patterns in the store.
//!
//! Generation walks the triples in order. Items resolve from substitutions,
//! from fixed elements and from elements produced by earlier triples; whatever
//! is still unresolved gets created with its type raised to constant. All
//! writes happen inside an events-pending region, and a failure erases every
//! element the call created before the error is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{PatternError, Result};
use crate::events::EventsPendingGuard;
use crate::params::Substitutions;
use crate::pattern::{CONNECTOR, Pattern, PatternItem, PatternTriple, SOURCE, TARGET};
use crate::row::MatchRow;
use crate::store::GraphStore;
use crate::types::{ElementAddr, ElementType};

/// Generates `pattern` without substitutions.
pub fn generate<S: GraphStore + ?Sized>(store: &S, pattern: &Pattern) -> Result<MatchRow> {
    Generator::new(store, pattern).run(&Substitutions::new())
}

/// Generates `pattern`, using the substituted elements instead of creating new ones.
pub fn generate_with<S: GraphStore + ?Sized>(
    store: &S,
    pattern: &Pattern,
    substitutions: &Substitutions,
) -> Result<MatchRow> {
    Generator::new(store, pattern).run(substitutions)
}

struct Generator<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    pattern: &'a Pattern,
}

impl<'a, S: GraphStore + ?Sized> Generator<'a, S> {
    fn new(store: &'a S, pattern: &'a Pattern) -> Self {
        Self { store, pattern }
    }

    fn run(&self, substitutions: &Substitutions) -> Result<MatchRow> {
        let _pending = EventsPendingGuard::new(self.store);
        let params = self.check_params(substitutions)?;
        let mut produced = vec![ElementAddr::INVALID; self.pattern.len() * 3];
        let mut created = Vec::new();
        match self.fill(&params, &mut produced, &mut created) {
            Ok(()) => {
                info!(triples = self.pattern.len(), created = created.len(), "pattern generated");
                Ok(MatchRow::new(produced, Arc::new(self.pattern.aliases().clone())))
            }
            Err(e) => {
                warn!(error = %e, created = created.len(), "generation failed, rolling back");
                for addr in created.iter().rev() {
                    if let Err(erase_error) = self.store.erase(*addr) {
                        warn!(error = %erase_error, element = %addr, "rollback could not erase element");
                    }
                }
                Err(e)
            }
        }
    }

    /// Validates every substitution against the item it replaces.
    fn check_params(&self, substitutions: &Substitutions) -> Result<BTreeMap<String, ElementAddr>> {
        let params = substitutions.resolve(self.pattern, self.store)?;
        for (alias, value) in &params {
            let Some(slot) = self.pattern.alias_slot(alias) else { continue };
            let triple = &self.pattern.triples()[slot / 3];
            let item = &triple.items()[slot % 3];
            let value_type = self.store.element_type(*value).map_err(|_| {
                PatternError::InvalidParams(format!("substitution for '{}' is not an element: {}", alias, value))
            })?;
            let item_type = self.pattern.item_type(item);
            let demanded = item_type.up_const();
            if !demanded.can_extend_to(value_type) && !(item_type.is_node() && value_type.is_connector()) {
                return Err(PatternError::InvalidType(format!(
                    "substitution for '{}' has type {}, the pattern demands {}",
                    alias, value_type, demanded
                )));
            }
            if slot % 3 == CONNECTOR {
                let (source, target) = self.store.connector_ends(*value).map_err(|_| {
                    PatternError::InvalidParams(format!("substitution for connector '{}' is not a connector", alias))
                })?;
                let expected_source = self.known(triple.source(), &params);
                let expected_target = self.known(triple.target(), &params);
                if !incident(value_type, (source, target), expected_source, expected_target) {
                    return Err(PatternError::InvalidParams(format!(
                        "substituted connector {} does not join the substituted endpoints",
                        value
                    )));
                }
            }
        }
        Ok(params)
    }

    /// An element the item denotes before anything is produced.
    fn known(&self, item: &PatternItem, params: &BTreeMap<String, ElementAddr>) -> Option<ElementAddr> {
        item.alias()
            .and_then(|a| params.get(a).copied())
            .or_else(|| self.pattern.fixed_addr(item))
    }

    fn resolve(
        &self,
        item: &PatternItem,
        params: &BTreeMap<String, ElementAddr>,
        produced: &[ElementAddr],
    ) -> Option<ElementAddr> {
        if let Some(addr) = self.known(item, params) {
            return Some(addr);
        }
        let slot = item.alias().and_then(|a| self.pattern.alias_slot(a))?;
        Some(produced[slot]).filter(|a| a.is_valid())
    }

    fn fill(
        &self,
        params: &BTreeMap<String, ElementAddr>,
        produced: &mut [ElementAddr],
        created: &mut Vec<ElementAddr>,
    ) -> Result<()> {
        for triple in self.pattern.triples() {
            self.fill_triple(triple, params, produced, created)?;
        }
        Ok(())
    }

    fn fill_triple(
        &self,
        triple: &PatternTriple,
        params: &BTreeMap<String, ElementAddr>,
        produced: &mut [ElementAddr],
        created: &mut Vec<ElementAddr>,
    ) -> Result<()> {
        let base = triple.index() * 3;
        let mut source = self.resolve(triple.source(), params, produced);
        let mut target = self.resolve(triple.target(), params, produced);
        let connector = self.resolve(triple.connector(), params, produced);

        for (column, resolved) in [(SOURCE, source), (TARGET, target), (CONNECTOR, connector)] {
            let item = &triple.items()[column];
            let ty = self.pattern.item_type(item);
            if resolved.is_some() {
                continue;
            }
            if ty.is_unknown() {
                return Err(PatternError::InvalidType(format!(
                    "cannot generate an element of unknown type for {} in triple {}",
                    item,
                    triple.index()
                )));
            }
            if column != CONNECTOR && ty.is_connector() {
                return Err(PatternError::InvalidParams(format!(
                    "connector item {} in triple {} has no endpoints to be generated between",
                    item,
                    triple.index()
                )));
            }
        }

        // an existing connector is authoritative about its endpoints
        if let Some(connector) = connector {
            let connector_type = self.store.element_type(connector)?;
            let ends = self.store.connector_ends(connector)?;
            if !incident(connector_type, ends, source, target) {
                return Err(PatternError::InvalidParams(format!(
                    "connector {} does not join the endpoints of triple {}",
                    connector,
                    triple.index()
                )));
            }
            let (real_source, real_target) = oriented(connector_type, ends, source, target);
            source = Some(real_source);
            target = Some(real_target);
        }

        let source = match source {
            Some(addr) => addr,
            None => self.create(self.pattern.item_type(triple.source()), created)?,
        };
        produced[base + SOURCE] = source;
        // the target may name the element just produced for the source
        let target = match target.or_else(|| self.resolve(triple.target(), params, produced)) {
            Some(addr) => addr,
            None => self.create(self.pattern.item_type(triple.target()), created)?,
        };
        produced[base + TARGET] = target;
        let connector = match connector {
            Some(addr) => addr,
            None => {
                let ty = self.pattern.item_type(triple.connector()).up_const();
                let addr = self.store.create_connector(ty, source, target)?;
                created.push(addr);
                addr
            }
        };
        produced[base + CONNECTOR] = connector;
        Ok(())
    }

    fn create(&self, ty: ElementType, created: &mut Vec<ElementAddr>) -> Result<ElementAddr> {
        let ty = ty.up_const();
        let addr = if ty.is_link() { self.store.create_link(ty)? } else { self.store.create_node(ty)? };
        created.push(addr);
        Ok(addr)
    }
}

/// Whether a connector with `ends` joins the expected endpoints. Common edges
/// join them in either direction.
fn incident(
    ty: ElementType,
    ends: (ElementAddr, ElementAddr),
    source: Option<ElementAddr>,
    target: Option<ElementAddr>,
) -> bool {
    let fits = |(s, t): (ElementAddr, ElementAddr)| {
        source.is_none_or(|e| e == s) && target.is_none_or(|e| e == t)
    };
    fits(ends) || (ty.is_common_edge() && fits((ends.1, ends.0)))
}

fn oriented(
    ty: ElementType,
    ends: (ElementAddr, ElementAddr),
    source: Option<ElementAddr>,
    target: Option<ElementAddr>,
) -> (ElementAddr, ElementAddr) {
    let forward = source.is_none_or(|e| e == ends.0) && target.is_none_or(|e| e == ends.1);
    if forward || !ty.is_common_edge() { ends } else { (ends.1, ends.0) }
}
