//! Substitutions: caller supplied elements for pattern items.
//!
//! A substitution is keyed by an alias of the pattern, by the implicit alias of
//! a fixed element (its hash) or by the system identifier of such an element.

use std::collections::BTreeMap;

use crate::error::{PatternError, Result};
use crate::pattern::{Pattern, PatternItem};
use crate::store::GraphStore;
use crate::types::ElementAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<String, ElementAddr>,
}

impl Substitutions {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, name: impl Into<String>, value: ElementAddr) -> Result<&mut Self> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(PatternError::InvalidParams(format!("substitution for '{}' is already set", name)));
        }
        self.values.insert(name, value);
        Ok(self)
    }
    /// Substitutes the item that names the variable element `var`.
    pub fn add_var(&mut self, var: ElementAddr, value: ElementAddr) -> Result<&mut Self> {
        self.add(var.implicit_alias(), value)
    }
    pub fn get(&self, name: &str) -> Option<ElementAddr> { self.values.get(name).copied() }
    pub fn get_var(&self, var: ElementAddr) -> Option<ElementAddr> { self.get(&var.implicit_alias()) }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&str, ElementAddr)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Maps every substitution onto the pattern alias it replaces.
    pub fn resolve<S: GraphStore + ?Sized>(
        &self,
        pattern: &Pattern,
        store: &S,
    ) -> Result<BTreeMap<String, ElementAddr>> {
        let mut resolved = BTreeMap::new();
        for (name, value) in self.iter() {
            let alias = resolve_alias(pattern, store, name)?;
            resolved.insert(alias, value);
        }
        Ok(resolved)
    }
}

/// Finds the alias `name` refers to, directly or through a system identifier.
pub fn resolve_alias<S: GraphStore + ?Sized>(pattern: &Pattern, store: &S, name: &str) -> Result<String> {
    if pattern.has_alias(name) {
        return Ok(name.to_owned());
    }
    if let Some(addr) = store.find_by_system_identifier(name)? {
        let implicit = addr.implicit_alias();
        if pattern.has_alias(&implicit) {
            return Ok(implicit);
        }
    }
    Err(PatternError::InvalidParams(format!("pattern has no item named '{}'", name)))
}

impl Pattern {
    /// A copy of the pattern where every substituted item is fixed to its value.
    pub fn substituted<S: GraphStore + ?Sized>(&self, store: &S, substitutions: &Substitutions) -> Result<Pattern> {
        if substitutions.is_empty() {
            return Ok(self.clone());
        }
        let resolved = substitutions.resolve(self, store)?;
        for (alias, value) in &resolved {
            if !store.is_element(*value) {
                return Err(PatternError::InvalidParams(format!(
                    "substitution for '{}' is not an element: {}",
                    alias, value
                )));
            }
        }
        let replace = |item: &PatternItem| -> PatternItem {
            match item.alias().and_then(|a| resolved.get(a).map(|v| (a, *v))) {
                Some((alias, value)) => PatternItem::Addr { addr: value, alias: Some(alias.to_owned()) },
                None => item.clone(),
            }
        };
        let mut pattern = Pattern::new();
        for triple in self.triples() {
            pattern.triple(replace(triple.source()), replace(triple.connector()), replace(triple.target()))?;
        }
        Ok(pattern)
    }
}
