//! Patterns: ordered triples of items with an alias table.
//!
//! A [`Pattern`] is built triple by triple. Each item is either a fixed
//! element, a type constraint or a reference to an alias introduced by an
//! earlier item. Aliases map to the first slot (`triple * 3 + column`) that
//! introduced them, and every later use of the alias denotes the same element.
//!
//! ```
//! use sc_pattern::pattern::{Pattern, PatternItem, WithAlias};
//! use sc_pattern::types::{ElementAddr, ElementType};
//!
//! let class = ElementAddr::new(7);
//! let mut pattern = Pattern::new();
//! pattern
//!     .triple(class, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_x"))
//!     .unwrap()
//!     .triple("_x", ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_y"))
//!     .unwrap();
//! assert_eq!(pattern.len(), 2);
//! assert_eq!(pattern.alias_slot("_x"), Some(2));
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::error::{PatternError, Result};
use crate::memory::OtherHasher;
use crate::types::{ElementAddr, ElementType};

pub const SOURCE: usize = 0;
pub const CONNECTOR: usize = 1;
pub const TARGET: usize = 2;

pub type AliasTable = HashMap<String, usize, OtherHasher>;

// ------------- PatternItem -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternItem {
    /// A concrete element.
    Addr { addr: ElementAddr, alias: Option<String> },
    /// Any element of the type.
    Type { ty: ElementType, alias: Option<String> },
    /// The element bound to an alias introduced earlier.
    Alias(String),
}

impl PatternItem {
    pub fn addr(addr: ElementAddr) -> Self { PatternItem::Addr { addr, alias: None } }
    pub fn typed(ty: ElementType) -> Self { PatternItem::Type { ty, alias: None } }
    pub fn reference(alias: impl Into<String>) -> Self { PatternItem::Alias(alias.into()) }

    pub fn alias(&self) -> Option<&str> {
        match self {
            PatternItem::Addr { alias, .. } | PatternItem::Type { alias, .. } => alias.as_deref(),
            PatternItem::Alias(name) => Some(name),
        }
    }
    pub fn is_addr(&self) -> bool { matches!(self, PatternItem::Addr { .. }) }
    pub fn is_type(&self) -> bool { matches!(self, PatternItem::Type { .. }) }
    pub fn is_reference(&self) -> bool { matches!(self, PatternItem::Alias(_)) }

    fn set_alias(&mut self, name: String) {
        match self {
            PatternItem::Addr { alias, .. } | PatternItem::Type { alias, .. } => *alias = Some(name),
            PatternItem::Alias(existing) => *existing = name,
        }
    }
}

impl From<ElementAddr> for PatternItem {
    fn from(addr: ElementAddr) -> Self { PatternItem::addr(addr) }
}
impl From<ElementType> for PatternItem {
    fn from(ty: ElementType) -> Self { PatternItem::typed(ty) }
}
impl From<&str> for PatternItem {
    fn from(alias: &str) -> Self { PatternItem::Alias(alias.to_owned()) }
}
impl From<String> for PatternItem {
    fn from(alias: String) -> Self { PatternItem::Alias(alias) }
}

/// Attaches an alias to a fixed element or a type constraint.
pub trait WithAlias {
    fn with_alias(self, alias: impl Into<String>) -> PatternItem;
}

impl WithAlias for ElementAddr {
    fn with_alias(self, alias: impl Into<String>) -> PatternItem {
        PatternItem::Addr { addr: self, alias: Some(alias.into()) }
    }
}
impl WithAlias for ElementType {
    fn with_alias(self, alias: impl Into<String>) -> PatternItem {
        PatternItem::Type { ty: self, alias: Some(alias.into()) }
    }
}

impl fmt::Display for PatternItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternItem::Addr { addr, alias: Some(alias) } if *alias != addr.implicit_alias() => {
                write!(f, "{} as {}", addr, alias)
            }
            PatternItem::Addr { addr, .. } => write!(f, "{}", addr),
            PatternItem::Type { ty, alias: Some(alias) } => write!(f, "{} as {}", ty, alias),
            PatternItem::Type { ty, alias: None } => write!(f, "{}", ty),
            PatternItem::Alias(name) => write!(f, "{}", name),
        }
    }
}

// ------------- PatternTriple -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTriple {
    index: usize,
    items: [PatternItem; 3],
}

impl PatternTriple {
    pub fn index(&self) -> usize { self.index }
    pub fn items(&self) -> &[PatternItem; 3] { &self.items }
    pub fn source(&self) -> &PatternItem { &self.items[SOURCE] }
    pub fn connector(&self) -> &PatternItem { &self.items[CONNECTOR] }
    pub fn target(&self) -> &PatternItem { &self.items[TARGET] }
}

impl fmt::Display for PatternTriple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.items[0], self.items[1], self.items[2])
    }
}

// ------------- Pattern -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    triples: Vec<PatternTriple>,
    aliases: AliasTable,
    alias_addrs: HashMap<String, ElementAddr, OtherHasher>,
    alias_types: HashMap<String, ElementType, OtherHasher>,
}

impl Pattern {
    pub fn new() -> Self { Self::default() }

    /// Appends a triple. On error the pattern is left unchanged.
    pub fn triple(
        &mut self,
        source: impl Into<PatternItem>,
        connector: impl Into<PatternItem>,
        target: impl Into<PatternItem>,
    ) -> Result<&mut Self> {
        let mut items = [source.into(), connector.into(), target.into()];
        self.check(&mut items)?;
        let index = self.triples.len();
        for (column, item) in items.iter().enumerate() {
            let Some(alias) = item.alias() else { continue };
            self.aliases.entry(alias.to_owned()).or_insert(index * 3 + column);
            match item {
                PatternItem::Addr { addr, .. } => {
                    self.alias_addrs.insert(alias.to_owned(), *addr);
                }
                PatternItem::Type { ty, .. } => {
                    self.alias_types.entry(alias.to_owned()).or_insert(*ty);
                }
                PatternItem::Alias(_) => (),
            }
        }
        self.triples.push(PatternTriple { index, items });
        Ok(self)
    }

    /// Appends `source -connector-> target` together with
    /// `relation_source -relation_connector-> connector`. An anonymous connector
    /// gets the alias `_repl_<slot>` so the second triple can refer to it.
    pub fn triple_with_relation(
        &mut self,
        source: impl Into<PatternItem>,
        connector: impl Into<PatternItem>,
        target: impl Into<PatternItem>,
        relation_connector: impl Into<PatternItem>,
        relation_source: impl Into<PatternItem>,
    ) -> Result<&mut Self> {
        let mut connector = connector.into();
        let alias = match connector.alias() {
            Some(alias) => alias.to_owned(),
            None => {
                let generated = format!("_repl_{}", self.triples.len() * 3 + CONNECTOR);
                connector.set_alias(generated.clone());
                generated
            }
        };
        let backup = self.clone();
        let expanded = self
            .triple(source, connector, target)
            .and_then(|p| p.triple(relation_source, relation_connector, PatternItem::Alias(alias)))
            .map(|_| ());
        if let Err(e) = expanded {
            *self = backup;
            return Err(e);
        }
        Ok(self)
    }

    fn check(&self, items: &mut [PatternItem; 3]) -> Result<()> {
        let mut introduced: Vec<(String, Option<ElementAddr>)> = Vec::new();
        for (column, item) in items.iter_mut().enumerate() {
            match item {
                PatternItem::Addr { addr, alias } => {
                    if !addr.is_valid() {
                        return Err(PatternError::InvalidParams(format!("invalid element in column {}", column)));
                    }
                    let name = alias.get_or_insert_with(|| addr.implicit_alias()).clone();
                    if name.is_empty() {
                        return Err(PatternError::InvalidParams(String::from("empty alias")));
                    }
                    let bound = self
                        .alias_addrs
                        .get(&name)
                        .copied()
                        .or_else(|| introduced.iter().find(|(n, _)| *n == name).and_then(|(_, a)| *a));
                    if let Some(bound) = bound {
                        if bound != *addr {
                            return Err(PatternError::InvalidParams(format!(
                                "alias '{}' is already bound to {}",
                                name, bound
                            )));
                        }
                    } else if self.alias_types.contains_key(&name) {
                        return Err(PatternError::InvalidParams(format!(
                            "alias '{}' already names a type item",
                            name
                        )));
                    }
                    introduced.push((name, Some(*addr)));
                }
                PatternItem::Type { ty, alias } => {
                    if ty.is_const() {
                        return Err(PatternError::InvalidParams(format!(
                            "only variable types can be used in patterns, got {}",
                            ty
                        )));
                    }
                    if column == CONNECTOR && !ty.is_unknown() && !ty.is_connector() {
                        return Err(PatternError::InvalidParams(format!("{} is not a connector type", ty)));
                    }
                    if alias.as_deref() == Some("") {
                        *alias = None;
                    }
                    if let Some(name) = alias {
                        introduced.push((name.clone(), None));
                    }
                }
                PatternItem::Alias(name) => {
                    if name.is_empty() {
                        return Err(PatternError::InvalidParams(String::from("empty alias reference")));
                    }
                    if !self.aliases.contains_key(name.as_str()) && !introduced.iter().any(|(n, _)| n == name) {
                        return Err(PatternError::InvalidParams(format!("alias '{}' is not introduced yet", name)));
                    }
                    if column == CONNECTOR {
                        let ty = self.alias_type(name);
                        if !ty.is_unknown() && !ty.is_connector() {
                            return Err(PatternError::InvalidParams(format!(
                                "alias '{}' of type {} cannot be a connector",
                                name, ty
                            )));
                        }
                    }
                }
            }
        }
        if let Some(connector) = items[CONNECTOR].alias() {
            if items[SOURCE].alias() == Some(connector) || items[TARGET].alias() == Some(connector) {
                return Err(PatternError::InvalidParams(format!(
                    "alias '{}' is shared between a connector and its endpoint",
                    connector
                )));
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
    pub fn len(&self) -> usize { self.triples.len() }
    pub fn is_empty(&self) -> bool { self.triples.is_empty() }
    pub fn triples(&self) -> &[PatternTriple] { &self.triples }
    pub fn triple_at(&self, index: usize) -> Option<&PatternTriple> { self.triples.get(index) }
    pub fn aliases(&self) -> &AliasTable { &self.aliases }
    pub fn alias_slot(&self, alias: &str) -> Option<usize> { self.aliases.get(alias).copied() }
    pub fn has_alias(&self, alias: &str) -> bool { self.aliases.contains_key(alias) }
    /// The element an alias is fixed to, if any item bound it to one.
    pub fn alias_addr(&self, alias: &str) -> Option<ElementAddr> { self.alias_addrs.get(alias).copied() }
    pub fn alias_type(&self, alias: &str) -> ElementType {
        self.alias_types.get(alias).copied().unwrap_or(ElementType::UNKNOWN)
    }

    /// The concrete element an item denotes regardless of any search state.
    pub fn fixed_addr(&self, item: &PatternItem) -> Option<ElementAddr> {
        match item {
            PatternItem::Addr { addr, .. } => Some(*addr),
            _ => item.alias().and_then(|a| self.alias_addr(a)),
        }
    }
    pub fn is_fixed(&self, item: &PatternItem) -> bool { self.fixed_addr(item).is_some() }

    /// The type an item demands. References inherit the type of their alias.
    pub fn item_type(&self, item: &PatternItem) -> ElementType {
        match item {
            PatternItem::Addr { .. } => ElementType::UNKNOWN,
            PatternItem::Type { ty, .. } => *ty,
            PatternItem::Alias(name) => self.alias_type(name),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self.triples.iter().map(|t| t.to_string()).collect();
        write!(f, "[{}]", lines.join("; "))
    }
}
