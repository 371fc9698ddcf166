//! The graph store capabilities the pattern engine is written against.

use serde::Serialize;

use crate::content::LinkContent;
use crate::error::Result;
use crate::types::{ElementAddr, ElementType};

pub type Triple = [ElementAddr; 3];
pub type Quintuple = [ElementAddr; 5];

// ------------- Constraint -------------
/// One position of a constrained iteration: either a concrete element or a
/// type every returned element must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Fixed(ElementAddr),
    Type(ElementType),
}

impl Constraint {
    pub fn any() -> Self { Constraint::Type(ElementType::UNKNOWN) }
    pub fn fixed(&self) -> Option<ElementAddr> {
        match self {
            Constraint::Fixed(addr) => Some(*addr),
            Constraint::Type(_) => None,
        }
    }
    pub fn is_fixed(&self) -> bool { matches!(self, Constraint::Fixed(_)) }
    pub fn admits(&self, addr: ElementAddr, ty: ElementType) -> bool {
        match self {
            Constraint::Fixed(fixed) => *fixed == addr,
            Constraint::Type(constraint) => constraint.matches(ty),
        }
    }
}

impl From<ElementAddr> for Constraint {
    fn from(addr: ElementAddr) -> Self { Constraint::Fixed(addr) }
}
impl From<ElementType> for Constraint {
    fn from(ty: ElementType) -> Self { Constraint::Type(ty) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ElementCounts {
    pub nodes: usize,
    pub links: usize,
    pub connectors: usize,
}

impl ElementCounts {
    pub fn total(&self) -> usize { self.nodes + self.links + self.connectors }
}

// ------------- GraphStore -------------
/// A session on a graph store. Sessions are not meant to be shared between
/// threads; concurrent callers open one session each.
pub trait GraphStore {
    fn create_node(&self, ty: ElementType) -> Result<ElementAddr>;
    fn create_link(&self, ty: ElementType) -> Result<ElementAddr>;
    fn create_connector(&self, ty: ElementType, source: ElementAddr, target: ElementAddr) -> Result<ElementAddr>;
    /// Erases the element together with every connector incident to it.
    /// Returns false when the element did not exist.
    fn erase(&self, addr: ElementAddr) -> Result<bool>;

    fn is_element(&self, addr: ElementAddr) -> bool;
    fn element_type(&self, addr: ElementAddr) -> Result<ElementType>;
    /// Changes subtype and constancy flags; the element kind cannot change.
    fn set_element_subtype(&self, addr: ElementAddr, ty: ElementType) -> Result<()>;
    fn connector_ends(&self, connector: ElementAddr) -> Result<(ElementAddr, ElementAddr)>;

    /// Every (source, connector, target) satisfying the three constraints.
    /// Common edges are returned from both of their ends.
    fn iter3(&self, source: Constraint, connector: Constraint, target: Constraint) -> Result<Vec<Triple>>;

    /// Every triple from `iter3` extended with an attribute connector
    /// `relation_source -> connector`, as (source, connector, target, relation_connector, relation_source).
    fn iter5(
        &self,
        source: Constraint,
        connector: Constraint,
        target: Constraint,
        relation_connector: Constraint,
        relation_source: Constraint,
    ) -> Result<Vec<Quintuple>> {
        let mut quintuples = Vec::new();
        for [s, c, t] in self.iter3(source, connector, target)? {
            for [rs, rc, _] in self.iter3(relation_source, relation_connector, Constraint::Fixed(c))? {
                quintuples.push([s, c, t, rc, rs]);
            }
        }
        Ok(quintuples)
    }

    fn has_connector(&self, source: ElementAddr, target: ElementAddr, ty: ElementType) -> Result<bool> {
        Ok(!self.iter3(source.into(), ty.into(), target.into())?.is_empty())
    }

    /// Number of connectors leaving `addr`, used as a cardinality estimate.
    fn outgoing_count(&self, addr: ElementAddr) -> Result<usize>;

    fn find_by_system_identifier(&self, idtf: &str) -> Result<Option<ElementAddr>>;
    /// Finds the element with the identifier or creates a node of type `ty` carrying it.
    fn resolve_system_identifier(&self, idtf: &str, ty: ElementType) -> Result<ElementAddr>;
    fn set_system_identifier(&self, addr: ElementAddr, idtf: &str) -> Result<()>;
    fn system_identifier_of(&self, addr: ElementAddr) -> Result<Option<String>>;

    fn set_link_content(&self, link: ElementAddr, content: LinkContent) -> Result<()>;
    fn link_content(&self, link: ElementAddr) -> Result<Option<LinkContent>>;
    fn find_links_by_content(&self, content: &LinkContent) -> Result<Vec<ElementAddr>>;
    fn find_links_by_content_prefix(&self, prefix: &str) -> Result<Vec<ElementAddr>>;

    fn element_counts(&self) -> Result<ElementCounts>;

    fn begin_events_pending(&self);
    fn end_events_pending(&self);
    fn begin_events_blocking(&self);
    fn end_events_blocking(&self);
}
