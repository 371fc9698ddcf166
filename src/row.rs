use std::ops::Index;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::pattern::AliasTable;
use crate::store::Triple;
use crate::types::ElementAddr;

/// One binding of a whole pattern: three elements per triple, addressable by
/// position or by alias. Rows are snapshots and do not follow later store changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    addrs: Vec<ElementAddr>,
    aliases: Arc<AliasTable>,
}

impl MatchRow {
    pub fn new(addrs: Vec<ElementAddr>, aliases: Arc<AliasTable>) -> Self {
        Self { addrs, aliases }
    }
    pub fn get(&self, alias: &str) -> Option<ElementAddr> {
        self.aliases.get(alias).and_then(|slot| self.addrs.get(*slot)).copied()
    }
    /// The element bound to the item that was built from the variable element `var`.
    pub fn get_var(&self, var: ElementAddr) -> Option<ElementAddr> {
        self.get(&var.implicit_alias())
    }
    pub fn get_index(&self, slot: usize) -> Option<ElementAddr> {
        self.addrs.get(slot).copied()
    }
    pub fn triple(&self, index: usize) -> Option<Triple> {
        let slice = self.addrs.get(index * 3..index * 3 + 3)?;
        Some([slice[0], slice[1], slice[2]])
    }
    pub fn contains(&self, addr: ElementAddr) -> bool { self.addrs.contains(&addr) }
    pub fn has_alias(&self, alias: &str) -> bool { self.aliases.contains_key(alias) }
    pub fn len(&self) -> usize { self.addrs.len() }
    pub fn is_empty(&self) -> bool { self.addrs.is_empty() }
    pub fn addrs(&self) -> &[ElementAddr] { &self.addrs }
    pub fn aliases(&self) -> &AliasTable { &self.aliases }
    pub fn iter(&self) -> impl Iterator<Item = ElementAddr> + '_ { self.addrs.iter().copied() }
}

impl Index<usize> for MatchRow {
    type Output = ElementAddr;
    fn index(&self, slot: usize) -> &ElementAddr { &self.addrs[slot] }
}

impl Serialize for MatchRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MatchRow", 2)?;
        state.serialize_field("aliases", self.aliases.as_ref())?;
        state.serialize_field("addrs", &self.addrs)?;
        state.end()
    }
}
