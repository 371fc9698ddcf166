//! Element identifiers and the type descriptor bitmask.
//!
//! An [`ElementType`] is a set of flags along orthogonal axes: element kind
//! (node, link, connector), constancy (const or var) and, for connectors,
//! polarity and permanence. Nodes reuse the connector polarity bits for their
//! subkind (tuple, structure, role, ...), so subkind tests must always be
//! qualified by the element kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;

// ------------- ElementAddr -------------
/// Opaque handle of a graph element. The zero value is never issued and
/// is therefore always invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementAddr(u64);

impl ElementAddr {
    pub const INVALID: ElementAddr = ElementAddr(0);

    pub const fn new(value: u64) -> Self { Self(value) }
    pub fn is_valid(&self) -> bool { self.0 != 0 }
    /// Integer used for ordering and for implicit alias names.
    pub fn hash(&self) -> u64 { self.0 }
    pub fn from_hash(hash: u64) -> Self { Self(hash) }
    /// The alias an item gets when it names this element without an explicit alias.
    pub fn implicit_alias(&self) -> String { self.0.to_string() }
}

impl fmt::Display for ElementAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ElementAddr {
    fn from(value: u64) -> Self { Self(value) }
}

// ------------- ElementType -------------
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementType(u16);

impl ElementType {
    pub const UNKNOWN: ElementType = ElementType(0);

    // element kind
    pub const NODE: ElementType = ElementType(0x1);
    pub const LINK: ElementType = ElementType(0x2);
    pub const EDGE_COMMON: ElementType = ElementType(0x4);
    pub const ARC_COMMON: ElementType = ElementType(0x8);
    pub const ARC_ACCESS: ElementType = ElementType(0x10);

    // constancy
    pub const CONST: ElementType = ElementType(0x20);
    pub const VAR: ElementType = ElementType(0x40);

    // connector polarity and permanence
    pub const ARC_POS: ElementType = ElementType(0x80);
    pub const ARC_NEG: ElementType = ElementType(0x100);
    pub const ARC_FUZ: ElementType = ElementType(0x200);
    pub const ARC_TEMP: ElementType = ElementType(0x400);
    pub const ARC_PERM: ElementType = ElementType(0x800);

    // node subkinds
    pub const NODE_TUPLE: ElementType = ElementType(0x80);
    pub const NODE_STRUCT: ElementType = ElementType(0x100);
    pub const NODE_ROLE: ElementType = ElementType(0x200);
    pub const NODE_NOROLE: ElementType = ElementType(0x400);
    pub const NODE_CLASS: ElementType = ElementType(0x800);
    pub const NODE_ABSTRACT: ElementType = ElementType(0x1000);
    pub const NODE_MATERIAL: ElementType = ElementType(0x2000);

    // masks
    pub const ELEMENT_MASK: ElementType = ElementType(0x1f);
    pub const CONSTANCY_MASK: ElementType = ElementType(0x60);
    pub const POSITIVITY_MASK: ElementType = ElementType(0x380);
    pub const PERMANENCY_MASK: ElementType = ElementType(0xc00);
    pub const NODE_SUBKIND_MASK: ElementType = ElementType(0x3f80);
    pub const CONNECTOR_MASK: ElementType = ElementType(0x1c);

    // common combinations
    pub const CONST_NODE: ElementType = ElementType(0x21);
    pub const VAR_NODE: ElementType = ElementType(0x41);
    pub const CONST_LINK: ElementType = ElementType(0x22);
    pub const VAR_LINK: ElementType = ElementType(0x42);
    pub const CONST_NODE_TUPLE: ElementType = ElementType(0xa1);
    pub const VAR_NODE_TUPLE: ElementType = ElementType(0xc1);
    pub const CONST_NODE_STRUCT: ElementType = ElementType(0x121);
    pub const VAR_NODE_STRUCT: ElementType = ElementType(0x141);
    pub const CONST_NODE_ROLE: ElementType = ElementType(0x221);
    pub const VAR_NODE_ROLE: ElementType = ElementType(0x241);
    pub const CONST_NODE_NOROLE: ElementType = ElementType(0x421);
    pub const VAR_NODE_NOROLE: ElementType = ElementType(0x441);
    pub const CONST_NODE_CLASS: ElementType = ElementType(0x821);
    pub const VAR_NODE_CLASS: ElementType = ElementType(0x841);
    pub const CONST_NODE_ABSTRACT: ElementType = ElementType(0x1021);
    pub const VAR_NODE_ABSTRACT: ElementType = ElementType(0x1041);
    pub const CONST_NODE_MATERIAL: ElementType = ElementType(0x2021);
    pub const VAR_NODE_MATERIAL: ElementType = ElementType(0x2041);

    pub const CONST_COMMON_EDGE: ElementType = ElementType(0x24);
    pub const VAR_COMMON_EDGE: ElementType = ElementType(0x44);
    pub const CONST_COMMON_ARC: ElementType = ElementType(0x28);
    pub const VAR_COMMON_ARC: ElementType = ElementType(0x48);
    pub const CONST_ACCESS_ARC: ElementType = ElementType(0x30);
    pub const VAR_ACCESS_ARC: ElementType = ElementType(0x50);
    pub const CONST_PERM_POS_ARC: ElementType = ElementType(0x8b0);
    pub const VAR_PERM_POS_ARC: ElementType = ElementType(0x8d0);
    pub const CONST_PERM_NEG_ARC: ElementType = ElementType(0x930);
    pub const VAR_PERM_NEG_ARC: ElementType = ElementType(0x950);
    pub const CONST_TEMP_POS_ARC: ElementType = ElementType(0x4b0);
    pub const VAR_TEMP_POS_ARC: ElementType = ElementType(0x4d0);
    pub const CONST_TEMP_NEG_ARC: ElementType = ElementType(0x530);
    pub const VAR_TEMP_NEG_ARC: ElementType = ElementType(0x550);
    pub const CONST_FUZ_ARC: ElementType = ElementType(0x230);
    pub const VAR_FUZ_ARC: ElementType = ElementType(0x250);

    pub const fn from_bits(bits: u16) -> Self { Self(bits) }
    pub const fn bits(&self) -> u16 { self.0 }

    fn has(&self, flags: ElementType) -> bool { self.0 & flags.0 != 0 }

    pub fn is_unknown(&self) -> bool { self.0 & Self::ELEMENT_MASK.0 == 0 }
    pub fn is_node(&self) -> bool { self.has(Self::NODE) }
    pub fn is_link(&self) -> bool { self.has(Self::LINK) }
    pub fn is_connector(&self) -> bool { self.has(Self::CONNECTOR_MASK) }
    pub fn is_common_edge(&self) -> bool { self.has(Self::EDGE_COMMON) }
    pub fn is_arc(&self) -> bool { self.has(Self::ARC_COMMON) || self.has(Self::ARC_ACCESS) }
    pub fn is_access_arc(&self) -> bool { self.has(Self::ARC_ACCESS) }
    pub fn is_const(&self) -> bool { self.has(Self::CONST) }
    pub fn is_var(&self) -> bool { self.has(Self::VAR) }
    pub fn has_constancy(&self) -> bool { self.has(Self::CONSTANCY_MASK) }
    pub fn is_struct(&self) -> bool { self.is_node() && self.has(Self::NODE_STRUCT) }

    /// Element kind bits only.
    pub fn kind(&self) -> ElementType { ElementType(self.0 & Self::ELEMENT_MASK.0) }

    /// Raises constancy: the variable flag is replaced by the constant flag.
    pub fn as_const(&self) -> ElementType {
        ElementType((self.0 & !Self::VAR.0) | Self::CONST.0)
    }
    pub fn as_var(&self) -> ElementType {
        ElementType((self.0 & !Self::CONST.0) | Self::VAR.0)
    }
    /// Projection used when a pattern item has to match or produce a store element.
    /// Types without a constancy flag are left untouched.
    pub fn up_const(&self) -> ElementType {
        if self.has_constancy() { self.as_const() } else { *self }
    }

    /// True when an element of type `actual` satisfies this type as a constraint.
    pub fn matches(&self, actual: ElementType) -> bool {
        actual.0 & self.0 == self.0
    }

    /// True when an element of this type may be refined into `other`, that is every
    /// flag set here is also set on `other`.
    pub fn can_extend_to(&self, other: ElementType) -> bool {
        other.0 & self.0 == self.0
    }

    pub fn name(&self) -> Option<&'static str> {
        NAMES.iter().find(|(t, _)| t == self).map(|(_, n)| *n)
    }
}

const NAMES: &[(ElementType, &str)] = &[
    (ElementType::UNKNOWN, "unknown"),
    (ElementType::NODE, "node"),
    (ElementType::LINK, "link"),
    (ElementType::CONST_NODE, "const_node"),
    (ElementType::VAR_NODE, "var_node"),
    (ElementType::CONST_LINK, "const_link"),
    (ElementType::VAR_LINK, "var_link"),
    (ElementType::CONST_NODE_TUPLE, "const_node_tuple"),
    (ElementType::VAR_NODE_TUPLE, "var_node_tuple"),
    (ElementType::CONST_NODE_STRUCT, "const_node_struct"),
    (ElementType::VAR_NODE_STRUCT, "var_node_struct"),
    (ElementType::CONST_NODE_ROLE, "const_node_role"),
    (ElementType::VAR_NODE_ROLE, "var_node_role"),
    (ElementType::CONST_NODE_NOROLE, "const_node_norole"),
    (ElementType::VAR_NODE_NOROLE, "var_node_norole"),
    (ElementType::CONST_NODE_CLASS, "const_node_class"),
    (ElementType::VAR_NODE_CLASS, "var_node_class"),
    (ElementType::CONST_NODE_ABSTRACT, "const_node_abstract"),
    (ElementType::VAR_NODE_ABSTRACT, "var_node_abstract"),
    (ElementType::CONST_NODE_MATERIAL, "const_node_material"),
    (ElementType::VAR_NODE_MATERIAL, "var_node_material"),
    (ElementType::CONST_COMMON_EDGE, "const_common_edge"),
    (ElementType::VAR_COMMON_EDGE, "var_common_edge"),
    (ElementType::CONST_COMMON_ARC, "const_common_arc"),
    (ElementType::VAR_COMMON_ARC, "var_common_arc"),
    (ElementType::CONST_ACCESS_ARC, "const_access_arc"),
    (ElementType::VAR_ACCESS_ARC, "var_access_arc"),
    (ElementType::CONST_PERM_POS_ARC, "const_perm_pos_arc"),
    (ElementType::VAR_PERM_POS_ARC, "var_perm_pos_arc"),
    (ElementType::CONST_PERM_NEG_ARC, "const_perm_neg_arc"),
    (ElementType::VAR_PERM_NEG_ARC, "var_perm_neg_arc"),
    (ElementType::CONST_TEMP_POS_ARC, "const_temp_pos_arc"),
    (ElementType::VAR_TEMP_POS_ARC, "var_temp_pos_arc"),
    (ElementType::CONST_TEMP_NEG_ARC, "const_temp_neg_arc"),
    (ElementType::VAR_TEMP_NEG_ARC, "var_temp_neg_arc"),
    (ElementType::CONST_FUZ_ARC, "const_fuz_arc"),
    (ElementType::VAR_FUZ_ARC, "var_fuz_arc"),
];

impl ops::BitOr for ElementType {
    type Output = ElementType;
    fn bitor(self, rhs: ElementType) -> ElementType { ElementType(self.0 | rhs.0) }
}
impl ops::BitOrAssign for ElementType {
    fn bitor_assign(&mut self, rhs: ElementType) { self.0 |= rhs.0; }
}
impl ops::BitAnd for ElementType {
    type Output = ElementType;
    fn bitand(self, rhs: ElementType) -> ElementType { ElementType(self.0 & rhs.0) }
}
impl ops::BitAndAssign for ElementType {
    fn bitand_assign(&mut self, rhs: ElementType) { self.0 &= rhs.0; }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ElementType({})", self)
    }
}
