//! Building patterns from graph structures and from parsed notation.
//!
//! A structure is turned into one triple per member connector. Connectors go
//! out in power order (see [`connector_power_buckets`]) so every connector used
//! as an endpoint is introduced before the triples that refer to it. Constant
//! elements become fixed items and variable elements become typed items
//! aliased by their hash, which lets callers map a generated row back onto
//! the structure with [`MatchRow::get_var`](crate::row::MatchRow::get_var).

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{PatternError, Result};
use crate::memory::OtherHasher;
use crate::params::Substitutions;
use crate::parsed::{NotationParser, ParsedConstruction, ParsedElement};
use crate::pattern::{Pattern, PatternItem, WithAlias};
use crate::plan::connector_power_buckets;
use crate::store::{Constraint, GraphStore};
use crate::types::{ElementAddr, ElementType};

/// Builds a pattern from the members of `structure`.
pub fn from_structure<S: GraphStore + ?Sized>(
    store: &S,
    structure: ElementAddr,
    substitutions: Option<&Substitutions>,
) -> Result<Pattern> {
    if !store.is_element(structure) {
        return Err(PatternError::ItemNotFound(format!("structure {} does not exist", structure)));
    }
    let members: Vec<ElementAddr> = store
        .iter3(
            Constraint::Fixed(structure),
            Constraint::Type(ElementType::CONST_PERM_POS_ARC),
            Constraint::any(),
        )?
        .into_iter()
        .map(|[_, _, member]| member)
        .collect();
    from_members(store, &members, substitutions)
}

/// Builds a pattern from an explicit list of member elements. The order of
/// `members` does not affect the result.
pub fn from_members<S: GraphStore + ?Sized>(
    store: &S,
    members: &[ElementAddr],
    substitutions: Option<&Substitutions>,
) -> Result<Pattern> {
    let mut connectors = BTreeMap::new();
    for member in members {
        if store.element_type(*member)?.is_connector() {
            connectors.insert(*member, store.connector_ends(*member)?);
        }
    }
    let buckets = connector_power_buckets(&connectors)?;

    let mut builder = StructureItems { store, substitutions, pattern: Pattern::new() };
    for bucket in &buckets {
        for connector in bucket {
            let (source, target) = connectors[connector];
            let source = builder.item(source)?;
            let connector = builder.item(*connector)?;
            let target = builder.item(target)?;
            builder.pattern.triple(source, connector, target)?;
        }
    }
    debug!(members = members.len(), triples = builder.pattern.len(), powers = buckets.len(), "pattern built from structure");
    Ok(builder.pattern)
}

struct StructureItems<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    substitutions: Option<&'a Substitutions>,
    pattern: Pattern,
}

impl<S: GraphStore + ?Sized> StructureItems<'_, S> {
    /// The substitution for `element`, looked up by its system identifier
    /// first and by its hash second.
    fn substitute(&self, element: ElementAddr) -> Result<Option<ElementAddr>> {
        let Some(substitutions) = self.substitutions else { return Ok(None) };
        if let Some(idtf) = self.store.system_identifier_of(element)? {
            if let Some(value) = substitutions.get(&idtf) {
                return Ok(Some(value));
            }
        }
        Ok(substitutions.get(&element.implicit_alias()))
    }

    fn item(&self, element: ElementAddr) -> Result<PatternItem> {
        let alias = element.implicit_alias();
        if self.pattern.has_alias(&alias) {
            return Ok(PatternItem::Alias(alias));
        }
        // a substitute may belong to another store, so only the member's own type is read
        if let Some(actual) = self.substitute(element)? {
            return Ok(actual.with_alias(alias));
        }
        let ty = self.store.element_type(element)?;
        if ty.is_const() { Ok(element.with_alias(alias)) } else { Ok(ty.with_alias(alias)) }
    }
}

/// Builds a pattern from a parsed construction. Elements are matched by label:
/// the first mention of a label declares it, later mentions refer to it.
/// Named constants known to the store become fixed items.
pub fn from_parsed<S: GraphStore + ?Sized>(store: &S, parsed: &ParsedConstruction) -> Result<Pattern> {
    let mut uses: HashMap<usize, usize, OtherHasher> = HashMap::default();
    for triple in &parsed.triples {
        for index in [triple.source, triple.connector, triple.target] {
            if index >= parsed.elements.len() {
                return Err(PatternError::parse(format!("triple refers to missing element {}", index)));
            }
            *uses.entry(index).or_default() += 1;
        }
    }

    let mut pattern = Pattern::new();
    for triple in &parsed.triples {
        let connector = &parsed.elements[triple.connector];
        let (source, target) = if connector.reversed {
            (triple.target, triple.source)
        } else {
            (triple.source, triple.target)
        };
        let mut items = Vec::with_capacity(3);
        for index in [source, triple.connector, target] {
            let reused = uses.get(&index).copied().unwrap_or(0) > 1;
            items.push(parsed_item(store, &pattern, &parsed.elements[index], index, reused)?);
        }
        let [source, connector, target]: [PatternItem; 3] = items
            .try_into()
            .map_err(|_| PatternError::InvalidState(String::from("triple without three items")))?;
        let at = pattern.len();
        pattern
            .triple(source, connector, target)
            .map_err(|e| PatternError::parse(format!("cannot build triple {}: {}", at, e)))?;
    }
    debug!(elements = parsed.elements.len(), triples = pattern.len(), "pattern built from notation");
    Ok(pattern)
}

fn parsed_item<S: GraphStore + ?Sized>(
    store: &S,
    pattern: &Pattern,
    element: &ParsedElement,
    index: usize,
    reused: bool,
) -> Result<PatternItem> {
    let label = if element.is_unnamed() {
        if !reused {
            return Ok(PatternItem::typed(variable(element.ty)));
        }
        format!("..{}", index)
    } else {
        element.idtf.clone()
    };
    if pattern.has_alias(&label) {
        return Ok(PatternItem::Alias(label));
    }
    if !element.is_unnamed() && !element.ty.is_var() {
        if let Some(addr) = store.find_by_system_identifier(&label)? {
            return Ok(addr.with_alias(label));
        }
    }
    Ok(variable(element.ty).with_alias(label))
}

fn variable(ty: ElementType) -> ElementType {
    if ty.is_const() { ty.as_var() } else { ty }
}

/// Parses `text` and builds a pattern from it. Parser failures come back as
/// [`PatternError::Parse`].
pub fn from_notation<S, P>(store: &S, parser: &P, text: &str) -> Result<Pattern>
where
    S: GraphStore + ?Sized,
    P: NotationParser + ?Sized,
{
    let parsed = parser.parse(text).map_err(PatternError::parse)?;
    from_parsed(store, &parsed)
}
