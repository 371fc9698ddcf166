//! sc-pattern – pattern search and generation over a typed semantic graph.
//!
//! The graph holds three kinds of elements, each identified by an
//! [`types::ElementAddr`] and classified by an [`types::ElementType`]:
//! * nodes, optionally refined by a subkind (tuple, structure, class, ...),
//! * links, which carry a [`content::LinkContent`] value,
//! * connectors (arcs and common edges) between two elements, where either
//!   end may itself be a connector.
//!
//! A [`pattern::Pattern`] is an ordered list of triples `source -connector-> target`
//! whose items are fixed elements, variable type constraints or references to
//! aliases introduced earlier. The engine answers two questions about it:
//! * [`search`] – where does the pattern occur in the graph? Every match is a
//!   [`row::MatchRow`] binding all three slots of every triple.
//! * [`generate`] – make the pattern occur: create whatever is missing,
//!   atomically, and return the row of the new construction.
//!
//! ## Modules
//! * [`types`] – Element identifiers and the type bitmask.
//! * [`store`] – The [`store::GraphStore`] capabilities the engine relies on.
//! * [`memory`] – An in-process graph implementing `GraphStore` per session.
//! * [`events`] – Change notifications with deferring and blocking guards.
//! * [`pattern`] / [`params`] – Pattern construction and substitutions.
//! * [`plan`] – Triple classification, dependency maps and search ordering.
//! * [`search`] / [`generate`] – The two engines.
//! * [`builder`] / [`parsed`] – Patterns built from graph structures or parsed notation.
//! * [`protocol`] – A JSON request/response surface over the above.
//! * [`settings`] – Configuration and logging setup.
//!
//! ## Quick Start
//! ```
//! use sc_pattern::memory::Memory;
//! use sc_pattern::pattern::{Pattern, WithAlias};
//! use sc_pattern::search::search;
//! use sc_pattern::store::GraphStore;
//! use sc_pattern::types::ElementType;
//!
//! let memory = Memory::new();
//! let session = memory.session();
//! let class = session.create_node(ElementType::CONST_NODE_CLASS).unwrap();
//! let member = session.create_node(ElementType::CONST_NODE).unwrap();
//! session.create_connector(ElementType::CONST_PERM_POS_ARC, class, member).unwrap();
//!
//! let mut pattern = Pattern::new();
//! pattern
//!     .triple(class, ElementType::VAR_PERM_POS_ARC, ElementType::VAR_NODE.with_alias("_member"))
//!     .unwrap();
//! let rows = search(&session, &pattern).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].get("_member"), Some(member));
//! ```

pub mod error;
pub mod settings;
pub mod types;
pub mod content;
pub mod events;
pub mod store;
pub mod memory;
pub mod pattern;
pub mod params;
pub mod row;
pub mod plan;
pub mod search;
pub mod generate;
pub mod builder;
pub mod parsed;
pub mod protocol;

pub use error::{PatternError, Result};
pub use types::{ElementAddr, ElementType};
