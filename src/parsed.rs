//! What a textual notation parser hands to the pattern builder.
//!
//! The crate ships no parser of its own; anything implementing
//! [`NotationParser`] can be plugged into [`crate::builder::from_notation`]
//! and into the protocol dispatcher.

use crate::content::LinkContent;
use crate::types::ElementType;

/// One element mentioned by the notation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    /// The label. Empty or starting with `...` when the element is unnamed.
    pub idtf: String,
    pub ty: ElementType,
    /// Set on connectors written target-first.
    pub reversed: bool,
    pub value: Option<LinkContent>,
}

impl ParsedElement {
    pub fn new(idtf: impl Into<String>, ty: ElementType) -> Self {
        Self { idtf: idtf.into(), ty, reversed: false, value: None }
    }
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }
    pub fn with_value(mut self, value: impl Into<LinkContent>) -> Self {
        self.value = Some(value.into());
        self
    }
    pub fn is_unnamed(&self) -> bool {
        self.idtf.is_empty() || self.idtf.starts_with("...")
    }
}

/// Indices into [`ParsedConstruction::elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTriple {
    pub source: usize,
    pub connector: usize,
    pub target: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedConstruction {
    pub elements: Vec<ParsedElement>,
    pub triples: Vec<ParsedTriple>,
}

impl ParsedConstruction {
    pub fn new() -> Self { Self::default() }

    /// Adds an element and returns its index.
    pub fn element(&mut self, element: ParsedElement) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn triple(&mut self, source: usize, connector: usize, target: usize) -> &mut Self {
        self.triples.push(ParsedTriple { source, connector, target });
        self
    }
}

/// Turns notation text into a [`ParsedConstruction`]. Failures carry a
/// human readable message.
pub trait NotationParser {
    fn parse(&self, text: &str) -> std::result::Result<ParsedConstruction, String>;
}

impl<F> NotationParser for F
where
    F: Fn(&str) -> std::result::Result<ParsedConstruction, String>,
{
    fn parse(&self, text: &str) -> std::result::Result<ParsedConstruction, String> {
        self(text)
    }
}
