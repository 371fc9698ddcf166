// used to print out readable forms of a content value
use std::fmt;

use serde::{Deserialize, Serialize};

/// Value carried by a link element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum LinkContent {
    String(String),
    Int(i64),
    Float(f64),
    Binary(Vec<u8>),
}

// ------------- Content Types --------------
impl LinkContent {
    pub fn identifier(&self) -> u8 {
        match self {
            LinkContent::String(_) => 1,
            LinkContent::Int(_) => 2,
            LinkContent::Float(_) => 3,
            LinkContent::Binary(_) => 4,
        }
    }
    pub fn data_type(&self) -> &'static str {
        match self {
            LinkContent::String(_) => "string",
            LinkContent::Int(_) => "int",
            LinkContent::Float(_) => "float",
            LinkContent::Binary(_) => "binary",
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LinkContent::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LinkContent::String(s) => s.as_bytes().to_vec(),
            LinkContent::Int(i) => i.to_le_bytes().to_vec(),
            LinkContent::Float(x) => x.to_le_bytes().to_vec(),
            LinkContent::Binary(b) => b.clone(),
        }
    }
    /// Digest over the type tag and the byte representation, used as the
    /// key of the content index. Equal contents of different types never collide.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.identifier()]);
        hasher.update(&self.to_bytes());
        hasher.finalize()
    }
}

impl From<&str> for LinkContent {
    fn from(s: &str) -> Self { LinkContent::String(s.to_owned()) }
}
impl From<String> for LinkContent {
    fn from(s: String) -> Self { LinkContent::String(s) }
}
impl From<i64> for LinkContent {
    fn from(i: i64) -> Self { LinkContent::Int(i) }
}
impl From<f64> for LinkContent {
    fn from(x: f64) -> Self { LinkContent::Float(x) }
}

impl fmt::Display for LinkContent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkContent::String(s) => write!(f, "\"{}\"", s),
            LinkContent::Int(i) => write!(f, "{}", i),
            LinkContent::Float(x) => write!(f, "{}", x),
            LinkContent::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}
