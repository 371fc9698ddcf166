//! JSON request/response protocol over a [`GraphStore`].
//!
//! A request names an action and carries its payload:
//!
//! ```text
//! {"id": 1, "type": "search_template", "payload": [[
//!     {"type": "addr", "value": 17},
//!     {"type": "type", "value": 2256, "alias": "_arc"},
//!     {"type": "type", "value": 65, "alias": "_x"}
//! ]]}
//! ```
//!
//! and gets `{"id": 1, "event": false, "status": true, "payload": ...}` back.
//! Failed requests carry `status: false` and an `errors` message.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::builder::{from_notation, from_structure};
use crate::content::LinkContent;
use crate::error::{PatternError, Result};
use crate::events::EventsPendingGuard;
use crate::generate::generate_with;
use crate::params::Substitutions;
use crate::parsed::NotationParser;
use crate::pattern::{Pattern, PatternItem};
use crate::search::{Search, SearchRequest};
use crate::settings::Settings;
use crate::store::GraphStore;
use crate::types::{ElementAddr, ElementType};

// ------------- Envelope -------------
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(rename = "type")]
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub id: u64,
    pub event: bool,
    pub status: bool,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl Response {
    fn ok(id: u64, payload: Value) -> Self {
        Self { id, event: false, status: true, payload, errors: None }
    }
    fn failed(id: u64, error: &PatternError) -> Self {
        Self { id, event: false, status: false, payload: Value::Null, errors: Some(error.to_string()) }
    }
}

// ------------- Payloads -------------
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireItem {
    Type { value: ElementType, alias: Option<String> },
    Addr { value: ElementAddr, alias: Option<String> },
    Alias { value: String },
}

impl From<WireItem> for PatternItem {
    fn from(item: WireItem) -> Self {
        match item {
            WireItem::Type { value, alias } => PatternItem::Type { ty: value, alias },
            WireItem::Addr { value, alias } => PatternItem::Addr { addr: value, alias },
            WireItem::Alias { value } => PatternItem::Alias(value),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredKind {
    Idtf,
    Addr,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TemplateSpec {
    Wrapped {
        templ: Box<TemplateSpec>,
        #[serde(default)]
        params: BTreeMap<String, ElementAddr>,
    },
    Triples(Vec<[WireItem; 3]>),
    Stored {
        #[serde(rename = "type")]
        kind: StoredKind,
        value: Value,
    },
    Notation(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KeynodeCommand {
    Find,
    Resolve,
}

#[derive(Debug, Deserialize)]
struct KeynodeRequest {
    command: KeynodeCommand,
    idtf: String,
    #[serde(rename = "elType")]
    el_type: Option<ElementType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RefKind {
    Ref,
    Addr,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    #[serde(rename = "type")]
    kind: RefKind,
    value: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "el", rename_all = "lowercase")]
enum CreateRequest {
    Node {
        #[serde(rename = "type")]
        ty: ElementType,
    },
    Link {
        #[serde(rename = "type")]
        ty: ElementType,
        content: Option<Value>,
    },
    Edge {
        #[serde(rename = "type")]
        ty: ElementType,
        src: WireRef,
        trg: WireRef,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
enum ContentRequest {
    Set {
        addr: ElementAddr,
        #[serde(rename = "type")]
        data_type: Option<String>,
        data: Value,
    },
    Get {
        addr: ElementAddr,
    },
    Find {
        #[serde(rename = "type")]
        data_type: Option<String>,
        data: Value,
    },
}

fn content_from_json(data_type: Option<&str>, data: &Value) -> Result<LinkContent> {
    let content = match (data_type, data) {
        (Some("string") | None, Value::String(s)) => LinkContent::String(s.clone()),
        (Some("int") | None, Value::Number(n)) if n.is_i64() => {
            LinkContent::Int(n.as_i64().ok_or_else(|| PatternError::Protocol(format!("{} is not an int", n)))?)
        }
        (Some("float") | None, Value::Number(n)) => {
            LinkContent::Float(n.as_f64().ok_or_else(|| PatternError::Protocol(format!("{} is not a float", n)))?)
        }
        (data_type, data) => {
            return Err(PatternError::Protocol(format!(
                "cannot read {} as {} content",
                data,
                data_type.unwrap_or("any")
            )));
        }
    };
    Ok(content)
}

fn content_to_json(content: &LinkContent) -> Value {
    let value = match content {
        LinkContent::String(s) => json!(s),
        LinkContent::Int(i) => json!(i),
        LinkContent::Float(x) => json!(x),
        LinkContent::Binary(b) => json!(b),
    };
    json!({"type": content.data_type(), "value": value})
}

// ------------- Dispatcher -------------
/// Maps protocol actions onto a store session.
pub struct Dispatcher<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    parser: Option<&'a dyn NotationParser>,
    max_search_rows: Option<usize>,
}

impl<'a, S: GraphStore + ?Sized> Dispatcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store, parser: None, max_search_rows: None }
    }
    pub fn with_parser(mut self, parser: &'a dyn NotationParser) -> Self {
        self.parser = Some(parser);
        self
    }
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.max_search_rows = settings.max_search_rows;
        self
    }

    /// Handles one serialized request and returns the serialized response.
    pub fn handle_text(&self, text: &str) -> String {
        let response = match serde_json::from_str::<Request>(text) {
            Ok(request) => self.handle(request),
            Err(e) => Response::failed(0, &PatternError::from(e)),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"id":0,"event":false,"status":false,"payload":null,"errors":"{}"}}"#, e))
    }

    pub fn handle(&self, request: Request) -> Response {
        debug!(id = request.id, action = %request.action, "request");
        match self.dispatch(&request.action, request.payload) {
            Ok(payload) => Response::ok(request.id, payload),
            Err(e) => {
                warn!(id = request.id, action = %request.action, error = %e, "request failed");
                Response::failed(request.id, &e)
            }
        }
    }

    fn dispatch(&self, action: &str, payload: Value) -> Result<Value> {
        match action {
            "keynodes" => self.keynodes(serde_json::from_value(payload)?),
            "create_elements" => self.create_elements(serde_json::from_value(payload)?),
            "check_elements" => self.check_elements(serde_json::from_value(payload)?),
            "delete_elements" => self.delete_elements(serde_json::from_value(payload)?),
            "search_template" => self.search_template(serde_json::from_value(payload)?),
            "generate_template" => self.generate_template(serde_json::from_value(payload)?),
            "content" => self.content(serde_json::from_value(payload)?),
            other => Err(PatternError::Protocol(format!("unknown action '{}'", other))),
        }
    }

    fn keynodes(&self, requests: Vec<KeynodeRequest>) -> Result<Value> {
        let mut addrs = Vec::with_capacity(requests.len());
        for request in requests {
            let addr = match request.command {
                KeynodeCommand::Find => {
                    self.store.find_by_system_identifier(&request.idtf)?.unwrap_or(ElementAddr::INVALID)
                }
                KeynodeCommand::Resolve => self
                    .store
                    .resolve_system_identifier(&request.idtf, request.el_type.unwrap_or(ElementType::CONST_NODE))?,
            };
            addrs.push(addr);
        }
        Ok(json!(addrs))
    }

    fn create_elements(&self, requests: Vec<CreateRequest>) -> Result<Value> {
        let _pending = EventsPendingGuard::new(self.store);
        let mut created: Vec<ElementAddr> = Vec::with_capacity(requests.len());
        for request in requests {
            let addr = match request {
                CreateRequest::Node { ty } => self.store.create_node(ty)?,
                CreateRequest::Link { ty, content } => {
                    let link = self.store.create_link(ty)?;
                    if let Some(data) = content {
                        self.store.set_link_content(link, content_from_json(None, &data)?)?;
                    }
                    link
                }
                CreateRequest::Edge { ty, src, trg } => {
                    let source = resolve_ref(&src, &created)?;
                    let target = resolve_ref(&trg, &created)?;
                    self.store.create_connector(ty, source, target)?
                }
            };
            created.push(addr);
        }
        Ok(json!(created))
    }

    fn check_elements(&self, addrs: Vec<ElementAddr>) -> Result<Value> {
        let types: Vec<u16> = addrs
            .into_iter()
            .map(|addr| self.store.element_type(addr).map(|ty| ty.bits()).unwrap_or(0))
            .collect();
        Ok(json!(types))
    }

    fn delete_elements(&self, addrs: Vec<ElementAddr>) -> Result<Value> {
        let _pending = EventsPendingGuard::new(self.store);
        let mut missing = Vec::new();
        for addr in addrs {
            if !self.store.erase(addr)? {
                missing.push(addr.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(PatternError::ItemNotFound(format!("cannot delete {}", missing.join(", "))));
        }
        Ok(Value::Null)
    }

    fn pattern(&self, spec: TemplateSpec) -> Result<(Pattern, Substitutions)> {
        match spec {
            TemplateSpec::Wrapped { templ, params } => {
                let (pattern, mut substitutions) = self.pattern(*templ)?;
                for (name, value) in params {
                    substitutions.add(name, value)?;
                }
                Ok((pattern, substitutions))
            }
            TemplateSpec::Triples(triples) => {
                let mut pattern = Pattern::new();
                for [source, connector, target] in triples {
                    pattern.triple(source, connector, target)?;
                }
                Ok((pattern, Substitutions::new()))
            }
            TemplateSpec::Stored { kind, value } => {
                let structure = match (kind, &value) {
                    (StoredKind::Idtf, Value::String(idtf)) => self
                        .store
                        .find_by_system_identifier(idtf)?
                        .ok_or_else(|| PatternError::ItemNotFound(format!("no template named '{}'", idtf)))?,
                    (StoredKind::Addr, Value::Number(n)) => ElementAddr::new(
                        n.as_u64().ok_or_else(|| PatternError::Protocol(format!("{} is not an element", n)))?,
                    ),
                    (_, value) => return Err(PatternError::Protocol(format!("cannot read template from {}", value))),
                };
                Ok((from_structure(self.store, structure, None)?, Substitutions::new()))
            }
            TemplateSpec::Notation(text) => {
                let parser = self
                    .parser
                    .ok_or_else(|| PatternError::Protocol(String::from("no notation parser is configured")))?;
                Ok((from_notation(self.store, parser, &text)?, Substitutions::new()))
            }
        }
    }

    fn search_template(&self, spec: TemplateSpec) -> Result<Value> {
        let (pattern, substitutions) = self.pattern(spec)?;
        let pattern = pattern.substituted(self.store, &substitutions)?;
        let mut rows = Vec::new();
        let limit = self.max_search_rows;
        Search::new(self.store, &pattern).for_each_until(|row| {
            rows.push(row.addrs().to_vec());
            match limit {
                Some(limit) if rows.len() >= limit => SearchRequest::Stop,
                _ => SearchRequest::Continue,
            }
        })?;
        Ok(json!({"aliases": pattern.aliases(), "addrs": rows}))
    }

    fn generate_template(&self, spec: TemplateSpec) -> Result<Value> {
        let (pattern, substitutions) = self.pattern(spec)?;
        let row = generate_with(self.store, &pattern, &substitutions)?;
        Ok(serde_json::to_value(&row)?)
    }

    fn content(&self, requests: Vec<ContentRequest>) -> Result<Value> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match request {
                ContentRequest::Set { addr, data_type, data } => {
                    self.store.set_link_content(addr, content_from_json(data_type.as_deref(), &data)?)?;
                    json!(true)
                }
                ContentRequest::Get { addr } => match self.store.link_content(addr)? {
                    Some(content) => content_to_json(&content),
                    None => Value::Null,
                },
                ContentRequest::Find { data_type, data } => {
                    let content = content_from_json(data_type.as_deref(), &data)?;
                    json!(self.store.find_links_by_content(&content)?)
                }
            };
            results.push(result);
        }
        Ok(json!(results))
    }
}

fn resolve_ref(reference: &WireRef, created: &[ElementAddr]) -> Result<ElementAddr> {
    match reference.kind {
        RefKind::Addr => Ok(ElementAddr::new(reference.value)),
        RefKind::Ref => usize::try_from(reference.value)
            .ok()
            .and_then(|index| created.get(index).copied())
            .ok_or_else(|| PatternError::Protocol(format!("reference {} points past the created elements", reference.value))),
    }
}
