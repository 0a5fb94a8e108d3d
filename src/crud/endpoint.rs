//! REST endpoint table.
//!
//! Every built-in operation maps to a URL suffix appended to the resolved
//! instance URL and an HTTP method. Global and per-instance overrides are
//! layered on top of the built-in defaults; custom endpoints are looked up by
//! name through the same table.

use http::Method;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Query,
    Details,
    Add,
    Update,
    AddOrUpdate,
    Delete,
    Export,
    Import,
    Sort,
    Copy,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Query,
        Operation::Details,
        Operation::Add,
        Operation::Update,
        Operation::AddOrUpdate,
        Operation::Delete,
        Operation::Export,
        Operation::Import,
        Operation::Sort,
        Operation::Copy,
    ];

    /// Override key, upper case.
    pub fn key(self) -> &'static str {
        match self {
            Operation::Query => "QUERY",
            Operation::Details => "DETAILS",
            Operation::Add => "ADD",
            Operation::Update => "UPDATE",
            Operation::AddOrUpdate => "ADD_OR_UPDATE",
            Operation::Delete => "DELETE",
            Operation::Export => "EXPORT",
            Operation::Import => "IMPORT",
            Operation::Sort => "SORT",
            Operation::Copy => "COPY",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.key().eq_ignore_ascii_case(key))
    }

    pub fn default_endpoint(self) -> Endpoint {
        let (url, method) = match self {
            Operation::Query | Operation::Details => ("", Method::GET),
            Operation::Add => ("", Method::POST),
            Operation::Update | Operation::AddOrUpdate => ("", Method::PUT),
            Operation::Delete => ("", Method::DELETE),
            Operation::Export => ("/export", Method::GET),
            Operation::Import => ("/import", Method::POST),
            Operation::Sort => ("/sort", Method::PUT),
            Operation::Copy => ("/copy", Method::POST),
        };
        Endpoint::new(url, method)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Resolved URL suffix and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub method: Method,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
        }
    }
}

fn parse_method(method: &str) -> Option<Method> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()).ok()
}

/// Override of one endpoint: a bare suffix, or a suffix and/or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointSpec {
    Suffix(String),
    Full {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        method: Option<String>,
    },
}

impl EndpointSpec {
    pub fn method(method: Method) -> Self {
        EndpointSpec::Full {
            url: None,
            method: Some(method.as_str().to_string()),
        }
    }

    pub fn full(url: impl Into<String>, method: Method) -> Self {
        EndpointSpec::Full {
            url: Some(url.into()),
            method: Some(method.as_str().to_string()),
        }
    }

    fn apply(&self, base: Endpoint) -> Endpoint {
        match self {
            EndpointSpec::Suffix(url) => Endpoint::new(url.clone(), base.method),
            EndpointSpec::Full { url, method } => {
                let method = match method.as_deref().map(|m| (m, parse_method(m))) {
                    Some((_, Some(method))) => method,
                    Some((raw, None)) => {
                        warn!("[CRUD] - invalid HTTP method '{}', keeping {}", raw, base.method);
                        base.method
                    }
                    None => base.method,
                };
                Endpoint::new(url.clone().unwrap_or(base.url), method)
            }
        }
    }
}

impl From<&str> for EndpointSpec {
    fn from(value: &str) -> Self {
        EndpointSpec::Suffix(value.to_string())
    }
}

/// Layered endpoint overrides keyed by operation.
///
/// Keys are canonicalised on insert and on deserialize, so `export`,
/// `Export` and `EXPORT` address the same operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, EndpointSpec>",
    into = "BTreeMap<String, EndpointSpec>"
)]
pub struct RestApi {
    overrides: BTreeMap<Operation, EndpointSpec>,
}

impl RestApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, operation: Operation, spec: impl Into<EndpointSpec>) -> &mut Self {
        self.overrides.insert(operation, spec.into());
        self
    }

    pub fn with(mut self, operation: Operation, spec: impl Into<EndpointSpec>) -> Self {
        self.set(operation, spec);
        self
    }

    pub fn endpoint(&self, operation: Operation) -> Endpoint {
        let base = operation.default_endpoint();
        match self.overrides.get(&operation) {
            Some(spec) => spec.apply(base),
            None => base,
        }
    }

    /// `self` with `instance` overrides on top.
    ///
    /// Suffix and method resolve field by field: built-in, then `self`, then
    /// `instance`. An instance override naming only a method keeps the suffix
    /// resolved below it.
    pub fn layered(&self, instance: &RestApi) -> RestApi {
        let mut merged = self.clone();
        for (operation, spec) in &instance.overrides {
            let resolved = spec.apply(self.endpoint(*operation));
            merged
                .overrides
                .insert(*operation, EndpointSpec::full(resolved.url, resolved.method));
        }
        merged
    }
}

impl From<BTreeMap<String, EndpointSpec>> for RestApi {
    fn from(raw: BTreeMap<String, EndpointSpec>) -> Self {
        let mut api = RestApi::new();
        for (key, spec) in raw {
            match Operation::from_key(&key) {
                Some(operation) => {
                    api.set(operation, spec);
                }
                None => warn!("[CRUD] - unknown rest api key '{}' ignored", key),
            }
        }
        api
    }
}

impl From<RestApi> for BTreeMap<String, EndpointSpec> {
    fn from(api: RestApi) -> Self {
        api.overrides
            .into_iter()
            .map(|(operation, spec)| (operation.key().to_string(), spec))
            .collect()
    }
}

/// Descriptor of a caller-registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEndpoint {
    pub url: String,
    pub method: Method,
    /// Track `loading.custom[<name>]` while the call is in flight.
    pub tracks_loading: bool,
}

impl CustomEndpoint {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            tracks_loading: true,
        }
    }

    pub fn tracks_loading(mut self, tracks: bool) -> Self {
        self.tracks_loading = tracks;
        self
    }
}
