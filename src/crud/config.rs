use super::endpoint::{EndpointSpec, Operation, RestApi};
use super::validation::FormValidator;
use crate::core::Result;
use crate::reconcile::AutoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Page size used when neither the instance nor the defaults set one.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Instance value if set, otherwise `fallback`.
pub fn effective<T>(value: Option<T>, fallback: T) -> T {
    value.unwrap_or(fallback)
}

/// First positive page size of instance, global default, built-in default.
pub fn effective_page_size(instance: usize, global: usize) -> usize {
    [instance, global]
        .into_iter()
        .find(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// First non-blank string of instance and fallback.
pub fn effective_str<'a>(instance: &'a str, fallback: &'a str) -> &'a str {
    if instance.trim().is_empty() {
        fallback
    } else {
        instance
    }
}

/// Process-wide defaults shared by every instance of a [`CrudContext`](super::CrudContext).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrudDefaults {
    /// Merged into every query before instance values.
    pub query: Map<String, Value>,
    /// `0` means unset.
    pub page_size: usize,
    pub row_key: String,
    pub recoverable: bool,
    pub frontend: bool,
    pub cache: bool,
    pub rest_api: RestApi,
}

impl CrudDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses defaults from a JSON document, e.g. an application config file.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn row_key(mut self, key: impl Into<String>) -> Self {
        self.row_key = key.into();
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn frontend(mut self, frontend: bool) -> Self {
        self.frontend = frontend;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn rest_api(mut self, operation: Operation, spec: impl Into<EndpointSpec>) -> Self {
        self.rest_api.set(operation, spec);
        self
    }
}

/// Constructor input of one instance: the resource URL plus configuration.
#[derive(Clone, Default)]
pub struct CrudOptions {
    pub url: String,
    pub url_params: Map<String, Value>,
    /// Instance default query, layered over the global default query.
    pub query: Map<String, Value>,
    /// Free-form parameters exposed through `CrudState::params`.
    pub params: Map<String, Value>,
    /// Distinguishes several instances of the same page for draft snapshots.
    pub key: String,
    pub rest_api: RestApi,
    pub recoverable: Option<bool>,
    pub frontend: Option<bool>,
    pub cache: Option<bool>,
    pub page_size: usize,
    pub row_key: Option<String>,
    pub auto_response: AutoResponse,
    pub validator: Option<Arc<dyn FormValidator>>,
}

impl fmt::Debug for CrudOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudOptions")
            .field("url", &self.url)
            .field("key", &self.key)
            .field("query", &self.query)
            .field("rest_api", &self.rest_api)
            .field("recoverable", &self.recoverable)
            .field("frontend", &self.frontend)
            .field("cache", &self.cache)
            .field("page_size", &self.page_size)
            .field("row_key", &self.row_key)
            .field("auto_response", &self.auto_response)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl CrudOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn url_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn rest_api(mut self, operation: Operation, spec: impl Into<EndpointSpec>) -> Self {
        self.rest_api.set(operation, spec);
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = Some(recoverable);
        self
    }

    /// Fetch once and page the cached result on the client.
    pub fn frontend(mut self, frontend: bool) -> Self {
        self.frontend = Some(frontend);
        self
    }

    /// Same client-side paging as [`frontend`](Self::frontend), under its other name.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn row_key(mut self, key: impl Into<String>) -> Self {
        self.row_key = Some(key.into());
        self
    }

    pub fn auto_response(mut self, auto_response: AutoResponse) -> Self {
        self.auto_response = auto_response;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn FormValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl From<&str> for CrudOptions {
    fn from(url: &str) -> Self {
        CrudOptions::new(url)
    }
}

impl From<String> for CrudOptions {
    fn from(url: String) -> Self {
        CrudOptions::new(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    #[test]
    fn test_effective_page_size_falls_back() {
        assert_eq!(effective_page_size(20, 50), 20);
        assert_eq!(effective_page_size(0, 50), 50);
        assert_eq!(effective_page_size(0, 0), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_effective_helpers() {
        assert!(effective(Some(true), false));
        assert!(!effective(None, false));
        assert_eq!(effective_str("  ", "id"), "id");
        assert_eq!(effective_str("uuid", "id"), "uuid");
    }

    #[test]
    fn test_defaults_from_json() {
        let defaults = CrudDefaults::from_json(
            r#"{
                "query": {"tenant": "acme"},
                "pageSize": 25,
                "rowKey": "id",
                "recoverable": true,
                "cache": true,
                "restApi": {"add": {"url": "/create", "method": "POST"}}
            }"#,
        )
        .unwrap();
        assert_eq!(defaults.query.get("tenant"), Some(&json!("acme")));
        assert_eq!(defaults.page_size, 25);
        assert!(defaults.recoverable);
        assert!(!defaults.frontend);
        assert!(defaults.cache);
        assert_eq!(defaults.rest_api.endpoint(Operation::Add).url, "/create");
        assert_eq!(defaults.rest_api.endpoint(Operation::Add).method, Method::POST);
    }

    #[test]
    fn test_options_builder() {
        let options = CrudOptions::new("/api/:tenant/users")
            .url_param("tenant", "acme")
            .query("status", 1)
            .key("left")
            .recoverable(true)
            .row_key("uid");
        assert_eq!(options.url_params.get("tenant"), Some(&json!("acme")));
        assert_eq!(options.recoverable, Some(true));
        assert_eq!(options.row_key.as_deref(), Some("uid"));
    }
}
