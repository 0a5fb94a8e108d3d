//! Transport collaborator: the single function performing HTTP calls.

use crate::core::TransportError;
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, UploadFile)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub params: Option<Map<String, Value>>,
    pub data: Option<RequestBody>,
    pub response_type: Option<ResponseType>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            params: None,
            data: None,
            response_type: None,
        }
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn json(mut self, data: Value) -> Self {
        self.data = Some(RequestBody::Json(data));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.data = Some(RequestBody::Multipart(form));
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Performs one request and returns the raw response.
///
/// Failures are reported as [`TransportError`]; the orchestrator never looks
/// further into the transport than that.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: Request) -> Result<Value, TransportError>;
}

/// Renders a parameter value for a query string.
pub fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Prefix for every request URL, e.g. `https://api.example.com`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn full_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), url),
            None => url.to_string(),
        }
    }
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    let mut error = TransportError::new(err.to_string()).with_name("ReqwestError");
    if err.is_timeout() {
        error = error.with_code("ETIMEDOUT");
    } else if err.is_connect() {
        error = error.with_code("ECONNREFUSED");
    }
    if let Some(status) = err.status() {
        error = error.with_response(status.as_u16(), status.canonical_reason().unwrap_or_default());
    }
    error
}

fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    for (name, file) in form.files {
        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name);
        if let Some(content_type) = file.content_type {
            part = part.mime_str(&content_type).map_err(from_reqwest)?;
        }
        multipart = multipart.part(name, part);
    }
    Ok(multipart)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: Request) -> Result<Value, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|err| TransportError::new(err.to_string()).with_name("InvalidMethod"))?;
        let mut builder = self.client.request(method, self.full_url(&request.url));

        if let Some(params) = &request.params {
            let pairs: Vec<(String, String)> = params
                .iter()
                .filter_map(|(key, value)| query_value(value).map(|value| (key.clone(), value)))
                .collect();
            builder = builder.query(&pairs);
        }
        match request.data {
            Some(RequestBody::Json(body)) => builder = builder.json(&body),
            Some(RequestBody::Multipart(form)) => builder = builder.multipart(to_reqwest_form(form)?),
            None => {}
        }

        let response = builder.send().await.map_err(from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(format!(
                "Request failed with status code {}",
                status.as_u16()
            ))
            .with_name("HttpError")
            .with_response(status.as_u16(), status.canonical_reason().unwrap_or_default()));
        }

        match request.response_type.unwrap_or_default() {
            ResponseType::Json => {
                let bytes = response.bytes().await.map_err(from_reqwest)?;
                if bytes.is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_slice(&bytes)
                    .map_err(|err| TransportError::new(err.to_string()).with_name("ParseError"))
            }
            ResponseType::Text => Ok(Value::String(response.text().await.map_err(from_reqwest)?)),
            ResponseType::Blob => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await.map_err(from_reqwest)?;
                Ok(json!({"contentType": content_type, "bytes": bytes.to_vec()}))
            }
        }
    }
}
