//! Form validation adapter invoked before add/update submissions.

use super::state::FormStatus;
use crate::core::{CrudError, Result, field};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

#[async_trait]
pub trait FormValidator: Send + Sync {
    /// Rejects the form with an error, typically `CrudError::Validation`.
    async fn validate(&self, form: &Value, status: FormStatus) -> Result<()>;
}

/// Accepts every form.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;

#[async_trait]
impl FormValidator for NoopValidator {
    async fn validate(&self, _form: &Value, status: FormStatus) -> Result<()> {
        debug!("[CRUD] - no form validator configured, submitting {} form as is", status);
        Ok(())
    }
}

/// Requires each listed field to be present and non-empty.
#[derive(Debug, Default, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

#[async_trait]
impl FormValidator for RequiredFields {
    async fn validate(&self, form: &Value, _status: FormStatus) -> Result<()> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|name| is_blank(field(form, name)))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CrudError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}
