use super::{Crud, CustomEndpoint, Operation, Request};
use crate::core::{CrudError, Result};
use crate::hooks::HookName;
use serde_json::{Map, Value};
use tracing::{Level, event};

impl Crud {
    /// Registers a named endpoint callable through [`invoke_endpoint`](Self::invoke_endpoint).
    ///
    /// Its hooks are `CRUD_BEFORE_<NAME>` and `CRUD_AFTER_<NAME>`.
    pub fn register_endpoint(&mut self, name: impl Into<String>, endpoint: CustomEndpoint) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CrudError::Config("custom endpoint name can not be empty".to_string()));
        }
        if Operation::from_key(&name).is_some() {
            return Err(CrudError::Config(format!(
                "custom endpoint '{}' shadows a built-in operation",
                name
            )));
        }
        if endpoint.tracks_loading {
            self.state.loading.custom.insert(name.clone(), false);
        } else {
            self.state.loading.custom.remove(&name);
        }
        event!(Level::DEBUG, instance = %self.id, endpoint = %name, "custom endpoint registered");
        self.custom_endpoints.insert(name, endpoint);
        Ok(())
    }

    pub fn custom_endpoint(&self, name: &str) -> Option<&CustomEndpoint> {
        self.custom_endpoints.get(name)
    }

    /// Runs a registered endpoint through the BEFORE / request / AFTER pipeline.
    pub async fn invoke_endpoint(
        &mut self,
        name: &str,
        params: Map<String, Value>,
        data: Option<Value>,
    ) -> Result<Option<Value>> {
        let Some(endpoint) = self.custom_endpoints.get(name).cloned() else {
            let err = CrudError::Config(format!("no endpoint registered under '{}'", name));
            return Err(self.fail(err, &[]).await);
        };

        let payload = data.unwrap_or(Value::Null);
        let Some(outcome) = self.gate(HookName::before(name), params, payload).await? else {
            return Ok(None);
        };

        let mut request = Request::new(endpoint.method, format!("{}{}", self.rest_url(), endpoint.url));
        if !outcome.params.is_empty() {
            request = request.params(outcome.params);
        }
        if !outcome.payload.is_null() {
            request = request.json(outcome.payload);
        }

        self.set_custom_loading(name, endpoint.tracks_loading, true);
        let transport = self.context.transport().clone();
        let result = transport.request(request).await;
        self.set_custom_loading(name, endpoint.tracks_loading, false);

        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err.into(), &[]).await),
        };
        if let Err(err) = self
            .finish_with(HookName::after(name), response.clone(), None)
            .await
        {
            return Err(self.fail(err, &[]).await);
        }
        Ok(Some(response))
    }

    fn set_custom_loading(&mut self, name: &str, tracks: bool, value: bool) {
        if tracks {
            self.state.loading.custom.insert(name.to_string(), value);
        }
    }
}
