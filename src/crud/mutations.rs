use super::{Crud, LoadingFlag, MultipartForm, Operation, ResponseType, UploadFile};
use super::transport::query_value;
use crate::core::{Result, row_id};
use crate::hooks::HookName;
use crate::reconcile::AutoPatch;
use serde_json::{Map, Value};
use tracing::{Instrument, info_span};

fn ids_to_strings(payload: &Value) -> Vec<String> {
    payload
        .as_array()
        .map(|ids| ids.iter().filter_map(row_id).collect())
        .unwrap_or_default()
}

impl Crud {
    /// Deletes `rows`; the DELETE body is their row-key values.
    pub async fn to_delete(&mut self, rows: &[Value]) -> Result<Option<Value>> {
        let span = info_span!("crud.delete", instance = %self.id, rows = rows.len());
        self.delete_inner(rows).instrument(span).await
    }

    async fn delete_inner(&mut self, rows: &[Value]) -> Result<Option<Value>> {
        let ids = Value::Array(self.ids_of(rows, "to_delete()"));
        let Some(outcome) = self.gate(HookName::BEFORE_DELETE, Map::new(), ids).await? else {
            return Ok(None);
        };

        let deleted = ids_to_strings(&outcome.payload);
        let request = self.request(Operation::Delete).json(outcome.payload);
        let response = self
            .execute(
                request,
                &[LoadingFlag::Del, LoadingFlag::Table],
                HookName::AFTER_DELETE,
                |response| Some(AutoPatch::delete(deleted, response.clone())),
            )
            .await?;
        Ok(Some(response))
    }

    /// Downloads the current query as a blob.
    pub async fn to_export(&mut self) -> Result<Option<Value>> {
        let params = self.query_params(None);
        let orders = self.orders_payload();
        let Some(outcome) = self.gate(HookName::BEFORE_EXPORT, params, orders).await? else {
            return Ok(None);
        };

        let request = self
            .request(Operation::Export)
            .params(outcome.params)
            .response_type(ResponseType::Blob);
        let response = self
            .execute(request, &[LoadingFlag::Export], HookName::AFTER_EXPORT, |_| None)
            .await?;
        Ok(Some(response))
    }

    /// Uploads `files` as multipart: one file under `file`, several under `files`.
    ///
    /// Parameters set by BEFORE_IMPORT are sent as text fields.
    pub async fn to_import(&mut self, files: Vec<UploadFile>) -> Result<Option<Value>> {
        let Some(outcome) = self
            .gate(HookName::BEFORE_IMPORT, Map::new(), Value::Null)
            .await?
        else {
            return Ok(None);
        };

        let mut form = MultipartForm::default();
        for (name, value) in &outcome.params {
            if let Some(text) = query_value(value) {
                form.fields.push((name.clone(), text));
            }
        }
        let field = if files.len() == 1 { "file" } else { "files" };
        form.files = files
            .into_iter()
            .map(|file| (field.to_string(), file))
            .collect();

        let request = self.request(Operation::Import).multipart(form);
        let response = self
            .execute(request, &[LoadingFlag::Import], HookName::AFTER_IMPORT, |_| None)
            .await?;
        Ok(Some(response))
    }

    /// Submits `state.sortation` to the reorder endpoint.
    pub async fn to_sort(&mut self) -> Result<Option<Value>> {
        let sortation = self.state.sortation.clone();
        let Some(outcome) = self
            .gate(HookName::BEFORE_SORT, Map::new(), sortation)
            .await?
        else {
            return Ok(None);
        };

        let request = self.request(Operation::Sort).json(outcome.payload);
        let response = self
            .execute(request, &[LoadingFlag::Sort], HookName::AFTER_SORT, |_| None)
            .await?;
        Ok(Some(response))
    }

    /// Copies `rows`; copies are placed next to their sources.
    pub async fn to_copy(&mut self, rows: &[Value]) -> Result<Option<Value>> {
        let span = info_span!("crud.copy", instance = %self.id, rows = rows.len());
        self.copy_inner(rows).instrument(span).await
    }

    async fn copy_inner(&mut self, rows: &[Value]) -> Result<Option<Value>> {
        let ids = Value::Array(self.ids_of(rows, "to_copy()"));
        let Some(outcome) = self.gate(HookName::BEFORE_COPY, Map::new(), ids).await? else {
            return Ok(None);
        };

        let copied = ids_to_strings(&outcome.payload);
        let sources = rows.to_vec();
        let request = self.request(Operation::Copy).json(outcome.payload);
        let response = self
            .execute(
                request,
                &[LoadingFlag::Copy, LoadingFlag::Table],
                HookName::AFTER_COPY,
                |response| Some(AutoPatch::copy(copied, sources, response.clone())),
            )
            .await?;
        Ok(Some(response))
    }
}
