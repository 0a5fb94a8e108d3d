use super::{Crud, FormStatus, LoadingFlag, Operation};
use crate::core::{Result, record_id};
use crate::hooks::HookName;
use crate::reconcile::AutoPatch;
use log::warn;
use serde_json::{Map, Value};
use tracing::{Instrument, Level, event, info_span};

const SUBMIT_FLAGS: &[LoadingFlag] = &[LoadingFlag::Submit];
const FORM_FLAGS: &[LoadingFlag] = &[LoadingFlag::Form];

/// Hooks around entering one form mode with an existing record.
struct FormEntry {
    mode: FormStatus,
    query_hook: HookName,
    loaded_hook: HookName,
    caller: &'static str,
}

impl FormEntry {
    const EDIT: FormEntry = FormEntry {
        mode: FormStatus::Updating,
        query_hook: HookName::BEFORE_EDIT_QUERY,
        loaded_hook: HookName::BEFORE_EDIT,
        caller: "to_update()",
    };
    const VIEW: FormEntry = FormEntry {
        mode: FormStatus::Viewing,
        query_hook: HookName::BEFORE_VIEW_QUERY,
        loaded_hook: HookName::BEFORE_VIEW,
        caller: "to_view()",
    };
    const ADD_OR_UPDATE: FormEntry = FormEntry {
        mode: FormStatus::AddOrUpdate,
        query_hook: HookName::BEFORE_ADD_OR_UPDATE_QUERY,
        loaded_hook: HookName::BEFORE_ADD_OR_UPDATE,
        caller: "to_add_or_update()",
    };
}

impl Crud {
    /// Enters `ADDING` and offers any pending create-draft.
    ///
    /// `args` is handed to BEFORE_ADD as its payload.
    pub async fn to_add(&mut self, args: Value) -> Result<Option<Value>> {
        let Some(_) = self.gate(HookName::BEFORE_ADD, Map::new(), args).await? else {
            return Ok(None);
        };
        self.transition(FormStatus::Adding, None);
        if let Err(err) = self.recover(FormStatus::Adding).await {
            return Err(self.fail(err, &[]).await);
        }
        Ok(Some(self.state.form.clone()))
    }

    /// Enters `UPDATING` for `row`, fetching its details.
    pub async fn to_update(&mut self, row: &Value) -> Result<Option<Value>> {
        self.enter_form(FormEntry::EDIT, Some(row)).await
    }

    /// Enters `VIEWING` for `row`, fetching its details.
    pub async fn to_view(&mut self, row: &Value) -> Result<Option<Value>> {
        self.enter_form(FormEntry::VIEW, Some(row)).await
    }

    /// Enters `ADD_OR_UPDATE`; the details of `row` are fetched when it has an id.
    pub async fn to_add_or_update(&mut self, row: Option<&Value>) -> Result<Option<Value>> {
        self.enter_form(FormEntry::ADD_OR_UPDATE, row).await
    }

    async fn enter_form(&mut self, entry: FormEntry, row: Option<&Value>) -> Result<Option<Value>> {
        let span = info_span!("crud.form.enter", instance = %self.id, mode = %entry.mode);
        self.enter_form_inner(entry, row).instrument(span).await
    }

    async fn enter_form_inner(&mut self, entry: FormEntry, row: Option<&Value>) -> Result<Option<Value>> {
        let key = self.row_key(entry.caller);
        let id = match (row, key.as_deref()) {
            (Some(row), Some(key)) => record_id(row, key),
            _ => None,
        };

        let mut params = Map::new();
        if let (Some(key), Some(id)) = (&key, &id) {
            params.insert(key.clone(), Value::String(id.clone()));
        }
        let row_payload = row.cloned().unwrap_or(Value::Null);
        let Some(outcome) = self
            .gate(entry.query_hook.clone(), params, row_payload.clone())
            .await?
        else {
            return Ok(None);
        };

        self.transition(entry.mode, id.clone());

        let loaded = match &id {
            Some(id) if outcome.fetch => {
                let endpoint = self.endpoint(Operation::Details);
                let request = super::Request::new(
                    endpoint.method,
                    format!("{}{}/{}", self.rest_url(), endpoint.url, id),
                )
                .params(outcome.params);
                self.send(request, FORM_FLAGS).await?
            }
            _ => row_payload,
        };

        if let Err(err) = self.fire(entry.loaded_hook, Map::new(), loaded.clone()).await {
            return Err(self.fail(err, FORM_FLAGS).await);
        }
        if let Err(err) = self.recover(entry.mode).await {
            return Err(self.fail(err, FORM_FLAGS).await);
        }
        Ok(Some(loaded))
    }

    fn transition(&mut self, mode: FormStatus, editing_id: Option<String>) {
        event!(
            Level::DEBUG,
            instance = %self.id,
            from = %self.state.form_status,
            to = %mode,
            "form status transition"
        );
        self.state.form_status = mode;
        self.state.editing_id = editing_id;
    }

    /// Back to `IDLE`, discarding the draft of the mode being left.
    pub async fn cancel(&mut self) -> Result<()> {
        let leaving = self.state.form_status;
        let editing_id = self.state.editing_id.take();
        self.transition(FormStatus::Idle, None);
        if let Err(err) = self.discard_draft(leaving, editing_id.as_deref()).await {
            return Err(self.fail(err, &[]).await);
        }
        if let Err(err) = self.fire(HookName::ON_CANCEL, Map::new(), Value::Null).await {
            return Err(self.fail(err, &[]).await);
        }
        Ok(())
    }

    /// Submits the form through the endpoint of the current mode.
    ///
    /// Outside `ADDING`, `UPDATING` and `ADD_OR_UPDATE` this logs a warning and
    /// returns `Ok(None)` without a transport call.
    pub async fn submit(&mut self) -> Result<Option<Value>> {
        match self.state.form_status {
            FormStatus::Adding => self.submit_add().await,
            FormStatus::Updating => self.submit_update().await,
            FormStatus::AddOrUpdate => self.submit_add_or_update().await,
            status => {
                warn!(
                    "[CRUD] - form status '{}' can not be submitted - submit()",
                    status
                );
                Ok(None)
            }
        }
    }

    pub async fn submit_add(&mut self) -> Result<Option<Value>> {
        self.submit_to(Operation::Add, "submit_add()").await
    }

    pub async fn submit_update(&mut self) -> Result<Option<Value>> {
        self.submit_to(Operation::Update, "submit_update()").await
    }

    pub async fn submit_add_or_update(&mut self) -> Result<Option<Value>> {
        self.submit_to(Operation::AddOrUpdate, "submit_add_or_update()").await
    }

    async fn submit_to(&mut self, operation: Operation, caller: &str) -> Result<Option<Value>> {
        let status = self.state.form_status;
        if !status.is_submittable() {
            warn!(
                "[CRUD] - form status '{}' can not be submitted - {}",
                status, caller
            );
            return Ok(None);
        }
        let span = info_span!("crud.form.submit", instance = %self.id, operation = operation.key());
        self.submit_inner(operation, status).instrument(span).await
    }

    async fn submit_inner(&mut self, operation: Operation, status: FormStatus) -> Result<Option<Value>> {
        let form = self.state.form.clone();
        if self
            .gate(HookName::BEFORE_SUBMIT, Map::new(), form)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let validated = self.validator.validate(&self.state.form, status).await;
        if let Err(err) = validated {
            return Err(self.fail(err, &[]).await);
        }

        let form = self.state.form.clone();
        let request = self.request(operation).json(form.clone());
        let response = self.send(request, SUBMIT_FLAGS).await?;

        let editing_id = self.state.editing_id.clone();
        if let Err(err) = self.discard_draft(status, editing_id.as_deref()).await {
            return Err(self.fail(err, SUBMIT_FLAGS).await);
        }

        let patch = match operation {
            Operation::Add => AutoPatch::add(form, response.clone()),
            Operation::AddOrUpdate => match self.form_id() {
                Some(id) if self.mirror_contains(&id) => AutoPatch::update(form, response.clone()),
                _ => AutoPatch::add(form, response.clone()),
            },
            _ => AutoPatch::update(form, response.clone()),
        };
        if let Err(err) = self
            .finish_with(HookName::AFTER_SUBMIT, response.clone(), Some(patch))
            .await
        {
            return Err(self.fail(err, SUBMIT_FLAGS).await);
        }
        Ok(Some(response))
    }
}
