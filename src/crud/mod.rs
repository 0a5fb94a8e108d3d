// ============================================================================
// Lifecycle Orchestrator
// ============================================================================
//
// `Crud` owns the state of one REST-backed collection and runs every
// operation through the same pipeline:
//
//   BEFORE hook (may cancel) -> draft recovery -> state transition
//     -> transport call -> auto response -> AFTER hook -> loading cleared
//
// Failures on any step clear the operation's loading flags, fill the error
// bundle, run ON_ERROR and are returned to the caller.
//
// ============================================================================

pub mod config;
pub mod context;
pub mod endpoint;
pub mod state;
pub mod transport;
pub mod url;
pub mod validation;

mod custom;
mod form;
mod mutations;
mod query;

pub use config::{CrudDefaults, CrudOptions, DEFAULT_PAGE_SIZE, effective, effective_page_size};
pub use context::{CrudContext, CrudContextBuilder};
pub use endpoint::{CustomEndpoint, Endpoint, EndpointSpec, Operation, RestApi};
pub use state::{CrudState, ErrorInfo, FormStatus, LoadingFlag, LoadingFlags, Pagination, SortOrder, TableMirror};
pub use transport::{MultipartForm, ReqwestTransport, Request, RequestBody, ResponseType, Transport, UploadFile};
pub use url::resolve_url;
pub use validation::{FormValidator, NoopValidator, RequiredFields};

use crate::core::{CrudError, Result, record_id};
use crate::hooks::{HandlerId, HookContext, HookHandler, HookName, HookOutcome, InstanceId};
use crate::reconcile::{AutoPatch, AutoResponse};
use crate::snapshot::{Draft, SnapshotScope, SnapshotSlot};
use config::effective_str;
use log::warn;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, event};

/// Orchestrator of one resource instance.
pub struct Crud {
    id: InstanceId,
    context: Arc<CrudContext>,
    url: String,
    url_params: Map<String, Value>,
    default_query: Map<String, Value>,
    instance_key: String,
    recoverable: bool,
    rest_api: RestApi,
    custom_endpoints: BTreeMap<String, CustomEndpoint>,
    auto_response: AutoResponse,
    validator: Arc<dyn FormValidator>,
    recovery: BTreeMap<SnapshotSlot, String>,
    cache: Option<Value>,
    state: CrudState,
}

impl std::fmt::Debug for Crud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crud")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("instance_key", &self.instance_key)
            .field("recoverable", &self.recoverable)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Crud {
    /// Creates an instance and rehydrates its draft recovery index.
    ///
    /// # Errors
    /// `CrudError::Config` if the URL is blank; storage errors while loading drafts.
    pub async fn open(context: Arc<CrudContext>, options: impl Into<CrudOptions>) -> Result<Self> {
        let options = options.into();
        if options.url.trim().is_empty() {
            return Err(CrudError::Config("The URL can not be empty".to_string()));
        }

        let defaults = context.defaults();
        let row_key = options
            .row_key
            .clone()
            .unwrap_or_else(|| defaults.row_key.clone());
        let mut state = CrudState::new(row_key);
        state.pagination.page_size = options.page_size;
        state.pagination.frontend = effective(options.frontend, defaults.frontend);
        state.pagination.cache = effective(options.cache, defaults.cache);
        state.params = options.params;

        let recoverable = effective(options.recoverable, defaults.recoverable);
        let rest_api = defaults.rest_api.layered(&options.rest_api);

        let mut crud = Self {
            id: InstanceId::new(),
            context: context.clone(),
            url: options.url,
            url_params: options.url_params,
            default_query: options.query,
            instance_key: options.key,
            recoverable,
            rest_api,
            custom_endpoints: BTreeMap::new(),
            auto_response: options.auto_response,
            validator: options
                .validator
                .unwrap_or_else(|| Arc::new(NoopValidator) as Arc<dyn FormValidator>),
            recovery: BTreeMap::new(),
            cache: None,
            state,
        };

        if crud.recoverable {
            crud.recovery = context.snapshots().load_all(&crud.snapshot_scope()).await?;
        }
        event!(
            Level::DEBUG,
            instance = %crud.id,
            url = %crud.url,
            drafts = crud.recovery.len(),
            "crud instance opened"
        );
        Ok(crud)
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn context(&self) -> &Arc<CrudContext> {
        &self.context
    }

    pub fn state(&self) -> &CrudState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CrudState {
        &mut self.state
    }

    pub fn auto_response(&self) -> &AutoResponse {
        &self.auto_response
    }

    pub fn set_auto_response(&mut self, auto_response: AutoResponse) {
        self.auto_response = auto_response;
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn snapshot_scope(&self) -> SnapshotScope {
        SnapshotScope::new(self.context.origin(), self.instance_key.clone())
    }

    /// Drafts known to the recovery index.
    pub fn recoverable_drafts(&self) -> impl Iterator<Item = &SnapshotSlot> {
        self.recovery.keys()
    }

    /// Registers an instance hook handler.
    pub fn on(&self, hook: HookName, handler: Arc<dyn HookHandler>) -> Result<HandlerId> {
        self.context.hooks().register(self.id, hook, handler)
    }

    pub fn off(&self, hook: &HookName, id: HandlerId) -> Result<bool> {
        self.context.hooks().unregister(self.id, hook, id)
    }

    pub fn set_url_params(&mut self, params: Map<String, Value>) {
        self.url_params = params;
    }

    /// Instance URL with `:tokens` resolved.
    pub fn rest_url(&self) -> String {
        resolve_url(&self.url, &self.url_params)
    }

    pub fn endpoint(&self, operation: Operation) -> Endpoint {
        self.rest_api.endpoint(operation)
    }

    /// Effective row key, warning when it is blank.
    pub fn row_key(&self, caller: &str) -> Option<String> {
        let key = effective_str(&self.state.table.row_key, &self.context.defaults().row_key);
        if key.is_empty() {
            warn!(
                "[CRUD] - table.row_key is a blank value '{}', it may cause an error - {}",
                key, caller
            );
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn effective_page_size(&self) -> usize {
        effective_page_size(
            self.state.pagination.page_size,
            self.context.defaults().page_size,
        )
    }

    pub fn change_selection(&mut self, selection: Vec<Value>) {
        self.state.table.selection = selection;
    }

    fn request(&self, operation: Operation) -> Request {
        let endpoint = self.endpoint(operation);
        Request::new(endpoint.method, format!("{}{}", self.rest_url(), endpoint.url))
    }

    /// Row ids of `rows`; the rows themselves when no row key is configured.
    fn ids_of(&self, rows: &[Value], caller: &str) -> Vec<Value> {
        match self.row_key(caller) {
            Some(key) => rows
                .iter()
                .map(|row| crate::core::field(row, &key).cloned().unwrap_or(Value::Null))
                .collect(),
            None => rows.to_vec(),
        }
    }

    // ------------------------------------------------------------------
    // Pipeline steps
    // ------------------------------------------------------------------

    async fn fire(
        &mut self,
        hook: HookName,
        params: Map<String, Value>,
        payload: Value,
    ) -> Result<HookOutcome> {
        let mut ctx = HookContext::new(hook, self.id, &mut self.state)
            .with_params(params)
            .with_payload(payload);
        self.context.hooks().invoke(&mut ctx).await?;
        Ok(ctx.finish())
    }

    /// BEFORE hook: `Ok(None)` when a handler cancelled.
    async fn gate(
        &mut self,
        hook: HookName,
        params: Map<String, Value>,
        payload: Value,
    ) -> Result<Option<HookOutcome>> {
        match self.fire(hook.clone(), params, payload).await {
            Ok(outcome) if outcome.proceed => Ok(Some(outcome)),
            Ok(_) => {
                event!(Level::DEBUG, instance = %self.id, hook = %hook, "operation cancelled by hook");
                Ok(None)
            }
            Err(err) => Err(self.fail(err, &[]).await),
        }
    }

    /// AFTER hook followed by the default auto response, unless a handler
    /// applied or skipped it.
    async fn finish_with(&mut self, hook: HookName, response: Value, patch: Option<AutoPatch>) -> Result<()> {
        let mut ctx = HookContext::new(hook, self.id, &mut self.state).with_payload(response);
        if let Some(patch) = patch {
            ctx = ctx.with_patch(&self.auto_response, patch);
        }
        self.context.hooks().invoke(&mut ctx).await?;
        ctx.settle_auto_response();
        Ok(())
    }

    /// Transport call with `flags` raised while it is in flight.
    async fn send(&mut self, request: Request, flags: &[LoadingFlag]) -> Result<Value> {
        self.state.loading.set_all(flags, true);
        event!(Level::DEBUG, instance = %self.id, request = %request, "sending request");
        let transport = self.context.transport().clone();
        let result = transport.request(request).await;
        self.state.loading.set_all(flags, false);
        match result {
            Ok(response) => Ok(response),
            Err(err) => Err(self.fail(err.into(), flags).await),
        }
    }

    /// Send, then the AFTER hook; every failure goes through [`fail`](Self::fail).
    async fn execute<P>(
        &mut self,
        request: Request,
        flags: &[LoadingFlag],
        after: HookName,
        patch: P,
    ) -> Result<Value>
    where
        P: FnOnce(&Value) -> Option<AutoPatch> + Send,
    {
        let response = self.send(request, flags).await?;
        let patch = patch(&response);
        if let Err(err) = self.finish_with(after, response.clone(), patch).await {
            return Err(self.fail(err, flags).await);
        }
        Ok(response)
    }

    /// Error path shared by every operation. Returns `err` for propagation.
    async fn fail(&mut self, err: CrudError, flags: &[LoadingFlag]) -> CrudError {
        self.state.loading.set_all(flags, false);
        self.state.error = ErrorInfo::from_error(&err);
        event!(Level::ERROR, instance = %self.id, error = %err, "crud operation failed");
        let payload = serde_json::to_value(&self.state.error).unwrap_or(Value::Null);
        {
            let mut ctx = HookContext::new(HookName::ON_ERROR, self.id, &mut self.state)
                .with_payload(payload)
                .with_error(&err);
            self.context.hooks().invoke_error(&mut ctx).await;
        }
        err
    }

    // ------------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------------

    fn editing_slot(&self, mode: FormStatus) -> SnapshotSlot {
        SnapshotSlot::new(mode, self.state.editing_id.as_deref())
    }

    /// Offers a pending draft through BEFORE_RECOVER and merges it onto the form.
    async fn recover(&mut self, mode: FormStatus) -> Result<()> {
        if !self.recoverable || !mode.is_recoverable() {
            return Ok(());
        }
        let slot = self.editing_slot(mode);
        let draft = match self.recovery.get(&slot) {
            Some(raw) => match Draft::parse(raw) {
                Ok(draft) => Some(draft.form),
                Err(err) => {
                    warn!("[CRUD] - unreadable draft for {} ignored: {}", slot, err);
                    None
                }
            },
            None => {
                self.context
                    .snapshots()
                    .load(&self.snapshot_scope(), slot.mode, self.state.editing_id.as_deref())
                    .await?
            }
        };
        let Some(draft) = draft else {
            return Ok(());
        };

        let outcome = self.fire(HookName::BEFORE_RECOVER, Map::new(), draft).await?;
        if outcome.proceed {
            crate::core::merge_into(&mut self.state.form, &outcome.payload, &[]);
            event!(Level::DEBUG, instance = %self.id, slot = %slot, "draft recovered");
        }
        Ok(())
    }

    /// Persists the current form as a recoverable draft.
    ///
    /// Returns `false` when drafts are disabled or the form is not editable.
    pub async fn snapshot_form(&mut self) -> Result<bool> {
        let mode = self.state.form_status;
        if !self.recoverable || !mode.is_recoverable() {
            return Ok(false);
        }
        let slot = self.editing_slot(mode);
        self.context
            .snapshots()
            .save(&self.snapshot_scope(), mode, self.state.editing_id.as_deref(), &self.state.form)
            .await?;
        let raw = serde_json::to_string(&Draft::new(self.state.form.clone()))?;
        self.recovery.insert(slot, raw);
        Ok(true)
    }

    async fn discard_draft(&mut self, mode: FormStatus, editing_id: Option<&str>) -> Result<()> {
        if !self.recoverable || !mode.is_recoverable() {
            return Ok(());
        }
        self.recovery.remove(&SnapshotSlot::new(mode, editing_id));
        self.context
            .snapshots()
            .remove(&self.snapshot_scope(), mode, editing_id)
            .await
    }

    /// Whether a record with `id` is currently in the table mirror.
    fn mirror_contains(&self, id: &str) -> bool {
        let table = &self.state.table;
        crate::tree::locate_by_id(
            &table.data,
            &self.auto_response.children_key_field,
            &table.row_key,
            id,
        )
        .is_some()
    }

    fn form_id(&self) -> Option<String> {
        let key = effective_str(&self.state.table.row_key, &self.context.defaults().row_key);
        record_id(&self.state.form, key)
    }
}
