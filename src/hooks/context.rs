use super::{HookName, InstanceId};
use crate::core::CrudError;
use crate::crud::state::{CrudState, SortOrder};
use crate::reconcile::{AutoPatch, AutoResponse, ReconcileOutcome, reconcile};
use serde_json::{Map, Value};

/// Everything a hook handler sees and may change during one invocation.
///
/// Handlers cancel the surrounding operation cooperatively with
/// [`cancel`](Self::cancel); the orchestrator checks the flag once every
/// handler of the hook has completed.
pub struct HookContext<'a> {
    hook: HookName,
    instance: InstanceId,
    /// Lifecycle state of the invoking instance.
    pub state: &'a mut CrudState,
    /// Request parameters of the pending call.
    pub params: Map<String, Value>,
    /// Hook-specific value: ids, raw response, recovered draft or cache candidate.
    pub payload: Value,
    error: Option<&'a CrudError>,
    auto_response: Option<&'a AutoResponse>,
    patch: Option<AutoPatch>,
    patch_settled: bool,
    binding_context: Option<Value>,
    proceed: bool,
    fetch: bool,
}

impl<'a> HookContext<'a> {
    pub fn new(hook: HookName, instance: InstanceId, state: &'a mut CrudState) -> Self {
        Self {
            hook,
            instance,
            state,
            params: Map::new(),
            payload: Value::Null,
            error: None,
            auto_response: None,
            patch: None,
            patch_settled: false,
            binding_context: None,
            proceed: true,
            fetch: true,
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_error(mut self, error: &'a CrudError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_patch(mut self, config: &'a AutoResponse, patch: AutoPatch) -> Self {
        self.auto_response = Some(config);
        self.patch = Some(patch);
        self
    }

    pub fn hook(&self) -> &HookName {
        &self.hook
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Error being reported to an `ON_ERROR` handler.
    pub fn error(&self) -> Option<&CrudError> {
        self.error
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.state.table.orders
    }

    /// Context value attached when the running handler was registered.
    pub fn binding_context(&self) -> Option<&Value> {
        self.binding_context.as_ref()
    }

    pub(crate) fn set_binding_context(&mut self, context: Option<Value>) {
        self.binding_context = context;
    }

    /// Abort the surrounding operation once this hook completes.
    pub fn cancel(&mut self) {
        self.proceed = false;
    }

    pub fn is_cancelled(&self) -> bool {
        !self.proceed
    }

    /// Keep entering the form but skip the detail fetch.
    pub fn skip_fetch(&mut self) {
        self.fetch = false;
    }

    pub fn fetch_skipped(&self) -> bool {
        !self.fetch
    }

    pub fn pending_patch(&self) -> Option<&AutoPatch> {
        self.patch.as_ref()
    }

    /// Runs the default reconciliation now instead of after the hook.
    ///
    /// May be called again to re-run it; returns `None` without a pending patch.
    pub fn apply_auto_response(&mut self) -> Option<ReconcileOutcome> {
        let config = self.auto_response?;
        let patch = self.patch.as_ref()?;
        self.patch_settled = true;
        Some(reconcile(&mut self.state.table, config, patch))
    }

    /// Suppresses the default reconciliation for this operation.
    pub fn skip_auto_response(&mut self) {
        self.patch_settled = true;
    }

    /// Applies the pending patch unless a handler already applied or skipped it.
    pub(crate) fn settle_auto_response(&mut self) -> Option<ReconcileOutcome> {
        if self.patch_settled {
            return None;
        }
        self.apply_auto_response()
    }

    pub(crate) fn finish(self) -> HookOutcome {
        HookOutcome {
            proceed: self.proceed,
            fetch: self.fetch,
            params: self.params,
            payload: self.payload,
        }
    }
}

/// Owned result of a hook invocation, once the state borrow is released.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOutcome {
    pub proceed: bool,
    pub fetch: bool,
    pub params: Map<String, Value>,
    pub payload: Value,
}
