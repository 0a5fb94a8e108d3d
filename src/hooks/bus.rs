use super::{HookContext, HookName, InstanceId};
use crate::core::Result;
use async_trait::async_trait;
use log::error;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{Level, event};

/// A hook handler.
///
/// Handlers run strictly one after another; each is awaited before the next
/// starts. Returning an error aborts the hook (except for `ON_ERROR`, whose
/// handler failures are logged and swallowed).
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<()>;
}

/// Adapter for synchronous closures.
pub struct FnHook<F>(F);

#[async_trait]
impl<F> HookHandler for FnHook<F>
where
    F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync,
{
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        (self.0)(ctx)
    }
}

/// Wraps a synchronous closure as a shareable handler.
pub fn hook_fn<F>(handler: F) -> Arc<dyn HookHandler>
where
    F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHook(handler))
}

/// Identifier returned by [`HookBus::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

#[derive(Clone)]
struct HookBinding {
    id: HandlerId,
    handler: Arc<dyn HookHandler>,
    context: Option<Value>,
}

type InstanceHooks = HashMap<HookName, Vec<HookBinding>>;

/// Registry of default and per-instance hook handlers.
///
/// Defaults run first, then instance handlers in registration order.
/// Registrations live until explicitly removed; dropping an orchestrator does
/// not unregister its hooks.
#[derive(Default)]
pub struct HookBus {
    defaults: RwLock<HashMap<HookName, Arc<dyn HookHandler>>>,
    instances: RwLock<HashMap<InstanceId, InstanceHooks>>,
    next_handler: AtomicU64,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the process-wide default handler of `hook`, returning the previous one.
    pub fn set_default(
        &self,
        hook: HookName,
        handler: Arc<dyn HookHandler>,
    ) -> Result<Option<Arc<dyn HookHandler>>> {
        let mut defaults = self.defaults.write()?;
        Ok(defaults.insert(hook, handler))
    }

    pub fn remove_default(&self, hook: &HookName) -> Result<bool> {
        let mut defaults = self.defaults.write()?;
        Ok(defaults.remove(hook).is_some())
    }

    pub fn register(
        &self,
        instance: InstanceId,
        hook: HookName,
        handler: Arc<dyn HookHandler>,
    ) -> Result<HandlerId> {
        self.register_binding(instance, hook, handler, None)
    }

    /// Registers a handler together with a context value exposed through
    /// [`HookContext::binding_context`] while it runs.
    pub fn register_with_context(
        &self,
        instance: InstanceId,
        hook: HookName,
        handler: Arc<dyn HookHandler>,
        context: Value,
    ) -> Result<HandlerId> {
        self.register_binding(instance, hook, handler, Some(context))
    }

    fn register_binding(
        &self,
        instance: InstanceId,
        hook: HookName,
        handler: Arc<dyn HookHandler>,
        context: Option<Value>,
    ) -> Result<HandlerId> {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::SeqCst));
        let mut instances = self.instances.write()?;
        event!(Level::TRACE, instance = %instance, hook = %hook, handler = %id, "hook registered");
        instances
            .entry(instance)
            .or_default()
            .entry(hook)
            .or_default()
            .push(HookBinding {
                id,
                handler,
                context,
            });
        Ok(id)
    }

    /// Removes one registration. Returns `false` if it was not registered.
    pub fn unregister(&self, instance: InstanceId, hook: &HookName, id: HandlerId) -> Result<bool> {
        let mut instances = self.instances.write()?;
        let Some(hooks) = instances.get_mut(&instance) else {
            return Ok(false);
        };
        let Some(bindings) = hooks.get_mut(hook) else {
            return Ok(false);
        };
        let before = bindings.len();
        bindings.retain(|binding| binding.id != id);
        let removed = bindings.len() != before;
        if bindings.is_empty() {
            hooks.remove(hook);
        }
        if hooks.is_empty() {
            instances.remove(&instance);
        }
        Ok(removed)
    }

    /// Removes every registration of `instance`, returning how many were dropped.
    pub fn clear_instance(&self, instance: InstanceId) -> Result<usize> {
        let mut instances = self.instances.write()?;
        Ok(instances
            .remove(&instance)
            .map(|hooks| hooks.values().map(Vec::len).sum())
            .unwrap_or(0))
    }

    /// Number of instance handlers registered for `hook`.
    pub fn handler_count(&self, instance: InstanceId, hook: &HookName) -> Result<usize> {
        let instances = self.instances.read()?;
        Ok(instances
            .get(&instance)
            .and_then(|hooks| hooks.get(hook))
            .map(Vec::len)
            .unwrap_or(0))
    }

    fn resolve(
        &self,
        hook: &HookName,
        instance: InstanceId,
    ) -> Result<(Option<Arc<dyn HookHandler>>, Vec<HookBinding>)> {
        let default = self.defaults.read()?.get(hook).cloned();
        let bindings = self
            .instances
            .read()?
            .get(&instance)
            .and_then(|hooks| hooks.get(hook))
            .cloned()
            .unwrap_or_default();
        Ok((default, bindings))
    }

    /// Runs the default handler, then every instance handler, in order.
    ///
    /// The handler list is resolved once up front; handlers registered while
    /// the hook runs take effect from the next invocation.
    pub async fn invoke(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        let (default, bindings) = self.resolve(ctx.hook(), ctx.instance())?;
        if let Some(handler) = default {
            ctx.set_binding_context(None);
            handler.call(ctx).await?;
        }
        for binding in bindings {
            ctx.set_binding_context(binding.context.clone());
            binding.handler.call(ctx).await?;
        }
        ctx.set_binding_context(None);
        Ok(())
    }

    /// Like [`invoke`](Self::invoke) for the error hook: a failing handler is
    /// logged and the remaining handlers still run.
    pub async fn invoke_error(&self, ctx: &mut HookContext<'_>) {
        let (default, bindings) = match self.resolve(ctx.hook(), ctx.instance()) {
            Ok(resolved) => resolved,
            Err(err) => {
                error!("[CRUD] - failed to resolve '{}' handlers: {}", ctx.hook(), err);
                return;
            }
        };
        let handlers = default
            .map(|handler| (handler, None))
            .into_iter()
            .chain(bindings.into_iter().map(|b| (b.handler, b.context)));
        for (handler, context) in handlers {
            ctx.set_binding_context(context);
            if let Err(err) = handler.call(ctx).await {
                error!("[CRUD] - '{}' handler failed: {}", ctx.hook(), err);
            }
        }
        ctx.set_binding_context(None);
    }
}
