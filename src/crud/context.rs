use super::config::CrudDefaults;
use super::transport::Transport;
use crate::hooks::HookBus;
use crate::snapshot::{KeyValueStorage, MemoryStorage, SnapshotStore};
use std::fmt;
use std::sync::Arc;

/// Application root shared by every orchestrator instance.
///
/// Owns the hook registry, the transport, draft storage and global defaults.
/// Instances keep an `Arc` to it; dropping the last reference tears the
/// registry down.
pub struct CrudContext {
    hooks: HookBus,
    transport: Arc<dyn Transport>,
    snapshots: SnapshotStore,
    defaults: CrudDefaults,
    origin: String,
}

impl fmt::Debug for CrudContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudContext")
            .field("origin", &self.origin)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl CrudContext {
    pub fn builder(transport: Arc<dyn Transport>) -> CrudContextBuilder {
        CrudContextBuilder {
            transport,
            storage: None,
            defaults: CrudDefaults::default(),
            origin: String::new(),
        }
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn defaults(&self) -> &CrudDefaults {
        &self.defaults
    }

    /// Page origin scoping draft snapshots.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

pub struct CrudContextBuilder {
    transport: Arc<dyn Transport>,
    storage: Option<Arc<dyn KeyValueStorage>>,
    defaults: CrudDefaults,
    origin: String,
}

impl CrudContextBuilder {
    /// Draft storage; defaults to [`MemoryStorage`].
    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn defaults(mut self, defaults: CrudDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn build(self) -> Arc<CrudContext> {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        Arc::new(CrudContext {
            hooks: HookBus::new(),
            transport: self.transport,
            snapshots: SnapshotStore::new(storage),
            defaults: self.defaults,
            origin: self.origin,
        })
    }
}
