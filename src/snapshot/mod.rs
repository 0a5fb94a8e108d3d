//! Recoverable form drafts.
//!
//! A draft is keyed by page origin, an optional instance key (several
//! collections on one page), the form status and, for edits, the id of the
//! edited record. Create drafts and per-record edit drafts never collide.

mod storage;

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

use crate::core::Result;
use crate::crud::state::FormStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const KEY_PREFIX: &str = "crud-snapshot";
const SEPARATOR: char = '|';

/// Page origin plus optional instance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SnapshotScope {
    pub origin: String,
    pub instance_key: String,
}

impl SnapshotScope {
    pub fn new(origin: impl Into<String>, instance_key: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            instance_key: instance_key.into(),
        }
    }

    fn prefix(&self) -> String {
        format!(
            "{KEY_PREFIX}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}",
            escape(&self.origin),
            escape(&self.instance_key)
        )
    }
}

/// Form status plus edited record id (empty for create drafts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotSlot {
    pub mode: FormStatus,
    pub editing_id: String,
}

impl SnapshotSlot {
    pub fn new(mode: FormStatus, editing_id: Option<&str>) -> Self {
        Self {
            mode,
            editing_id: editing_id.unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for SnapshotSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.editing_id.is_empty() {
            write!(f, "{}", self.mode)
        } else {
            write!(f, "{}#{}", self.mode, self.editing_id)
        }
    }
}

/// Serialized form of a stored draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub form: Value,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(form: Value) -> Self {
        Self {
            form,
            saved_at: Utc::now(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace(SEPARATOR, "%7C")
}

fn unescape(component: &str) -> String {
    component.replace("%7C", "|").replace("%25", "%")
}

fn key_of(scope: &SnapshotScope, slot: &SnapshotSlot) -> String {
    format!(
        "{}{}{SEPARATOR}{}",
        scope.prefix(),
        slot.mode.code(),
        escape(&slot.editing_id)
    )
}

fn slot_of(scope_prefix: &str, key: &str) -> Option<SnapshotSlot> {
    let rest = key.strip_prefix(scope_prefix)?;
    let (mode, editing_id) = rest.split_once(SEPARATOR)?;
    let mode = FormStatus::from_code(mode.parse().ok()?)?;
    Some(SnapshotSlot {
        mode,
        editing_id: unescape(editing_id),
    })
}

/// Draft persistence on top of a [`KeyValueStorage`].
#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}

impl SnapshotStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Storage key of a draft, exposed for diagnostics.
    pub fn key(scope: &SnapshotScope, mode: FormStatus, editing_id: Option<&str>) -> String {
        key_of(scope, &SnapshotSlot::new(mode, editing_id))
    }

    pub async fn save(
        &self,
        scope: &SnapshotScope,
        mode: FormStatus,
        editing_id: Option<&str>,
        value: &Value,
    ) -> Result<()> {
        let raw = serde_json::to_string(&Draft::new(value.clone()))?;
        self.storage
            .set(&Self::key(scope, mode, editing_id), &raw)
            .await
    }

    pub async fn load(
        &self,
        scope: &SnapshotScope,
        mode: FormStatus,
        editing_id: Option<&str>,
    ) -> Result<Option<Value>> {
        let raw = self.storage.get(&Self::key(scope, mode, editing_id)).await?;
        raw.map(|raw| Draft::parse(&raw).map(|draft| draft.form))
            .transpose()
    }

    pub async fn remove(
        &self,
        scope: &SnapshotScope,
        mode: FormStatus,
        editing_id: Option<&str>,
    ) -> Result<()> {
        self.storage.remove(&Self::key(scope, mode, editing_id)).await
    }

    /// Every raw draft stored for `scope`.
    pub async fn load_all(&self, scope: &SnapshotScope) -> Result<BTreeMap<SnapshotSlot, String>> {
        let prefix = scope.prefix();
        let mut drafts = BTreeMap::new();
        for key in self.storage.keys(&prefix).await? {
            let Some(slot) = slot_of(&prefix, &key) else {
                continue;
            };
            if let Some(raw) = self.storage.get(&key).await? {
                drafts.insert(slot, raw);
            }
        }
        Ok(drafts)
    }
}
