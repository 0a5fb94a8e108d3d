//! Auto-response reconciliation.
//!
//! Applies the effect of a completed mutation to the in-memory table mirror so
//! the collection stays current without a re-query. Every patch is gated by the
//! configured validator; the default validator rejects everything, which keeps
//! reconciliation opt-in.

use crate::core::{merge_into, record_id, row_id};
use crate::crud::state::TableMirror;
use crate::tree::{
    children_mut_or_init, container_mut, find_all_nodes, locate_by_id, node_at, NodeLocation,
};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{event, Level};

/// Decides whether a raw response should be reconciled at all.
pub type ResponseValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Maps a raw response plus the submitted records to canonical record(s).
pub type ResponseExtractor = Arc<dyn Fn(&Value, &[Value]) -> Vec<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    #[default]
    Head,
    Tail,
}

/// Per-instance auto-response settings.
#[derive(Clone)]
pub struct AutoResponse {
    pub position: InsertPosition,
    pub validator: ResponseValidator,
    pub getter: Option<ResponseExtractor>,
    pub parent_key_field: Option<String>,
    pub children_key_field: String,
}

impl Default for AutoResponse {
    fn default() -> Self {
        Self {
            position: InsertPosition::Head,
            validator: Arc::new(|_| false),
            getter: None,
            parent_key_field: None,
            children_key_field: "children".to_string(),
        }
    }
}

impl fmt::Debug for AutoResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoResponse")
            .field("position", &self.position)
            .field("getter", &self.getter.is_some())
            .field("parent_key_field", &self.parent_key_field)
            .field("children_key_field", &self.children_key_field)
            .finish()
    }
}

impl AutoResponse {
    pub fn position(mut self, position: InsertPosition) -> Self {
        self.position = position;
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
        self
    }

    /// Reconcile every response.
    pub fn always(self) -> Self {
        self.validator(|_| true)
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Vec<Value> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn parent_key_field(mut self, field: impl Into<String>) -> Self {
        self.parent_key_field = Some(field.into());
        self
    }

    pub fn children_key_field(mut self, field: impl Into<String>) -> Self {
        self.children_key_field = field.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Add,
    Update,
    Delete,
    Copy,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Copy => "copy",
        };
        write!(f, "{label}")
    }
}

/// A reconciliation waiting to be applied after a successful mutation.
///
/// `submitted` holds the draft(s) for add/update and the source records for
/// copy; `ids` holds the row ids for delete and copy.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoPatch {
    pub kind: MutationKind,
    pub submitted: Vec<Value>,
    pub ids: Vec<String>,
    pub response: Value,
}

impl AutoPatch {
    pub fn add(draft: Value, response: Value) -> Self {
        Self {
            kind: MutationKind::Add,
            submitted: vec![draft],
            ids: Vec::new(),
            response,
        }
    }

    pub fn update(draft: Value, response: Value) -> Self {
        Self {
            kind: MutationKind::Update,
            submitted: vec![draft],
            ids: Vec::new(),
            response,
        }
    }

    pub fn delete(ids: Vec<String>, response: Value) -> Self {
        Self {
            kind: MutationKind::Delete,
            submitted: Vec::new(),
            ids,
            response,
        }
    }

    pub fn copy(ids: Vec<String>, sources: Vec<Value>, response: Value) -> Self {
        Self {
            kind: MutationKind::Copy,
            submitted: sources,
            ids,
            response,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub applied: bool,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub moved: usize,
}

/// Applies `patch` to `table` if the validator accepts the response.
pub fn reconcile(table: &mut TableMirror, config: &AutoResponse, patch: &AutoPatch) -> ReconcileOutcome {
    if !(config.validator)(&patch.response) {
        return ReconcileOutcome::default();
    }
    if table.row_key.is_empty() {
        warn!("[CRUD] - table.row_key is blank, auto response skipped - {}", patch.kind);
        return ReconcileOutcome::default();
    }

    let outcome = match patch.kind {
        MutationKind::Delete => apply_delete(table, config, &patch.ids),
        MutationKind::Add => apply_add(table, config, patch),
        MutationKind::Update => apply_update(table, config, patch),
        MutationKind::Copy => apply_copy(table, config, patch),
    };
    event!(
        Level::DEBUG,
        kind = %patch.kind,
        inserted = outcome.inserted,
        updated = outcome.updated,
        removed = outcome.removed,
        moved = outcome.moved,
        "auto response reconciled"
    );
    outcome
}

fn extract(config: &AutoResponse, patch: &AutoPatch) -> Option<Vec<Value>> {
    match &config.getter {
        Some(getter) => Some(getter(&patch.response, &patch.submitted)),
        None => {
            warn!(
                "[CRUD] - auto response getter is not configured, {} result ignored",
                patch.kind
            );
            None
        }
    }
}

fn take_record(
    table: &mut TableMirror,
    children_field: &str,
    location: &NodeLocation,
    id: &str,
) -> Option<Value> {
    let row_key = table.row_key.clone();
    let container = container_mut(&mut table.data, children_field, &location.container)?;
    let position = container
        .iter()
        .position(|record| record_id(record, &row_key).as_deref() == Some(id))?;
    Some(container.remove(position))
}

fn insert_at(container: &mut Vec<Value>, position: InsertPosition, records: Vec<Value>) -> usize {
    let count = records.len();
    match position {
        InsertPosition::Head => {
            for record in records.into_iter().rev() {
                container.insert(0, record);
            }
        }
        InsertPosition::Tail => container.extend(records),
    }
    count
}

/// Location of the record that should receive children of `parent_id`.
///
/// `None` means the root sequence, either because no parent was given or
/// because it is not present in the mirror.
fn parent_location(table: &TableMirror, children_field: &str, parent_id: Option<&str>) -> Option<NodeLocation> {
    let id = parent_id?;
    let location = locate_by_id(&table.data, children_field, &table.row_key, id)
        .filter(|location| {
            node_at(&table.data, children_field, location).is_some_and(Value::is_object)
        });
    if location.is_none() {
        warn!("[CRUD] - parent '{}' not found in table, record placed at root", id);
    }
    location
}

fn place(
    table: &mut TableMirror,
    children_field: &str,
    parent: Option<&NodeLocation>,
    position: InsertPosition,
    record: Value,
) -> usize {
    let container = match parent {
        Some(location) => container_mut(&mut table.data, children_field, &location.container)
            .and_then(|container| container.get_mut(location.index))
            .and_then(|node| children_mut_or_init(node, children_field)),
        None => Some(&mut table.data),
    };
    match container {
        Some(container) => insert_at(container, position, vec![record]),
        None => 0,
    }
}

fn parent_of(record: &Value, parent_field: Option<&str>) -> Option<String> {
    parent_field.and_then(|field| record.get(field)).and_then(row_id)
}

fn apply_delete(table: &mut TableMirror, config: &AutoResponse, ids: &[String]) -> ReconcileOutcome {
    let children_field = config.children_key_field.as_str();
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let matches = find_all_nodes(&table.data, children_field, &table.row_key, |visit| {
        record_id(visit.node, &table.row_key)
            .map(|id| wanted.contains(id.as_str()))
            .unwrap_or(false)
    });

    // Deepest and right-most first: a removal only shifts paths already handled.
    let mut matches: Vec<(String, NodeLocation)> = matches.into_iter().collect();
    matches.sort_by(|a, b| b.1.node_path().cmp(&a.1.node_path()));

    let mut removed = 0;
    for (id, location) in &matches {
        if take_record(table, children_field, location, id).is_some() {
            removed += 1;
        }
    }
    table.selection.retain(|record| {
        record_id(record, &table.row_key)
            .map(|id| !wanted.contains(id.as_str()))
            .unwrap_or(true)
    });

    ReconcileOutcome {
        applied: true,
        removed,
        ..ReconcileOutcome::default()
    }
}

fn apply_add(table: &mut TableMirror, config: &AutoResponse, patch: &AutoPatch) -> ReconcileOutcome {
    let Some(records) = extract(config, patch) else {
        return ReconcileOutcome::default();
    };
    let children_field = config.children_key_field.as_str();
    let parent_field = config.parent_key_field.as_deref();
    let draft_parent = patch
        .submitted
        .first()
        .and_then(|draft| parent_of(draft, parent_field));

    let mut inserted = 0;
    for record in records {
        let parent = draft_parent
            .clone()
            .or_else(|| parent_of(&record, parent_field));
        let location = parent_location(table, children_field, parent.as_deref());
        inserted += place(table, children_field, location.as_ref(), config.position, record);
    }

    ReconcileOutcome {
        applied: true,
        inserted,
        ..ReconcileOutcome::default()
    }
}

fn apply_update(table: &mut TableMirror, config: &AutoResponse, patch: &AutoPatch) -> ReconcileOutcome {
    let children_field = config.children_key_field.as_str();
    let parent_field = config.parent_key_field.as_deref();
    let replacements = match &config.getter {
        Some(getter) => getter(&patch.response, &patch.submitted),
        None => patch.submitted.clone(),
    };

    let mut outcome = ReconcileOutcome {
        applied: true,
        ..ReconcileOutcome::default()
    };
    for (position, replacement) in replacements.into_iter().enumerate() {
        let id = record_id(&replacement, &table.row_key).or_else(|| {
            patch
                .submitted
                .get(position)
                .and_then(|draft| record_id(draft, &table.row_key))
        });
        let Some(id) = id else {
            warn!("[CRUD] - updated record has no row key, auto response ignored");
            continue;
        };
        let Some(location) = locate_by_id(&table.data, children_field, &table.row_key, &id) else {
            warn!("[CRUD] - record '{}' not found in table, auto response ignored", id);
            continue;
        };
        let Some(existing) = node_at(&table.data, children_field, &location) else {
            continue;
        };

        let old_parent = parent_of(existing, parent_field);
        let new_parent = match parent_field {
            Some(field) if replacement.get(field).is_some() => parent_of(&replacement, parent_field),
            _ => old_parent.clone(),
        };

        if parent_field.is_some() && old_parent != new_parent {
            let unloaded = new_parent.clone().filter(|pid| {
                locate_by_id(&table.data, children_field, &table.row_key, pid).is_none()
            });
            let Some(mut record) = take_record(table, children_field, &location, &id) else {
                continue;
            };
            if let Some(pid) = unloaded {
                warn!(
                    "[CRUD] - parent '{}' of record '{}' is not loaded, record dropped from table",
                    pid, id
                );
                table.selection.retain(|selected| {
                    record_id(selected, &table.row_key).as_deref() != Some(id.as_str())
                });
                outcome.removed += 1;
                continue;
            }
            merge_into(&mut record, &replacement, &[children_field]);
            let location = parent_location(table, children_field, new_parent.as_deref());
            if place(table, children_field, location.as_ref(), config.position, record) > 0 {
                outcome.moved += 1;
            }
        } else {
            let Some(container) = container_mut(&mut table.data, children_field, &location.container)
            else {
                continue;
            };
            if let Some(record) = container.get_mut(location.index) {
                merge_into(record, &replacement, &[children_field]);
                outcome.updated += 1;
            }
        }
    }
    outcome
}

fn apply_copy(table: &mut TableMirror, config: &AutoResponse, patch: &AutoPatch) -> ReconcileOutcome {
    let Some(records) = extract(config, patch) else {
        return ReconcileOutcome::default();
    };
    let children_field = config.children_key_field.as_str();

    let mut inserted = 0;
    for (source_id, record) in patch.ids.iter().zip(records) {
        let Some(location) = locate_by_id(&table.data, children_field, &table.row_key, source_id)
        else {
            warn!("[CRUD] - copy source '{}' not found in table, copy ignored", source_id);
            continue;
        };
        if let Some(container) = container_mut(&mut table.data, children_field, &location.container) {
            inserted += insert_at(container, config.position, vec![record]);
        }
    }

    ReconcileOutcome {
        applied: true,
        inserted,
        ..ReconcileOutcome::default()
    }
}
