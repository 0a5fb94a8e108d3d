// ============================================================================
// Lifecycle State
// ============================================================================
//
// One mutable bundle per resource instance. Mutated by the orchestrator and
// by hook handlers through `HookContext::state`.
//
// Form status transitions:
//
//   Idle ──to_add──────────> Adding
//    │   ──to_update───────> Updating
//    │   ──to_view─────────> Viewing
//    │   ──to_add_or_update> AddOrUpdate
//    │
//   any ──cancel──> Idle
//
// `submit` is legal only from Adding, Updating and AddOrUpdate.
//
// ============================================================================

use crate::core::CrudError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FormStatus {
    #[default]
    Idle = 0,
    Adding = 1,
    Updating = 2,
    Viewing = 3,
    AddOrUpdate = 4,
}

impl FormStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Adding),
            2 => Some(Self::Updating),
            3 => Some(Self::Viewing),
            4 => Some(Self::AddOrUpdate),
            _ => None,
        }
    }

    /// Whether `submit` may run in this status.
    pub fn is_submittable(self) -> bool {
        matches!(self, Self::Adding | Self::Updating | Self::AddOrUpdate)
    }

    /// Whether drafts of this status can be snapshotted and recovered.
    pub fn is_recoverable(self) -> bool {
        self.is_submittable()
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormStatus::Idle => write!(f, "IDLE"),
            FormStatus::Adding => write!(f, "ADDING"),
            FormStatus::Updating => write!(f, "UPDATING"),
            FormStatus::Viewing => write!(f, "VIEWING"),
            FormStatus::AddOrUpdate => write!(f, "ADD_OR_UPDATE"),
        }
    }
}

/// One entry of the multi-column sort list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub asc: bool,
}

/// In-memory mirror of the collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMirror {
    pub row_key: String,
    pub data: Vec<Value>,
    pub selection: Vec<Value>,
    pub orders: Vec<SortOrder>,
}

impl TableMirror {
    pub fn new(row_key: impl Into<String>) -> Self {
        Self {
            row_key: row_key.into(),
            ..Self::default()
        }
    }

    /// Updates the sort list: `Some(asc)` sets or adds the column, `None` removes it.
    pub fn change_sort(&mut self, column: &str, order: Option<bool>) {
        let existing = self.orders.iter().position(|item| item.column == column);
        match (existing, order) {
            (Some(index), None) => {
                self.orders.remove(index);
            }
            (Some(index), Some(asc)) => self.orders[index].asc = asc,
            (None, Some(asc)) => self.orders.push(SortOrder {
                column: column.to_string(),
                asc,
            }),
            (None, None) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingFlag {
    Query,
    Table,
    Del,
    Export,
    Import,
    Form,
    Submit,
    Sort,
    Copy,
}

/// Per-operation loading flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingFlags {
    pub query: bool,
    pub table: bool,
    pub del: bool,
    pub export: bool,
    pub import: bool,
    pub form: bool,
    pub submit: bool,
    pub sort: bool,
    pub copy: bool,
    /// Flags of registered custom endpoints, keyed by endpoint name.
    pub custom: BTreeMap<String, bool>,
}

impl LoadingFlags {
    pub fn set(&mut self, flag: LoadingFlag, value: bool) {
        let slot = match flag {
            LoadingFlag::Query => &mut self.query,
            LoadingFlag::Table => &mut self.table,
            LoadingFlag::Del => &mut self.del,
            LoadingFlag::Export => &mut self.export,
            LoadingFlag::Import => &mut self.import,
            LoadingFlag::Form => &mut self.form,
            LoadingFlag::Submit => &mut self.submit,
            LoadingFlag::Sort => &mut self.sort,
            LoadingFlag::Copy => &mut self.copy,
        };
        *slot = value;
    }

    pub fn set_all(&mut self, flags: &[LoadingFlag], value: bool) {
        for flag in flags {
            self.set(*flag, value);
        }
    }

    pub fn any(&self) -> bool {
        self.query
            || self.table
            || self.del
            || self.export
            || self.import
            || self.form
            || self.submit
            || self.sort
            || self.copy
            || self.custom.values().any(|v| *v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Instance page size; `0` defers to the global default.
    pub page_size: usize,
    pub current_page: usize,
    pub total: usize,
    /// Page on the client instead of the server.
    pub frontend: bool,
    /// Keep the fetched result between queries.
    pub cache: bool,
}

impl Pagination {
    /// Either flag fetches the full result once and slices it locally.
    pub fn client_side(&self) -> bool {
        self.frontend || self.cache
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: 0,
            current_page: 1,
            total: 0,
            frontend: false,
            cache: false,
        }
    }
}

/// Last error observed by the instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    pub status: String,
}

impl ErrorInfo {
    pub fn from_error(err: &CrudError) -> Self {
        let name = err.name();
        match err.transport() {
            Some(transport) => match &transport.response {
                Some(response) => Self {
                    name,
                    message: response.status_text.clone(),
                    status: response.status.to_string(),
                },
                None => Self {
                    name,
                    message: transport.message.clone(),
                    status: String::new(),
                },
            },
            None => Self {
                name,
                message: err.to_string(),
                status: String::new(),
            },
        }
    }
}

/// Mutable state of one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudState {
    pub form_status: FormStatus,
    pub form: Value,
    pub editing_id: Option<String>,
    pub loading: LoadingFlags,
    pub error: ErrorInfo,
    pub query: Map<String, Value>,
    pub pagination: Pagination,
    pub table: TableMirror,
    /// Payload submitted to the reorder endpoint.
    pub sortation: Value,
    /// Extra constructor parameters, read-only by convention.
    pub params: Map<String, Value>,
}

impl CrudState {
    pub fn new(row_key: impl Into<String>) -> Self {
        Self {
            form: Value::Object(Map::new()),
            table: TableMirror::new(row_key),
            ..Self::default()
        }
    }
}
