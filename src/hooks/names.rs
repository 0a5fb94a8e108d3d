use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of one orchestrator instance on the hook bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        InstanceId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crud_{}", self.0.simple())
    }
}

/// Name of a hook slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookName(Cow<'static, str>);

macro_rules! hook_names {
    ($($(#[$doc:meta])* $ident:ident => $value:literal,)*) => {
        impl HookName {
            $(
                $(#[$doc])*
                pub const $ident: HookName = HookName(Cow::Borrowed($value));
            )*
        }
    };
}

hook_names! {
    /// Before a query; params and orders are editable.
    BEFORE_QUERY => "CRUD_BEFORE_QUERY",
    AFTER_QUERY => "CRUD_AFTER_QUERY",
    BEFORE_DELETE => "CRUD_BEFORE_DELETE",
    AFTER_DELETE => "CRUD_AFTER_DELETE",
    /// Before entering the create form; typically clears the form.
    BEFORE_ADD => "CRUD_BEFORE_ADD",
    /// Gate of the edit form; may cancel or skip the detail fetch.
    BEFORE_EDIT_QUERY => "CRUD_BEFORE_EDIT_QUERY",
    /// After the edit detail fetch; typically fills the form.
    BEFORE_EDIT => "CRUD_BEFORE_EDIT",
    BEFORE_VIEW_QUERY => "CRUD_BEFORE_VIEW_QUERY",
    BEFORE_VIEW => "CRUD_BEFORE_VIEW",
    BEFORE_ADD_OR_UPDATE_QUERY => "CRUD_BEFORE_ADD_OR_UPDATE_QUERY",
    BEFORE_ADD_OR_UPDATE => "CRUD_BEFORE_ADD_OR_UPDATE",
    BEFORE_SUBMIT => "CRUD_BEFORE_SUBMIT",
    AFTER_SUBMIT => "CRUD_AFTER_SUBMIT",
    BEFORE_EXPORT => "CRUD_BEFORE_EXPORT",
    AFTER_EXPORT => "CRUD_AFTER_EXPORT",
    BEFORE_IMPORT => "CRUD_BEFORE_IMPORT",
    AFTER_IMPORT => "CRUD_AFTER_IMPORT",
    BEFORE_SORT => "CRUD_BEFORE_SORT",
    AFTER_SORT => "CRUD_AFTER_SORT",
    BEFORE_COPY => "CRUD_BEFORE_COPY",
    AFTER_COPY => "CRUD_AFTER_COPY",
    /// Offered a recovered draft before it is merged onto the form.
    BEFORE_RECOVER => "CRUD_BEFORE_RECOVER",
    /// Offered the raw result before it is cached for frontend paging.
    BEFORE_CACHE => "CRUD_BEFORE_CACHE",
    ON_ERROR => "CRUD_ON_ERROR",
    ON_CANCEL => "CRUD_ON_CANCEL",
}

impl HookName {
    pub fn custom(name: impl Into<String>) -> Self {
        HookName(Cow::Owned(name.into()))
    }

    /// BEFORE hook of a custom endpoint.
    pub fn before(endpoint: &str) -> Self {
        Self::custom(format!("CRUD_BEFORE_{}", endpoint.to_uppercase()))
    }

    /// AFTER hook of a custom endpoint.
    pub fn after(endpoint: &str) -> Self {
        Self::custom(format!("CRUD_AFTER_{}", endpoint.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_error(&self) -> bool {
        *self == HookName::ON_ERROR
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for HookName {
    fn from(value: &'static str) -> Self {
        HookName(Cow::Borrowed(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_endpoint_hook_names() {
        assert_eq!(HookName::before("audit").as_str(), "CRUD_BEFORE_AUDIT");
        assert_eq!(HookName::after("audit").as_str(), "CRUD_AFTER_AUDIT");
        assert_eq!(HookName::from("CRUD_BEFORE_QUERY"), HookName::BEFORE_QUERY);
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }
}
