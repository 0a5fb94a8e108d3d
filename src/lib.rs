// ============================================================================
// RestCrud Library
// ============================================================================

//! REST collection lifecycle: hook pipeline, form modes, auto response and
//! recoverable drafts.
//!
//! # Examples
//!
//! ```no_run
//! use restcrud::{Crud, CrudContext, CrudOptions, HookName, ReqwestTransport, hook_fn};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> restcrud::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new().base_url("https://api.example.com"));
//! let context = CrudContext::builder(transport).origin("/users").build();
//!
//! let mut users = Crud::open(context, CrudOptions::new("/users").page_size(20)).await?;
//! users.on(
//!     HookName::AFTER_QUERY,
//!     hook_fn(|ctx| {
//!         let rows = ctx.payload["rows"].as_array().cloned().unwrap_or_default();
//!         ctx.state.table.data = rows;
//!         Ok(())
//!     }),
//! )?;
//!
//! users.to_query(None).await?;
//! println!("{} users loaded", users.state().table.data.len());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod crud;
pub mod hooks;
pub mod reconcile;
pub mod snapshot;
pub mod tree;

// Re-export main types for convenience
pub use core::{CrudError, Result, TransportError, TransportResponse};
pub use crud::{
    Crud, CrudContext, CrudDefaults, CrudOptions, CrudState, CustomEndpoint, FormStatus,
    FormValidator, Operation, ReqwestTransport, Request, Transport, UploadFile,
};
pub use hooks::{HookBus, HookContext, HookHandler, HookName, hook_fn};
pub use reconcile::{AutoPatch, AutoResponse, InsertPosition, MutationKind, reconcile};
pub use snapshot::{FileStorage, KeyValueStorage, MemoryStorage, SnapshotStore};
