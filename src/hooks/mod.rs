//! Named extension points bracketing every lifecycle operation.

mod bus;
mod context;
mod names;

pub use bus::{FnHook, HandlerId, HookBus, HookHandler, hook_fn};
pub use context::{HookContext, HookOutcome};
pub use names::{HookName, InstanceId};
