//! Handler module - declaring which methods handle which messages.
//!
//! Provides:
//! - [`HandlerRegistry`] - contract, message and parameter bindings per handler type
//! - [`ControllerDecl`] - fluent registration for one handler type
//! - [`Arguments`] - values injected into a handler method

mod args;
mod binding;
mod declare;
mod registry;

pub use args::{Argument, Arguments};
pub use binding::{ClassKey, ContractRegistration, MessageBinding, ParamBinding, ParamKind};
pub use declare::ControllerDecl;
pub use registry::{BoxFuture, HandlerRegistry, HandlerResult};

pub(crate) use registry::{Instance, MethodFn};
