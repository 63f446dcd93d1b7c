//! Fluent registration for one handler type.
//!
//! Each call forwards to the matching [`HandlerRegistry`] operation, so
//! calls may come in any order.
//!
//! # Example
//!
//! ```
//! use contractwire::handler::HandlerRegistry;
//!
//! #[derive(Default)]
//! struct Orders;
//!
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .controller::<Orders>()
//!     .contract("order")
//!     .message("GetAllOrderRequest", "get_all")
//!     .data("get_all", 0)
//!     .socket("get_all", 1)
//!     .handler("get_all", |_orders, args| async move {
//!         let _filter = args.data(0)?;
//!         Ok(())
//!     })
//!     .construct_default();
//!
//! assert_eq!(registry.controllers()[0].1.contract_name, "order");
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Arguments, ClassKey, HandlerRegistry, HandlerResult, ParamKind};
use crate::error::Result;
use crate::inject::Dependencies;

/// Registration builder for handler type `C`.
pub struct ControllerDecl<'r, C> {
    registry: &'r mut HandlerRegistry,
    class: ClassKey,
    _marker: PhantomData<fn() -> C>,
}

impl<'r, C: Send + Sync + 'static> ControllerDecl<'r, C> {
    pub(crate) fn new(registry: &'r mut HandlerRegistry) -> Self {
        Self {
            registry,
            class: ClassKey::of::<C>(),
            _marker: PhantomData,
        }
    }

    /// Class key of `C`.
    pub fn class(&self) -> ClassKey {
        self.class
    }

    /// Contract served by `C`.
    pub fn contract(self, contract_name: &str) -> Self {
        self.registry.register_controller(self.class, contract_name);
        self
    }

    /// Bind `method_name` to `message_name`.
    pub fn message(self, message_name: &str, method_name: &str) -> Self {
        self.registry
            .register_message_handler(self.class, message_name, method_name);
        self
    }

    /// Inject the payload at `position`.
    pub fn data(self, method_name: &str, position: usize) -> Self {
        self.param(method_name, ParamKind::Data, position)
    }

    /// Inject the connection at `position`.
    pub fn socket(self, method_name: &str, position: usize) -> Self {
        self.param(method_name, ParamKind::Socket, position)
    }

    /// Declare an arbitrary parameter kind.
    pub fn param(self, method_name: &str, kind: ParamKind, position: usize) -> Self {
        self.registry
            .register_param(self.class, method_name, kind, position);
        self
    }

    /// Implementation of `method_name`.
    pub fn handler<F, Fut>(self, method_name: &str, handler: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register_method::<C, F, Fut>(method_name, handler);
        self
    }

    /// Construct `C` from the named dependencies.
    pub fn construct<F>(self, dependencies: &[&str], factory: F) -> Self
    where
        F: Fn(&Dependencies) -> Result<C> + Send + Sync + 'static,
    {
        self.registry.register_constructor::<C, F>(dependencies, factory);
        self
    }

    /// Construct `C` with `Default`.
    pub fn construct_default(self) -> Self
    where
        C: Default,
    {
        self.construct(&[], |_| Ok(C::default()))
    }
}
