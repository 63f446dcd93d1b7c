//! Handler registry: which handler type serves which contract, and which
//! of its methods handles which message type.
//!
//! Registration is order independent. Parameters may be declared before
//! the method is bound to a message type, and the contract name may be set
//! after the bindings. Lookups against unknown keys return empty results.
//!
//! # Example
//!
//! ```
//! use contractwire::handler::{ClassKey, HandlerRegistry, ParamKind};
//!
//! struct Orders;
//!
//! let mut registry = HandlerRegistry::new();
//! let orders = ClassKey::of::<Orders>();
//!
//! registry.register_param(orders, "get_all", ParamKind::Data, 0);
//! registry.register_message_handler(orders, "GetAllOrderRequest", "get_all");
//! registry.register_controller(orders, "order");
//!
//! assert_eq!(registry.messages(orders)[0].message_type_name, "GetAllOrderRequest");
//! assert_eq!(registry.params(orders, "get_all").len(), 1);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::{Arguments, ClassKey, ContractRegistration, ControllerDecl, MessageBinding, ParamBinding, ParamKind};
use crate::error::{Result, WireError};
use crate::inject::Dependencies;

/// Result type for handler methods.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A constructed handler instance.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased handler method.
pub(crate) type MethodFn =
    Arc<dyn Fn(Instance, Arguments) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

type FactoryFn = Arc<dyn Fn(&Dependencies) -> Result<Instance> + Send + Sync>;

/// How to build a handler instance.
#[derive(Clone)]
pub(crate) struct Constructor {
    /// Dependency names, in constructor order.
    pub(crate) dependencies: Vec<String>,
    pub(crate) factory: FactoryFn,
}

pub(crate) struct ControllerEntry {
    pub(crate) class: ClassKey,
    pub(crate) contract_name: String,
    pub(crate) messages: Vec<MessageBinding>,
    pub(crate) constructor: Option<Constructor>,
    pub(crate) methods: HashMap<String, MethodFn>,
}

impl ControllerEntry {
    fn new(class: ClassKey) -> Self {
        Self {
            class,
            contract_name: String::new(),
            messages: Vec::new(),
            constructor: None,
            methods: HashMap::new(),
        }
    }

    fn binding_mut(&mut self, method_name: &str) -> &mut MessageBinding {
        let index = match self
            .messages
            .iter()
            .position(|b| b.handler_method_name == method_name)
        {
            Some(index) => index,
            None => {
                self.messages.push(MessageBinding {
                    message_type_name: String::new(),
                    handler_method_name: method_name.to_string(),
                    parameters: Vec::new(),
                });
                self.messages.len() - 1
            }
        };
        &mut self.messages[index]
    }
}

/// Registry of handler types, their message bindings and implementations.
///
/// Entries keep registration order so dispatch table construction is
/// deterministic.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<ControllerEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent registration for handler type `C`.
    pub fn controller<C: Send + Sync + 'static>(&mut self) -> ControllerDecl<'_, C> {
        ControllerDecl::new(self)
    }

    fn entry_mut(&mut self, class: ClassKey) -> &mut ControllerEntry {
        let index = match self.entries.iter().position(|e| e.class == class) {
            Some(index) => index,
            None => {
                self.entries.push(ControllerEntry::new(class));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    fn entry(&self, class: ClassKey) -> Option<&ControllerEntry> {
        self.entries.iter().find(|e| e.class == class)
    }

    /// Set the contract served by `class`. Existing bindings are kept.
    pub fn register_controller(&mut self, class: ClassKey, contract_name: &str) {
        self.entry_mut(class).contract_name = contract_name.to_string();
    }

    /// Bind `method_name` to `message_name`, overwriting any earlier binding
    /// of the same method.
    pub fn register_message_handler(&mut self, class: ClassKey, message_name: &str, method_name: &str) {
        self.entry_mut(class).binding_mut(method_name).message_type_name = message_name.to_string();
    }

    /// Declare that `method_name` receives `kind` at `position`.
    pub fn register_param(&mut self, class: ClassKey, method_name: &str, kind: ParamKind, position: usize) {
        self.entry_mut(class)
            .binding_mut(method_name)
            .parameters
            .push(ParamBinding::new(kind, position));
    }

    /// Provide the implementation of `method_name` on handler type `C`.
    ///
    /// Registering the same method twice replaces the implementation.
    pub fn register_method<C, F, Fut>(&mut self, method_name: &str, handler: F)
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let class = ClassKey::of::<C>();
        let erased: MethodFn = Arc::new(
            move |instance: Instance, args: Arguments| -> BoxFuture<'static, HandlerResult> {
                match instance.downcast::<C>() {
                    Ok(this) => Box::pin(handler(this, args)),
                    Err(_) => {
                        let message = format!("handler instance is not a {}", class.name());
                        Box::pin(async move { Err(WireError::Handler(message)) })
                    }
                }
            },
        );
        self.entry_mut(class)
            .methods
            .insert(method_name.to_string(), erased);
    }

    /// Declare how handler type `C` is constructed.
    ///
    /// `dependencies` lists provider names in constructor order; the
    /// factory receives them resolved.
    pub fn register_constructor<C, F>(&mut self, dependencies: &[&str], factory: F)
    where
        C: Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<C> + Send + Sync + 'static,
    {
        let constructor = Constructor {
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: Arc::new(move |deps| factory(deps).map(|c| Arc::new(c) as Instance)),
        };
        self.entry_mut(ClassKey::of::<C>()).constructor = Some(constructor);
    }

    /// Snapshot of every registered handler type.
    pub fn controllers(&self) -> Vec<(ClassKey, ContractRegistration)> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.class,
                    ContractRegistration {
                        contract_name: e.contract_name.clone(),
                        messages: e.messages.clone(),
                    },
                )
            })
            .collect()
    }

    /// Message bindings of `class`; empty if unknown.
    pub fn messages(&self, class: ClassKey) -> &[MessageBinding] {
        self.entry(class).map(|e| e.messages.as_slice()).unwrap_or(&[])
    }

    /// Parameters of one binding; empty if unknown.
    pub fn params(&self, class: ClassKey, method_name: &str) -> &[ParamBinding] {
        self.messages(class)
            .iter()
            .find(|b| b.handler_method_name == method_name)
            .map(|b| b.parameters.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `class` has an implementation for `method_name`.
    pub fn has_method(&self, class: ClassKey, method_name: &str) -> bool {
        self.entry(class)
            .map(|e| e.methods.contains_key(method_name))
            .unwrap_or(false)
    }

    /// Drop all registrations.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered handler types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &ControllerEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Orders;
    struct Users;

    #[test]
    fn test_register_controller_keeps_messages() {
        let mut registry = HandlerRegistry::new();
        let orders = ClassKey::of::<Orders>();

        registry.register_message_handler(orders, "AddOrderRequest", "add");
        registry.register_controller(orders, "order");
        registry.register_controller(orders, "orders");

        let controllers = registry.controllers();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].0, orders);
        assert_eq!(controllers[0].1.contract_name, "orders");
        assert_eq!(controllers[0].1.messages.len(), 1);
    }

    #[test]
    fn test_message_handler_auto_creates_entry() {
        let mut registry = HandlerRegistry::new();
        let orders = ClassKey::of::<Orders>();

        registry.register_message_handler(orders, "AddOrderRequest", "add");

        let controllers = registry.controllers();
        assert_eq!(controllers[0].1.contract_name, "");
        assert_eq!(registry.messages(orders)[0].handler_method_name, "add");
    }

    #[test]
    fn test_message_handler_overwrites_binding() {
        let mut registry = HandlerRegistry::new();
        let orders = ClassKey::of::<Orders>();

        registry.register_message_handler(orders, "AddOrderRequest", "add");
        registry.register_message_handler(orders, "PlaceOrderRequest", "add");

        let messages = registry.messages(orders);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type_name, "PlaceOrderRequest");
    }

    #[test]
    fn test_params_before_method_binding() {
        let mut registry = HandlerRegistry::new();
        let orders = ClassKey::of::<Orders>();

        registry.register_param(orders, "get_all", ParamKind::Socket, 1);
        registry.register_param(orders, "get_all", ParamKind::Data, 0);
        assert_eq!(registry.messages(orders)[0].message_type_name, "");

        registry.register_message_handler(orders, "GetAllOrderRequest", "get_all");

        let messages = registry.messages(orders);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type_name, "GetAllOrderRequest");
        assert_eq!(
            registry.params(orders, "get_all"),
            &[
                ParamBinding::new(ParamKind::Socket, 1),
                ParamBinding::new(ParamKind::Data, 0),
            ]
        );
    }

    #[test]
    fn test_lookups_are_per_class() {
        let mut registry = HandlerRegistry::new();
        registry.register_message_handler(ClassKey::of::<Orders>(), "AddOrderRequest", "add");

        assert!(registry.messages(ClassKey::of::<Users>()).is_empty());
        assert!(registry.params(ClassKey::of::<Users>(), "add").is_empty());
        assert!(registry.params(ClassKey::of::<Orders>(), "missing").is_empty());
    }

    #[test]
    fn test_register_method_and_constructor() {
        let mut registry = HandlerRegistry::new();
        let orders = ClassKey::of::<Orders>();

        registry.register_method::<Orders, _, _>("add", |_this, _args| async { Ok(()) });
        registry.register_constructor::<Orders, _>(&[], |_| Ok(Orders));

        assert!(registry.has_method(orders, "add"));
        assert!(!registry.has_method(orders, "remove"));
        let entry = registry.entries().next().unwrap();
        assert!(entry.constructor.is_some());
    }

    #[test]
    fn test_clear() {
        let mut registry = HandlerRegistry::new();
        registry.register_controller(ClassKey::of::<Orders>(), "order");
        registry.register_controller(ClassKey::of::<Users>(), "user");
        assert_eq!(registry.len(), 2);

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.controllers().is_empty());
        assert!(registry.messages(ClassKey::of::<Orders>()).is_empty());
    }
}
