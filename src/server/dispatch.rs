//! Flat dispatch table: message type name to handler method.
//!
//! Built once from a [`HandlerRegistry`] before any traffic. Building is
//! the point where the permissive registrations are validated and every
//! handler type is instantiated exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::Connection;
use crate::error::{Result, WireError};
use crate::handler::{
    Argument, Arguments, BoxFuture, ClassKey, HandlerRegistry, HandlerResult, Instance, MethodFn,
    ParamBinding, ParamKind,
};
use crate::inject::{Dependencies, DependencyProvider};

/// A handler method bound to one message type.
pub struct DispatchEntry {
    class: ClassKey,
    contract_name: String,
    method_name: String,
    parameters: Vec<ParamBinding>,
    instance: Instance,
    invoke: MethodFn,
}

impl DispatchEntry {
    /// Handler type.
    pub fn class(&self) -> ClassKey {
        self.class
    }

    /// Contract the handler type serves.
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Handler method name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Parameters sorted by position.
    pub fn parameters(&self) -> &[ParamBinding] {
        &self.parameters
    }

    /// Build handler arguments in position order.
    pub fn arguments(&self, data: &Value, conn: &Arc<Connection>) -> Arguments {
        Arguments::new(
            self.parameters
                .iter()
                .map(|param| match &param.kind {
                    ParamKind::Data => Argument::Data(data.clone()),
                    ParamKind::Socket => Argument::Socket(conn.clone()),
                    ParamKind::Other(_) => Argument::Undefined,
                })
                .collect(),
        )
    }

    /// Start the handler method with `args`.
    ///
    /// Panics raised while the method builds its future propagate to the
    /// caller.
    pub(crate) fn call(&self, args: Arguments) -> BoxFuture<'static, HandlerResult> {
        (self.invoke)(self.instance.clone(), args)
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("class", &self.class)
            .field("contract_name", &self.contract_name)
            .field("method_name", &self.method_name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Read-only lookup from message type name to [`DispatchEntry`].
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<String, DispatchEntry>,
}

impl DispatchTable {
    /// Validate `registry` and instantiate its handler types.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidRegistration`] when a handler type has no
    /// contract or constructor, a method is declared but never bound or
    /// never implemented, two parameters share a position, or a message
    /// type is bound twice. [`WireError::MissingDependency`] when the
    /// provider lacks a constructor dependency.
    pub fn build(registry: &HandlerRegistry, provider: &dyn DependencyProvider) -> Result<Self> {
        let mut entries: HashMap<String, DispatchEntry> = HashMap::new();

        for controller in registry.entries() {
            let class = controller.class;
            if controller.contract_name.is_empty() {
                return Err(invalid(format!("{} has no contract", class.name())));
            }

            for binding in &controller.messages {
                if binding.message_type_name.is_empty() {
                    return Err(invalid(format!(
                        "{}::{} has parameters but is not bound to a message type",
                        class.name(),
                        binding.handler_method_name
                    )));
                }
                if !controller.methods.contains_key(&binding.handler_method_name) {
                    return Err(invalid(format!(
                        "{}::{} is bound to {} but has no implementation",
                        class.name(),
                        binding.handler_method_name,
                        binding.message_type_name
                    )));
                }
                let parameters = binding.sorted_parameters();
                if let Some(pair) = parameters.windows(2).find(|w| w[0].position == w[1].position) {
                    return Err(invalid(format!(
                        "{}::{} declares two parameters at position {}",
                        class.name(),
                        binding.handler_method_name,
                        pair[0].position
                    )));
                }
            }

            if controller.messages.is_empty() {
                continue;
            }

            let constructor = controller
                .constructor
                .as_ref()
                .ok_or_else(|| invalid(format!("{} has no constructor", class.name())))?;
            let dependencies = Dependencies::resolve(class, &constructor.dependencies, provider)?;
            let instance = (constructor.factory)(&dependencies)?;
            debug!(
                class = class.name(),
                contract = %controller.contract_name,
                messages = controller.messages.len(),
                "handler instantiated"
            );

            for binding in &controller.messages {
                if let Some(existing) = entries.get(&binding.message_type_name) {
                    return Err(invalid(format!(
                        "message type {} is bound by both {}::{} and {}::{}",
                        binding.message_type_name,
                        existing.class.name(),
                        existing.method_name,
                        class.name(),
                        binding.handler_method_name
                    )));
                }

                let Some(invoke) = controller.methods.get(&binding.handler_method_name) else {
                    continue;
                };
                entries.insert(
                    binding.message_type_name.clone(),
                    DispatchEntry {
                        class,
                        contract_name: controller.contract_name.clone(),
                        method_name: binding.handler_method_name.clone(),
                        parameters: binding.sorted_parameters(),
                        instance: instance.clone(),
                        invoke: invoke.clone(),
                    },
                );
            }
        }

        Ok(Self { entries })
    }

    /// Entry handling `message_type`.
    pub fn get(&self, message_type: &str) -> Option<&DispatchEntry> {
        self.entries.get(message_type)
    }

    /// Bound message type names.
    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of bound message types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no message type is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn invalid(message: String) -> WireError {
    WireError::InvalidRegistration(message)
}
