//! Registration records kept by the handler registry.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a handler type.
///
/// Equality and hashing use the `TypeId`; the name is kept for messages.
#[derive(Clone, Copy)]
pub struct ClassKey {
    id: TypeId,
    name: &'static str,
}

impl ClassKey {
    /// Key for handler type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type name of the handler.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassKey {}

impl Hash for ClassKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What gets injected at a parameter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// The decoded payload object.
    Data,
    /// The connection the message arrived on.
    Socket,
    /// Anything else; injected as [`Argument::Undefined`](super::Argument::Undefined).
    Other(String),
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    /// Injected value.
    pub kind: ParamKind,
    /// Position in the handler signature.
    pub position: usize,
}

impl ParamBinding {
    /// Create a parameter binding.
    pub fn new(kind: ParamKind, position: usize) -> Self {
        Self { kind, position }
    }
}

/// Binds a handler method to a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBinding {
    /// Fully-qualified message type name; empty until the method is bound.
    pub message_type_name: String,
    /// Method that handles the message.
    pub handler_method_name: String,
    /// Parameters in declaration order.
    pub parameters: Vec<ParamBinding>,
}

impl MessageBinding {
    /// Parameters in invocation order (by position, stable).
    pub fn sorted_parameters(&self) -> Vec<ParamBinding> {
        let mut params = self.parameters.clone();
        params.sort_by_key(|p| p.position);
        params
    }
}

/// Snapshot of one handler type's registration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractRegistration {
    /// Contract served by the handler type.
    pub contract_name: String,
    /// Message bindings in registration order.
    pub messages: Vec<MessageBinding>,
}
