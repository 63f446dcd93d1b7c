//! Arguments injected into handler methods.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, WireError};
use crate::server::Connection;

/// A single injected argument.
#[derive(Debug, Clone)]
pub enum Argument {
    /// Decoded payload object.
    Data(Value),
    /// Connection the message arrived on.
    Socket(Arc<Connection>),
    /// Parameter kind the dispatcher does not know.
    Undefined,
}

/// Handler arguments in position order.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    /// Wrap an ordered argument list.
    pub fn new(args: Vec<Argument>) -> Self {
        Self(args)
    }

    /// Argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    /// Payload object at `index`.
    pub fn data(&self, index: usize) -> Result<&Value> {
        match self.0.get(index) {
            Some(Argument::Data(value)) => Ok(value),
            _ => Err(WireError::InvalidArgument(index)),
        }
    }

    /// Payload at `index` converted into `T`.
    pub fn data_as<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        Ok(serde_json::from_value(self.data(index)?.clone())?)
    }

    /// Connection at `index`.
    pub fn socket(&self, index: usize) -> Result<Arc<Connection>> {
        match self.0.get(index) {
            Some(Argument::Socket(conn)) => Ok(conn.clone()),
            _ => Err(WireError::InvalidArgument(index)),
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct AddOrder {
        id: String,
    }

    #[test]
    fn test_typed_access() {
        let args = Arguments::new(vec![Argument::Data(json!({"id": "5"})), Argument::Undefined]);

        let order: AddOrder = args.data_as(0).unwrap();
        assert_eq!(order.id, "5");
        assert!(matches!(args.get(1), Some(Argument::Undefined)));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_wrong_kind_is_invalid_argument() {
        let args = Arguments::new(vec![Argument::Undefined]);

        assert!(matches!(args.data(0), Err(WireError::InvalidArgument(0))));
        assert!(matches!(args.socket(0), Err(WireError::InvalidArgument(0))));
        assert!(matches!(args.data(3), Err(WireError::InvalidArgument(3))));
    }
}
