//! Invocation context handed to implementations and hooks
//!
//! An `Invocation` wraps a single call: the receiver, the operation identity
//! and the argument list. Before-hooks get it mutably and may rewrite
//! arguments in place; the forwarded implementation then sees the rewritten
//! values.

use crate::operation::OperationKey;
use serde_json::Value;

/// The target of a call
#[derive(Debug, Clone, PartialEq)]
pub enum Receiver {
    /// An instance of the type, carrying its state
    Instance(Value),
    /// The type itself (type-level operations)
    Type,
}

impl Receiver {
    /// Instance state, if this is an instance-level call
    pub fn state(&self) -> Option<&Value> {
        match self {
            Receiver::Instance(state) => Some(state),
            Receiver::Type => None,
        }
    }
}

/// A single in-flight call
#[derive(Debug, Clone)]
pub struct Invocation {
    receiver: Receiver,
    key: OperationKey,
    arguments: Vec<Value>,
}

impl Invocation {
    pub fn new(receiver: Receiver, key: OperationKey, arguments: Vec<Value>) -> Self {
        Self {
            receiver,
            key,
            arguments,
        }
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Name of the invoked operation (the selector)
    pub fn operation(&self) -> &str {
        &self.key.operation
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Argument at `index` as `i64`, if present and integral
    pub fn argument_i64(&self, index: usize) -> Option<i64> {
        self.argument(index).and_then(Value::as_i64)
    }

    /// Argument at `index` as `f64`, if present and numeric
    pub fn argument_f64(&self, index: usize) -> Option<f64> {
        self.argument(index).and_then(Value::as_f64)
    }

    /// Overwrite the argument at `index`.
    ///
    /// Returns the previous value, or `None` (and changes nothing) when the
    /// index is out of range; the argument count is part of the call shape.
    pub fn set_argument(&mut self, index: usize, value: impl Into<Value>) -> Option<Value> {
        self.arguments
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value.into()))
    }
}
