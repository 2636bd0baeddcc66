//! Operation identity: which type, which named operation, and at which level.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an operation is invoked on an instance of a type or on the type itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Invoked on an instance (`receiver.op(args)`)
    Instance,
    /// Invoked on the type (`Type::op(args)`)
    Type,
}

impl OperationKind {
    /// Build from the `is_instance_level` flag used throughout records
    pub fn from_instance_level(is_instance_level: bool) -> Self {
        if is_instance_level {
            Self::Instance
        } else {
            Self::Type
        }
    }

    pub fn is_instance_level(self) -> bool {
        matches!(self, Self::Instance)
    }
}

/// Key of a single dispatch slot: `(type, operation, kind)`
///
/// Two keys that differ only in `kind` name different operations, so a type
/// may define an instance-level and a type-level `describe` side by side.
///
/// # Example
/// ```
/// use interpose::operation::{OperationKey, OperationKind};
///
/// let key = OperationKey::instance("Calculator", "compute");
/// assert_eq!(key.kind, OperationKind::Instance);
/// assert_eq!(key.to_string(), "Calculator#compute");
/// assert_eq!(OperationKey::type_level("Calculator", "fibonacci").to_string(), "Calculator.fibonacci");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub type_name: String,
    pub operation: String,
    pub kind: OperationKind,
}

impl OperationKey {
    pub fn new(
        type_name: impl Into<String>,
        operation: impl Into<String>,
        kind: OperationKind,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            operation: operation.into(),
            kind,
        }
    }

    /// Key for an instance-level operation
    pub fn instance(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(type_name, operation, OperationKind::Instance)
    }

    /// Key for a type-level operation
    pub fn type_level(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(type_name, operation, OperationKind::Type)
    }

    pub fn is_instance_level(&self) -> bool {
        self.kind.is_instance_level()
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.kind {
            OperationKind::Instance => '#',
            OperationKind::Type => '.',
        };
        write!(f, "{}{}{}", self.type_name, sep, self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_kind_from_instance_level() {
        assert_eq!(OperationKind::from_instance_level(true), OperationKind::Instance);
        assert_eq!(OperationKind::from_instance_level(false), OperationKind::Type);
        assert!(OperationKind::Instance.is_instance_level());
        assert!(!OperationKind::Type.is_instance_level());
    }

    #[test]
    fn test_keys_differ_by_kind() {
        let a = OperationKey::instance("Widget", "describe");
        let b = OperationKey::type_level("Widget", "describe");
        assert_ne!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(b);
        set.insert(a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(OperationKey::instance("A", "b").to_string(), "A#b");
        assert_eq!(OperationKey::type_level("A", "b").to_string(), "A.b");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&OperationKind::Instance).unwrap();
        assert_eq!(json, "\"instance\"");
    }
}
