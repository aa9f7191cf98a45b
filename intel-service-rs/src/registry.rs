//! Operation registry
//!
//! A static table, populated once at startup, mapping operation names to
//! their schema, primary handler, optional fallback handler, cache TTL, and
//! execution timeout. This is the seam where external collaborators are
//! wired in as primary implementations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use resilience_rs::SourceResult;

use crate::schema::InputSchema;

/// Default TTL for cached operation results
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Executable side of an operation
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn call(&self, args: &Map<String, Value>) -> SourceResult<Value>;
}

/// Immutable metadata for a dispatchable operation
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: InputSchema,
}

impl OperationDescriptor {
    /// JSON rendering for protocol-level tool discovery
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json(),
        })
    }
}

/// One registry entry: descriptor plus execution wiring
pub struct RegisteredOperation {
    pub descriptor: OperationDescriptor,
    pub primary: Arc<dyn OperationHandler>,
    pub fallback: Option<Arc<dyn OperationHandler>>,
    pub cache_ttl: Duration,
    pub timeout: Option<Duration>,
}

/// Registration errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("operation already registered: {0}")]
    DuplicateOperation(String),

    #[error("operation '{0}' declared a zero cache ttl")]
    ZeroCacheTtl(String),
}

/// Name-indexed table of registered operations
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, RegisteredOperation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation; duplicate names and zero TTLs are rejected so a
    /// bad table fails loudly at startup rather than at dispatch time.
    pub fn register(&mut self, operation: RegisteredOperation) -> Result<(), RegistryError> {
        let name = operation.descriptor.name;
        if operation.cache_ttl.is_zero() {
            return Err(RegistryError::ZeroCacheTtl(name.to_string()));
        }
        if self.operations.contains_key(name) {
            return Err(RegistryError::DuplicateOperation(name.to_string()));
        }
        self.operations.insert(name, operation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredOperation> {
        self.operations.get(name)
    }

    /// Descriptors of every registered operation, sorted by name
    pub fn descriptors(&self) -> Vec<&OperationDescriptor> {
        let mut descriptors: Vec<_> = self
            .operations
            .values()
            .map(|op| &op.descriptor)
            .collect();
        descriptors.sort_by_key(|d| d.name);
        descriptors
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec};

    struct NullHandler;

    #[async_trait]
    impl OperationHandler for NullHandler {
        async fn call(&self, _args: &Map<String, Value>) -> SourceResult<Value> {
            Ok(Value::Null)
        }
    }

    fn entry(name: &'static str, ttl: Duration) -> RegisteredOperation {
        RegisteredOperation {
            descriptor: OperationDescriptor {
                name,
                description: "test operation",
                input_schema: InputSchema::new(vec![FieldSpec::required(
                    "msg",
                    FieldKind::Text,
                )]),
            },
            primary: Arc::new(NullHandler),
            fallback: None,
            cache_ttl: ttl,
            timeout: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = OperationRegistry::new();
        registry.register(entry("echo", DEFAULT_CACHE_TTL)).unwrap();

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = OperationRegistry::new();
        registry.register(entry("echo", DEFAULT_CACHE_TTL)).unwrap();

        let err = registry.register(entry("echo", DEFAULT_CACHE_TTL)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateOperation(name) if name == "echo"));
    }

    #[test]
    fn test_zero_ttl_rejected_at_registration() {
        let mut registry = OperationRegistry::new();
        let err = registry.register(entry("echo", Duration::ZERO)).unwrap_err();
        assert!(matches!(err, RegistryError::ZeroCacheTtl(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_descriptors_sorted_by_name() {
        let mut registry = OperationRegistry::new();
        registry.register(entry("zeta", DEFAULT_CACHE_TTL)).unwrap();
        registry.register(entry("alpha", DEFAULT_CACHE_TTL)).unwrap();

        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_descriptor_json_shape() {
        let rendered = entry("echo", DEFAULT_CACHE_TTL).descriptor.to_json();
        assert_eq!(rendered["name"], "echo");
        assert_eq!(rendered["inputSchema"]["required"][0], "msg");
    }
}
