//! Declarative argument schemas for dispatchable operations
//!
//! Each operation declares its expected fields once; the dispatcher
//! validates incoming arguments against the declaration before any handler
//! runs, so handlers never re-check shapes.

use serde_json::{Map, Value};
use thiserror::Error;

/// Accepted shape for a single argument field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Any JSON string
    Text,
    /// Any JSON number
    Number,
    /// JSON true/false
    Boolean,
    /// Array of strings
    TextArray,
    /// String restricted to a closed set of values
    Choice(&'static [&'static str]),
}

/// Declaration for one argument field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A single schema check failure, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation on field '{field}': {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Declared input schema for an operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Checks required presence, primitive types, and choice membership.
    ///
    /// Unknown extra fields are tolerated; the first offending declared
    /// field is reported.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), SchemaViolation> {
        for spec in &self.fields {
            match args.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(SchemaViolation::new(spec.name, "required field is missing"));
                    }
                }
                Some(value) => check_kind(spec.name, &spec.kind, value)?,
            }
        }
        Ok(())
    }

    /// JSON rendering for tool discovery, in the shape protocol clients
    /// expect: `{"type": "object", "properties": {...}, "required": [...]}`
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.fields {
            let rendered = match &spec.kind {
                FieldKind::Text => serde_json::json!({"type": "string"}),
                FieldKind::Number => serde_json::json!({"type": "number"}),
                FieldKind::Boolean => serde_json::json!({"type": "boolean"}),
                FieldKind::TextArray => {
                    serde_json::json!({"type": "array", "items": {"type": "string"}})
                }
                FieldKind::Choice(options) => {
                    serde_json::json!({"type": "string", "enum": options})
                }
            };
            properties.insert(spec.name.to_string(), rendered);
            if spec.required {
                required.push(Value::String(spec.name.to_string()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn check_kind(field: &str, kind: &FieldKind, value: &Value) -> Result<(), SchemaViolation> {
    match kind {
        FieldKind::Text => {
            if !value.is_string() {
                return Err(SchemaViolation::new(field, "expected a string"));
            }
        }
        FieldKind::Number => {
            if !value.is_number() {
                return Err(SchemaViolation::new(field, "expected a number"));
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                return Err(SchemaViolation::new(field, "expected a boolean"));
            }
        }
        FieldKind::TextArray => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => {}
            _ => return Err(SchemaViolation::new(field, "expected an array of strings")),
        },
        FieldKind::Choice(options) => match value.as_str() {
            Some(chosen) if options.contains(&chosen) => {}
            Some(chosen) => {
                return Err(SchemaViolation::new(
                    field,
                    format!("'{}' is not one of {}", chosen, options.join(", ")),
                ));
            }
            None => return Err(SchemaViolation::new(field, "expected a string")),
        },
    }
    Ok(())
}
