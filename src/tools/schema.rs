// ABOUTME: JSON schema subset used to declare and validate tool arguments
// ABOUTME: Validation happens before any store call; failures never reach the task store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Taskpilot Project

//! # Tool Schemas
//!
//! Tools declare their inputs with the object-schema subset below. The
//! same structure serves two purposes: it is serialized into the tool
//! declarations handed to the model capability, and it validates the
//! model's untrusted arguments before dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declared schema for one tool, as listed to clients and the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// Human-readable description for model consumption
    pub description: String,
    /// Input schema
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonSchema,
    /// Shape of the payload a successful call produces
    #[serde(rename = "outputSchema")]
    pub output_schema: JsonSchema,
}

/// JSON Schema definition (object subset)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Always "object" for tool inputs
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property name to schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, PropertySchema>>,
    /// Names of required properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// Schema for a single property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    /// JSON type ("string", "integer", "boolean")
    #[serde(rename = "type")]
    pub property_type: String,
    /// Description for model consumption
    pub description: String,
    /// Allowed values, when the property is an enumeration
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    /// A plain string property
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            property_type: "string".to_owned(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// A string property restricted to an enumeration
    #[must_use]
    pub fn string_enum(description: impl Into<String>, values: &[&str]) -> Self {
        Self {
            property_type: "string".to_owned(),
            description: description.into(),
            enum_values: Some(values.iter().map(|v| (*v).to_owned()).collect()),
        }
    }

    /// A boolean property
    #[must_use]
    pub fn boolean(description: impl Into<String>) -> Self {
        Self {
            property_type: "boolean".to_owned(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// An integer property
    #[must_use]
    pub fn integer(description: impl Into<String>) -> Self {
        Self {
            property_type: "integer".to_owned(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// A nested object property; the inner shape is not enforced
    #[must_use]
    pub fn object(description: impl Into<String>) -> Self {
        Self {
            property_type: "object".to_owned(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// An array property; element shape is not enforced
    #[must_use]
    pub fn array(description: impl Into<String>) -> Self {
        Self {
            property_type: "array".to_owned(),
            description: description.into(),
            enum_values: None,
        }
    }
}

impl JsonSchema {
    /// Build an object schema from properties and required names
    #[must_use]
    pub fn object(properties: HashMap<String, PropertySchema>, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_owned(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required.iter().map(|r| (*r).to_owned()).collect())
            },
        }
    }

    /// An object schema with no properties
    #[must_use]
    pub fn empty_object() -> Self {
        Self {
            schema_type: "object".to_owned(),
            properties: None,
            required: None,
        }
    }

    /// Validate untrusted arguments against this schema.
    ///
    /// Checks that the value is an object, every required property is
    /// present, no unknown top-level properties appear, and each known
    /// property matches its declared type (and enumeration, if any).
    /// Returns the list of violations, empty on success.
    #[must_use]
    pub fn validate(&self, args: &Value) -> Vec<String> {
        let mut violations = Vec::new();

        let Some(object) = args.as_object() else {
            return vec!["arguments must be a JSON object".to_owned()];
        };

        if let Some(ref required) = self.required {
            for name in required {
                match object.get(name) {
                    None | Some(Value::Null) => {
                        violations.push(format!("missing required field '{name}'"));
                    }
                    Some(_) => {}
                }
            }
        }

        let empty = HashMap::new();
        let properties = self.properties.as_ref().unwrap_or(&empty);

        for (name, value) in object {
            let Some(property) = properties.get(name) else {
                violations.push(format!("unknown field '{name}'"));
                continue;
            };
            if value.is_null() {
                continue;
            }
            let type_ok = match property.property_type.as_str() {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !type_ok {
                violations.push(format!(
                    "field '{name}' must be of type {}",
                    property.property_type
                ));
                continue;
            }
            if let (Some(allowed), Some(actual)) = (&property.enum_values, value.as_str()) {
                if !allowed.iter().any(|v| v == actual) {
                    violations.push(format!(
                        "field '{name}' must be one of: {}",
                        allowed.join(", ")
                    ));
                }
            }
        }

        violations
    }

    /// Serialize the schema into the JSON value form used in declarations
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }
}
