//! The JSON-Schema subset actions declare for their inputs and outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConductorError;

/// Primitive kinds accepted by the schema subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a runtime JSON value matches this kind. Objects exclude arrays.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
}

impl Property {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            description: None,
            allowed: None,
            items: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(PropertyKind::String)
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(PropertyKind::Number)
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(PropertyKind::Boolean)
        }
    }
}

/// An object schema: named properties, a required set, and an
/// additional-properties flag carried through to the wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub additional_properties: bool,
}

impl Schema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// JSON-Schema wire form used for tool parameters.
    pub fn to_json(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for (name, property) in &self.properties {
            properties.insert(name.clone(), property_json(property));
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
            "additionalProperties": self.additional_properties,
        })
    }

    /// Check `params` against this schema. All failures are gathered into a
    /// single `Validation` error so the model sees every problem at once.
    pub fn validate(&self, params: &Value) -> Result<(), ConductorError> {
        let mut reasons = Vec::new();

        let object = match params.as_object() {
            Some(object) => object,
            None => {
                return Err(ConductorError::validation(vec![format!(
                    "parameters must be an object, got {}",
                    kind_of(params)
                )]));
            }
        };

        for name in &self.required {
            match object.get(name) {
                None | Some(Value::Null) => {
                    reasons.push(format!("missing required parameter '{name}'"));
                }
                Some(_) => {}
            }
        }

        for (name, property) in &self.properties {
            let Some(value) = object.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !property.kind.matches(value) {
                reasons.push(format!(
                    "parameter '{name}' must be a {}, got {}",
                    property.kind.name(),
                    kind_of(value)
                ));
                continue;
            }
            if let Some(allowed) = &property.allowed {
                if !allowed.contains(value) {
                    reasons.push(format!("parameter '{name}' is not one of the allowed values"));
                }
            }
            if let (Some(items), Some(elements)) = (&property.items, value.as_array()) {
                for (index, element) in elements.iter().enumerate() {
                    if !items.kind.matches(element) {
                        reasons.push(format!(
                            "parameter '{name}[{index}]' must be a {}, got {}",
                            items.kind.name(),
                            kind_of(element)
                        ));
                    }
                }
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::validation(reasons))
        }
    }

    /// Keep only declared keys. Used to project model-supplied tool arguments
    /// before dispatching them to an action.
    pub fn project(&self, args: &Value) -> Value {
        let mut projected = serde_json::Map::new();
        if let Some(object) = args.as_object() {
            for name in self.properties.keys() {
                if let Some(value) = object.get(name) {
                    projected.insert(name.clone(), value.clone());
                }
            }
        }
        Value::Object(projected)
    }
}

fn property_json(property: &Property) -> Value {
    let mut out = serde_json::Map::new();
    out.insert("type".into(), Value::String(property.kind.name().into()));
    if let Some(description) = &property.description {
        out.insert("description".into(), Value::String(description.clone()));
    }
    if let Some(allowed) = &property.allowed {
        out.insert("enum".into(), Value::Array(allowed.clone()));
    }
    if let Some(items) = &property.items {
        out.insert("items".into(), property_json(items));
    }
    Value::Object(out)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fill_schema() -> Schema {
        Schema::object()
            .property("element_id", Property::number("target element"))
            .property("text", Property::string("text to enter"))
            .require("element_id")
            .require("text")
    }

    #[test]
    fn accepts_matching_params() {
        let schema = fill_schema();
        assert!(schema.validate(&json!({"element_id": 3, "text": "hi"})).is_ok());
    }

    #[test]
    fn aggregates_all_failures() {
        let schema = fill_schema();
        let err = schema
            .validate(&json!({"element_id": "abc"}))
            .expect_err("should fail");
        match err {
            ConductorError::Validation { reasons } => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons.iter().any(|r| r.contains("element_id")));
                assert!(reasons.iter().any(|r| r.contains("missing required parameter 'text'")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn object_kind_excludes_arrays() {
        let schema = Schema::object().property("payload", Property::new(PropertyKind::Object));
        let err = schema
            .validate(&json!({"payload": [1, 2]}))
            .expect_err("arrays are not objects");
        assert!(err.to_string().contains("must be a object"));
    }

    #[test]
    fn null_required_counts_as_missing() {
        let schema = Schema::object()
            .property("url", Property::string("page url"))
            .require("url");
        assert!(schema.validate(&json!({"url": null})).is_err());
    }

    #[test]
    fn enum_membership_is_checked() {
        let mut property = Property::string("direction");
        property.allowed = Some(vec![json!("up"), json!("down")]);
        let schema = Schema::object().property("direction", property);
        assert!(schema.validate(&json!({"direction": "up"})).is_ok());
        assert!(schema.validate(&json!({"direction": "sideways"})).is_err());
    }

    #[test]
    fn array_items_are_checked() {
        let mut property = Property::new(PropertyKind::Array);
        property.items = Some(Box::new(Property::new(PropertyKind::String)));
        let schema = Schema::object().property("tags", property);
        assert!(schema.validate(&json!({"tags": ["a", "b"]})).is_ok());
        let err = schema
            .validate(&json!({"tags": ["a", 7]}))
            .expect_err("non-string element");
        assert!(err.to_string().contains("tags[1]"));
    }

    #[test]
    fn projection_keeps_only_declared_keys() {
        let schema = fill_schema();
        let projected = schema.project(&json!({
            "element_id": 4,
            "text": "hello",
            "justification": "model-side field",
        }));
        assert_eq!(projected, json!({"element_id": 4, "text": "hello"}));
    }

    #[test]
    fn wire_form_carries_the_subset() {
        let schema = fill_schema();
        let wire = schema.to_json();
        assert_eq!(wire["type"], "object");
        assert_eq!(wire["properties"]["element_id"]["type"], "number");
        assert_eq!(wire["additionalProperties"], json!(false));
    }
}
