//! Static skill descriptors.
//!
//! The descriptor is the single source of truth for a skill's parameters:
//! the same structure drives argument validation and is surfaced verbatim
//! in the agent card so upstream orchestrators can form requests.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// One recognised parameter.
#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub default: Option<Value>,
    pub enum_values: Option<&'static [&'static str]>,
    /// Schema of array items / nested object fields.
    pub items: Option<Box<ParamSchema>>,
}

impl ParamField {
    pub fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            default: None,
            enum_values: None,
            items: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: &'static [&'static str]) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_items(mut self, schema: ParamSchema) -> Self {
        self.items = Some(Box::new(schema));
        self
    }
}

/// Recursive parameter schema (an object with named fields).
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    pub fields: Vec<ParamField>,
    pub required: Vec<&'static str>,
}

impl ParamSchema {
    pub fn new(fields: Vec<ParamField>, required: Vec<&'static str>) -> Self {
        Self { fields, required }
    }

    /// Renders the JSON-schema form served in the agent card.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(field.kind.type_name()));
            prop.insert("description".into(), json!(field.description));
            if let Some(default) = &field.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(values) = field.enum_values {
                prop.insert("enum".into(), json!(values));
            }
            if let Some(items) = &field.items {
                let key = if field.kind == ParamKind::Array {
                    "items"
                } else {
                    "properties"
                };
                match field.kind {
                    ParamKind::Array => {
                        prop.insert(key.into(), items.to_json());
                    }
                    _ => {
                        if let Value::Object(nested) = items.to_json() {
                            for (k, v) in nested {
                                prop.insert(k, v);
                            }
                        }
                    }
                }
            }
            properties.insert(field.name.to_string(), Value::Object(prop));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Static record describing one exposed operation.
#[derive(Debug, Clone)]
pub struct SkillDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: ParamSchema,
}

impl SkillDescriptor {
    /// Agent-card entry for this skill.
    pub fn card_entry(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_renders_json_schema_shape() {
        let schema = ParamSchema::new(
            vec![
                ParamField::new("url", ParamKind::String, "The URL to navigate to"),
                ParamField::new("timeout", ParamKind::Integer, "Timeout in ms")
                    .with_default(json!(30000)),
                ParamField::new("wait_until", ParamKind::String, "Completion condition")
                    .with_default(json!("load"))
                    .with_enum(&["domcontentloaded", "load", "networkidle"]),
            ],
            vec!["url"],
        );

        let rendered = schema.to_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"][0], "url");
        assert_eq!(rendered["properties"]["timeout"]["default"], 30000);
        assert_eq!(rendered["properties"]["wait_until"]["enum"][2], "networkidle");
    }

    #[test]
    fn nested_array_items_render() {
        let item = ParamSchema::new(
            vec![ParamField::new("selector", ParamKind::String, "Field selector")],
            vec!["selector"],
        );
        let schema = ParamSchema::new(
            vec![ParamField::new("fields", ParamKind::Array, "Fields to fill").with_items(item)],
            vec!["fields"],
        );

        let rendered = schema.to_json();
        assert_eq!(
            rendered["properties"]["fields"]["items"]["properties"]["selector"]["type"],
            "string"
        );
    }
}
