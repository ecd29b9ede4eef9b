//! Tool catalog: provider tool descriptors and their function-calling form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A tool as described by the tool provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<InputSchema>,
}

/// The parts of a JSON input schema the bridge forwards to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl InputSchema {
    /// Pick `properties` and `required` out of a raw schema, ignoring
    /// anything malformed.
    pub fn from_value(schema: &Value) -> Self {
        let properties = schema.get("properties").and_then(Value::as_object).cloned();
        let required = schema.get("required").and_then(Value::as_array).map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });
        Self {
            properties,
            required,
        }
    }
}

impl From<mcp::Tool> for ToolDescriptor {
    fn from(tool: mcp::Tool) -> Self {
        let input_schema = (!tool.input_schema.is_null())
            .then(|| InputSchema::from_value(&tool.input_schema));
        Self {
            name: tool.name,
            description: tool.description,
            input_schema,
        }
    }
}

/// The only kind of tool the function-calling convention knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecKind {
    #[default]
    Function,
}

/// The model-facing description of one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    #[serde(rename = "type", default)]
    pub kind: SpecKind,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: FunctionParameters,
}

/// Always an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl FunctionSpec {
    /// Project a descriptor, filling in whatever it leaves out.
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        let name = descriptor.name.clone();
        let description = descriptor
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Use the {name} tool"));
        let schema = descriptor.input_schema.clone().unwrap_or_default();

        Self {
            kind: SpecKind::Function,
            function: FunctionDef {
                name,
                description,
                parameters: FunctionParameters {
                    kind: "object".to_string(),
                    properties: schema.properties.unwrap_or_default(),
                    required: schema.required.unwrap_or_default(),
                },
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

impl From<&FunctionSpec> for ToolDescriptor {
    fn from(spec: &FunctionSpec) -> Self {
        Self {
            name: spec.function.name.clone(),
            description: Some(spec.function.description.clone()),
            input_schema: Some(InputSchema {
                properties: Some(spec.function.parameters.properties.clone()),
                required: Some(spec.function.parameters.required.clone()),
            }),
        }
    }
}

/// Convert provider descriptors into function-call specs, preserving order.
pub fn convert(descriptors: &[ToolDescriptor]) -> Vec<FunctionSpec> {
    descriptors
        .iter()
        .map(|descriptor| {
            let spec = FunctionSpec::from_descriptor(descriptor);
            debug!(
                tool = %spec.function.name,
                spec = %serde_json::to_string(&spec).unwrap_or_default(),
                "converted tool"
            );
            spec
        })
        .collect()
}
