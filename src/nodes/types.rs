//! Node descriptor and invocation types
//!
//! Descriptors are the fixed registration record a node-graph host reads:
//! display name, category, typed inputs and typed outputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Category every POML node is filed under
pub const CATEGORY: &str = "POML";

/// Type and widget options of one node input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum InputKind {
    /// Free text
    String {
        multiline: bool,
        default: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tooltip: Option<String>,
    },
    /// One of a fixed list of strings
    Combo { options: Vec<String>, default: String },
    /// Bounded integer
    Int {
        default: i64,
        min: i64,
        max: i64,
        step: i64,
    },
}

/// A named node input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: InputKind,
}

impl InputSpec {
    #[must_use]
    pub fn string(name: &str, multiline: bool, default: &str, tooltip: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind: InputKind::String {
                multiline,
                default: default.to_string(),
                tooltip: tooltip.map(ToString::to_string),
            },
        }
    }

    #[must_use]
    pub fn combo(name: &str, options: &[&str], default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: InputKind::Combo {
                options: options.iter().map(ToString::to_string).collect(),
                default: default.to_string(),
            },
        }
    }

    #[must_use]
    pub fn int(name: &str, default: i64, min: i64, max: i64, step: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: InputKind::Int {
                default,
                min,
                max,
                step,
            },
        }
    }

    fn default_value(&self) -> Value {
        match &self.kind {
            InputKind::String { default, .. } | InputKind::Combo { default, .. } => {
                Value::String(default.clone())
            }
            InputKind::Int { default, .. } => Value::from(*default),
        }
    }

    /// Check a supplied value against this input's type
    fn accept(&self, value: &Value) -> Result<Value> {
        match (&self.kind, value) {
            (InputKind::String { .. } | InputKind::Combo { .. }, Value::String(_)) => {
                Ok(value.clone())
            }
            (InputKind::Int { min, max, .. }, Value::Number(n)) => {
                let n = n.as_i64().ok_or_else(|| {
                    Error::NodeInput(format!("'{}' must be an integer", self.name))
                })?;
                if n < *min || n > *max {
                    return Err(Error::NodeInput(format!(
                        "'{}' must be between {min} and {max}, got {n}",
                        self.name
                    )));
                }
                Ok(Value::from(n))
            }
            (InputKind::Int { .. }, _) => Err(Error::NodeInput(format!(
                "'{}' must be an integer",
                self.name
            ))),
            (_, _) => Err(Error::NodeInput(format!("'{}' must be a string", self.name))),
        }
    }
}

/// Required and optional inputs of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    pub required: Vec<InputSpec>,
    #[serde(default)]
    pub optional: Vec<InputSpec>,
}

/// A named node output; every POML output is a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl OutputSpec {
    #[must_use]
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "STRING".to_string(),
        }
    }
}

/// Registration record for one node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Stable identifier the host registers the node under
    pub name: String,
    pub display_name: String,
    pub category: String,
    /// Entry point name the host calls
    pub function: String,
    pub inputs: InputSchema,
    pub outputs: Vec<OutputSpec>,
}

/// Inputs of one invocation, type-checked and with defaults filled in
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: Map<String, Value>,
}

impl NodeInputs {
    /// Check raw host inputs against a descriptor
    ///
    /// Optional inputs and required inputs with a default may be omitted.
    /// Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::NodeInput` if `raw` is not an object or a value has
    /// the wrong type or is out of range
    pub fn resolve(descriptor: &NodeDescriptor, raw: &Value) -> Result<Self> {
        let empty = Map::new();
        let raw = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(Error::NodeInput("inputs must be a JSON object".to_string())),
        };

        let mut values = Map::new();
        let specs = descriptor
            .inputs
            .required
            .iter()
            .chain(&descriptor.inputs.optional);
        for spec in specs {
            let value = match raw.get(&spec.name) {
                Some(Value::Null) | None => spec.default_value(),
                Some(value) => spec.accept(value)?,
            };
            values.insert(spec.name.clone(), value);
        }

        Ok(Self { values })
    }

    /// String input by name
    #[must_use]
    pub fn str(&self, name: &str) -> &str {
        self.values.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// Integer input by name
    #[must_use]
    pub fn int(&self, name: &str) -> i64 {
        self.values.get(name).and_then(Value::as_i64).unwrap_or(0)
    }
}

/// Result of invoking a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvokeResult {
    pub ok: bool,
    /// Output values in declaration order
    #[serde(default)]
    pub outputs: Vec<String>,
    pub error: Option<String>,
}

impl InvokeResult {
    #[must_use]
    pub const fn success(outputs: Vec<String>) -> Self {
        Self {
            ok: true,
            outputs,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: &Error) -> Self {
        Self {
            ok: false,
            outputs: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> NodeDescriptor {
        NodeDescriptor {
            name: "Test".to_string(),
            display_name: "Test".to_string(),
            category: CATEGORY.to_string(),
            function: "run".to_string(),
            inputs: InputSchema {
                required: vec![InputSpec::string("text", true, "hi", None)],
                optional: vec![InputSpec::int("limit", 0, 0, 10, 1)],
            },
            outputs: vec![OutputSpec::string("out")],
        }
    }

    #[test]
    fn defaults_fill_missing_inputs() {
        let inputs = NodeInputs::resolve(&descriptor(), &serde_json::json!({})).unwrap();
        assert_eq!(inputs.str("text"), "hi");
        assert_eq!(inputs.int("limit"), 0);
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = NodeInputs::resolve(&descriptor(), &serde_json::json!({"text": 5})).unwrap_err();
        assert!(err.to_string().contains("'text' must be a string"));
        let err =
            NodeInputs::resolve(&descriptor(), &serde_json::json!({"limit": "3"})).unwrap_err();
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn int_bounds_are_enforced() {
        let err =
            NodeInputs::resolve(&descriptor(), &serde_json::json!({"limit": 11})).unwrap_err();
        assert!(err.to_string().contains("between 0 and 10"));
    }

    #[test]
    fn descriptor_serializes_host_types() {
        let json = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(json["inputs"]["required"][0]["type"], "STRING");
        assert_eq!(json["inputs"]["optional"][0]["type"], "INT");
        assert_eq!(json["outputs"][0]["type"], "STRING");
        let back: NodeDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor());
    }
}
