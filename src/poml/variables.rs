//! `{{ variable }}` substitution and variables JSON parsing

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::capabilities::{Capabilities, Capability};

/// Per-call variable mapping
pub type Variables = serde_json::Map<String, Value>;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid regex"));

/// Which placeholders were resolved and which were left verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionLog {
    pub used: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

impl SubstitutionLog {
    /// Placeholders that never resolved anywhere in the call
    #[must_use]
    pub fn unresolved(&self) -> Vec<String> {
        self.missing.difference(&self.used).cloned().collect()
    }
}

/// Replace every `{{ name }}` with its value from `variables`
///
/// Unknown names are left exactly as written and recorded as missing.
pub fn substitute(text: &str, variables: &Variables, log: &mut SubstitutionLog) -> String {
    PLACEHOLDER_REGEX
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            if name.is_empty() {
                return caps[0].to_string();
            }
            match variables.get(name) {
                Some(value) => {
                    log.used.insert(name.to_string());
                    value_to_string(value)
                }
                None => {
                    log.missing.insert(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Substitute without tracking
#[must_use]
pub fn substitute_str(text: &str, variables: &Variables) -> String {
    substitute(text, variables, &mut SubstitutionLog::default())
}

/// Render a JSON value the way it appears in prompt text
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Result of parsing a variables JSON string
#[derive(Debug, Clone, Default)]
pub struct VariablesOutcome {
    pub variables: Variables,
    /// Parse or validation failure; `variables` is empty when set
    pub error: Option<String>,
}

/// Schema applied to variables when no other schema is configured
#[must_use]
pub fn default_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "additionalProperties": true
    })
}

/// Parse a variables JSON object
///
/// Never fails: malformed input yields an empty mapping and an error note.
/// Schema validation runs only when that capability is available.
#[must_use]
pub fn parse_variables(
    json: &str,
    caps: &dyn Capabilities,
    schema: Option<&Value>,
) -> VariablesOutcome {
    if json.trim().is_empty() {
        return VariablesOutcome::default();
    }

    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => return failed(format!("Invalid JSON: {e}")),
    };

    if caps.is_available(Capability::SchemaValidation) {
        let fallback = default_schema();
        if let Err(e) = validate_schema(schema.unwrap_or(&fallback), &value) {
            return failed(e);
        }
    }

    match value {
        Value::Object(variables) => VariablesOutcome {
            variables,
            error: None,
        },
        other => failed(format!(
            "variables must be a JSON object, got {}",
            json_type_name(&other)
        )),
    }
}

fn failed(error: String) -> VariablesOutcome {
    tracing::debug!(%error, "variables rejected, rendering without substitutions");
    VariablesOutcome {
        variables: Variables::new(),
        error: Some(error),
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(feature = "schema")]
fn validate_schema(schema: &Value, value: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("invalid variables schema: {e}"))?;
    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("JSON schema validation failed: {}", errors.join("; ")))
    }
}

#[cfg(not(feature = "schema"))]
#[allow(clippy::unnecessary_wraps)]
const fn validate_schema(_schema: &Value, _value: &Value) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityMap;

    fn vars(json: &str) -> Variables {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn substitutes_known_placeholder() {
        let mut log = SubstitutionLog::default();
        let out = substitute("{{ x }}", &vars(r#"{"x": "hi"}"#), &mut log);
        assert_eq!(out, "hi");
        assert!(log.used.contains("x"));
        assert!(log.missing.is_empty());
    }

    #[test]
    fn unknown_placeholder_stays_verbatim() {
        let mut log = SubstitutionLog::default();
        let out = substitute("say {{ x }}!", &Variables::new(), &mut log);
        assert_eq!(out, "say {{ x }}!");
        assert_eq!(log.unresolved(), vec!["x".to_string()]);
    }

    #[test]
    fn whitespace_variants_resolve() {
        let v = vars(r#"{"name": "Ada"}"#);
        assert_eq!(substitute_str("{{name}} {{  name  }}", &v), "Ada Ada");
    }

    #[test]
    fn scalars_render_plainly() {
        let v = vars(r#"{"n": 3, "b": true, "z": null, "l": [1, 2]}"#);
        assert_eq!(substitute_str("{{n}} {{b}} [{{z}}] {{l}}", &v), "3 true [] [1,2]");
    }

    #[test]
    fn empty_braces_are_not_placeholders() {
        let mut log = SubstitutionLog::default();
        assert_eq!(substitute("{{ }}", &Variables::new(), &mut log), "{{ }}");
        assert!(log.missing.is_empty());
    }

    #[test]
    fn malformed_json_is_recorded_not_raised() {
        let outcome = parse_variables("{not json", &CapabilityMap::none(), None);
        assert!(outcome.variables.is_empty());
        assert!(outcome.error.unwrap().starts_with("Invalid JSON"));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let outcome = parse_variables("[1, 2]", &CapabilityMap::none(), None);
        assert!(outcome.error.unwrap().contains("array"));
    }

    #[test]
    fn blank_input_is_empty_mapping() {
        let outcome = parse_variables("  ", &CapabilityMap::none(), None);
        assert!(outcome.variables.is_empty());
        assert!(outcome.error.is_none());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn custom_schema_is_enforced() {
        let caps = CapabilityMap::none().with(Capability::SchemaValidation, true);
        let schema = serde_json::json!({
            "type": "object",
            "required": ["topic"]
        });
        let outcome = parse_variables(r#"{"user": "x"}"#, &caps, Some(&schema));
        assert!(outcome.error.unwrap().contains("schema validation failed"));

        let outcome = parse_variables(r#"{"topic": "AI"}"#, &caps, Some(&schema));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.variables["topic"], "AI");
    }
}
