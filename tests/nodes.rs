//! Node integration tests
//!
//! Drives the processor and template nodes through the registry the way a host does

use std::sync::Arc;

use serde_json::{Value, json};

use poml_nodes::nodes::{PROCESSOR_NODE, TEMPLATE_NODE};
use poml_nodes::templates::{get_template, names};
use poml_nodes::{NodeRegistry, Renderer};

mod common;
use common::{MockSdk, bare_renderer, sdk_renderer};

fn registry_with(renderer: Renderer) -> NodeRegistry {
    NodeRegistry::with_defaults(Arc::new(renderer), None)
}

#[test]
fn processor_renders_markup_and_metadata() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(
        PROCESSOR_NODE,
        &json!({
            "poml_template": "<poml><role>Hi {{ user_name }}</role><task>Talk about {{ topic }}</task></poml>",
            "render_mode": "optimized",
            "variables_json": r#"{"user_name": "Ada", "topic": "engines"}"#,
        }),
    );

    assert!(result.ok, "{:?}", result.error);
    assert_eq!(result.outputs.len(), 2);
    assert_eq!(result.outputs[0], "Role: Hi Ada\n\nTask: Talk about engines");

    let meta: Value = serde_json::from_str(&result.outputs[1]).unwrap();
    assert_eq!(meta["mode"], "optimized");
    assert_eq!(meta["variables_used"], json!(["topic", "user_name"]));
}

#[test]
fn processor_truncates_to_max_length() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(
        PROCESSOR_NODE,
        &json!({
            "poml_template": "<poml><task>Write a very long and detailed essay</task></poml>",
            "max_length": 10,
        }),
    );

    assert!(result.ok);
    assert_eq!(result.outputs[0], "Write a...");
    let meta: Value = serde_json::from_str(&result.outputs[1]).unwrap();
    assert_eq!(meta["truncated"], true);
}

#[test]
fn processor_rejects_missing_root() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(PROCESSOR_NODE, &json!({"poml_template": "plain text"}));

    assert!(!result.ok);
    assert!(result.outputs.is_empty());
    assert!(result.error.unwrap().contains("poml"));
}

#[test]
fn processor_rejects_unknown_mode() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(PROCESSOR_NODE, &json!({"render_mode": "fancy"}));
    assert!(!result.ok);
}

#[test]
fn processor_reports_sdk_failure_in_metadata() {
    let registry = registry_with(sdk_renderer(MockSdk::failing("sdk crashed")));
    let result = registry.invoke(PROCESSOR_NODE, &json!({}));

    assert!(result.ok);
    let meta: Value = serde_json::from_str(&result.outputs[1]).unwrap();
    assert_eq!(meta["sdk_used"], "fallback");
    assert!(meta["sdk_error"].as_str().unwrap().contains("sdk crashed"));
}

#[test]
fn template_node_fills_variables() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(
        TEMPLATE_NODE,
        &json!({
            "template_name": "Customer Support",
            "template_variables": r#"{"company": "Acme"}"#,
        }),
    );

    assert!(result.ok, "{:?}", result.error);
    assert!(result.outputs[0].contains("Acme"));
    assert!(result.outputs[0].starts_with("<poml>"));
}

#[test]
fn template_node_returns_raw_template_for_bad_variables() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(
        TEMPLATE_NODE,
        &json!({"template_name": "Analysis", "template_variables": "not json"}),
    );

    assert!(result.ok);
    assert_eq!(result.outputs[0], get_template("Analysis").unwrap());
}

#[test]
fn template_node_rejects_unknown_name() {
    let registry = registry_with(bare_renderer());
    let result = registry.invoke(TEMPLATE_NODE, &json!({"template_name": "Poetry"}));

    assert!(!result.ok);
    assert!(result.error.unwrap().contains("Poetry"));
}

#[test]
fn every_template_renders_through_the_processor() {
    let registry = registry_with(bare_renderer());
    for name in names() {
        let template = get_template(name).unwrap();
        let result = registry.invoke(PROCESSOR_NODE, &json!({"poml_template": template}));
        assert!(result.ok, "{name}: {:?}", result.error);
        assert!(!result.outputs[0].is_empty(), "{name} rendered empty");
    }
}

#[test]
fn descriptors_serialize_for_the_host() {
    let registry = registry_with(bare_renderer());
    let descriptors = serde_json::to_value(registry.descriptors()).unwrap();

    let processor = descriptors
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == PROCESSOR_NODE)
        .unwrap();
    assert_eq!(processor["category"], "POML");
    assert_eq!(processor["outputs"][0]["name"], "rendered_prompt");

    let required = processor["inputs"]["required"].as_array().unwrap();
    assert_eq!(required[1]["name"], "render_mode");
    assert_eq!(required[1]["type"], "COMBO");
    assert_eq!(
        required[1]["options"],
        json!(["standard", "optimized", "debug"])
    );
}
