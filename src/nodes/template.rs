//! Template node: picks a prebuilt template and fills in variables

use std::sync::Arc;

use crate::Result;
use crate::poml::substitute_str;
use crate::render::Renderer;
use crate::templates::{DEFAULT_TEMPLATE, get_template, names};

use super::Node;
use super::types::{CATEGORY, InputSchema, InputSpec, NodeDescriptor, NodeInputs, OutputSpec};

/// Registration name of the template node
pub const TEMPLATE_NODE: &str = "PomlTemplate";

const DEFAULT_VARIABLES: &str =
    r#"{"analysis_type": "business intelligence", "data_type": "quarterly reports"}"#;

/// Emits a library template, with variables substituted where given
pub struct TemplateNode {
    renderer: Arc<Renderer>,
}

impl TemplateNode {
    #[must_use]
    pub const fn new(renderer: Arc<Renderer>) -> Self {
        Self { renderer }
    }
}

impl Node for TemplateNode {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            name: TEMPLATE_NODE.to_string(),
            display_name: "POML Template".to_string(),
            category: CATEGORY.to_string(),
            function: "get_template".to_string(),
            inputs: InputSchema {
                required: vec![InputSpec::combo("template_name", &names(), DEFAULT_TEMPLATE)],
                optional: vec![InputSpec::string(
                    "template_variables",
                    true,
                    DEFAULT_VARIABLES,
                    Some("JSON with template-specific variables"),
                )],
            },
            outputs: vec![OutputSpec::string("poml_template")],
        }
    }

    fn invoke(&self, inputs: &NodeInputs) -> Result<Vec<String>> {
        let template = get_template(inputs.str("template_name"))?;

        let outcome = self.renderer.parse_variables(inputs.str("template_variables"));
        if let Some(error) = &outcome.error {
            tracing::debug!(%error, "template variables invalid, returning template as-is");
            return Ok(vec![template.to_string()]);
        }

        Ok(vec![substitute_str(template, &outcome.variables)])
    }
}
