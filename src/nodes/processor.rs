//! Processor node: POML markup in, rendered prompt and metadata out

use std::path::PathBuf;
use std::sync::Arc;

use crate::Result;
use crate::render::{RenderMode, RenderRequest, Renderer};

use super::Node;
use super::types::{CATEGORY, InputSchema, InputSpec, NodeDescriptor, NodeInputs, OutputSpec};

/// Registration name of the processor node
pub const PROCESSOR_NODE: &str = "PomlProcessor";

/// Largest `max_length` the host widget allows
pub const MAX_LENGTH_LIMIT: i64 = 8000;

const DEFAULT_MARKUP: &str = "<poml>
<role>You are a helpful AI assistant.</role>
<task>Assist the user with their request in a clear and helpful manner.</task>
<output-format>Provide a well-structured, informative response.</output-format>
</poml>";

const DEFAULT_VARIABLES: &str = r#"{"user_name": "User", "topic": "AI"}"#;

/// Renders POML markup through the shared renderer
pub struct ProcessorNode {
    renderer: Arc<Renderer>,
    base_dir: Option<PathBuf>,
}

impl ProcessorNode {
    #[must_use]
    pub const fn new(renderer: Arc<Renderer>, base_dir: Option<PathBuf>) -> Self {
        Self { renderer, base_dir }
    }
}

impl Node for ProcessorNode {
    fn descriptor(&self) -> NodeDescriptor {
        let modes: Vec<&str> = RenderMode::ALL.iter().map(|m| m.as_str()).collect();
        NodeDescriptor {
            name: PROCESSOR_NODE.to_string(),
            display_name: "POML Processor".to_string(),
            category: CATEGORY.to_string(),
            function: "process_poml".to_string(),
            inputs: InputSchema {
                required: vec![
                    InputSpec::string("poml_template", true, DEFAULT_MARKUP, None),
                    InputSpec::combo("render_mode", &modes, RenderMode::Standard.as_str()),
                ],
                optional: vec![
                    InputSpec::string(
                        "variables_json",
                        true,
                        DEFAULT_VARIABLES,
                        Some("JSON object with template variables"),
                    ),
                    InputSpec::int("max_length", 0, 0, MAX_LENGTH_LIMIT, 100),
                ],
            },
            outputs: vec![
                OutputSpec::string("rendered_prompt"),
                OutputSpec::string("metadata"),
            ],
        }
    }

    fn invoke(&self, inputs: &NodeInputs) -> Result<Vec<String>> {
        let mode: RenderMode = inputs.str("render_mode").parse()?;
        let outcome = self.renderer.parse_variables(inputs.str("variables_json"));
        let max_length = usize::try_from(inputs.int("max_length")).unwrap_or(0);

        let mut request = RenderRequest::new(inputs.str("poml_template"))
            .mode(mode)
            .variables_outcome(outcome)
            .max_length(max_length);
        if let Some(dir) = &self.base_dir {
            request = request.base_dir(dir);
        }

        let result = self.renderer.render(&request)?;
        Ok(vec![result.text, result.metadata.to_json_pretty()])
    }
}
