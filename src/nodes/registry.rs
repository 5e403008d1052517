//! Registry of node types exposed to the host

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::Error;
use crate::render::Renderer;

use super::Node;
use super::processor::ProcessorNode;
use super::template::TemplateNode;
use super::types::{InvokeResult, NodeDescriptor, NodeInputs};

/// Node types keyed by registration name
#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Box<dyn Node>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the processor and template nodes
    #[must_use]
    pub fn with_defaults(renderer: Arc<Renderer>, base_dir: Option<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ProcessorNode::new(renderer.clone(), base_dir)));
        registry.register(Box::new(TemplateNode::new(renderer)));
        registry
    }

    /// Register a node, replacing any node with the same name
    pub fn register(&mut self, node: Box<dyn Node>) {
        let name = node.descriptor().name;
        if self.nodes.insert(name.clone(), node).is_some() {
            tracing::warn!(node = %name, "replaced existing node registration");
        } else {
            tracing::debug!(node = %name, "registered node");
        }
    }

    /// Get a node by registration name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Node> {
        self.nodes.get(name).map(Box::as_ref)
    }

    /// Descriptors of every registered node
    #[must_use]
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes.values().map(|n| n.descriptor()).collect()
    }

    /// `name -> display name` for host menus
    #[must_use]
    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.descriptors()
            .into_iter()
            .map(|d| (d.name, d.display_name))
            .collect()
    }

    /// Invoke a node with raw JSON inputs
    ///
    /// Failures never escape as errors; they come back with `ok = false`.
    #[must_use]
    pub fn invoke(&self, name: &str, inputs: &Value) -> InvokeResult {
        let Some(node) = self.get(name) else {
            return InvokeResult::failure(&Error::NotFound(format!("node '{name}'")));
        };

        let result = NodeInputs::resolve(&node.descriptor(), inputs)
            .and_then(|inputs| node.invoke(&inputs));
        match result {
            Ok(outputs) => InvokeResult::success(outputs),
            Err(e) => {
                tracing::warn!(node = name, error = %e, "node invocation failed");
                InvokeResult::failure(&e)
            }
        }
    }

    /// Number of registered nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no nodes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
