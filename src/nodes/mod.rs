//! Host-facing nodes
//!
//! Each node publishes a fixed [`NodeDescriptor`] and is invoked with a JSON
//! object of inputs. The renderer underneath stays usable on its own.

pub mod processor;
pub mod registry;
pub mod template;
pub mod types;

pub use processor::{PROCESSOR_NODE, ProcessorNode};
pub use registry::NodeRegistry;
pub use template::{TEMPLATE_NODE, TemplateNode};
pub use types::{
    InputKind, InputSchema, InputSpec, InvokeResult, NodeDescriptor, NodeInputs, OutputSpec,
};

use crate::Result;

/// A node type the host can register and call
pub trait Node: Send + Sync {
    /// Fixed registration record
    fn descriptor(&self) -> NodeDescriptor;

    /// Run the node, returning outputs in declaration order
    ///
    /// # Errors
    ///
    /// Returns an error for invalid markup or unknown selections
    fn invoke(&self, inputs: &NodeInputs) -> Result<Vec<String>>;
}
