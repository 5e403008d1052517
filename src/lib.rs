//! POML Nodes - Prompt markup rendering for node-graph hosts
//!
//! This library turns POML (Prompt Orchestration Markup Language) documents
//! into plain prompt text:
//! - Capability probing for the official SDK and optional ingestion backends
//! - Rendering through the SDK when installed, with a built-in fallback
//! - A library of ready-made prompt templates
//! - Processor and template nodes a host can register and invoke
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Host / CLI                         │
//! │   PomlProcessor node  │  PomlTemplate node           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Renderer                          │
//! │   SDK backend  │  Fallback (parse, build, layout)   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          Capabilities  │  Ingestion                  │
//! │   poml  │  tables  │  pdf  │  images  │  http       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod capabilities;
pub mod config;
pub mod error;
pub mod ingest;
pub mod nodes;
pub mod poml;
pub mod render;
pub mod templates;

pub use capabilities::{Capabilities, Capability, CapabilityMap, ProbeConfig};
pub use config::Config;
pub use error::{Error, Result};
pub use nodes::{InvokeResult, Node, NodeDescriptor, NodeRegistry};
pub use poml::{Variables, VariablesOutcome, parse_variables};
pub use render::{
    RenderMetadata, RenderMode, RenderRequest, RenderResult, Renderer, SdkBackend, SdkMessage,
    SdkUsage,
};
pub use templates::{DEFAULT_TEMPLATE, get_template};
