//! Dependency-aware POML rendering
//!
//! [`Renderer::render`] delegates to the POML SDK when that capability is
//! available and falls back to the built-in parser otherwise, or when the
//! SDK fails. The two strategies are independent; their output is not
//! expected to match byte for byte.

pub mod fallback;
pub mod metadata;
pub mod sdk;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{Capabilities, Capability, CapabilityMap};
use crate::config::Config;
use crate::poml::{
    SubstitutionLog, Variables, VariablesOutcome, check_root, parse, parse_variables,
    substitute,
};
use crate::{Error, Result};

pub use metadata::{ComponentsFound, RenderMetadata, SdkUsage};
pub use sdk::{PomlCli, SdkBackend, SdkMessage};

/// Output formatting style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Section bodies joined as paragraphs
    #[default]
    Standard,
    /// Labeled sections in a fixed order
    Optimized,
    /// Sections annotated with tag name and length
    Debug,
}

impl RenderMode {
    /// All modes in display order
    pub const ALL: [Self; 3] = [Self::Standard, Self::Optimized, Self::Debug];

    /// Lowercase mode name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Optimized => "optimized",
            Self::Debug => "debug",
        }
    }
}

impl FromStr for RenderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "optimized" => Ok(Self::Optimized),
            "debug" => Ok(Self::Debug),
            other => Err(Error::Validation(format!(
                "unknown render mode '{other}' (expected standard, optimized or debug)"
            ))),
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One render invocation
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub markup: String,
    pub mode: RenderMode,
    pub variables: Variables,
    /// Failure from parsing the caller's variables JSON, reported in metadata
    pub variables_error: Option<String>,
    /// Character cap on the output; 0 means unlimited
    pub max_length: usize,
    /// Directory relative `src` paths resolve against
    pub base_dir: Option<PathBuf>,
}

impl RenderRequest {
    /// Request for `markup` in standard mode with no variables
    #[must_use]
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Take variables from a parsed JSON outcome, keeping its error for metadata
    #[must_use]
    pub fn variables_outcome(mut self, outcome: VariablesOutcome) -> Self {
        self.variables = outcome.variables;
        self.variables_error = outcome.error;
        self
    }

    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

/// Rendered prompt text plus what happened while producing it
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub text: String,
    pub metadata: RenderMetadata,
}

/// Renders POML using whatever capabilities are present
#[derive(Clone)]
pub struct Renderer {
    caps: Arc<dyn Capabilities>,
    sdk: Option<Arc<dyn SdkBackend>>,
    variables_schema: Option<Value>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("sdk", &self.sdk.as_ref().map(|s| s.name().to_string()))
            .field("variables_schema", &self.variables_schema)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Renderer with the given capabilities and no SDK backend
    #[must_use]
    pub fn new(caps: Arc<dyn Capabilities>) -> Self {
        Self {
            caps,
            sdk: None,
            variables_schema: None,
        }
    }

    /// Install the backend used when the SDK capability is available
    #[must_use]
    pub fn with_sdk(mut self, sdk: Arc<dyn SdkBackend>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    /// Schema variables JSON is validated against when validation is available
    #[must_use]
    pub fn with_variables_schema(mut self, schema: Value) -> Self {
        self.variables_schema = Some(schema);
        self
    }

    /// Probe the environment and wire up the SDK per configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let probe = config.probe_config();
        let caps = CapabilityMap::probe(&probe);
        let sdk = if caps.is_available(Capability::Sdk) {
            PomlCli::discover(&probe).map(|cli| match &config.sdk_args {
                Some(args) => cli.with_args(args.clone()),
                None => cli,
            })
        } else {
            None
        };

        let mut renderer = Self::new(Arc::new(caps));
        if let Some(cli) = sdk {
            tracing::info!(program = %cli.program().display(), "using POML SDK");
            renderer = renderer.with_sdk(Arc::new(cli));
        }
        if let Some(schema) = &config.variables_schema {
            renderer = renderer.with_variables_schema(schema.clone());
        }
        renderer
    }

    /// The capability map this renderer consults
    #[must_use]
    pub fn capabilities(&self) -> &dyn Capabilities {
        self.caps.as_ref()
    }

    /// Parse a variables JSON object, validating it when possible
    #[must_use]
    pub fn parse_variables(&self, json: &str) -> VariablesOutcome {
        parse_variables(json, self.caps.as_ref(), self.variables_schema.as_ref())
    }

    /// Render a request
    ///
    /// # Errors
    ///
    /// Returns a validation error if the markup lacks a `<poml>` root or
    /// (on the fallback path) is structurally malformed. SDK failures are
    /// never returned; they are noted in metadata.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderResult> {
        check_root(&request.markup)?;

        let mut metadata = RenderMetadata::new(request.mode, self.caps.as_ref());
        metadata.variables_error.clone_from(&request.variables_error);

        let text = match self.render_with_sdk(request, &mut metadata) {
            Some(text) => text,
            None => fallback::render(request, self.caps.as_ref(), &mut metadata)?,
        };

        let (text, original_length) = truncate(&text, request.max_length);
        if let Some(original) = original_length {
            metadata.truncated = true;
            metadata.original_length = Some(original);
        }
        metadata.prompt_length = text.chars().count();

        tracing::debug!(
            mode = %request.mode,
            sdk_used = ?metadata.sdk_used,
            sections = metadata.sections.len(),
            missing = metadata.variables_missing.len(),
            length = metadata.prompt_length,
            truncated = metadata.truncated,
            "rendered POML"
        );

        Ok(RenderResult { text, metadata })
    }

    fn render_with_sdk(
        &self,
        request: &RenderRequest,
        metadata: &mut RenderMetadata,
    ) -> Option<String> {
        if !self.caps.is_available(Capability::Sdk) {
            return None;
        }
        let sdk = self.sdk.as_ref()?;

        match sdk.render(&request.markup, &request.variables, request.base_dir.as_deref()) {
            Ok(messages) => {
                metadata.sdk_used = SdkUsage::Official;
                metadata.record_capability(Capability::Sdk);
                describe_for_sdk(request, metadata);
                // The SDK decides content; the mode still decides layout
                Some(sdk::layout(&messages, request.mode))
            }
            Err(e) => {
                tracing::warn!(backend = sdk.name(), error = %e, "POML SDK failed, falling back");
                metadata.sdk_error = Some(e.to_string());
                None
            }
        }
    }
}

/// Best-effort section and variable stats for SDK-rendered output
fn describe_for_sdk(request: &RenderRequest, metadata: &mut RenderMetadata) {
    let mut log = SubstitutionLog::default();
    substitute(&request.markup, &request.variables, &mut log);
    metadata.record_variables(&log);

    if let Ok(root) = parse(&request.markup) {
        let sections = root
            .elements()
            .filter(|e| e.tag != "let")
            .map(|e| e.tag.clone())
            .collect();
        metadata.sections = sections;
        metadata.components_found = ComponentsFound {
            role: root.find("role").is_some(),
            task: root.find("task").is_some(),
            examples: root.elements().filter(|e| e.tag == "example").count(),
            documents: root.elements().filter(|e| e.tag == "document").count(),
            tables: root.elements().filter(|e| e.tag == "table").count(),
            images: root
                .elements()
                .filter(|e| e.tag == "img" || e.tag == "image")
                .count(),
            output_format: root
                .elements()
                .any(|e| e.tag == "output-format" || e.tag == "output_format"),
        };
    }
}

/// Cap `text` at `max_length` characters
///
/// Returns the possibly shortened text and, when it was cut, the original
/// length. When there is room the cut is marked with `...`.
#[must_use]
pub fn truncate(text: &str, max_length: usize) -> (String, Option<usize>) {
    let length = text.chars().count();
    if max_length == 0 || length <= max_length {
        return (text.to_string(), None);
    }

    let cut = if max_length > 3 {
        let mut cut: String = text.chars().take(max_length - 3).collect();
        cut.push_str("...");
        cut
    } else {
        text.chars().take(max_length).collect()
    };
    (cut, Some(length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_is_case_insensitive() {
        assert_eq!("Optimized".parse::<RenderMode>().unwrap(), RenderMode::Optimized);
        assert!(matches!("fancy".parse::<RenderMode>(), Err(Error::Validation(_))));
    }

    #[test]
    fn truncate_respects_bound() {
        assert_eq!(truncate("hello", 0), ("hello".to_string(), None));
        assert_eq!(truncate("hello", 5), ("hello".to_string(), None));
        assert_eq!(truncate("hello world", 8), ("hello...".to_string(), Some(11)));
        assert_eq!(truncate("hello", 2), ("he".to_string(), Some(5)));
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let (text, original) = truncate("ééééé", 4);
        assert_eq!(text, "é...");
        assert_eq!(original, Some(5));
    }
}
