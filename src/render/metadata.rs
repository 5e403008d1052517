//! Per-call render metadata

use std::collections::BTreeMap;

use serde::Serialize;

use crate::capabilities::{Capabilities, Capability};
use crate::poml::{Document, SubstitutionLog};

use super::RenderMode;

/// Which strategy produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkUsage {
    Official,
    Fallback,
}

/// Section counts found in the markup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentsFound {
    pub role: bool,
    pub task: bool,
    pub examples: usize,
    pub documents: usize,
    pub tables: usize,
    pub images: usize,
    pub output_format: bool,
}

/// Everything a caller may want to know about one render
#[derive(Debug, Clone, Serialize)]
pub struct RenderMetadata {
    pub mode: RenderMode,
    pub sdk_used: SdkUsage,
    /// Section tags in document order
    pub sections: Vec<String>,
    pub components_found: ComponentsFound,
    pub variables_used: Vec<String>,
    pub variables_missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_error: Option<String>,
    pub prompt_length: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_length: Option<usize>,
    pub capabilities_used: Vec<&'static str>,
    pub dependencies_status: BTreeMap<&'static str, bool>,
    pub features_available: BTreeMap<&'static str, bool>,
}

impl RenderMetadata {
    /// Fresh metadata for a call in `mode`
    #[must_use]
    pub fn new(mode: RenderMode, caps: &dyn Capabilities) -> Self {
        Self {
            mode,
            sdk_used: SdkUsage::Fallback,
            sections: Vec::new(),
            components_found: ComponentsFound::default(),
            variables_used: Vec::new(),
            variables_missing: Vec::new(),
            variables_error: None,
            sdk_error: None,
            prompt_length: 0,
            truncated: false,
            original_length: None,
            capabilities_used: Vec::new(),
            dependencies_status: Capability::ALL
                .into_iter()
                .map(|c| (c.name(), caps.is_available(c)))
                .collect(),
            features_available: Capability::ALL
                .into_iter()
                .map(|c| (c.feature(), caps.is_available(c)))
                .collect(),
        }
    }

    pub(crate) fn record_document(&mut self, document: &Document) {
        self.sections = document
            .sections
            .iter()
            .map(|s| s.tag().to_string())
            .collect();
        self.components_found = ComponentsFound {
            role: document.has("role"),
            task: document.has("task"),
            examples: document.count("example"),
            documents: document.count("document"),
            tables: document.count("table"),
            images: document.count("img"),
            output_format: document.has("output-format"),
        };
    }

    pub(crate) fn record_variables(&mut self, log: &SubstitutionLog) {
        self.variables_used = log.used.iter().cloned().collect();
        self.variables_missing = log.unresolved();
    }

    pub(crate) fn record_capability(&mut self, capability: Capability) {
        if !self.capabilities_used.contains(&capability.name()) {
            self.capabilities_used.push(capability.name());
        }
    }

    /// Pretty JSON for the host-facing metadata output
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize render metadata");
            "{}".to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityMap;

    #[test]
    fn optional_fields_are_omitted_when_unset() {
        let meta = RenderMetadata::new(RenderMode::Standard, &CapabilityMap::none());
        let json: serde_json::Value = serde_json::from_str(&meta.to_json_pretty()).unwrap();
        assert_eq!(json["mode"], "standard");
        assert_eq!(json["sdk_used"], "fallback");
        assert!(json.get("sdk_error").is_none());
        assert!(json.get("original_length").is_none());
        assert_eq!(json["features_available"]["official_poml_sdk"], false);
        assert_eq!(json["dependencies_status"]["poml"], false);
    }

    #[test]
    fn capabilities_are_recorded_once() {
        let mut meta = RenderMetadata::new(RenderMode::Debug, &CapabilityMap::all());
        meta.record_capability(Capability::Tables);
        meta.record_capability(Capability::Tables);
        assert_eq!(meta.capabilities_used, vec!["tables"]);
    }
}
