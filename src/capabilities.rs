//! Optional capability probing
//!
//! Every optional processing backend (the POML SDK, table parsing, PDF
//! extraction, image inspection, HTTP fetching and schema validation) is
//! probed once at startup. The resulting [`CapabilityMap`] is immutable and
//! handed to the renderer through the [`Capabilities`] trait, so rendering
//! code never checks for a backend on its own.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Executable name of the external POML SDK command line
pub const SDK_BINARY: &str = "poml";

/// Executable used for PDF text extraction
pub const PDF_BINARY: &str = "pdftotext";

/// An optional backend the renderer can use when present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Official POML SDK (external executable)
    Sdk,
    /// CSV table parsing
    Tables,
    /// PDF text extraction
    Pdf,
    /// Local image inspection
    Images,
    /// Fetching `http(s)` sources
    Http,
    /// JSON schema validation of variables
    SchemaValidation,
}

impl Capability {
    /// All capabilities in probe order
    pub const ALL: [Self; 6] = [
        Self::Sdk,
        Self::Tables,
        Self::Pdf,
        Self::Images,
        Self::Http,
        Self::SchemaValidation,
    ];

    /// Dependency name as reported in render metadata
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sdk => "poml",
            Self::Tables => "tables",
            Self::Pdf => "pdf",
            Self::Images => "images",
            Self::Http => "http",
            Self::SchemaValidation => "jsonschema",
        }
    }

    /// Feature name as reported under `features_available`
    #[must_use]
    pub const fn feature(self) -> &'static str {
        match self {
            Self::Sdk => "official_poml_sdk",
            Self::Tables => "advanced_tables",
            Self::Pdf => "pdf_processing",
            Self::Images => "image_processing",
            Self::Http => "external_data",
            Self::SchemaValidation => "json_validation",
        }
    }

    /// Parse a dependency name (case-insensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name || c.feature() == name)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only capability query injected into the renderer
pub trait Capabilities: Send + Sync {
    /// Whether the given capability can be used
    fn is_available(&self, capability: Capability) -> bool;
}

/// Inputs to the startup probe
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Explicit path to the SDK executable (skips `PATH` lookup)
    pub sdk_bin: Option<PathBuf>,
    /// Capabilities to treat as absent regardless of the environment
    pub disabled: Vec<Capability>,
}

/// Immutable availability map established once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMap {
    available: BTreeMap<Capability, bool>,
}

impl CapabilityMap {
    /// Probe every optional backend
    ///
    /// Never fails: a missing backend is logged and recorded as unavailable.
    #[must_use]
    pub fn probe(config: &ProbeConfig) -> Self {
        let mut available = BTreeMap::new();

        for capability in Capability::ALL {
            let present = if config.disabled.contains(&capability) {
                tracing::debug!(%capability, "capability disabled by configuration");
                false
            } else {
                probe_one(capability, config)
            };

            if present {
                tracing::debug!(%capability, "capability available");
            } else {
                tracing::warn!(%capability, "{}", missing_hint(capability));
            }
            available.insert(capability, present);
        }

        Self { available }
    }

    /// A map with every capability absent
    #[must_use]
    pub fn none() -> Self {
        Self {
            available: Capability::ALL.into_iter().map(|c| (c, false)).collect(),
        }
    }

    /// A map with every capability present
    #[must_use]
    pub fn all() -> Self {
        Self {
            available: Capability::ALL.into_iter().map(|c| (c, true)).collect(),
        }
    }

    /// Copy of this map with one capability set
    #[must_use]
    pub fn with(mut self, capability: Capability, present: bool) -> Self {
        self.available.insert(capability, present);
        self
    }

    /// Query by dependency name; unknown names are unavailable
    #[must_use]
    pub fn is_available_by_name(&self, name: &str) -> bool {
        Capability::from_name(name).is_some_and(|c| self.is_available(c))
    }

    /// `dependency name -> available` view for metadata
    #[must_use]
    pub fn dependency_status(&self) -> BTreeMap<&'static str, bool> {
        self.available.iter().map(|(c, ok)| (c.name(), *ok)).collect()
    }

    /// `feature name -> available` view for metadata
    #[must_use]
    pub fn features(&self) -> BTreeMap<&'static str, bool> {
        self.available.iter().map(|(c, ok)| (c.feature(), *ok)).collect()
    }
}

impl Capabilities for CapabilityMap {
    fn is_available(&self, capability: Capability) -> bool {
        self.available.get(&capability).copied().unwrap_or(false)
    }
}

/// Locate the SDK executable, preferring an explicitly configured path
#[must_use]
pub fn locate_sdk(config: &ProbeConfig) -> Option<PathBuf> {
    match &config.sdk_bin {
        Some(path) if path.is_file() => Some(path.clone()),
        Some(path) => {
            tracing::warn!(path = %path.display(), "configured POML SDK path does not exist");
            None
        }
        None => which::which(SDK_BINARY).ok(),
    }
}

fn probe_one(capability: Capability, config: &ProbeConfig) -> bool {
    match capability {
        Capability::Sdk => locate_sdk(config).is_some(),
        Capability::Pdf => which::which(PDF_BINARY).is_ok(),
        Capability::Tables => cfg!(feature = "tables"),
        Capability::Images => cfg!(feature = "images"),
        Capability::Http => cfg!(feature = "http"),
        Capability::SchemaValidation => cfg!(feature = "schema"),
    }
}

const fn missing_hint(capability: Capability) -> &'static str {
    match capability {
        Capability::Sdk => "POML SDK not available, using fallback parser",
        Capability::Tables => "table support not compiled in, using plain CSV splitting",
        Capability::Pdf => "pdftotext not found, PDF processing disabled",
        Capability::Images => "image support not compiled in, image inspection disabled",
        Capability::Http => "http support not compiled in, external data fetching disabled",
        Capability::SchemaValidation => "schema support not compiled in, JSON validation disabled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_reports_everything_absent() {
        let caps = CapabilityMap::none();
        for c in Capability::ALL {
            assert!(!caps.is_available(c));
        }
        assert!(caps.dependency_status().values().all(|v| !v));
    }

    #[test]
    fn with_overrides_single_entry() {
        let caps = CapabilityMap::none().with(Capability::Tables, true);
        assert!(caps.is_available(Capability::Tables));
        assert!(!caps.is_available(Capability::Sdk));
    }

    #[test]
    fn lookup_by_name_accepts_both_views() {
        let caps = CapabilityMap::none().with(Capability::Sdk, true);
        assert!(caps.is_available_by_name("poml"));
        assert!(caps.is_available_by_name("official_poml_sdk"));
        assert!(!caps.is_available_by_name("pandas"));
    }

    #[test]
    fn disabled_capabilities_are_never_probed_present() {
        let config = ProbeConfig {
            sdk_bin: None,
            disabled: Capability::ALL.to_vec(),
        };
        assert_eq!(CapabilityMap::probe(&config), CapabilityMap::none());
    }

    #[test]
    fn compiled_features_follow_cargo_features() {
        let caps = CapabilityMap::probe(&ProbeConfig::default());
        assert_eq!(caps.is_available(Capability::Tables), cfg!(feature = "tables"));
        assert_eq!(caps.is_available(Capability::Http), cfg!(feature = "http"));
    }

    #[test]
    fn missing_sdk_path_is_unavailable() {
        let config = ProbeConfig {
            sdk_bin: Some(PathBuf::from("/nonexistent/poml-sdk-xyz")),
            disabled: vec![],
        };
        assert!(locate_sdk(&config).is_none());
        assert!(!CapabilityMap::probe(&config).is_available(Capability::Sdk));
    }
}
