//! TOML configuration file loading
//!
//! Supports `~/.config/poml/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PomlConfigFile {
    /// External SDK settings
    #[serde(default)]
    pub sdk: SdkFileConfig,

    /// Render defaults
    #[serde(default)]
    pub render: RenderFileConfig,

    /// Capability overrides
    #[serde(default)]
    pub capabilities: CapabilitiesFileConfig,

    /// Variables JSON validation
    #[serde(default)]
    pub variables: VariablesFileConfig,
}

/// POML SDK configuration
#[derive(Debug, Default, Deserialize)]
pub struct SdkFileConfig {
    /// Use the SDK when it is installed (default true)
    pub enabled: Option<bool>,

    /// Path to the SDK executable (default: `poml` on PATH)
    pub bin: Option<String>,

    /// Extra arguments passed to the SDK
    pub args: Option<Vec<String>>,
}

/// Render defaults
#[derive(Debug, Default, Deserialize)]
pub struct RenderFileConfig {
    /// Default render mode ("standard", "optimized", "debug")
    pub mode: Option<String>,

    /// Default character cap (0 = unlimited)
    pub max_length: Option<usize>,

    /// Directory relative `src` attributes resolve against
    pub base_dir: Option<String>,
}

/// Capability overrides
#[derive(Debug, Default, Deserialize)]
pub struct CapabilitiesFileConfig {
    /// Capabilities to treat as absent (e.g. `["pdf", "http"]`)
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Variables validation configuration
#[derive(Debug, Default, Deserialize)]
pub struct VariablesFileConfig {
    /// Path to a JSON schema variables must satisfy
    pub schema: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `PomlConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> PomlConfigFile {
    let Some(path) = config_file_path() else {
        return PomlConfigFile::default();
    };

    if !path.exists() {
        return PomlConfigFile::default();
    }

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path, falling back to defaults
pub fn load_config_file_from(path: &Path) -> PomlConfigFile {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                PomlConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            PomlConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/poml/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("poml").join("config.toml"))
}
