//! Configuration management for the POML renderer

pub mod file;

use std::path::PathBuf;

use serde_json::Value;

use crate::capabilities::{Capability, ProbeConfig};
use crate::render::RenderMode;
use crate::{Error, Result};

pub use file::{PomlConfigFile, config_file_path, load_config_file};

/// Renderer configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Explicit SDK executable, bypassing the `PATH` lookup
    pub sdk_bin: Option<PathBuf>,

    /// Arguments passed to the SDK in place of the defaults
    pub sdk_args: Option<Vec<String>>,

    /// Never delegate to the SDK, even when installed
    pub disable_sdk: bool,

    /// Capabilities to treat as absent
    pub disabled: Vec<Capability>,

    /// Mode used when a caller does not pick one
    pub default_mode: RenderMode,

    /// Default character cap (0 = unlimited)
    pub max_length: usize,

    /// Directory relative `src` attributes resolve against
    pub base_dir: Option<PathBuf>,

    /// JSON schema variables must satisfy
    pub variables_schema: Option<Value>,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or the schema file cannot be read
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or the schema file cannot be read
    pub fn from_sources<F>(fc: PomlConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // SDK
        let sdk_bin = env("POML_SDK_BIN").or(fc.sdk.bin).map(PathBuf::from);

        let sdk_args = env("POML_SDK_ARGS")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .or(fc.sdk.args);

        let disable_sdk = env("POML_DISABLE_SDK")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or_else(|| fc.sdk.enabled.map(|enabled| !enabled))
            .unwrap_or(false);

        // Capabilities turned off by name
        let disabled_names: Vec<String> = env("POML_DISABLE").map_or(fc.capabilities.disabled, |v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        });
        let mut disabled = Vec::with_capacity(disabled_names.len());
        for name in &disabled_names {
            let capability = Capability::from_name(name)
                .ok_or_else(|| Error::Config(format!("unknown capability '{name}'")))?;
            if !disabled.contains(&capability) {
                disabled.push(capability);
            }
        }

        // Render defaults
        let default_mode = match env("POML_DEFAULT_MODE").or(fc.render.mode) {
            Some(mode) => mode
                .parse()
                .map_err(|_| Error::Config(format!("invalid render mode '{mode}'")))?,
            None => RenderMode::default(),
        };

        let max_length = match env("POML_MAX_LENGTH") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid POML_MAX_LENGTH '{v}'")))?,
            None => fc.render.max_length.unwrap_or(0),
        };

        let base_dir = env("POML_BASE_DIR")
            .or(fc.render.base_dir)
            .map(PathBuf::from);

        let variables_schema = env("POML_VARIABLES_SCHEMA")
            .or(fc.variables.schema)
            .map(|path| load_schema(&PathBuf::from(path)))
            .transpose()?;

        Ok(Self {
            sdk_bin,
            sdk_args,
            disable_sdk,
            disabled,
            default_mode,
            max_length,
            base_dir,
            variables_schema,
        })
    }

    /// Inputs for the capability probe
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        let mut disabled = self.disabled.clone();
        if self.disable_sdk && !disabled.contains(&Capability::Sdk) {
            disabled.push(Capability::Sdk);
        }
        ProbeConfig {
            sdk_bin: self.sdk_bin.clone(),
            disabled,
        }
    }
}

fn load_schema(path: &std::path::Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read variables schema {}: {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "variables schema {} is not valid JSON: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(PomlConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.default_mode, RenderMode::Standard);
        assert_eq!(config.max_length, 0);
        assert!(!config.disable_sdk);
        assert!(config.probe_config().disabled.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        let fc: PomlConfigFile = toml::from_str(
            r#"
            [render]
            mode = "debug"
            max_length = 500
            "#,
        )
        .unwrap();
        let config =
            Config::from_sources(fc, env_of(&[("POML_DEFAULT_MODE", "optimized")])).unwrap();
        assert_eq!(config.default_mode, RenderMode::Optimized);
        assert_eq!(config.max_length, 500);
    }

    #[test]
    fn disabled_sdk_reaches_probe() {
        let fc: PomlConfigFile = toml::from_str("[sdk]\nenabled = false").unwrap();
        let config = Config::from_sources(fc, env_of(&[("POML_DISABLE", "pdf, http")])).unwrap();
        let probe = config.probe_config();
        assert!(probe.disabled.contains(&Capability::Sdk));
        assert!(probe.disabled.contains(&Capability::Pdf));
        assert!(probe.disabled.contains(&Capability::Http));
    }

    #[test]
    fn sdk_args_split_on_whitespace() {
        let config = Config::from_sources(
            PomlConfigFile::default(),
            env_of(&[("POML_SDK_ARGS", "--speaker-mode true")]),
        )
        .unwrap();
        assert_eq!(
            config.sdk_args,
            Some(vec!["--speaker-mode".to_string(), "true".to_string()])
        );
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = Config::from_sources(
            PomlConfigFile::default(),
            env_of(&[("POML_DEFAULT_MODE", "fancy")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_sources(
            PomlConfigFile::default(),
            env_of(&[("POML_DISABLE", "telepathy")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn schema_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type": "object"}"#).unwrap();
        let config = Config::from_sources(
            PomlConfigFile::default(),
            env_of(&[("POML_VARIABLES_SCHEMA", path.to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(config.variables_schema.unwrap()["type"], "object");
    }
}
