//! Delegation to the external POML SDK
//!
//! The SDK is driven as a subprocess: markup and context are written to a
//! temporary directory and the rendered prompt is read from stdout.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use crate::capabilities::{ProbeConfig, locate_sdk};
use crate::poml::Variables;
use crate::{Error, Result};

use super::RenderMode;
use super::fallback::{DEBUG_HEADER, label};

/// Arguments passed to the SDK when none are configured
pub const DEFAULT_SDK_ARGS: &[&str] = &["--speaker-mode", "false"];

/// Speaker used for SDK output that carries no speaker of its own
pub const UNLABELED_SPEAKER: &str = "sdk";

/// One message of SDK output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkMessage {
    pub speaker: String,
    pub content: String,
}

impl SdkMessage {
    #[must_use]
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }

    /// Message without a speaker, as produced by plain-text output
    #[must_use]
    pub fn unlabeled(content: impl Into<String>) -> Self {
        Self::new(UNLABELED_SPEAKER, content)
    }
}

/// A full POML implementation the renderer can delegate to
pub trait SdkBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Render markup with the given context into messages
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or produces no output
    fn render(
        &self,
        markup: &str,
        variables: &Variables,
        base_dir: Option<&Path>,
    ) -> Result<Vec<SdkMessage>>;
}

/// The POML command line
#[derive(Debug, Clone)]
pub struct PomlCli {
    program: PathBuf,
    args: Vec<String>,
}

impl PomlCli {
    /// Use the given executable with default arguments
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: DEFAULT_SDK_ARGS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replace the extra arguments passed after the file arguments
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Locate the executable the same way the capability probe does
    #[must_use]
    pub fn discover(config: &ProbeConfig) -> Option<Self> {
        locate_sdk(config).map(Self::new)
    }

    /// Path of the executable
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl SdkBackend for PomlCli {
    fn name(&self) -> &str {
        "poml-cli"
    }

    fn render(
        &self,
        markup: &str,
        variables: &Variables,
        base_dir: Option<&Path>,
    ) -> Result<Vec<SdkMessage>> {
        let workdir = tempfile::tempdir()?;
        let markup_path = workdir.path().join("prompt.poml");
        let context_path = workdir.path().join("context.json");
        std::fs::write(&markup_path, markup)?;
        std::fs::write(&context_path, serde_json::to_vec(variables)?)?;

        let mut command = Command::new(&self.program);
        command
            .arg("--file")
            .arg(&markup_path)
            .arg("--context-file")
            .arg(&context_path)
            .args(&self.args);
        if let Some(dir) = base_dir {
            command.current_dir(dir);
        }

        tracing::debug!(program = %self.program.display(), "invoking POML SDK");
        let output = command
            .output()
            .map_err(|e| Error::Sdk(format!("failed to run {}: {e}", self.program.display())))?;

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(stderr = %stderr.trim(), "POML SDK stderr");
        }
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Sdk(format!("exited with code {code}: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let messages = extract_messages(stdout.trim());
        if messages.is_empty() {
            return Err(Error::Sdk("produced no output".to_string()));
        }
        Ok(messages)
    }
}

/// Pull messages out of SDK output
///
/// The SDK prints either a JSON string, a list of `{speaker, content}`
/// messages, an object holding `messages`, or plain text. Empty messages
/// are dropped.
#[must_use]
pub fn extract_messages(stdout: &str) -> Vec<SdkMessage> {
    let messages = match serde_json::from_str::<Value>(stdout) {
        Ok(Value::String(text)) => vec![SdkMessage::unlabeled(text)],
        Ok(Value::Array(messages)) => to_messages(&messages),
        Ok(Value::Object(obj)) => match obj.get("messages") {
            Some(Value::Array(messages)) => to_messages(messages),
            _ => vec![SdkMessage::unlabeled(stdout)],
        },
        _ => vec![SdkMessage::unlabeled(stdout)],
    };
    messages
        .into_iter()
        .filter(|m| !m.content.trim().is_empty())
        .collect()
}

fn to_messages(messages: &[Value]) -> Vec<SdkMessage> {
    messages
        .iter()
        .filter_map(|m| {
            let speaker = m
                .get("speaker")
                .and_then(Value::as_str)
                .unwrap_or(UNLABELED_SPEAKER);
            match m.get("content") {
                Some(Value::String(text)) => Some(SdkMessage::new(speaker, text.clone())),
                Some(other) => Some(SdkMessage::new(speaker, other.to_string())),
                None => m.as_str().map(SdkMessage::unlabeled),
            }
        })
        .collect()
}

/// Lay SDK messages out according to the render mode
///
/// Standard joins message contents; optimized labels each message with its
/// speaker; debug annotates each message like a fallback section.
#[must_use]
pub fn layout(messages: &[SdkMessage], mode: RenderMode) -> String {
    match mode {
        RenderMode::Standard => messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n\n"),
        RenderMode::Optimized => messages
            .iter()
            .map(|m| format!("{}: {}", label(&m.speaker), m.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
        RenderMode::Debug => {
            let mut parts = vec![DEBUG_HEADER.to_string()];
            for (i, m) in messages.iter().enumerate() {
                parts.push(format!(
                    "[{}] <{}> ({} chars)\n{}",
                    i + 1,
                    m.speaker,
                    m.content.chars().count(),
                    m.content
                ));
            }
            parts.join("\n\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_json_string() {
        assert_eq!(
            extract_messages(r#""hello\nworld""#),
            vec![SdkMessage::unlabeled("hello\nworld")]
        );
    }

    #[test]
    fn reads_message_lists() {
        let out = extract_messages(
            r#"[{"speaker": "system", "content": "Be kind."}, {"speaker": "human", "content": "Hi"}]"#,
        );
        assert_eq!(
            out,
            vec![SdkMessage::new("system", "Be kind."), SdkMessage::new("human", "Hi")]
        );
        let out = extract_messages(r#"{"messages": [{"speaker": "human", "content": "Hi"}]}"#);
        assert_eq!(out, vec![SdkMessage::new("human", "Hi")]);
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            extract_messages("You are helpful."),
            vec![SdkMessage::unlabeled("You are helpful.")]
        );
        assert!(extract_messages(r#""   ""#).is_empty());
    }

    #[test]
    fn layout_follows_render_mode() {
        let messages = vec![SdkMessage::new("system", "Be kind."), SdkMessage::new("human", "Hi")];
        assert_eq!(layout(&messages, RenderMode::Standard), "Be kind.\n\nHi");
        assert_eq!(
            layout(&messages, RenderMode::Optimized),
            "System: Be kind.\n\nHuman: Hi"
        );
        assert_eq!(
            layout(&messages, RenderMode::Debug),
            format!("{DEBUG_HEADER}\n\n[1] <system> (8 chars)\nBe kind.\n\n[2] <human> (2 chars)\nHi")
        );
    }

    #[test]
    fn missing_program_is_an_sdk_error() {
        let cli = PomlCli::new("/nonexistent/poml-sdk-xyz");
        let err = cli.render("<poml></poml>", &Variables::new(), None).unwrap_err();
        assert!(matches!(err, Error::Sdk(_)));
    }

    #[cfg(unix)]
    #[test]
    fn reads_rendered_text_from_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-poml");
        std::fs::write(&script, "#!/bin/sh\necho '\"rendered by sdk\"'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = PomlCli::new(&script);
        let messages = cli.render("<poml></poml>", &Variables::new(), None).unwrap();
        assert_eq!(messages, vec![SdkMessage::unlabeled("rendered by sdk")]);
    }
}
