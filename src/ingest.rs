//! External data for `<table src>`, `<document src>` and `<img src>`
//!
//! Every loader is gated on a capability. A load failure never aborts a
//! render: callers get an `Err(note)` they can fall back from or render as
//! content.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::capabilities::{Capabilities, Capability, PDF_BINARY};

/// Format and size of a local image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub format: &'static str,
    pub bytes: u64,
    pub dimensions: Option<(u32, u32)>,
}

impl std::fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.dimensions {
            Some((w, h)) => write!(f, "{}, {w}x{h}, {} bytes", self.format, self.bytes),
            None => write!(f, "{}, {} bytes", self.format, self.bytes),
        }
    }
}

/// Contents of a `<table src>` source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// CSV rows, header row first
    Rows(Vec<Vec<String>>),
    /// Non-CSV text, used as the table content unchanged
    Text(String),
}

/// Capability-aware loader for one render call
pub struct Loader<'a> {
    caps: &'a dyn Capabilities,
    base_dir: PathBuf,
    used: BTreeSet<Capability>,
}

impl<'a> Loader<'a> {
    /// Create a loader resolving relative paths against `base_dir`
    #[must_use]
    pub fn new(caps: &'a dyn Capabilities, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            caps,
            base_dir: base_dir.into(),
            used: BTreeSet::new(),
        }
    }

    /// Capabilities exercised so far
    #[must_use]
    pub const fn used(&self) -> &BTreeSet<Capability> {
        &self.used
    }

    /// Load a table source: CSV files become rows, anything else stays text
    ///
    /// # Errors
    ///
    /// Returns a human-readable note if the source cannot be loaded
    pub fn load_table(&mut self, src: &str) -> Result<TableSource, String> {
        let text = self.read_source(src)?;
        if !extension(src).is_some_and(|e| e == "csv") {
            return Ok(TableSource::Text(text));
        }

        // Quoted fields need the real parser; plain splitting is the floor
        if self.caps.is_available(Capability::Tables) {
            if let Some(rows) = parse_csv(&text) {
                self.used.insert(Capability::Tables);
                return Ok(TableSource::Rows(rows));
            }
            tracing::warn!(src, "CSV parser failed, using plain comma splitting");
        }
        Ok(TableSource::Rows(split_csv(&text)))
    }

    /// Load document text from a file or URL
    ///
    /// # Errors
    ///
    /// Returns a human-readable note if the source cannot be loaded
    pub fn load_document(&mut self, src: &str) -> Result<String, String> {
        if extension(src).is_some_and(|e| e == "pdf") {
            if is_url(src) {
                return Err(format!("Remote PDF documents are not supported: {src}"));
            }
            let path = self.resolve(src);
            return self.load_pdf(&path);
        }
        self.read_source(src)
    }

    /// Inspect a local image, if image support is available
    #[must_use]
    pub fn inspect_image(&mut self, src: &str) -> Option<ImageInfo> {
        if src.is_empty() || is_url(src) || !self.caps.is_available(Capability::Images) {
            return None;
        }

        let path = self.resolve(src);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "image not readable");
                return None;
            }
        };
        let info = sniff_image(&data)?;
        self.used.insert(Capability::Images);
        Some(info)
    }

    fn load_pdf(&mut self, path: &Path) -> Result<String, String> {
        if !self.caps.is_available(Capability::Pdf) {
            return Err(format!(
                "PDF processing requires {PDF_BINARY}; install poppler-utils to enable it"
            ));
        }
        if !path.is_file() {
            return Err(format!("file not found: {}", path.display()));
        }

        let output = Command::new(PDF_BINARY)
            .arg("-layout")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|e| format!("Error loading PDF: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Error loading PDF: {}", stderr.trim()));
        }

        self.used.insert(Capability::Pdf);
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn read_source(&mut self, src: &str) -> Result<String, String> {
        if is_url(src) {
            if !self.caps.is_available(Capability::Http) {
                return Err(format!("External data fetching is unavailable: {src}"));
            }
            let text = fetch_text(src).map_err(|e| format!("Error fetching {src}: {e}"))?;
            self.used.insert(Capability::Http);
            return Ok(text);
        }

        let path = self.resolve(src);
        let bytes = std::fs::read(&path)
            .map_err(|e| format!("Error loading {}: {e}", path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn is_url(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

fn extension(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Render rows as `a | b` lines with a rule under the header row
#[must_use]
pub fn format_rows(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::new();
    if !headers.is_empty() {
        let header = headers.join(" | ");
        let rule = "-".repeat(header.chars().count());
        lines.push(header);
        lines.push(rule);
    }
    for row in rows {
        lines.push(row.join(" | "));
    }
    lines.join("\n")
}

#[cfg(feature = "tables")]
fn parse_csv(text: &str) -> Option<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record.iter().map(|f| f.trim().to_string()).collect()),
            Err(e) => {
                tracing::debug!(error = %e, "malformed CSV record");
                return None;
            }
        }
    }
    Some(rows)
}

#[cfg(not(feature = "tables"))]
const fn parse_csv(_text: &str) -> Option<Vec<Vec<String>>> {
    None
}

fn split_csv(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split(',').map(|f| f.trim().to_string()).collect())
        .collect()
}

#[cfg(feature = "http")]
fn fetch_text(url: &str) -> Result<String, String> {
    reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::text)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "http"))]
fn fetch_text(_url: &str) -> Result<String, String> {
    Err("http support not compiled in".to_string())
}

/// Identify an image by its magic bytes
#[must_use]
pub fn sniff_image(data: &[u8]) -> Option<ImageInfo> {
    let bytes = data.len() as u64;
    let info = |format, dimensions| {
        Some(ImageInfo {
            format,
            bytes,
            dimensions,
        })
    };

    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        let dims = data.get(16..24).map(|d| {
            (
                u32::from_be_bytes([d[0], d[1], d[2], d[3]]),
                u32::from_be_bytes([d[4], d[5], d[6], d[7]]),
            )
        });
        return info("PNG", dims);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        let dims = data.get(6..10).map(|d| {
            (
                u32::from(u16::from_le_bytes([d[0], d[1]])),
                u32::from(u16::from_le_bytes([d[2], d[3]])),
            )
        });
        return info("GIF", dims);
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return info("JPEG", None);
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return info("WEBP", None);
    }
    if data.starts_with(b"BM") {
        return info("BMP", None);
    }
    None
}
