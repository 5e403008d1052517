//! Document model built from parsed markup
//!
//! Sections keep source order. Substitution happens while building, so the
//! document holds final text and the renderer only decides layout.

use crate::ingest::{ImageInfo, Loader, TableSource, format_rows};

use super::parser::Element;
use super::variables::{SubstitutionLog, Variables, substitute};

/// One `<example>` with its input/output pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// 1-based position among the document's examples
    pub index: usize,
    pub input: String,
    pub output: String,
}

/// A `<table>` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub src: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub content: String,
}

/// A `<document>` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub title: String,
    pub src: Option<String>,
    pub content: String,
}

/// An `<img>` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub title: String,
    pub src: String,
    pub alt: String,
    pub info: Option<ImageInfo>,
}

/// A named prompt section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Role(String),
    Task(String),
    Example(Example),
    Document(DocumentRef),
    Table(Table),
    Image(Image),
    OutputFormat(String),
    /// Any other tag, rendered as its flattened text
    Other { tag: String, text: String },
}

impl Section {
    /// Tag name this section came from
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Role(_) => "role",
            Self::Task(_) => "task",
            Self::Example(_) => "example",
            Self::Document(_) => "document",
            Self::Table(_) => "table",
            Self::Image(_) => "img",
            Self::OutputFormat(_) => "output-format",
            Self::Other { tag, .. } => tag,
        }
    }

    /// Plain rendering of the section body; empty when there is nothing to show
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Role(text) | Self::Task(text) | Self::OutputFormat(text) => text.clone(),
            Self::Other { text, .. } => text.clone(),
            Self::Example(ex) => match (ex.input.is_empty(), ex.output.is_empty()) {
                (false, false) => format!(
                    "Example {}:\nInput: {}\nOutput: {}",
                    ex.index, ex.input, ex.output
                ),
                (false, true) => format!("Example {}: {}", ex.index, ex.input),
                (true, false) => format!("Example {}:\nOutput: {}", ex.index, ex.output),
                (true, true) => String::new(),
            },
            Self::Document(doc) if !doc.content.is_empty() => {
                format!("Document - {}:\n{}", doc.title, doc.content)
            }
            Self::Table(table) if !table.content.is_empty() => {
                format!("Table - {}:\n{}", table.title, table.content)
            }
            Self::Image(img) if !img.alt.is_empty() => match &img.info {
                Some(info) => format!("Image - {}: {} ({info})", img.title, img.alt),
                None => format!("Image - {}: {}", img.title, img.alt),
            },
            Self::Document(_) | Self::Table(_) | Self::Image(_) => String::new(),
        }
    }
}

/// Ordered sections of one POML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub sections: Vec<Section>,
}

/// Mutable state threaded through one document build
pub struct BuildContext<'a, 'b> {
    pub variables: Variables,
    pub log: SubstitutionLog,
    pub loader: &'a mut Loader<'b>,
}

impl BuildContext<'_, '_> {
    fn sub(&mut self, text: &str) -> String {
        substitute(text, &self.variables, &mut self.log)
    }

    fn attr(&mut self, element: &Element, name: &str) -> Option<String> {
        element
            .attr(name)
            .map(str::to_string)
            .map(|v| self.sub(&v))
    }
}

impl Document {
    /// Build the document from a parsed `<poml>` root
    pub fn build(root: &Element, ctx: &mut BuildContext<'_, '_>) -> Self {
        let mut sections = Vec::new();
        let mut examples = 0;

        for element in root.elements() {
            let section = match element.tag.as_str() {
                "role" => Some(Section::Role(ctx.sub(&element.deep_text()).trim().to_string())),
                "task" => Some(Section::Task(ctx.sub(&element.deep_text()).trim().to_string())),
                "output-format" | "output_format" => Some(Section::OutputFormat(
                    ctx.sub(&element.deep_text()).trim().to_string(),
                )),
                "example" => build_example(element, ctx, examples + 1).map(|ex| {
                    examples += 1;
                    Section::Example(ex)
                }),
                "document" => Some(Section::Document(build_document(element, ctx))),
                "table" => Some(Section::Table(build_table(element, ctx))),
                "img" | "image" => Some(Section::Image(build_image(element, ctx))),
                "let" => {
                    bind_let(element, ctx);
                    None
                }
                tag => Some(Section::Other {
                    tag: tag.to_string(),
                    text: ctx.sub(&element.deep_text()).trim().to_string(),
                }),
            };
            sections.extend(section);
        }

        Self { sections }
    }

    /// Number of sections with the given tag
    #[must_use]
    pub fn count(&self, tag: &str) -> usize {
        self.sections.iter().filter(|s| s.tag() == tag).count()
    }

    /// Whether a non-empty section with the given tag exists
    #[must_use]
    pub fn has(&self, tag: &str) -> bool {
        self.sections
            .iter()
            .any(|s| s.tag() == tag && !s.body().is_empty())
    }
}

fn build_example(element: &Element, ctx: &mut BuildContext<'_, '_>, index: usize) -> Option<Example> {
    let mut input = String::new();
    let mut output = String::new();

    for child in element.elements() {
        match child.tag.as_str() {
            "input" => input = ctx.sub(&child.deep_text()).trim().to_string(),
            "output" | "o" => output = ctx.sub(&child.deep_text()).trim().to_string(),
            _ => {}
        }
    }

    if input.is_empty() && output.is_empty() {
        input = ctx.sub(&element.text()).trim().to_string();
    }

    (!input.is_empty() || !output.is_empty()).then_some(Example {
        index,
        input,
        output,
    })
}

fn build_document(element: &Element, ctx: &mut BuildContext<'_, '_>) -> DocumentRef {
    let title = ctx.attr(element, "title").unwrap_or_else(|| "Document".to_string());
    let src = ctx.attr(element, "src").filter(|s| !s.is_empty());
    let inline = ctx.sub(&element.deep_text()).trim().to_string();

    let content = match &src {
        Some(src) => match ctx.loader.load_document(src) {
            Ok(text) => text.trim().to_string(),
            Err(note) if inline.is_empty() => note,
            Err(note) => {
                tracing::debug!(%src, %note, "document source failed, using inline text");
                inline
            }
        },
        None => inline,
    };

    DocumentRef {
        title,
        src,
        content,
    }
}

fn build_table(element: &Element, ctx: &mut BuildContext<'_, '_>) -> Table {
    let title = ctx.attr(element, "title").unwrap_or_else(|| "Table".to_string());
    let src = ctx.attr(element, "src").filter(|s| !s.is_empty());

    let (mut headers, mut rows) = embedded_rows(element, ctx);
    let inline = ctx.sub(&element.text()).trim().to_string();
    let mut note = None;
    let mut source_text = None;

    // A source replaces embedded rows; failures only surface as a note
    if let Some(src) = &src {
        match ctx.loader.load_table(src) {
            Ok(TableSource::Rows(mut loaded)) if !loaded.is_empty() => {
                headers = loaded.remove(0);
                rows = loaded;
            }
            Ok(TableSource::Text(text)) if !text.trim().is_empty() => {
                source_text = Some(text.trim().to_string());
            }
            Ok(_) => note = Some(format!("Empty table source: {src}")),
            Err(e) => note = Some(e),
        }
    }

    let content = if let Some(text) = source_text {
        text
    } else if !headers.is_empty() || !rows.is_empty() {
        format_rows(&headers, &rows)
    } else if !inline.is_empty() {
        inline
    } else {
        note.unwrap_or_default()
    };

    Table {
        title,
        src,
        headers,
        rows,
        content,
    }
}

fn embedded_rows(element: &Element, ctx: &mut BuildContext<'_, '_>) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers = Vec::new();
    let mut rows = Vec::new();

    if let Some(header_row) = element.find("thead").and_then(|h| h.find("tr")) {
        headers = row_cells(header_row, "th", ctx);
    }

    let body_rows: Vec<&Element> = match element.find("tbody") {
        Some(body) => body.elements().filter(|e| e.tag == "tr").collect(),
        None => element.elements().filter(|e| e.tag == "tr").collect(),
    };
    for row in body_rows {
        if headers.is_empty() && row.find("th").is_some() {
            headers = row_cells(row, "th", ctx);
        } else {
            rows.push(row_cells(row, "td", ctx));
        }
    }

    (headers, rows)
}

fn row_cells(row: &Element, tag: &str, ctx: &mut BuildContext<'_, '_>) -> Vec<String> {
    row.elements()
        .filter(|c| c.tag == tag)
        .map(|c| ctx.sub(&c.deep_text()).trim().to_string())
        .collect()
}

fn build_image(element: &Element, ctx: &mut BuildContext<'_, '_>) -> Image {
    let src = ctx.attr(element, "src").unwrap_or_default();
    let info = ctx.loader.inspect_image(&src);
    Image {
        title: ctx.attr(element, "title").unwrap_or_else(|| "Image".to_string()),
        alt: ctx.attr(element, "alt").unwrap_or_default(),
        src,
        info,
    }
}

fn bind_let(element: &Element, ctx: &mut BuildContext<'_, '_>) {
    let Some(name) = element.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        tracing::debug!("ignoring <let> without a name");
        return;
    };
    let raw = element
        .attr("value")
        .map_or_else(|| element.deep_text().trim().to_string(), str::to_string);
    let value = ctx.sub(&raw);
    ctx.variables
        .insert(name.to_string(), serde_json::Value::String(value));
}
