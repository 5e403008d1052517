//! Built-in renderer used when the SDK is absent or fails

use std::path::PathBuf;

use crate::Result;
use crate::capabilities::Capabilities;
use crate::ingest::Loader;
use crate::poml::{BuildContext, Document, Section, SubstitutionLog, parse};

use super::metadata::RenderMetadata;
use super::{RenderMode, RenderRequest};

/// Header line of debug output
pub const DEBUG_HEADER: &str = "=== DEBUG MODE ===";

/// Parse, substitute and lay out the request
///
/// # Errors
///
/// Returns a validation error if the markup is malformed
pub fn render(
    request: &RenderRequest,
    caps: &dyn Capabilities,
    metadata: &mut RenderMetadata,
) -> Result<String> {
    let root = parse(&request.markup)?;

    let base_dir = request
        .base_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let mut loader = Loader::new(caps, base_dir);
    // Substitution and source loading both happen while building
    let (document, log) = {
        let mut ctx = BuildContext {
            variables: request.variables.clone(),
            log: SubstitutionLog::default(),
            loader: &mut loader,
        };
        let document = Document::build(&root, &mut ctx);
        (document, ctx.log)
    };

    // Record what the build saw before laying it out
    metadata.record_document(&document);
    metadata.record_variables(&log);
    for capability in loader.used() {
        metadata.record_capability(*capability);
    }

    Ok(layout(&document, request.mode))
}

/// Join document sections according to the render mode
#[must_use]
pub fn layout(document: &Document, mode: RenderMode) -> String {
    match mode {
        RenderMode::Standard => standard(document),
        RenderMode::Optimized => optimized(document),
        RenderMode::Debug => debug(document),
    }
}

fn standard(document: &Document) -> String {
    document
        .sections
        .iter()
        .map(Section::body)
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn optimized(document: &Document) -> String {
    let bodies = |pred: fn(&Section) -> bool| non_empty(document, pred);

    let mut parts = Vec::new();

    // Role and task lead, output format always closes
    for (body, _) in bodies(|s| matches!(s, Section::Role(_))) {
        parts.push(format!("Role: {body}"));
    }
    for (body, _) in bodies(|s| matches!(s, Section::Task(_))) {
        parts.push(format!("Task: {body}"));
    }

    let examples = bodies(|s| matches!(s, Section::Example(_)));
    if !examples.is_empty() {
        parts.push("Examples:".to_string());
        parts.extend(examples.into_iter().map(|(body, _)| body));
    }

    // Ingested content keeps its own headings
    for (body, _) in bodies(|s| matches!(s, Section::Document(_))) {
        parts.push(body);
    }
    for (body, _) in bodies(|s| matches!(s, Section::Table(_))) {
        parts.push(body);
    }
    for (body, _) in bodies(|s| matches!(s, Section::Image(_))) {
        parts.push(body);
    }
    for (body, section) in bodies(|s| matches!(s, Section::Other { .. })) {
        parts.push(format!("{}: {body}", label(section.tag())));
    }
    for (body, _) in bodies(|s| matches!(s, Section::OutputFormat(_))) {
        parts.push(format!("Output Format: {body}"));
    }

    parts.join("\n\n")
}

fn non_empty(document: &Document, pred: fn(&Section) -> bool) -> Vec<(String, &Section)> {
    document
        .sections
        .iter()
        .filter(|s| pred(s))
        .map(|s| (s.body(), s))
        .filter(|(b, _)| !b.is_empty())
        .collect()
}

fn debug(document: &Document) -> String {
    let mut parts = vec![DEBUG_HEADER.to_string()];
    let blocks = document
        .sections
        .iter()
        .map(|s| (s.tag(), s.body()))
        .filter(|(_, b)| !b.is_empty());

    for (i, (tag, body)) in blocks.enumerate() {
        parts.push(format!(
            "[{}] <{tag}> ({} chars)\n{body}",
            i + 1,
            body.chars().count()
        ));
    }

    parts.join("\n\n")
}

/// `stepwise-instructions` -> `Stepwise Instructions`
pub(crate) fn label(tag: &str) -> String {
    tag.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
