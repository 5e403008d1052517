//! POML markup parsing for the fallback renderer
//!
//! Built on `quick_xml` events: elements, attributes, text, CDATA,
//! self-closing tags and entities. Comments, declarations and processing
//! instructions are skipped. Tag names are lowercased. Anything structurally
//! broken is a validation error.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::{Error, Result};

/// Name of the required root element
pub const ROOT_TAG: &str = "poml";

/// Deepest element nesting accepted by [`parse`]
pub const MAX_DEPTH: usize = 256;

/// A node in the parsed markup tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A parsed element with its attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs,
            children: Vec::new(),
        }
    }

    /// Attribute value by name
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated direct text children
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Concatenated text of this element and all descendants
    #[must_use]
    pub fn deep_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given tag
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Self> {
        self.elements().find(|e| e.tag == tag)
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

/// Check that the markup is wrapped in a `<poml>` root element
///
/// A leading XML declaration, doctype or comments and trailing comments are
/// allowed around the root.
///
/// # Errors
///
/// Returns a validation error if the root wrapper is missing
pub fn check_root(markup: &str) -> Result<()> {
    let trimmed = strip_misc(markup);
    if trimmed.is_empty() {
        return Err(Error::Validation("POML markup is empty".to_string()));
    }

    let opens = trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.get(..ROOT_TAG.len()).zip(rest.get(ROOT_TAG.len()..)))
        .is_some_and(|(name, after)| {
            name.eq_ignore_ascii_case(ROOT_TAG)
                && after.starts_with(|c: char| c == '>' || c == '/' || c.is_whitespace())
        });
    let self_closed = opens && trimmed.ends_with("/>") && !trimmed[1..].contains('<');
    let closing = format!("</{ROOT_TAG}>");
    let closes = trimmed
        .len()
        .checked_sub(closing.len())
        .and_then(|at| trimmed.get(at..))
        .is_some_and(|tail| tail.eq_ignore_ascii_case(&closing));

    if opens && (closes || self_closed) {
        Ok(())
    } else {
        Err(Error::Validation(
            "POML markup must be wrapped in a <poml>...</poml> root element".to_string(),
        ))
    }
}

/// Markup with the prolog and trailing comments removed
fn strip_misc(markup: &str) -> &str {
    let mut rest = markup.trim();

    // Prolog: declaration, doctype, comments
    loop {
        let skipped = if rest.starts_with("<!--") {
            rest.find("-->").map(|end| &rest[end + 3..])
        } else if rest.starts_with("<?") {
            rest.find("?>").map(|end| &rest[end + 2..])
        } else if rest.starts_with("<!") {
            rest.find('>').map(|end| &rest[end + 1..])
        } else {
            None
        };
        match skipped {
            Some(next) => rest = next.trim_start(),
            None => break,
        }
    }

    // Trailing comments
    while rest.ends_with("-->") {
        match rest.rfind("<!--") {
            Some(start) => rest = rest[..start].trim_end(),
            None => break,
        }
    }

    rest
}

/// Parse markup into its root element
///
/// # Errors
///
/// Returns a validation error for a missing root, unbalanced or mismatched
/// tags, unterminated tags or comments, content outside the root, and
/// nesting deeper than [`MAX_DEPTH`]
pub fn parse(markup: &str) -> Result<Element> {
    check_root(markup)?;

    let mut reader = Reader::from_str(markup);
    // Tags compare case-insensitively, so end names are checked here
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = position(&reader);
        let event = reader
            .read_event()
            .map_err(|e| Error::validation_at(offset, &format!("malformed markup: {e}")))?;

        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(Error::validation_at(offset, "content after root element"));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(Error::validation_at(
                        offset,
                        &format!("nesting too deep (limit {MAX_DEPTH})"),
                    ));
                }
                stack.push(element_from(&start, offset)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(Error::validation_at(offset, "content after root element"));
                }
                let element = element_from(&start, offset)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                let Some(open) = stack.pop() else {
                    return Err(Error::validation_at(
                        offset,
                        &format!("unexpected closing tag </{name}>"),
                    ));
                };
                if open.tag != name {
                    return Err(Error::validation_at(
                        offset,
                        &format!("mismatched closing tag: expected </{}>, found </{name}>", open.tag),
                    ));
                }
                attach(&mut stack, &mut root, open);
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                let decoded = unescape(&raw).map_err(|e| {
                    Error::validation_at(offset, &format!("invalid entity: {e}"))
                })?;
                push_text(&mut stack, root.is_some(), decoded.into_owned(), offset)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                push_text(&mut stack, root.is_some(), text, offset)?;
            }
            Event::Eof => break,
            // Comments, declarations, doctypes, processing instructions
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Validation(format!("unclosed tag <{}>", open.tag)));
    }

    let root = root.ok_or_else(|| Error::Validation("no root element found".to_string()))?;
    if root.tag != ROOT_TAG {
        return Err(Error::Validation(format!(
            "root element must be <{ROOT_TAG}>, found <{}>",
            root.tag
        )));
    }
    Ok(root)
}

fn position(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn element_from(start: &BytesStart<'_>, offset: usize) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    if !is_valid_name(&name) {
        return Err(Error::validation_at(offset, &format!("invalid tag name '{name}'")));
    }

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr
            .map_err(|e| Error::validation_at(offset, &format!("malformed attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw)
            .map_err(|e| Error::validation_at(offset, &format!("invalid entity: {e}")))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(Element::new(&name, attrs))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn push_text(stack: &mut [Element], root_done: bool, text: String, offset: usize) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None if root_done => Err(Error::validation_at(offset, "content after root element")),
        None => Err(Error::validation_at(offset, "text outside root element")),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_in_order() {
        let root = parse("<poml><role>A</role><task>B</task></poml>").unwrap();
        let tags: Vec<&str> = root.elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["role", "task"]);
        assert_eq!(root.find("task").unwrap().text(), "B");
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = parse("<role>A</role>").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(check_root("plain text").is_err());
        assert!(check_root("   ").is_err());
    }

    #[test]
    fn root_with_attributes_is_accepted() {
        assert!(check_root("<poml version=\"1\">\n<role>x</role>\n</poml>").is_ok());
        assert!(check_root("<POML></POML>").is_ok());
        assert!(check_root("<poml/>").is_ok());
        assert!(check_root("<pomlx></pomlx>").is_err());
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = parse("<poml><role>A</task></poml>").unwrap_err();
        assert!(err.to_string().contains("mismatched closing tag"));
    }

    #[test]
    fn unclosed_tags_are_rejected() {
        let err = parse("<poml><role>A</poml>").unwrap_err();
        assert!(err.to_string().contains("mismatched"));
        let err = parse("<poml><role>A<task>B</task></role>").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn content_after_root_is_rejected() {
        let err = parse("<poml></poml><role>x</role></poml>").unwrap_err();
        assert!(err.to_string().contains("after root"));
    }

    #[test]
    fn self_closing_and_attributes() {
        let root =
            parse(r#"<poml><img src="a.png" alt='a &amp; b'/><let name="x" value="1" /></poml>"#)
                .unwrap();
        let img = root.find("img").unwrap();
        assert_eq!(img.attr("src"), Some("a.png"));
        assert_eq!(img.attr("ALT"), Some("a & b"));
        assert!(img.children.is_empty());
        assert_eq!(root.find("let").unwrap().attr("value"), Some("1"));
    }

    #[test]
    fn quoted_angle_brackets_inside_attributes() {
        let root = parse(r#"<poml><table title="a > b">x</table></poml>"#).unwrap();
        assert_eq!(root.find("table").unwrap().attr("title"), Some("a > b"));
    }

    #[test]
    fn comments_are_skipped_and_entities_decoded() {
        let root = parse("<poml><!-- note --><task>1 &lt; 2</task></poml>").unwrap();
        assert_eq!(root.elements().count(), 1);
        assert_eq!(root.find("task").unwrap().text(), "1 < 2");
    }

    #[test]
    fn deep_text_flattens_children() {
        let root = parse("<poml><hint>a <b>bold</b> c</hint></poml>").unwrap();
        assert_eq!(root.find("hint").unwrap().deep_text(), "a bold c");
    }

    #[test]
    fn prolog_and_trailing_comments_are_allowed() {
        let markup = "<?xml version=\"1.0\"?>\n<!-- header -->\n<poml><task>x</task></poml>\n<!-- end -->";
        assert!(check_root(markup).is_ok());
        let root = parse(markup).unwrap();
        assert_eq!(root.find("task").unwrap().text(), "x");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let depth = 20_000;
        let markup = format!(
            "<poml><hint>{}x{}</hint></poml>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        );
        let err = parse(&markup).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let depth = MAX_DEPTH - 2;
        let markup = format!(
            "<poml><hint>{}x{}</hint></poml>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        );
        let root = parse(&markup).unwrap();
        assert_eq!(root.find("hint").unwrap().deep_text(), "x");
    }

    #[test]
    fn cdata_is_kept_verbatim() {
        let root = parse("<poml><task><![CDATA[a <b> & c]]></task></poml>").unwrap();
        assert_eq!(root.find("task").unwrap().text(), "a <b> & c");
    }

    #[test]
    fn tags_are_lowercased() {
        let root = parse("<poml><Output-Format>x</output-format></poml>").unwrap();
        assert!(root.find("output-format").is_some());
    }
}
