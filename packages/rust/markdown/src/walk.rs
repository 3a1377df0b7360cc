//! Streaming walk over one XML document.
//!
//! The walker never builds a tree. Each element handler pulls events for its
//! own subtree and stops at the matching end tag, so text and inline markup
//! come out in document order.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::elements;
use crate::index::ConversionContext;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural problems that abort conversion of a document.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// Malformed XML, including unknown character entities.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected </{found}>, wanted </{expected}>")]
    MismatchedEnd { found: String, expected: String },

    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("tag lists must have same number of names ({names}) as descs ({descs})")]
    TagListMismatch { names: usize, descs: usize },

    #[error("unknown list type '{0}'")]
    UnknownListType(String),

    #[error("expected a <{0}> root element")]
    MissingRoot(&'static str),
}

pub(crate) type MarkupResult<T> = std::result::Result<T, MarkupError>;

// ---------------------------------------------------------------------------
// Entities and attributes
// ---------------------------------------------------------------------------

/// HTML entities used by the documentation sources on top of the XML ones.
fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or(match name {
        "nbsp" => Some(" "),
        "mdash" => Some("—"),
        "ldquo" => Some("“"),
        "rdquo" => Some("”"),
        "lsquo" => Some("‘"),
        "rsquo" => Some("’"),
        "times" => Some("×"),
        _ => None,
    })
}

/// Attributes of one element keyed by local name, values unescaped.
#[derive(Debug, Default)]
pub(crate) struct Attrs(HashMap<String, String>);

impl Attrs {
    pub(crate) fn of(start: &BytesStart<'_>) -> MarkupResult<Self> {
        let mut map = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value_with(resolve_entity)?;
            map.insert(key, value.into_owned());
        }
        Ok(Self(map))
    }

    /// Value of `key`, or `""` when absent.
    pub(crate) fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Local name of an element as an owned string.
pub(crate) fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

// ---------------------------------------------------------------------------
// Rendered output
// ---------------------------------------------------------------------------

/// One piece of converted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Part {
    /// Running text, concatenated as is.
    Inline(String),
    /// A fence or quote. Lines are relative and get indented inside list items.
    Block(String),
    /// A rendered list. Lines already carry their absolute indentation.
    List(String),
}

/// Converted content of an element, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Rendered {
    parts: Vec<Part>,
}

impl Rendered {
    pub(crate) fn push_inline(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(Part::Inline(prev)) => prev.push_str(&text),
            _ => self.parts.push(Part::Inline(text)),
        }
    }

    pub(crate) fn push(&mut self, part: Part) {
        match part {
            Part::Inline(text) => self.push_inline(text),
            other => self.parts.push(other),
        }
    }

    pub(crate) fn append(&mut self, other: Rendered) {
        for part in other.parts {
            self.push(part);
        }
    }

    /// Whether anything other than whitespace has been collected.
    pub(crate) fn has_content(&self) -> bool {
        self.parts.iter().any(|p| match p {
            Part::Inline(s) => !s.trim().is_empty(),
            Part::Block(_) | Part::List(_) => true,
        })
    }

    #[cfg(test)]
    pub(crate) fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub(crate) fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    /// Drop trailing whitespace from the last inline run.
    pub(crate) fn trim_end(&mut self) {
        while let Some(Part::Inline(text)) = self.parts.last_mut() {
            let kept = text.trim_end().len();
            text.truncate(kept);
            if !text.is_empty() {
                break;
            }
            self.parts.pop();
        }
    }

    /// Drop whitespace at both edges of the inline content.
    pub(crate) fn trim(mut self) -> Self {
        self.trim_end();
        while let Some(Part::Inline(text)) = self.parts.first_mut() {
            let start = text.len() - text.trim_start().len();
            text.replace_range(..start, "");
            if !text.is_empty() {
                break;
            }
            self.parts.remove(0);
        }
        self
    }

    /// Flatten into Markdown. Blocks and lists always start on their own
    /// line, and text after one starts a new paragraph.
    pub(crate) fn into_markdown(self) -> String {
        let mut out = String::new();
        let mut after_block = false;
        for part in self.parts {
            match part {
                Part::Inline(text) if after_block && !text.trim().is_empty() => {
                    out.truncate(out.trim_end().len());
                    out.push_str("\n\n");
                    out.push_str(text.trim_start());
                    after_block = false;
                }
                Part::Inline(text) => out.push_str(&text),
                Part::Block(text) | Part::List(text) => {
                    out.truncate(out.trim_end_matches([' ', '\t']).len());
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&text);
                    out.push('\n');
                    after_block = true;
                }
            }
        }
        out
    }

    /// Flattened and trimmed of surrounding whitespace.
    pub(crate) fn into_trimmed(self) -> String {
        self.into_markdown().trim().to_string()
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Pull-based reader over one document's events.
pub(crate) struct Walker<'x> {
    reader: Reader<&'x [u8]>,
}

impl<'x> Walker<'x> {
    pub(crate) fn new(xml: &'x [u8]) -> Self {
        let mut reader = Reader::from_reader(xml);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        // Mismatches are reported by the walk itself, naming both tags.
        config.check_end_names = false;
        Self { reader }
    }

    /// Advance to the first start tag of the document.
    pub(crate) fn root(&mut self) -> MarkupResult<Option<BytesStart<'x>>> {
        loop {
            match self.reader.read_event()? {
                Event::Start(start) => return Ok(Some(start)),
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// Visit the child elements of `parent` until its end tag.
    ///
    /// Text directly inside `parent` is ignored. The visitor must consume the
    /// child it is handed, either by walking it or by calling [`Walker::skip`].
    pub(crate) fn children<F>(&mut self, parent: &BytesStart<'_>, mut visit: F) -> MarkupResult<()>
    where
        F: FnMut(&mut Self, BytesStart<'x>) -> MarkupResult<()>,
    {
        loop {
            match self.reader.read_event()? {
                Event::Start(start) => visit(self, start)?,
                Event::End(end) => return check_end(parent, end.local_name().as_ref()),
                Event::Eof => return Err(MarkupError::UnexpectedEof(local_name(parent))),
                _ => {}
            }
        }
    }

    /// Convert the content of `parent` in document order.
    pub(crate) fn convert(
        &mut self,
        parent: &BytesStart<'_>,
        ctx: &mut ConversionContext<'_>,
    ) -> MarkupResult<Rendered> {
        let mut out = Rendered::default();
        loop {
            match self.reader.read_event()? {
                Event::Text(text) => {
                    let text = text.unescape_with(resolve_entity)?;
                    out.push_inline(normalize_run(text, ctx.verbatim));
                }
                Event::CData(data) => {
                    out.push_inline(String::from_utf8_lossy(&data.into_inner()).into_owned());
                }
                Event::Start(start) => elements::render(self, &start, &mut out, ctx)?,
                Event::End(end) => {
                    check_end(parent, end.local_name().as_ref())?;
                    return Ok(out);
                }
                Event::Eof => return Err(MarkupError::UnexpectedEof(local_name(parent))),
                // comments, processing instructions, doctype
                _ => {}
            }
        }
    }

    /// Concatenated text of `parent` and its descendants, markup dropped.
    pub(crate) fn text_content(&mut self, parent: &BytesStart<'_>) -> MarkupResult<String> {
        let mut out = String::new();
        let mut open = vec![local_name(parent)];
        loop {
            match self.reader.read_event()? {
                Event::Text(text) => out.push_str(&text.unescape_with(resolve_entity)?),
                Event::CData(data) => out.push_str(&String::from_utf8_lossy(&data.into_inner())),
                Event::Start(start) => open.push(local_name(&start)),
                Event::End(end) => {
                    let found = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    let expected = open.pop().unwrap_or_default();
                    if found != expected {
                        return Err(MarkupError::MismatchedEnd { found, expected });
                    }
                    if open.is_empty() {
                        return Ok(out);
                    }
                }
                Event::Eof => return Err(MarkupError::UnexpectedEof(local_name(parent))),
                _ => {}
            }
        }
    }

    /// Consume `start` and everything inside it.
    pub(crate) fn skip(&mut self, start: &BytesStart<'_>) -> MarkupResult<()> {
        self.text_content(start).map(drop)
    }
}

fn check_end(parent: &BytesStart<'_>, found: &[u8]) -> MarkupResult<()> {
    if found == parent.local_name().as_ref() {
        Ok(())
    } else {
        Err(MarkupError::MismatchedEnd {
            found: String::from_utf8_lossy(found).into_owned(),
            expected: local_name(parent),
        })
    }
}

/// Outside verbatim blocks, line-leading tabs are source indentation and
/// are dropped; any other tab run becomes one space.
fn normalize_run(text: Cow<'_, str>, verbatim: bool) -> String {
    static LEADING_TABS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\t+").expect("valid regex"));
    static TABS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+").expect("valid regex"));

    if verbatim || !text.contains('\t') {
        return text.into_owned();
    }
    let text = LEADING_TABS_RE.replace_all(&text, "");
    TABS_RE.replace_all(&text, " ").into_owned()
}

/// Collapse every whitespace run, newlines included, to one space and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}
