//! Inline element dispatch.

use quick_xml::events::BytesStart;
use tracing::warn;

use crate::index::ConversionContext;
use crate::walk::{Attrs, MarkupResult, Part, Rendered, Walker, local_name};
use crate::{link, list};

/// Every element the converter knows how to render inside prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Element {
    /// `literal`, `var`, `path`, `c-def`, `command`
    Code,
    /// `c-func`
    Call,
    /// `value`, `parameter`
    Value,
    Emphasis,
    /// HTTP header names.
    Header,
    Example,
    Note,
    HttpStatus,
    /// `commercial_version`
    Upsell,
    Link,
    List,
    Para,
    Unknown,
}

impl Element {
    pub(crate) fn from_name(name: &[u8]) -> Self {
        match name {
            b"literal" | b"var" | b"path" | b"c-def" | b"command" => Self::Code,
            b"c-func" => Self::Call,
            b"value" | b"parameter" => Self::Value,
            b"emphasis" => Self::Emphasis,
            b"header" => Self::Header,
            b"example" => Self::Example,
            b"note" => Self::Note,
            b"http-status" => Self::HttpStatus,
            b"commercial_version" => Self::Upsell,
            b"link" => Self::Link,
            b"list" => Self::List,
            b"para" => Self::Para,
            _ => Self::Unknown,
        }
    }

    /// Spans that turn into plain text inside a fence.
    fn is_span(self) -> bool {
        matches!(
            self,
            Self::Code | Self::Call | Self::Value | Self::Emphasis | Self::Header | Self::Link
        )
    }
}

/// Render the element opened by `start` into `out`, consuming it entirely.
pub(crate) fn render(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    out: &mut Rendered,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<()> {
    let kind = Element::from_name(start.local_name().as_ref());

    if ctx.verbatim && kind.is_span() {
        out.push_inline(walker.text_content(start)?);
        return Ok(());
    }

    match kind {
        Element::Code => out.push_inline(format!("`{}`", walker.text_content(start)?)),
        Element::Call => out.push_inline(format!("`{}()`", walker.text_content(start)?)),
        Element::Value => out.push_inline(format!("*`{}`*", walker.text_content(start)?)),
        Element::Emphasis => {
            let inner = walker.convert(start, ctx)?.into_trimmed();
            out.push_inline(format!("*{inner}*"));
        }
        Element::Header => out.push_inline(format!("\"{}\"", walker.text_content(start)?)),
        Element::Example => out.push(fence(walker, start, ctx)?),
        Element::Note => {
            let inner = walker.convert(start, ctx)?.into_markdown();
            out.push(Part::Block(quote(&inner)));
        }
        Element::HttpStatus => {
            let attrs = Attrs::of(start)?;
            walker.skip(start)?;
            out.push_inline(format!("{} ({})", attrs.get("code"), attrs.get("text")));
        }
        Element::Upsell => {
            let title = walker.convert(start, ctx)?.into_trimmed();
            out.push_inline(format!("[{title}]({})", ctx.upsell_url));
        }
        Element::Link => out.push_inline(link::render(walker, start, ctx)?),
        Element::List => out.push(list::render(walker, start, ctx)?),
        Element::Para => {
            let inner = walker.convert(start, ctx)?.trim();
            out.trim_end();
            if out.has_content() {
                out.push_inline("\n\n");
            }
            out.append(inner);
        }
        Element::Unknown => {
            let name = local_name(start);
            warn!(name = %name, page = %ctx.current.path, "unsupported tag");
            walker.skip(start)?;
            out.push_inline(format!("`TODO: handle <{name}>`"));
        }
    }
    Ok(())
}

fn fence(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Part> {
    let outer = ctx.verbatim;
    ctx.verbatim = true;
    let inner = walker.convert(start, ctx);
    ctx.verbatim = outer;

    let body = trim_blank_lines(&inner?.into_markdown());
    Ok(Part::Block(format!("```\n{body}\n```")))
}

/// Quote every non-blank line. Blank lines are dropped, not kept as bare `>`.
fn quote(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove blank lines at either end, keeping indentation of the rest.
fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}
