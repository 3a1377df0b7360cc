//! `<list type="bullet|enum|tag">` rendering.
//!
//! Every physical line of a list at depth `d`, markers and item content
//! alike, is indented by `d - 1` units. Nested lists are rendered first and
//! copied in verbatim since they already carry their own absolute
//! indentation.
//!
//! Tag lists have no Markdown equivalent; each name becomes a bullet and its
//! description a paragraph below it, one unit deeper.

use quick_xml::events::BytesStart;
use tracing::debug;

use crate::index::ConversionContext;
use crate::walk::{Attrs, MarkupError, MarkupResult, Part, Rendered, Walker, local_name};

const INDENT_UNIT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Enum,
    Tag,
}

impl ListKind {
    fn parse(value: &str) -> MarkupResult<Self> {
        match value {
            "bullet" => Ok(Self::Bullet),
            "enum" => Ok(Self::Enum),
            "tag" => Ok(Self::Tag),
            other => Err(MarkupError::UnknownListType(other.to_string())),
        }
    }
}

pub(crate) fn render(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Part> {
    let kind = ListKind::parse(Attrs::of(start)?.get("type"))?;

    ctx.list_depth += 1;
    let rendered = render_items(walker, start, kind, ctx);
    ctx.list_depth -= 1;

    Ok(Part::List(rendered?))
}

fn render_items(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    kind: ListKind,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<String> {
    let indent = INDENT_UNIT.repeat(ctx.list_depth.saturating_sub(1));
    let description = format!("{indent}{INDENT_UNIT}");

    let mut items = Vec::new();
    let mut names = Vec::new();
    let mut descs = Vec::new();
    walker.children(start, |w, child| {
        match (kind, child.local_name().as_ref()) {
            (ListKind::Bullet | ListKind::Enum, b"listitem") => items.push(w.convert(&child, ctx)?),
            (ListKind::Tag, b"tag-name") => names.push(w.convert(&child, ctx)?),
            (ListKind::Tag, b"tag-desc") => descs.push(w.convert(&child, ctx)?),
            _ => {
                debug!(name = %local_name(&child), "ignoring element inside <list>");
                w.skip(&child)?;
            }
        }
        Ok(())
    })?;

    let mut lines = Vec::new();
    match kind {
        ListKind::Bullet => {
            let marker = format!("{indent}- ");
            for item in items {
                push_item(&mut lines, &marker, &indent, item);
            }
        }
        ListKind::Enum => {
            for (i, item) in items.into_iter().enumerate() {
                let marker = format!("{indent}{}. ", i + 1);
                push_item(&mut lines, &marker, &indent, item);
            }
        }
        ListKind::Tag => {
            if names.len() != descs.len() {
                return Err(MarkupError::TagListMismatch {
                    names: names.len(),
                    descs: descs.len(),
                });
            }
            let marker = format!("{indent}- ");
            for (name, desc) in names.into_iter().zip(descs) {
                push_item(&mut lines, &marker, &indent, name);
                let desc = item_lines(desc);
                if !desc.is_empty() {
                    lines.push(String::new());
                    lines.extend(desc.into_iter().map(|l| l.render(&description)));
                }
            }
        }
    }

    Ok(lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Item layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Gets the item's continuation prefix.
    Text(String),
    /// Already indented by a nested list.
    Verbatim(String),
}

impl Line {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(t) if t.trim().is_empty())
    }

    fn render(self, prefix: &str) -> String {
        match self {
            Self::Text(t) if t.trim().is_empty() => String::new(),
            Self::Text(t) => format!("{prefix}{t}"),
            Self::Verbatim(v) => v,
        }
    }
}

fn push_item(lines: &mut Vec<String>, marker: &str, continuation: &str, item: Rendered) {
    let mut body = item_lines(item).into_iter();
    match body.next() {
        Some(Line::Text(first)) => lines.push(format!("{marker}{first}")),
        Some(nested) => {
            lines.push(marker.trim_end().to_string());
            lines.push(nested.render(continuation));
        }
        None => lines.push(marker.trim_end().to_string()),
    }
    lines.extend(body.map(|l| l.render(continuation)));
}

/// Split converted item content into lines. Text lines are trimmed, blank
/// runs collapse to one and blank lines at either end are dropped.
fn item_lines(item: Rendered) -> Vec<Line> {
    fn flush(pending: &mut String, lines: &mut Vec<Line>) {
        lines.extend(pending.trim().lines().map(|l| Line::Text(l.trim().to_string())));
        pending.clear();
    }

    let mut raw = Vec::new();
    let mut pending = String::new();
    for part in item.into_parts() {
        match part {
            Part::Inline(text) => pending.push_str(&text),
            Part::Block(text) => {
                flush(&mut pending, &mut raw);
                raw.extend(text.lines().map(|l| Line::Text(l.to_string())));
            }
            Part::List(text) => {
                flush(&mut pending, &mut raw);
                raw.extend(text.lines().map(|l| Line::Verbatim(l.to_string())));
            }
        }
    }
    flush(&mut pending, &mut raw);

    let mut lines: Vec<Line> = Vec::with_capacity(raw.len());
    for line in raw {
        if line.is_blank() && lines.last().is_none_or(Line::is_blank) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(Line::is_blank) {
        lines.pop();
    }
    lines
}
