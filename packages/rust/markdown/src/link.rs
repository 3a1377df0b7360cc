//! `<link>` resolution.
//!
//! Label precedence: inner markup, then `` `id` ``, then the target page's
//! name. The target is the `url` attribute verbatim, or the base URL plus the
//! target page's link (the current page when no `doc` is given) plus `#id`.

use quick_xml::events::BytesStart;
use tracing::warn;

use crate::index::ConversionContext;
use crate::walk::{Attrs, MarkupResult, Walker, collapse_whitespace};

pub(crate) fn render(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<String> {
    let attrs = Attrs::of(start)?;
    let label = collapse_whitespace(&walker.convert(start, ctx)?.into_markdown());

    let (doc, id, url) = (attrs.get("doc"), attrs.get("id"), attrs.get("url"));
    let target = ctx.page(doc);
    if !doc.is_empty() && target.is_none() {
        warn!(doc, page = %ctx.current.path, "link target not found, linking to current page");
    }

    let label = if !label.is_empty() {
        label
    } else if !id.is_empty() {
        format!("`{id}`")
    } else if let Some(page) = target.filter(|p| !p.name.is_empty()) {
        page.name.clone()
    } else if !doc.is_empty() {
        doc.to_string()
    } else {
        url.to_string()
    };

    let href = if !url.is_empty() {
        url.to_string()
    } else {
        let link = target.map_or(ctx.current.link.as_str(), |p| p.link.as_str());
        let mut href = format!("{}{link}", ctx.base_url);
        if !id.is_empty() {
            href.push('#');
            href.push_str(id);
        }
        href
    };

    Ok(format!("[{label}]({href})"))
}
