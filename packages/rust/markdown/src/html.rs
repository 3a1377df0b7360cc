//! Markdown to HTML for the catalog's `*_html` fields.

use std::sync::LazyLock;

use comrak::{Options, markdown_to_html as render};
use regex::Regex;

/// Render Markdown to HTML. Links open in a new tab.
pub fn markdown_to_html(md: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    // Sources spell literal markup as `&lt;...&gt;`; it must reach the output.
    options.render.unsafe_ = true;

    target_blank(&render(md, &options))
}

fn target_blank(html: &str) -> String {
    static ANCHOR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"<a href="([^"]*)""#).expect("valid regex"));

    ANCHOR_RE
        .replace_all(html, r#"<a href="$1" target="_blank""#)
        .into_owned()
}
