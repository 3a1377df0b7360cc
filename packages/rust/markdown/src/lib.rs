//! XML documentation to Markdown conversion.
//!
//! The sources are module pages (`dtd/module.dtd`) describing directives and
//! article pages (`dtd/article.dtd`) that only serve as link targets. Parsing a
//! corpus happens in two passes:
//!
//! 1. [`PageIndex::build`] reads the root element of every document so links
//!    can be resolved in any direction.
//! 2. Every module document is walked once, in document order, producing
//!    Markdown for syntax lines and prose. Each document gets its own
//!    [`ConversionContext`].

mod document;
mod elements;
mod html;
mod index;
mod link;
mod list;
mod walk;

use std::borrow::Cow;

use refconv_shared::{RefConvError, Result, SourceFile};
use tracing::{info, instrument, warn};

pub use document::{Directive, Module, Paragraph, Prose, Section, Syntax, Syntaxes, Variable};
pub use html::markdown_to_html;
pub use index::{ConversionContext, PageDescriptor, PageIndex};
pub use walk::MarkupError;

use index::MODULE_MARKER;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Settings for a corpus conversion.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Prefix for links built from canonical page links.
    pub base_url: String,
    /// Target of `<commercial_version>` links.
    pub upsell_url: String,
}

/// Everything parsed from one corpus.
#[derive(Debug, Clone, Default)]
pub struct Reference {
    /// Converted module documents, in corpus order.
    pub modules: Vec<Module>,
    /// Pages known to link resolution.
    pub pages: PageIndex,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a whole corpus. The first broken module document aborts the run.
#[instrument(skip_all, fields(files = files.len()))]
pub fn parse(files: &[SourceFile], opts: &ParseOptions) -> Result<Reference> {
    let pages = PageIndex::build(files)?;

    let mut modules = Vec::new();
    for file in files.iter().filter(|f| is_module(f)) {
        modules.push(convert_module(file, &pages, opts)?);
    }

    info!(modules = modules.len(), pages = pages.len(), "parsed corpus");
    Ok(Reference { modules, pages })
}

/// Whether `file` holds directives: an XML module page that is not a `_head.xml` fragment.
pub fn is_module(file: &SourceFile) -> bool {
    file.is_xml() && file.contains(MODULE_MARKER) && !file.name.ends_with("_head.xml")
}

/// Convert one module document against an already built page index.
#[instrument(skip_all, fields(file = %file.name))]
pub fn convert_module(file: &SourceFile, pages: &PageIndex, opts: &ParseOptions) -> Result<Module> {
    let contents = repair(file);
    let current = pages.get(&file.name).cloned().unwrap_or_else(|| PageDescriptor {
        path: file.name.clone(),
        ..PageDescriptor::default()
    });

    let mut ctx = ConversionContext::new(pages, &opts.base_url, &opts.upsell_url, current);
    document::parse_module(&contents, &mut ctx)
        .map_err(|e| RefConvError::document(&file.name, e.to_string()))
}

/// Some sources are truncated before their closing `</module>`.
fn repair(file: &SourceFile) -> Cow<'_, [u8]> {
    if file.contains("<module") && !file.contains("</module>") {
        warn!(file = %file.name, "fixed missing </module>");
        let mut contents = file.contents.clone();
        contents.extend_from_slice(b"</module>");
        Cow::Owned(contents)
    } else {
        Cow::Borrowed(&file.contents)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_URL: &str = "http://example.com";
    const UPSELL_URL: &str = "http://example.com/plus";

    fn fixture(name: &str) -> SourceFile {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/xml")
            .join(name);
        let contents = std::fs::read(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"));
        SourceFile::new(name, contents)
    }

    fn opts() -> ParseOptions {
        ParseOptions {
            base_url: BASE_URL.into(),
            upsell_url: UPSELL_URL.into(),
        }
    }

    /// A module at `path` with one directive whose body is `body`.
    fn module_file(path: &str, body: &str) -> SourceFile {
        let link = path.replacen(".xml", ".html", 1).replacen("/xml", "", 1);
        SourceFile::new(
            path,
            format!(
                r#"
<!DOCTYPE module SYSTEM "../dtd/module.dtd">
<module name="Module ngx_test_module" link="{link}" lang="en">
<section id="directives">
<directive name="test">
{body}
</directive>
</section>
</module>
"#
            ),
        )
    }

    fn article_file(path: &str, name: &str) -> SourceFile {
        let link = path.replacen(".xml", ".html", 1).replacen("/xml", "", 1);
        SourceFile::new(
            path,
            format!(
                r#"<!DOCTYPE article SYSTEM "../dtd/article.dtd">
	<article link="{link}" name="{name}" />"#
            ),
        )
    }

    fn first_directive(files: &[SourceFile]) -> Directive {
        let reference = parse(files, &opts()).expect("parse corpus");
        let module = reference.modules.last().expect("a module");
        module.directives().next().expect("a directive").clone()
    }

    /// Markdown for `xml` placed inside a `<para>`.
    fn prose(xml: &str) -> String {
        let file = module_file("/xml/en/test.xml", &format!("<para>\n{xml}\n</para>"));
        first_directive(&[file]).prose.to_markdown()
    }

    fn syntax(xml: &str) -> Vec<String> {
        let file = module_file("/xml/en/test.xml", xml);
        first_directive(&[file]).syntax.to_markdown()
    }

    fn parse_err(xml: &str) -> String {
        let file = module_file("/xml/en/test.xml", xml);
        parse(&[file], &opts()).unwrap_err().to_string()
    }

    // -- corpus level -------------------------------------------------------

    #[test]
    fn is_module_checks_marker_and_name() {
        assert!(is_module(&fixture("module.xml")));
        assert!(is_module(&fixture("incomplete.xml")));
        assert!(!is_module(&fixture("not-a-module.xml")));
        let head = SourceFile::new("xml/en/docs/http/ngx_x_head.xml", "dtd/module.dtd");
        assert!(!is_module(&head));
    }

    #[test]
    fn parse_module_fixture() {
        let reference = parse(&[fixture("module.xml")], &opts()).unwrap();
        assert_eq!(reference.modules.len(), 1);

        let module = &reference.modules[0];
        assert_eq!(module.name, "Module ngx_FAKE_TEST_module");
        assert_eq!(module.link, "/en/docs/FAKE/ngx_FAKE_TEST_module.html");
        assert_eq!(module.lang, "en");

        let directives: Vec<_> = module.directives().collect();
        assert_eq!(directives.len(), 2);
        let testing = directives[0];
        assert_eq!(testing.name, "testing");
        assert_eq!(testing.default, "on");
        assert_eq!(testing.contexts, ["http", "server", "location"]);
        assert_eq!(testing.syntax.to_markdown(), ["`on` | `off`"]);
        assert_eq!(
            testing.prose.to_markdown(),
            "Free form test.\n\nCan have more than one, with some html—ish entities and `verbatim` text."
        );

        let block = directives[1];
        assert!(block.syntax.is_block());
        assert_eq!(block.syntax.to_markdown(), ["*`name`* `{...}`"]);
        assert_eq!(block.contexts, ["http", "http"]);

        let summary = &module.sections[0];
        assert_eq!(summary.id, "summary");
        assert_eq!(
            summary.prose.to_markdown(),
            "The module is a test.\n\n```\nfake on;\n```"
        );
    }

    #[test]
    fn parse_repairs_missing_closing_tag() {
        let reference = parse(&[fixture("incomplete.xml")], &opts()).unwrap();
        let names: Vec<_> = reference.modules[0].directives().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["who_needs_closing_tags"]);
    }

    #[test]
    fn parse_reads_variables() {
        let reference = parse(&[fixture("variables.xml")], &opts()).unwrap();
        let module = &reference.modules[0];
        let vars: Vec<_> = module.variables().collect();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "$binary_remote_addr");
        assert_eq!(
            vars[0].prose.to_markdown(),
            "client address in a binary form, value’s length is always 4 bytes"
        );
        assert_eq!(vars[1].name, "$arg_NAME");
        assert_eq!(vars[1].prose.to_markdown(), "argument *`name`* in the request line");
    }

    #[test]
    fn variables_need_matching_descriptions() {
        let file = SourceFile::new(
            "xml/en/vars.xml",
            r#"<!DOCTYPE module SYSTEM "../dtd/module.dtd">
<module name="m" link="/m.html" lang="en">
<section id="variables"><para><list type="tag">
<tag-name><var>$a</var></tag-name>
</list></para></section>
</module>"#,
        );
        let err = parse(&[file], &opts()).unwrap_err();
        assert!(err.to_string().contains("same number of names (1) as descs (0)"));
    }

    #[test]
    fn conversion_is_deterministic() {
        let files = [fixture("module.xml"), fixture("variables.xml")];
        let a = parse(&files, &opts()).unwrap();
        let b = parse(&files, &opts()).unwrap();
        assert_eq!(a.modules, b.modules);
    }

    #[test]
    fn broken_document_names_its_path() {
        let err = parse(&[fixture("broken.xml")], &opts()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to convert broken.xml: unexpected </para>, wanted </list>"
        );
    }

    // -- inline elements ----------------------------------------------------

    #[test]
    fn multiple_paras_are_combined() {
        let file = module_file("/xml/en/test.xml", "<para>A</para><para>B</para>");
        assert_eq!(first_directive(&[file]).prose.to_markdown(), "A\n\nB");
    }

    #[test]
    fn text_and_markup_keep_document_order() {
        assert_eq!(prose("the <literal>off</literal> value is required"), "the `off` value is required");
        assert_eq!(prose("A <literal>B</literal>"), "A `B`");
    }

    #[test]
    fn code_like_spans() {
        assert_eq!(prose("<var>$uri</var>"), "`$uri`");
        assert_eq!(prose("<command>nginx -t</command>"), "`nginx -t`");
        assert_eq!(prose("<path>/etc/nginx</path>"), "`/etc/nginx`");
        assert_eq!(prose("<c-def>A=1</c-def>"), "`A=1`");
        assert_eq!(prose("<c-func>fn</c-func>"), "`fn()`");
        assert_eq!(prose("<value>val</value>"), "*`val`*");
        assert_eq!(prose("<parameter>size</parameter>"), "*`size`*");
        assert_eq!(prose("<emphasis>really</emphasis>"), "*really*");
    }

    #[test]
    fn comments_are_ignored() {
        assert_eq!(prose("A <!-- B -->"), "A");
    }

    #[test]
    fn examples_are_fences() {
        assert_eq!(prose("<example> A</example>"), "```\n A\n```");
        assert_eq!(
            prose("<example>\nserver {\n\tlisten 80;\n}\n</example>"),
            "```\nserver {\n\tlisten 80;\n}\n```"
        );
    }

    #[test]
    fn spans_inside_examples_are_plain() {
        assert_eq!(
            prose("<example>upstream <emphasis>name</emphasis></example>"),
            "```\nupstream name\n```"
        );
    }

    #[test]
    fn unknown_tags_show_a_todo() {
        assert_eq!(prose("<what>??</what>"), "`TODO: handle <what>`");
    }

    #[test]
    fn headers_are_quoted() {
        assert_eq!(prose("<header>User-Agent</header>"), "\"User-Agent\"");
    }

    #[test]
    fn http_status() {
        assert_eq!(prose(r#"<http-status code="418" text="I'm a teapot"/>"#), "418 (I'm a teapot)");
    }

    #[test]
    fn commercial_version_links_upsell() {
        assert_eq!(
            prose("<commercial_version>title</commercial_version>"),
            format!("[title]({UPSELL_URL})")
        );
    }

    #[test]
    fn notes_are_quotes() {
        assert_eq!(
            prose("<note>Hey, I'm <value>important</value></note>"),
            "> Hey, I'm *`important`*"
        );
        assert_eq!(
            prose(
                "<note>\nThe <literal>TLSv1.1</literal> and <literal>TLSv1.2</literal> parameters\n\n(1.1.13, 1.0.12) work only when OpenSSL 1.0.1 or higher is used.\n</note>"
            ),
            "> The `TLSv1.1` and `TLSv1.2` parameters\n> (1.1.13, 1.0.12) work only when OpenSSL 1.0.1 or higher is used."
        );
    }

    #[test]
    fn text_after_a_note_leaves_the_quote() {
        let md = prose("see <note>x</note> then more");
        assert_eq!(md, "see\n> x\n\nthen more");
        assert_eq!(
            markdown_to_html(&md),
            "<p>see</p>\n<blockquote>\n<p>x</p>\n</blockquote>\n<p>then more</p>\n"
        );
    }

    #[test]
    fn tabs_keep_word_boundaries() {
        assert_eq!(prose("foo\tbar"), "foo bar");
        assert_eq!(prose("\t\tindented\n\t\ttext"), "indented\ntext");
    }

    #[test]
    fn escaped_markup_survives_html_rendering() {
        let md = prose("use &lt;b&gt;bold&lt;/b&gt; tags");
        assert_eq!(md, "use <b>bold</b> tags");
        assert_eq!(markdown_to_html(&md), "<p>use <b>bold</b> tags</p>\n");
    }

    #[test]
    fn nested_paras_are_separated() {
        assert_eq!(
            prose("first\n<para>second</para>\n<para>third</para>"),
            "first\n\nsecond\n\nthird"
        );
    }

    #[test]
    fn entities_decode() {
        assert_eq!(prose("a&nbsp;b &ldquo;c&rdquo; 2&times;3 &lsquo;d&rsquo; &amp; &#x41;"), "a b “c” 2×3 ‘d’ & A");
    }

    #[test]
    fn unknown_entities_fail() {
        let err = parse_err("<para>&copy;</para>");
        assert!(err.starts_with("failed to convert /xml/en/test.xml"));
    }

    #[test]
    fn mismatched_end_tags_fail() {
        let err = parse_err("<para><literal>x</para></literal>");
        assert!(err.ends_with("unexpected </para>, wanted </literal>"));
    }

    // -- lists --------------------------------------------------------------

    #[test]
    fn tag_list() {
        let xml = r#"<list type="tag">
			<tag-name>tag <literal>one</literal></tag-name>
			<tag-desc>contents</tag-desc>
			<tag-name>tag two</tag-name>
			<tag-desc>more <var>contents</var></tag-desc>
			</list>"#;
        assert_eq!(
            prose(xml),
            "- tag `one`\n\n  contents\n- tag two\n\n  more `contents`"
        );
    }

    #[test]
    fn bullet_list() {
        let xml = r#"<list type="bullet">
			<listitem><para>content</para></listitem>
			<listitem>more <literal>content</literal></listitem>
			</list>"#;
        assert_eq!(prose(xml), "- content\n- more `content`");
    }

    #[test]
    fn enum_list() {
        let xml = r#"<list type="enum">
			<listitem>content</listitem>
			<listitem>more <literal>content</literal></listitem>
			</list>"#;
        assert_eq!(prose(xml), "1. content\n2. more `content`");
    }

    #[test]
    fn nested_lists_indent_by_depth() {
        let xml = r#"<list type="tag">
			<tag-name>tag</tag-name>
			<tag-desc>
				stuff
				<list type="bullet">
					<listitem>another list!</listitem>
					<listitem>
						but wait
						<list type="enum">
							<listitem>there's more!</listitem>
						</list>
					</listitem>
				</list>
			</tag-desc>
			</list>"#;
        assert_eq!(
            prose(xml),
            "- tag\n\n  stuff\n  - another list!\n  - but wait\n    1. there's more!"
        );
    }

    #[test]
    fn multi_line_items_indent_every_line() {
        let xml = "<list type=\"bullet\"><listitem>first line\nsecond line</listitem></list>";
        assert_eq!(prose(xml), "- first line\nsecond line");

        let xml = "<list type=\"bullet\"><listitem>outer<list type=\"bullet\"><listitem>first line\nsecond line</listitem></list></listitem></list>";
        assert_eq!(prose(xml), "- outer\n  - first line\n  second line");

        let xml = "<list type=\"bullet\"><listitem>o<list type=\"enum\"><listitem>one\ntwo</listitem></list></listitem></list>";
        assert_eq!(prose(xml), "- o\n  1. one\n  two");
    }

    #[test]
    fn tag_list_count_mismatch_fails() {
        let err = parse_err(
            r#"<para><list type="tag"><tag-name>a</tag-name><tag-name>b</tag-name><tag-desc>x</tag-desc></list></para>"#,
        );
        assert!(err.ends_with("tag lists must have same number of names (2) as descs (1)"));
    }

    #[test]
    fn unknown_list_type_fails() {
        let err = parse_err(r#"<para><list type="fancy"><listitem>a</listitem></list></para>"#);
        assert!(err.ends_with("unknown list type 'fancy'"));
    }

    #[test]
    fn list_depth_recovers_after_a_list() {
        let xml = r#"<list type="bullet"><listitem>a</listitem></list>
<list type="bullet"><listitem>b</listitem></list>"#;
        assert_eq!(prose(xml), "- a\n\n- b");
    }

    // -- syntax -------------------------------------------------------------

    #[test]
    fn syntax_forms() {
        let cases = [
            ("<literal>enumA</literal> | <literal>enumB</literal>", "`enumA` | `enumB`"),
            ("<value>arg</value>", "*`arg`*"),
            ("<value>argA</value> <value>argB</value>", "*`argA`* *`argB`*"),
            (
                "[<literal>flagA</literal>]\n[<literal>flagB</literal>]\n[<literal>flagC</literal>]",
                "[`flagA`] [`flagB`] [`flagC`]",
            ),
            ("<value>arg</value> [<literal>flag</literal>]", "*`arg`* [`flag`]"),
            (
                "<value>argA</value> | <value>argB</value> | <literal>flag</literal>",
                "*`argA`* | *`argB`* | `flag`",
            ),
            (
                "<value>arg</value> [<literal>opt</literal>=<value>val</value>]",
                "*`arg`* [`opt`=*`val`*]",
            ),
            ("\n    [<literal>SSLv2</literal>]\n    [<literal>SSLv4</literal>]\n", "[`SSLv2`] [`SSLv4`]"),
        ];
        for (xml, want) in cases {
            assert_eq!(syntax(&format!("<syntax>{xml}</syntax>")), [want], "failed on `{xml}`");
        }
    }

    #[test]
    fn multiple_syntax_forms() {
        assert_eq!(
            syntax("<syntax><value>arg1</value></syntax><syntax><value>arg2</value></syntax>"),
            ["*`arg1`*", "*`arg2`*"]
        );
    }

    #[test]
    fn block_syntax_gets_marker() {
        let file = module_file(
            "/xml/en/test.xml",
            r#"<syntax block="yes"><value>arg1</value></syntax>"#,
        );
        let directive = first_directive(&[file]);
        assert_eq!(directive.syntax.to_markdown(), ["*`arg1`* `{...}`"]);
        assert!(directive.syntax.is_block());
    }

    // -- links --------------------------------------------------------------

    fn link(xml: &str) -> String {
        let files = [
            article_file("/xml/en/debugging.xml", "I'm another file"),
            article_file("/xml/above.xml", "I'm in the parent dir"),
            module_file("/xml/en/child/below.xml", ""),
            module_file("/xml/en/test.xml", &format!("<para>{xml}</para>")),
        ];
        first_directive(&files).prose.to_markdown()
    }

    #[test]
    fn links_resolve() {
        let cases = [
            (r#"<link id="accept_mutex"/>"#, "[`accept_mutex`](http://example.com/en/test.html#accept_mutex)"),
            (r#"<link doc="debugging.xml"/>"#, "[I'm another file](http://example.com/en/debugging.html)"),
            (
                r#"<link doc="child/below.xml">ngx_http_perl_module</link>"#,
                "[ngx_http_perl_module](http://example.com/en/child/below.html)",
            ),
            (
                r#"<link doc="child/below.xml" id="reuseport"/>"#,
                "[`reuseport`](http://example.com/en/child/below.html#reuseport)",
            ),
            (r#"<link doc="../above.xml" id="epoll"/>"#, "[`epoll`](http://example.com/above.html#epoll)"),
            (
                r#"<link doc="debugging.xml"><literal>--foo</literal></link>"#,
                "[`--foo`](http://example.com/en/debugging.html)",
            ),
            (r#"<link url="http://nginx.org">hello</link>"#, "[hello](http://nginx.org)"),
            (r#"<link url="http://nginx.org" id="x">hello</link>"#, "[hello](http://nginx.org)"),
            (r#"<link url="http://nginx.org">hello&#xA;world</link>"#, "[hello world](http://nginx.org)"),
        ];
        for (xml, want) in cases {
            assert_eq!(link(xml), want, "failed on `{xml}`");
        }
    }

    #[test]
    fn unresolved_links_fall_back_to_current_page() {
        assert_eq!(
            link(r#"<link doc="missing.xml" id="x"/>"#),
            "[`x`](http://example.com/en/test.html#x)"
        );
        assert_eq!(
            link(r#"<link doc="missing.xml"/>"#),
            "[missing.xml](http://example.com/en/test.html)"
        );
    }
}
