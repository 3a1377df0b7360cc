//! Structured content of a module document.

use quick_xml::events::BytesStart;

use crate::elements;
use crate::html::markdown_to_html;
use crate::index::ConversionContext;
use crate::walk::{Attrs, MarkupError, MarkupResult, Rendered, Walker, collapse_whitespace};

/// Marker appended to the syntax of directives that open a block.
const BLOCK_MARKER: &str = "`{...}`";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One way of writing a directive, as a single Markdown line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub content: String,
    /// The directive introduces a nested configuration block.
    pub is_block: bool,
}

/// All syntax forms of a directive, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Syntaxes(pub Vec<Syntax>);

impl Syntaxes {
    pub fn to_markdown(&self) -> Vec<String> {
        self.0.iter().map(|s| s.content.clone()).collect()
    }

    /// Each form converted separately.
    pub fn to_html(&self) -> Vec<String> {
        self.0.iter().map(|s| markdown_to_html(&s.content)).collect()
    }

    /// Whether any form opens a block.
    pub fn is_block(&self) -> bool {
        self.0.iter().any(|s| s.is_block)
    }
}

/// A converted paragraph, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub content: String,
}

/// Paragraphs of prose, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prose(pub Vec<Paragraph>);

impl Prose {
    /// Paragraphs separated by blank lines.
    pub fn to_markdown(&self) -> String {
        self.0
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_html(&self) -> String {
        markdown_to_html(&self.to_markdown())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub default: String,
    /// Contexts exactly as listed, duplicates included.
    pub contexts: Vec<String>,
    pub syntax: Syntaxes,
    pub prose: Prose,
}

/// A variable a module defines, e.g. `$binary_remote_addr` or `$arg_NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub prose: Prose,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub directives: Vec<Directive>,
    pub prose: Prose,
    /// Only filled for the `variables` section.
    pub variables: Vec<Variable>,
}

/// A converted `<module>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub link: String,
    pub lang: String,
    pub sections: Vec<Section>,
}

impl Module {
    /// Directives of every section, in document order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.sections.iter().flat_map(|s| s.directives.iter())
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.sections.iter().flat_map(|s| s.variables.iter())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub(crate) fn parse_module(xml: &[u8], ctx: &mut ConversionContext<'_>) -> MarkupResult<Module> {
    let mut walker = Walker::new(xml);
    let root = walker
        .root()?
        .filter(|r| r.local_name().as_ref() == b"module")
        .ok_or(MarkupError::MissingRoot("module"))?;

    let attrs = Attrs::of(&root)?;
    let mut module = Module {
        name: attrs.get("name").to_string(),
        link: attrs.get("link").to_string(),
        lang: attrs.get("lang").to_string(),
        sections: Vec::new(),
    };

    walker.children(&root, |w, child| {
        if child.local_name().as_ref() == b"section" {
            module.sections.push(parse_section(w, &child, ctx)?);
        } else {
            w.skip(&child)?;
        }
        Ok(())
    })?;

    Ok(module)
}

fn parse_section(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Section> {
    let id = Attrs::of(start)?.get("id").to_string();
    if id == "variables" {
        let variables = parse_variables(walker, start, ctx)?;
        return Ok(Section {
            id,
            variables,
            ..Section::default()
        });
    }

    let mut section = Section {
        id,
        ..Section::default()
    };
    walker.children(start, |w, child| {
        match child.local_name().as_ref() {
            b"directive" => section.directives.push(parse_directive(w, &child, ctx)?),
            b"para" | b"example" | b"note" | b"list" => {
                section.prose.0.push(paragraph(w, &child, ctx)?);
            }
            _ => w.skip(&child)?,
        }
        Ok(())
    })?;
    Ok(section)
}

fn parse_directive(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Directive> {
    let mut directive = Directive {
        name: Attrs::of(start)?.get("name").to_string(),
        ..Directive::default()
    };

    walker.children(start, |w, child| {
        match child.local_name().as_ref() {
            b"syntax" => directive.syntax.0.push(parse_syntax(w, &child, ctx)?),
            b"default" => directive.default = w.text_content(&child)?.trim().to_string(),
            b"context" => directive.contexts.push(w.text_content(&child)?.trim().to_string()),
            b"para" | b"example" | b"note" | b"list" => {
                directive.prose.0.push(paragraph(w, &child, ctx)?);
            }
            _ => w.skip(&child)?,
        }
        Ok(())
    })?;
    Ok(directive)
}

/// Syntax is authored across lines for readability but renders as one line.
fn parse_syntax(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Syntax> {
    let is_block = Attrs::of(start)?.get("block") == "yes";
    let mut content = collapse_whitespace(&walker.convert(start, ctx)?.into_markdown());
    if is_block {
        if !content.is_empty() {
            content.push(' ');
        }
        content.push_str(BLOCK_MARKER);
    }
    Ok(Syntax { content, is_block })
}

/// A top-level prose element rendered on its own.
fn paragraph(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Paragraph> {
    let mut out = Rendered::default();
    elements::render(walker, start, &mut out, ctx)?;
    Ok(Paragraph {
        content: out.into_trimmed(),
    })
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Variables are documented as `<para><list type="tag">` pairs whose names
/// hold `<var>$name</var>` and an optional `<value>suffix</value>`.
fn parse_variables(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Vec<Variable>> {
    let mut variables = Vec::new();
    walker.children(start, |w, para| {
        if para.local_name().as_ref() != b"para" {
            return w.skip(&para);
        }
        w.children(&para, |w, child| {
            if child.local_name().as_ref() == b"list" {
                variables.extend(variable_list(w, &child, ctx)?);
            } else {
                w.skip(&child)?;
            }
            Ok(())
        })
    })?;
    Ok(variables)
}

fn variable_list(
    walker: &mut Walker<'_>,
    start: &BytesStart<'_>,
    ctx: &mut ConversionContext<'_>,
) -> MarkupResult<Vec<Variable>> {
    let mut names = Vec::new();
    let mut descs = Vec::new();
    walker.children(start, |w, child| {
        match child.local_name().as_ref() {
            b"tag-name" => names.push(variable_name(w, &child)?),
            b"tag-desc" => descs.push(w.convert(&child, ctx)?.into_trimmed()),
            _ => w.skip(&child)?,
        }
        Ok(())
    })?;

    if names.len() != descs.len() {
        return Err(MarkupError::TagListMismatch {
            names: names.len(),
            descs: descs.len(),
        });
    }

    Ok(names
        .into_iter()
        .zip(descs)
        .map(|(name, content)| Variable {
            name,
            prose: Prose(vec![Paragraph { content }]),
        })
        .collect())
}

fn variable_name(walker: &mut Walker<'_>, start: &BytesStart<'_>) -> MarkupResult<String> {
    let mut name = String::new();
    let mut suffix = String::new();
    walker.children(start, |w, child| {
        match child.local_name().as_ref() {
            b"var" => name.push_str(w.text_content(&child)?.trim()),
            b"value" => suffix.push_str(w.text_content(&child)?.trim()),
            _ => w.skip(&child)?,
        }
        Ok(())
    })?;
    name.push_str(&suffix.to_uppercase());
    Ok(name)
}
