//! Directive catalog assembly and serialization.
//!
//! A [`Catalog`] is the flattened, language-filtered view of the converted
//! modules that downstream consumers (editors, doc browsers) load as JSON.

use std::io::{Read, Write};
use std::path::Path;

use refconv_markdown::{Directive, Module, Variable};
use refconv_shared::{RefConvError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const MODULE_PREFIX: &str = "Module ";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The whole catalog: every module with directives, plus the upstream revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub modules: Vec<ModuleRecord>,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Canonical link of the module page.
    pub id: String,
    /// Display name without the `Module ` prefix.
    pub name: String,
    pub directives: Vec<DirectiveRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveRecord {
    pub name: String,
    pub default: String,
    pub contexts: Vec<String>,
    pub syntax_md: Vec<String>,
    pub syntax_html: Vec<String>,
    #[serde(rename = "isBlock")]
    pub is_block: bool,
    pub description_md: String,
    pub description_html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub description_md: String,
    pub description_html: String,
}

impl From<&Directive> for DirectiveRecord {
    fn from(d: &Directive) -> Self {
        Self {
            name: d.name.clone(),
            default: d.default.clone(),
            contexts: d.contexts.clone(),
            syntax_md: d.syntax.to_markdown(),
            syntax_html: d.syntax.to_html(),
            is_block: d.syntax.is_block(),
            description_md: d.prose.to_markdown(),
            description_html: d.prose.to_html(),
        }
    }
}

impl From<&Variable> for VariableRecord {
    fn from(v: &Variable) -> Self {
        Self {
            name: v.name.clone(),
            description_md: v.prose.to_markdown(),
            description_html: v.prose.to_html(),
        }
    }
}

impl From<&Module> for ModuleRecord {
    fn from(m: &Module) -> Self {
        Self {
            id: m.link.clone(),
            name: m.name.strip_prefix(MODULE_PREFIX).unwrap_or(&m.name).to_string(),
            directives: m.directives().map(DirectiveRecord::from).collect(),
            variables: m.variables().map(VariableRecord::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

impl Catalog {
    /// Assemble the catalog for one language.
    ///
    /// Modules in other languages and modules without directives are left out.
    #[instrument(skip(modules), fields(modules = modules.len()))]
    pub fn new(version: &str, modules: &[Module], language: &str) -> Self {
        let modules: Vec<ModuleRecord> = modules
            .iter()
            .filter(|m| m.lang == language)
            .map(ModuleRecord::from)
            .filter(|m| {
                if m.directives.is_empty() {
                    debug!(module = %m.name, "dropping module without directives");
                }
                !m.directives.is_empty()
            })
            .collect();

        info!(modules = modules.len(), "assembled catalog");
        Self {
            modules,
            version: version.to_string(),
        }
    }

    /// Number of directives across all modules.
    pub fn directive_count(&self) -> usize {
        self.modules.iter().map(|m| m.directives.len()).sum()
    }

    /// Write pretty-printed JSON followed by a newline.
    pub fn write(&self, mut writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| RefConvError::Serialization(format!("failed to encode catalog: {e}")))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| RefConvError::Serialization(format!("failed to write catalog: {e}")))
    }

    /// Write to `path`, replacing it only once the whole catalog is on disk.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| RefConvError::io(dir, e))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RefConvError::io(dir, e))?;
        self.write(temp.as_file_mut())?;
        temp.persist(path)
            .map_err(|e| RefConvError::io(path, e.error))?;

        debug!("catalog written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Version lookup
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct VersionOnly {
    #[serde(default)]
    version: String,
}

/// The version recorded in a previously written catalog.
pub fn read_version(reader: impl Read) -> Result<String> {
    let catalog: VersionOnly = serde_json::from_reader(reader)
        .map_err(|e| RefConvError::Serialization(format!("failed to decode catalog: {e}")))?;
    Ok(catalog.version)
}

/// Like [`read_version`], reading from `path`. A missing file has no version.
pub fn read_version_from_path(path: &Path) -> Result<Option<String>> {
    match std::fs::File::open(path) {
        Ok(file) => read_version(std::io::BufReader::new(file)).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RefConvError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use refconv_markdown::{Paragraph, Prose, Section, Syntax, Syntaxes};

    use super::*;

    fn prose(text: &str) -> Prose {
        Prose(vec![Paragraph {
            content: text.into(),
        }])
    }

    fn directive(name: &str) -> Directive {
        Directive {
            name: name.into(),
            default: "default 2".into(),
            contexts: vec!["context 1".into(), "context 2".into()],
            syntax: Syntaxes(vec![
                Syntax {
                    content: "syntax 1".into(),
                    is_block: false,
                },
                Syntax {
                    content: "syntax 2".into(),
                    is_block: false,
                },
            ]),
            prose: prose("Test"),
        }
    }

    fn module(name: &str, lang: &str, directives: Vec<Directive>) -> Module {
        Module {
            name: name.into(),
            link: format!("/{lang}/docs/{}.html", name.to_lowercase().replace(' ', "_")),
            lang: lang.into(),
            sections: vec![Section {
                id: "directives".into(),
                directives,
                ..Section::default()
            }],
        }
    }

    #[test]
    fn new_filters_and_flattens() {
        let modules = vec![
            module("Module 1", "en", vec![]),
            module("Module 2", "en", vec![directive("directive 2")]),
            module("Module 3", "ru", vec![directive("directive 3")]),
        ];
        let catalog = Catalog::new("1.0", &modules, "en");

        assert_eq!(catalog.version, "1.0");
        assert_eq!(catalog.modules.len(), 1);
        let m = &catalog.modules[0];
        assert_eq!(m.name, "2");
        assert_eq!(m.id, "/en/docs/module_2.html");
        assert_eq!(
            m.directives[0],
            DirectiveRecord {
                name: "directive 2".into(),
                default: "default 2".into(),
                contexts: vec!["context 1".into(), "context 2".into()],
                syntax_md: vec!["syntax 1".into(), "syntax 2".into()],
                syntax_html: vec!["<p>syntax 1</p>\n".into(), "<p>syntax 2</p>\n".into()],
                is_block: false,
                description_md: "Test".into(),
                description_html: "<p>Test</p>\n".into(),
            }
        );
    }

    #[test]
    fn new_keeps_section_order() {
        let mut m = module("Module ngx_x", "en", vec![directive("a")]);
        m.sections.push(Section {
            id: "more".into(),
            directives: vec![directive("b"), directive("c")],
            ..Section::default()
        });
        let catalog = Catalog::new("", &[m], "en");
        let names: Vec<_> = catalog.modules[0].directives.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(catalog.directive_count(), 3);
    }

    #[test]
    fn only_the_leading_prefix_is_stripped() {
        let m = module("Module ngx_mod_Module", "en", vec![directive("a")]);
        let catalog = Catalog::new("", &[m], "en");
        assert_eq!(catalog.modules[0].name, "ngx_mod_Module");

        let m = module("ngx_stream_core_module", "en", vec![directive("a")]);
        let catalog = Catalog::new("", &[m], "en");
        assert_eq!(catalog.modules[0].name, "ngx_stream_core_module");
    }

    #[test]
    fn write_is_pretty_and_unescaped() {
        let mut m = module("Module 1", "en", vec![directive("d")]);
        m.sections[0].directives[0].syntax.0[0].is_block = true;
        m.sections[0].directives[0].contexts.clear();
        let catalog = Catalog::new("1.0", &[m], "en");

        let mut buf = Vec::new();
        catalog.write(&mut buf).unwrap();
        let json = String::from_utf8(buf).unwrap();

        assert!(json.contains("<p>Test</p>"));
        assert!(json.contains("\n  \"modules\": ["));
        assert!(json.contains("\"isBlock\": true"));
        assert!(json.contains("\"contexts\": []"));
        assert!(!json.contains("variables"));
        assert!(json.ends_with("}\n"));

        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn variables_are_serialized_when_present() {
        let mut m = module("Module 1", "en", vec![directive("d")]);
        m.sections.push(Section {
            id: "variables".into(),
            variables: vec![Variable {
                name: "$arg_NAME".into(),
                prose: prose("argument *`name`*"),
            }],
            ..Section::default()
        });
        let catalog = Catalog::new("1.0", &[m], "en");
        let v = &catalog.modules[0].variables[0];
        assert_eq!(v.name, "$arg_NAME");
        assert_eq!(v.description_md, "argument *`name`*");
        assert_eq!(v.description_html, "<p>argument <em><code>name</code></em></p>\n");
    }

    #[test]
    fn read_version_ignores_other_fields() {
        let json = r#"{"modules": [{ "name": "Module 1", "directives": [] }], "version": "1.0"}"#;
        assert_eq!(read_version(json.as_bytes()).unwrap(), "1.0");
        assert_eq!(read_version("{}".as_bytes()).unwrap(), "");
        assert!(read_version("not json".as_bytes()).is_err());
    }

    #[test]
    fn write_to_path_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/reference.json");
        assert_eq!(read_version_from_path(&path).unwrap(), None);

        let m = module("Module 1", "en", vec![directive("d")]);
        Catalog::new("v1", &[m.clone()], "en").write_to_path(&path).unwrap();
        assert_eq!(read_version_from_path(&path).unwrap().as_deref(), Some("v1"));

        Catalog::new("v2", &[m], "en").write_to_path(&path).unwrap();
        assert_eq!(read_version_from_path(&path).unwrap().as_deref(), Some("v2"));

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
