//! The page index and the per-document conversion context.

use std::collections::BTreeMap;

use refconv_shared::{RefConvError, Result, SourceFile};
use tracing::{debug, instrument};

use crate::walk::{Attrs, MarkupResult, Walker, local_name};

const ARTICLE_MARKER: &str = "dtd/article.dtd";
pub(crate) const MODULE_MARKER: &str = "dtd/module.dtd";

/// Display name and canonical link of a document that links can point at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Source path inside the corpus, e.g. `xml/en/docs/http/ngx_http_core_module.xml`.
    pub path: String,
    /// Declared display name.
    pub name: String,
    /// Declared canonical link, e.g. `/en/docs/http/ngx_http_core_module.html`.
    pub link: String,
}

/// Lookup table from source path to [`PageDescriptor`].
///
/// Built in one pass over the whole corpus before any document is converted,
/// so links may point forwards as well as backwards.
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    pages: BTreeMap<String, PageDescriptor>,
}

impl PageIndex {
    /// Index every document whose root element is `<article>` or `<module>`.
    ///
    /// Only the root element is read. A document that declares one of the
    /// page schemas but cannot be read fails the build; anything else that
    /// cannot be read is skipped.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn build(files: &[SourceFile]) -> Result<Self> {
        let mut pages = BTreeMap::new();

        for file in files.iter().filter(|f| f.is_xml()) {
            let declared = file.contains(ARTICLE_MARKER) || file.contains(MODULE_MARKER);
            match read_descriptor(file) {
                Ok(Some(page)) => {
                    pages.insert(page.path.clone(), page);
                }
                Ok(None) => {}
                Err(e) if declared => {
                    return Err(RefConvError::document(&file.name, e.to_string()));
                }
                Err(e) => debug!(file = %file.name, error = %e, "skipping unreadable file"),
            }
        }

        debug!(pages = pages.len(), "built page index");
        Ok(Self { pages })
    }

    /// Look up a page by its exact source path.
    pub fn get(&self, path: &str) -> Option<&PageDescriptor> {
        self.pages.get(path)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn read_descriptor(file: &SourceFile) -> MarkupResult<Option<PageDescriptor>> {
    let mut walker = Walker::new(&file.contents);
    let Some(root) = walker.root()? else {
        return Ok(None);
    };
    if !matches!(local_name(&root).as_str(), "article" | "module") {
        return Ok(None);
    }
    let attrs = Attrs::of(&root)?;
    Ok(Some(PageDescriptor {
        path: file.name.clone(),
        name: attrs.get("name").to_string(),
        link: attrs.get("link").to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Conversion context
// ---------------------------------------------------------------------------

/// State consulted while converting a single document.
///
/// One value per document, passed explicitly down the walk.
#[derive(Debug)]
pub struct ConversionContext<'a> {
    pub pages: &'a PageIndex,
    /// Prefix for links built from canonical page links.
    pub base_url: &'a str,
    /// Target of `<commercial_version>` links.
    pub upsell_url: &'a str,
    /// The document being converted.
    pub current: PageDescriptor,
    /// Number of `<list>` elements currently open.
    pub list_depth: usize,
    /// Set while inside a fenced example.
    pub verbatim: bool,
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        pages: &'a PageIndex,
        base_url: &'a str,
        upsell_url: &'a str,
        current: PageDescriptor,
    ) -> Self {
        Self {
            pages,
            base_url,
            upsell_url,
            current,
            list_depth: 0,
            verbatim: false,
        }
    }

    /// Find another page by a path relative to the current document.
    pub fn page(&self, relative: &str) -> Option<&'a PageDescriptor> {
        if relative.is_empty() {
            return None;
        }
        self.pages.get(&join_relative(&self.current.path, relative))
    }
}

/// Resolve `relative` against the directory of `current`, handling `.` and `..`.
pub(crate) fn join_relative(current: &str, relative: &str) -> String {
    let rooted = current.starts_with('/');
    let mut parts: Vec<&str> = current
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    parts.pop();

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    if rooted { format!("/{joined}") } else { joined }
}
