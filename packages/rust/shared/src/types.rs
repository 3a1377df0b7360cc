//! Core domain types shared between the archive reader and the converter.

/// One regular file extracted from the documentation archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path of the entry inside the archive (e.g. `nginx.org-main/xml/en/docs/index.xml`).
    pub name: String,
    /// Raw bytes of the entry.
    pub contents: Vec<u8>,
}

impl SourceFile {
    /// Create a source file from a name and its bytes.
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Reports whether `needle` occurs anywhere in the file's bytes.
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        if needle.is_empty() {
            return true;
        }
        self.contents.windows(needle.len()).any(|w| w == needle)
    }

    /// Whether the file name has an `.xml` extension.
    pub fn is_xml(&self) -> bool {
        self.name.ends_with(".xml")
    }
}
