//! Application configuration for refconv.
//!
//! User config lives at `~/.refconv/refconv.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RefConvError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "refconv.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".refconv";

// ---------------------------------------------------------------------------
// Config structs (matching refconv.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the XML sources and their revision feed come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Link and language settings used while converting.
    #[serde(default)]
    pub render: RenderConfig,

    /// Where the catalog is written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Local path or URL of the `.tar.gz` holding the XML sources.
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    /// Atom feed announcing upstream revisions.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            archive_url: default_archive_url(),
            feed_url: default_feed_url(),
        }
    }
}

fn default_archive_url() -> String {
    "https://github.com/nginx/nginx.org/archive/refs/heads/main.tar.gz".into()
}
fn default_feed_url() -> String {
    "https://github.com/nginx/nginx.org/commits/main.atom".into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Prefix for every link built from a page's canonical link.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Target of `<commercial_version>` links.
    #[serde(default = "default_upsell_url")]
    pub upsell_url: String,

    /// Only modules declaring this `lang` end up in the catalog.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upsell_url: default_upsell_url(),
            language: default_language(),
        }
    }
}

fn default_base_url() -> String {
    "https://nginx.org".into()
}
fn default_upsell_url() -> String {
    "https://nginx.com/products/".into()
}
fn default_language() -> String {
    "en".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination of the JSON catalog.
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    "reference.json".into()
}

// ---------------------------------------------------------------------------
// Convert settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime conversion settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ConvertSettings {
    /// Local path or URL of the source archive.
    pub archive_url: String,
    /// Revision feed URL.
    pub feed_url: String,
    /// Base URL for rendered links.
    pub base_url: String,
    /// Target of upsell links.
    pub upsell_url: String,
    /// Catalog language filter.
    pub language: String,
    /// Destination of the JSON catalog.
    pub output_path: PathBuf,
    /// Convert even when the destination already holds the upstream revision.
    pub force: bool,
}

impl From<&AppConfig> for ConvertSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            archive_url: config.source.archive_url.clone(),
            feed_url: config.source.feed_url.clone(),
            base_url: config.render.base_url.clone(),
            upsell_url: config.render.upsell_url.clone(),
            language: config.render.language.clone(),
            output_path: PathBuf::from(&config.output.path),
            force: false,
        }
    }
}

impl ConvertSettings {
    /// Check the settings before starting a run.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [("base_url", &self.base_url), ("upsell_url", &self.upsell_url)] {
            Url::parse(value).map_err(|e| {
                RefConvError::config(format!("{key} '{value}' is not a valid URL: {e}"))
            })?;
        }
        if self.language.trim().is_empty() {
            return Err(RefConvError::config("language must not be empty"));
        }
        if self.archive_url.trim().is_empty() {
            return Err(RefConvError::config("archive_url must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.refconv/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RefConvError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.refconv/refconv.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RefConvError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RefConvError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RefConvError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RefConvError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RefConvError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
