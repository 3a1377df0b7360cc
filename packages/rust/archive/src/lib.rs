//! Reads the documentation sources out of a `.tar.gz` archive.
//!
//! The archive can live on disk or behind a URL. Either way the whole thing is
//! decompressed in memory and handed back as a flat list of [`SourceFile`]s.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use refconv_shared::{RefConvError, Result, SourceFile};
use reqwest::Client;
use tracing::{debug, info, instrument};

/// Maximum number of redirects to follow when downloading the archive.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for the download.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// User-Agent string for archive downloads.
const USER_AGENT: &str = concat!("refconv/", env!("CARGO_PKG_VERSION"));

const ARCHIVE_SUFFIX: &str = ".tar.gz";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for fetching an archive over HTTP.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Timeout for the whole download in seconds.
    pub timeout_secs: u64,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Open the archive at `path_or_url` and return every `.xml` file inside it.
///
/// An existing local path wins over a URL interpretation of the same string.
#[instrument(skip(opts))]
pub async fn open(path_or_url: &str, opts: &ArchiveOptions) -> Result<Vec<SourceFile>> {
    if !path_or_url.ends_with(ARCHIVE_SUFFIX) {
        return Err(RefConvError::validation(format!(
            "invalid source {path_or_url}, must be a tar.gz"
        )));
    }

    let path = Path::new(path_or_url);
    let is_local = tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file());
    let bytes = if is_local {
        debug!("reading archive from disk");
        tokio::fs::read(path).await.map_err(|e| RefConvError::io(path, e))?
    } else {
        download(path_or_url, opts).await?
    };

    let files = unpack(&bytes)?;
    info!(files = files.len(), "read archive");
    Ok(files)
}

/// Decompress a gzipped tarball and collect its regular `.xml` entries in archive order.
pub fn unpack(bytes: &[u8]) -> Result<Vec<SourceFile>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| RefConvError::archive(format!("failed to read archive: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let mut entry = entry
            .map_err(|e| RefConvError::archive(format!("failed to read next archive entry: {e}")))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .map_err(|e| RefConvError::archive(format!("bad entry name: {e}")))?
            .to_string_lossy()
            .into_owned();
        if !name.ends_with(".xml") {
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| RefConvError::archive(format!("failed to read {name}: {e}")))?;
        files.push(SourceFile::new(name, contents));
    }

    Ok(files)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_client(opts: &ArchiveOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| RefConvError::Network(format!("failed to build HTTP client: {e}")))
}

async fn download(url: &str, opts: &ArchiveOptions) -> Result<Vec<u8>> {
    info!(%url, "downloading archive");
    let client = build_client(opts)?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RefConvError::Network(format!("unable to download {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefConvError::Network(format!(
            "unable to download {url}: HTTP {status}"
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| RefConvError::Network(format!("{url}: failed to read body: {e}")))?;
    debug!(bytes = body.len(), "downloaded archive");
    Ok(body.to_vec())
}
