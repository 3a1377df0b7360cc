//! Upstream revision discovery.
//!
//! The documentation repository publishes an Atom feed of its commits. The
//! link of the newest entry identifies the revision a catalog was built from,
//! which lets a run skip conversion when nothing changed upstream.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use refconv_shared::{RefConvError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};

/// Maximum number of redirects to follow when fetching the feed.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds for fetching the feed.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Feeds larger than this are rejected (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("refconv/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The newest revision announced by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedVersion {
    /// `href` of the first entry's `<link>`.
    pub revision: String,
    /// The entry's `<updated>` timestamp, when present and well-formed.
    pub updated: Option<DateTime<Utc>>,
}

/// Configuration for the feed lookup.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Download the Atom feed at `feed_url` and return its newest revision.
#[instrument(skip(opts))]
pub async fn latest_version(feed_url: &str, opts: &DiscoveryOptions) -> Result<FeedVersion> {
    let client = build_client(opts)?;
    let body = fetch(&client, feed_url).await?;
    let version = parse_feed(&body)?;
    info!(revision = %version.revision, "found upstream revision");
    Ok(version)
}

/// Extract the newest revision from an Atom document.
pub fn parse_feed(xml: &str) -> Result<FeedVersion> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_entry = false;
    let mut in_updated = false;
    let mut revision: Option<String> = None;
    let mut updated = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => in_entry = true,
                b"link" if in_entry && revision.is_none() => revision = href(&e)?,
                b"updated" if in_entry => in_updated = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_entry && revision.is_none() && e.local_name().as_ref() == b"link" {
                    revision = href(&e)?;
                }
            }
            Ok(Event::Text(t)) if in_updated => {
                let text = t
                    .unescape()
                    .map_err(|e| RefConvError::feed(format!("unable to parse XML: {e}")))?;
                updated = match DateTime::parse_from_rfc3339(text.trim()) {
                    Ok(ts) => Some(ts.with_timezone(&Utc)),
                    Err(e) => {
                        debug!(error = %e, value = %text, "ignoring malformed <updated>");
                        None
                    }
                };
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"updated" => in_updated = false,
                // Only the newest entry matters.
                b"entry" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(RefConvError::feed(format!("unable to parse XML: {e}"))),
        }
    }

    match revision {
        Some(revision) => Ok(FeedVersion { revision, updated }),
        None if in_entry => Err(RefConvError::feed("first entry has no link")),
        None => Err(RefConvError::feed("no entry was found in the feed")),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn href(link: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in link.attributes() {
        let attr = attr.map_err(|e| RefConvError::feed(format!("bad <link> attribute: {e}")))?;
        if attr.key.local_name().as_ref() == b"href" {
            let value = attr
                .unescape_value()
                .map_err(|e| RefConvError::feed(format!("bad <link> href: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| RefConvError::Network(format!("failed to build HTTP client: {e}")))
}

async fn fetch(client: &Client, url: &str) -> Result<String> {
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

    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(RefConvError::validation(format!(
                "{url}: feed too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    response
        .text()
        .await
        .map_err(|e| RefConvError::Network(format!("{url}: failed to read body: {e}")))
}
