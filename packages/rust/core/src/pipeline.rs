//! End-to-end `convert` pipeline: feed → archive → parse → catalog → JSON.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use refconv_archive::ArchiveOptions;
use refconv_artifacts::Catalog;
use refconv_discovery::{DiscoveryOptions, FeedVersion};
use refconv_markdown::ParseOptions;
use refconv_shared::{ConvertSettings, Result};

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new catalog was written.
    Written {
        /// Where the catalog was written.
        path: PathBuf,
        /// Upstream revision recorded in the catalog (empty when unknown).
        version: String,
        /// When the upstream revision was published, if the feed said.
        updated: Option<DateTime<Utc>>,
        /// Number of modules in the catalog.
        modules: usize,
        /// Number of directives across all modules.
        directives: usize,
        /// Total elapsed time.
        elapsed: Duration,
    },
    /// The destination already holds the upstream revision; nothing was touched.
    UpToDate { version: String },
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &RunOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &RunOutcome) {}
}

/// Run the full `convert` pipeline.
///
/// 1. Look up the upstream revision (a failure only costs the version tag)
/// 2. Stop early if the destination already records that revision
/// 3. Read the archive
/// 4. Convert every module document
/// 5. Assemble the catalog for the configured language
/// 6. Write it in one atomic step
///
/// Nothing is written unless every step succeeds.
#[instrument(skip_all, fields(src = %settings.archive_url, dst = %settings.output_path.display()))]
pub async fn run(settings: &ConvertSettings, progress: &dyn ProgressReporter) -> Result<RunOutcome> {
    settings.validate()?;
    let start = Instant::now();

    // --- Phase 1: Upstream revision ---
    progress.phase("Checking upstream revision");
    let feed = lookup_version(&settings.feed_url).await;
    let version = feed.as_ref().map(|f| f.revision.clone()).unwrap_or_default();

    // --- Phase 2: Compare with destination ---
    if !settings.force
        && !version.is_empty()
        && destination_version(settings).as_deref() == Some(version.as_str())
    {
        info!(%version, "catalog is up to date");
        let outcome = RunOutcome::UpToDate { version };
        progress.done(&outcome);
        return Ok(outcome);
    }

    // --- Phase 3: Archive ---
    progress.phase("Downloading sources");
    let files = refconv_archive::open(&settings.archive_url, &ArchiveOptions::default()).await?;

    // --- Phase 4: Convert ---
    progress.phase("Converting XML to Markdown");
    let parse_opts = ParseOptions {
        base_url: settings.base_url.clone(),
        upsell_url: settings.upsell_url.clone(),
    };
    let reference = refconv_markdown::parse(&files, &parse_opts)?;

    // --- Phase 5: Catalog ---
    progress.phase("Assembling catalog");
    let catalog = Catalog::new(&version, &reference.modules, &settings.language);

    // --- Phase 6: Write ---
    progress.phase("Writing catalog");
    catalog.write_to_path(&settings.output_path)?;

    let outcome = RunOutcome::Written {
        path: settings.output_path.clone(),
        version,
        updated: feed.and_then(|f| f.updated),
        modules: catalog.modules.len(),
        directives: catalog.directive_count(),
        elapsed: start.elapsed(),
    };
    progress.done(&outcome);

    info!(
        modules = catalog.modules.len(),
        directives = catalog.directive_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "convert pipeline complete"
    );

    Ok(outcome)
}

async fn lookup_version(feed_url: &str) -> Option<FeedVersion> {
    if feed_url.is_empty() {
        debug!("no feed configured, catalog will carry no version");
        return None;
    }
    match refconv_discovery::latest_version(feed_url, &DiscoveryOptions::default()).await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, feed = %feed_url, "failed to get the upstream revision");
            None
        }
    }
}

/// An unreadable destination is treated as having no version; it gets replaced.
fn destination_version(settings: &ConvertSettings) -> Option<String> {
    match refconv_artifacts::read_version_from_path(&settings.output_path) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable destination");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
