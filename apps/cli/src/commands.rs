//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use refconv_core::{ProgressReporter, RunOutcome};
use refconv_shared::{AppConfig, ConvertSettings, init_config, load_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// refconv: build a directive catalog from the NGINX XML documentation.
#[derive(Parser)]
#[command(
    name = "refconv",
    version,
    about = "Convert the NGINX XML documentation into a JSON directive catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download the sources and write the catalog.
    Convert(ConvertArgs),

    /// Print the upstream revision recorded in an existing catalog.
    Version {
        /// Catalog to inspect (defaults to the configured output path).
        #[arg(long)]
        dst: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for the configured conversion settings.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ConvertArgs {
    /// Where to get the XML sources (a .tar.gz path or URL).
    #[arg(long, env = "REFCONV_SRC")]
    pub src: Option<String>,

    /// Where to write the JSON catalog.
    #[arg(long)]
    pub dst: Option<PathBuf>,

    /// Atom feed announcing upstream revisions.
    #[arg(long)]
    pub feed_url: Option<String>,

    /// Base URL for rendering links inside the docs.
    #[arg(long)]
    pub base_url: Option<String>,

    /// URL for linking people to the commercial version.
    #[arg(long)]
    pub upsell_url: Option<String>,

    /// Only keep modules written in this language.
    #[arg(long)]
    pub lang: Option<String>,

    /// Convert even if the catalog already has the upstream revision.
    #[arg(long)]
    pub force: bool,
}

impl ConvertArgs {
    /// Layer the flags on top of the config file values.
    fn apply(self, config: &AppConfig) -> ConvertSettings {
        let mut settings = ConvertSettings::from(config);
        if let Some(src) = self.src {
            settings.archive_url = src;
        }
        if let Some(dst) = self.dst {
            settings.output_path = dst;
        }
        if let Some(feed_url) = self.feed_url {
            settings.feed_url = feed_url;
        }
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }
        if let Some(upsell_url) = self.upsell_url {
            settings.upsell_url = upsell_url;
        }
        if let Some(lang) = self.lang {
            settings.language = lang;
        }
        settings.force = self.force;
        settings
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "refconv=info",
        1 => "refconv=debug",
        _ => "refconv=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert(args) => cmd_convert(args).await,
        Command::Version { dst } => cmd_version(dst),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let config = load_config()?;
    let settings = args.apply(&config);

    info!(
        src = %settings.archive_url,
        dst = %settings.output_path.display(),
        feed_url = %settings.feed_url,
        base_url = %settings.base_url,
        "started"
    );

    let reporter = CliProgress::new();

    // Dropping the pipeline future on Ctrl-C abandons the run before the
    // catalog is persisted.
    let outcome = tokio::select! {
        res = refconv_core::run(&settings, &reporter) => res,
        _ = tokio::signal::ctrl_c() => {
            reporter.spinner.finish_and_clear();
            return Err(eyre!("interrupted, nothing was written"));
        }
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    match outcome {
        RunOutcome::Written {
            path,
            version,
            updated,
            modules,
            directives,
            elapsed,
        } => {
            println!();
            println!("  Catalog written successfully!");
            println!("  Modules:    {modules}");
            println!("  Directives: {directives}");
            if version.is_empty() {
                println!("  Version:    unknown");
            } else {
                println!("  Version:    {version}");
            }
            if let Some(updated) = updated {
                println!("  Published:  {}", updated.to_rfc3339());
            }
            println!("  Path:       {}", path.display());
            println!("  Time:       {:.1}s", elapsed.as_secs_f64());
            println!();
        }
        RunOutcome::UpToDate { version } => {
            println!("Catalog is already at {version}, nothing to do (use --force to convert anyway).");
        }
    }

    Ok(())
}

fn cmd_version(dst: Option<PathBuf>) -> Result<()> {
    let path = match dst {
        Some(path) => path,
        None => PathBuf::from(load_config()?.output.path),
    };

    match refconv_artifacts::read_version_from_path(&path)? {
        Some(version) if !version.is_empty() => println!("{version}"),
        Some(_) => println!("{} has no recorded version", path.display()),
        None => return Err(eyre!("no catalog at {}", path.display())),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &RunOutcome) {
        self.spinner.finish_and_clear();
    }
}
