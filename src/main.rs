//! `mathcheck` CLI - report unrendered math on a page

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mathcheck::config::{DEFAULT_HOSTS, DEFAULT_SCOPE};
use mathcheck::{
    CheckConfig, ChromeOptions, ChromeRenderer, Granularity, IndexBase, MathChecker, Report,
    ReportFormat, SettleConfig, StaticRenderer,
};

#[derive(Parser)]
#[command(name = "mathcheck")]
#[command(about = "Find math a page failed to render: raw TeX left in text and renderer error markers")]
#[command(version)]
struct Cli {
    /// Page to check (http, https or file URL)
    url: Option<String>,

    /// CSS selector of the container to check
    #[arg(long, default_value = DEFAULT_SCOPE)]
    scope: String,

    /// CSS selector of elements that host rendered math
    #[arg(long, default_value = DEFAULT_HOSTS)]
    hosts: String,

    /// Which elements become text units
    #[arg(long, value_enum, default_value_t = GranularityArg::Strict)]
    granularity: GranularityArg,

    /// Number text units and hosts from 1 instead of 0
    #[arg(long)]
    one_based: bool,

    /// How the page is loaded
    #[arg(long, value_enum, default_value_t = RendererArg::Chrome)]
    renderer: RendererArg,

    /// Browser executable (default: $MATHCHECK_CHROME, then PATH)
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Extra browser switch, repeatable (e.g. --chrome-arg=--no-sandbox)
    #[arg(long = "chrome-arg", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Grace delay after the page settles, in milliseconds
    #[arg(long, default_value = "1000")]
    wait_ms: u64,

    /// Upper bound on each settle wait, in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Do not wait for network idle
    #[arg(long)]
    no_network_idle: bool,

    /// Do not wait for MathJax startup to finish
    #[arg(long)]
    no_mathjax_wait: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    /// Elements with exactly one text child
    Strict,
    /// Every element's full text
    InnerText,
}

#[derive(Clone, Copy, ValueEnum)]
enum RendererArg {
    /// Headless Chromium over the DevTools protocol
    Chrome,
    /// Raw HTML, no scripts
    Static,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl Cli {
    fn config(&self) -> CheckConfig {
        let granularity = match self.granularity {
            GranularityArg::Strict => Granularity::SingleTextChild,
            GranularityArg::InnerText => Granularity::InnerText,
        };
        let index_base = if self.one_based {
            IndexBase::One
        } else {
            IndexBase::Zero
        };
        let settle = SettleConfig {
            grace: Duration::from_millis(self.wait_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            wait_for_network_idle: !self.no_network_idle,
            await_mathjax: !self.no_mathjax_wait,
        };

        CheckConfig::default()
            .with_scope(&self.scope)
            .with_hosts(&self.hosts)
            .with_granularity(granularity)
            .with_index_base(index_base)
            .with_settle(settle)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (stderr; stdout carries the report)
    let filter = if cli.verbose {
        EnvFilter::new("mathcheck=debug,chrome=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let Some(url) = cli.url.clone() else {
        eprintln!("error: missing URL argument\n");
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(1);
    };

    let config = cli.config();
    let settle = config.settle.clone();
    let checker = MathChecker::new(config);

    let result = match cli.renderer {
        RendererArg::Static => {
            let renderer = StaticRenderer::new(settle.timeout)?;
            checker.check(&renderer, &url).await?
        }
        RendererArg::Chrome => {
            let options = ChromeOptions {
                executable: cli.chrome.clone(),
                extra_args: cli.chrome_args.clone(),
            };
            let renderer = ChromeRenderer::launch(options, settle).await?;
            let result = checker.check(&renderer, &url).await;
            if let Err(e) = renderer.shutdown().await {
                warn!("Browser shutdown failed: {e}");
            }
            result?
        }
    };

    let format = match cli.format {
        FormatArg::Text => ReportFormat::Text,
        FormatArg::Json => ReportFormat::Json,
    };
    print!("{}", Report::generate(&result, format)?);

    Ok(())
}
