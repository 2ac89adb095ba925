//! Probe CLI - natural-language UI testing
//!
//! Usage:
//!   probe init                       Write default .probe/config.toml
//!   probe parse <goal>               Parse a goal into one intent
//!   probe decompose <goal>           Decompose a goal into actions
//!   probe infer --snapshot <file>    Infer the form a goal targets
//!   probe resolve --snapshot <file>  Resolve a field label to selectors
//!   probe run <goal> --url <url>     Execute a goal in the browser
//!   probe analyze <url>              Summarize a page
//!   probe verify <url> --expect ..   Check page text
//!
//! Results go to stdout as pretty JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use probe_browser::{analyze_ui, verify_page, BrowserSession, Driver};
use probe_core::{DomSnapshot, FieldKind, ProbeConfig};
use probe_executor::{plan_flow, run_flow, AdaptiveExecutor, SequenceOptions};
use probe_forms::{FormInferenceEngine, InferenceContext};
use probe_llm::{AssistedStrategy, LanguageModel, ModelValueMapper};
use probe_planning::WorkflowDecomposer;
use probe_resolver::{FieldQuery, FieldResolver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probe")]
#[command(author, version, about = "Natural-language UI testing")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding .probe/config.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Attach to a browser started with --remote-debugging-port instead of launching one
    #[arg(long, global = true, value_name = "PORT")]
    connect: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Init {
        /// Project path (defaults to --root)
        path: Option<PathBuf>,
    },

    /// Parse a goal into a single structured intent
    Parse {
        goal: String,
    },

    /// Decompose a goal into an ordered action list
    Decompose {
        goal: String,

        /// Skip the optimizer pass
        #[arg(long)]
        raw: bool,
    },

    /// Infer which form on a captured page a goal targets
    Infer {
        /// DOM snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        goal: String,
    },

    /// Resolve a human label to selectors on a captured page
    Resolve {
        /// DOM snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long, value_enum, default_value = "generic")]
        kind: CliFieldKind,

        /// Field group name (e.g. the name attribute of a radio group)
        #[arg(long, default_value = "")]
        name: String,

        #[arg(long)]
        label: String,
    },

    /// Execute a goal in the browser and report
    Run {
        goal: String,

        /// Page to start from
        #[arg(long)]
        url: Option<String>,

        /// Show only the planned actions
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize the forms, buttons, inputs and links of a page
    Analyze {
        url: String,
    },

    /// Check that a page shows (and does not show) given texts
    Verify {
        url: String,

        #[arg(long = "expect")]
        expected: Vec<String>,

        #[arg(long = "reject")]
        unexpected: Vec<String>,
    },
}

/// CLI-friendly field kind
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFieldKind {
    Checkbox,
    Radio,
    Select,
    Generic,
}

impl From<CliFieldKind> for FieldKind {
    fn from(k: CliFieldKind) -> Self {
        match k {
            CliFieldKind::Checkbox => FieldKind::Checkbox,
            CliFieldKind::Radio => FieldKind::Radio,
            CliFieldKind::Select => FieldKind::Select,
            CliFieldKind::Generic => FieldKind::Generic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs on stderr so stdout stays JSON
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { path } = &cli.command {
        return cmd_init(path.as_deref().unwrap_or(&cli.root));
    }

    let config = ProbeConfig::load_or_default(&cli.root).context("Failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Parse { goal } => cmd_parse(&config, &goal).await,
        Commands::Decompose { goal, raw } => cmd_decompose(&goal, raw),
        Commands::Infer { snapshot, goal } => cmd_infer(&config, &snapshot, &goal).await,
        Commands::Resolve {
            snapshot,
            kind,
            name,
            label,
        } => cmd_resolve(&config, &snapshot, kind.into(), name, label).await,
        Commands::Run { goal, url, dry_run } => {
            cmd_run(&config, cli.connect, &goal, url.as_deref(), dry_run).await
        }
        Commands::Analyze { url } => cmd_analyze(&config, cli.connect, &url).await,
        Commands::Verify {
            url,
            expected,
            unexpected,
        } => cmd_verify(&config, cli.connect, &url, &expected, &unexpected).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_snapshot(path: &Path) -> Result<DomSnapshot> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse snapshot JSON")
}

fn language_model(config: &ProbeConfig) -> Arc<dyn LanguageModel> {
    Arc::new(AssistedStrategy::from_config(&config.llm))
}

async fn open_browser(config: &ProbeConfig, connect: Option<u16>) -> Result<BrowserSession> {
    let session = match connect {
        Some(port) => BrowserSession::connect(port)
            .await
            .with_context(|| format!("Failed to attach to browser on port {}", port))?,
        None => BrowserSession::launch(&config.browser)
            .await
            .context("Failed to launch browser")?,
    };
    Ok(session.with_timeouts(
        config.executor.selector_timeout(),
        config.executor.navigation_timeout(),
    ))
}

fn cmd_init(path: &Path) -> Result<()> {
    let written = ProbeConfig::write_default(path).context("Failed to write configuration")?;
    println!("Initialized probe in {:?}", path);
    println!("Created:");
    println!("  {}", written.display());
    Ok(())
}

async fn cmd_parse(config: &ProbeConfig, goal: &str) -> Result<()> {
    let parsed = language_model(config).parse_goal(goal).await?;
    print_json(&parsed)
}

fn cmd_decompose(goal: &str, raw: bool) -> Result<()> {
    let actions = if raw {
        WorkflowDecomposer::new().decompose(goal)
    } else {
        plan_flow(goal, None)
    };
    print_json(&actions)
}

async fn cmd_infer(config: &ProbeConfig, snapshot: &Path, goal: &str) -> Result<()> {
    let page = load_snapshot(snapshot).await?;
    let engine = FormInferenceEngine::new(config.inference.clone());
    let inferred = engine.infer(&page, &InferenceContext::new(goal))?;
    print_json(&inferred)
}

async fn cmd_resolve(
    config: &ProbeConfig,
    snapshot: &Path,
    kind: FieldKind,
    name: String,
    label: String,
) -> Result<()> {
    let page = load_snapshot(snapshot).await?;
    let mut resolver = FieldResolver::new(config.resolver.clone());
    if config.llm.enabled {
        resolver = resolver.with_mapper(Arc::new(ModelValueMapper::new(language_model(config))));
    }

    let query = FieldQuery::new(kind, name, label.as_str());
    match resolver.resolve(&page, &query).await {
        Some(resolution) => print_json(&resolution),
        None => bail!("No {} field matches {:?}", kind, label),
    }
}

async fn cmd_run(
    config: &ProbeConfig,
    connect: Option<u16>,
    goal: &str,
    url: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        return print_json(&plan_flow(goal, url));
    }

    let session = open_browser(config, connect).await?;
    let executor = AdaptiveExecutor::from_config(Arc::new(session), config);
    let report = run_flow(&executor, goal, url, SequenceOptions::default()).await;
    print_json(&report)?;

    if !report.success() {
        info!("Run {} failed", report.run_id);
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_analyze(config: &ProbeConfig, connect: Option<u16>, url: &str) -> Result<()> {
    let session = open_browser(config, connect).await?;
    session
        .navigate(url)
        .await
        .with_context(|| format!("Failed to open {}", url))?;
    let analysis = analyze_ui(&session).await?;
    print_json(&analysis)
}

async fn cmd_verify(
    config: &ProbeConfig,
    connect: Option<u16>,
    url: &str,
    expected: &[String],
    unexpected: &[String],
) -> Result<()> {
    let session = open_browser(config, connect).await?;
    session
        .navigate(url)
        .await
        .with_context(|| format!("Failed to open {}", url))?;
    let verification = verify_page(&session, expected, unexpected).await?;
    print_json(&verification)?;

    if !verification.passed {
        std::process::exit(1);
    }
    Ok(())
}
