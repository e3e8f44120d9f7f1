//! domscout CLI
//!
//! Runs one exported entry point against an HTML file and prints what the page
//! would have sent to the driver.
//!
//! Usage:
//!   domscout --html page.html --layout layout.yaml byClass row
//!   domscout --html page.html bySelector "button.primary" true
//!   domscout --html page.html --json allTexts

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use domscout::{
    ElementCollector, Engine, EngineConfig, HtmlDocument, LayoutEntry, MessageLog,
    VisibilityPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "domscout")]
#[command(about = "Locate elements in an HTML page the way an in-page test driver does")]
struct Cli {
    /// HTML document to query
    #[arg(long)]
    html: PathBuf,

    /// Layout file (JSON or YAML): a list of { selector, rect, text_rect }
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Engine config file (JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prefix of the termination sentinel
    #[arg(long, env = "DOMSCOUT_TOOL_NAME")]
    tool_name: Option<String>,

    /// Visibility policy: non-negative-origin or positive-origin
    #[arg(long, env = "DOMSCOUT_VISIBILITY")]
    visibility: Option<VisibilityPolicy>,

    /// Print the collected elements as JSON instead of the raw messages
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,

    /// Exported entry point, e.g. byId, bySelector, setTextByName, allTexts
    entry_point: String,

    /// String arguments of the entry point
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }

    for line in run(&cli)? {
        println!("{line}");
    }
    Ok(())
}

/// Runs the request described by `cli`, returning the lines to print.
fn run(cli: &Cli) -> Result<Vec<String>> {
    let config = resolve_config(cli)?;
    let document = load_document(&cli.html, cli.layout.as_deref())?;
    let args: Vec<&str> = cli.args.iter().map(String::as_str).collect();
    info!(entry_point = %cli.entry_point, ?args, "running request");

    if cli.json {
        let collector = ElementCollector::for_config(&config);
        let mut engine = Engine::with_config(document, collector, config);
        engine
            .invoke(&cli.entry_point, &args)
            .with_context(|| format!("{} rejected", cli.entry_point))?;
        let elements = engine.sink_mut().take_elements();
        let json = serde_json::to_string_pretty(&elements)?;
        Ok(vec![json])
    } else {
        let mut engine = Engine::with_config(document, MessageLog::new(), config);
        let summary = engine
            .invoke(&cli.entry_point, &args)
            .with_context(|| format!("{} rejected", cli.entry_point))?;
        info!(reported = summary.reported, target_node = ?summary.target, "done");
        Ok(engine.sink_mut().take())
    }
}

fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_structured::<EngineConfig>(path)?,
        None => EngineConfig::default(),
    };
    if let Some(tool_name) = &cli.tool_name {
        config = config.with_tool_name(tool_name.clone());
    }
    if let Some(visibility) = cli.visibility {
        config = config.with_visibility(visibility);
    }
    debug!(?config, "resolved config");
    Ok(config)
}

fn load_document(html: &Path, layout: Option<&Path>) -> Result<HtmlDocument> {
    let markup =
        fs::read_to_string(html).with_context(|| format!("Failed to read {}", html.display()))?;
    let mut document = HtmlDocument::parse(&markup);
    if let Some(layout) = layout {
        let entries: Vec<LayoutEntry> = load_structured(layout)?;
        document
            .apply_layout(&entries)
            .with_context(|| format!("Failed to apply layout {}", layout.display()))?;
        debug!(entries = entries.len(), "layout applied");
    }
    Ok(document)
}

/// Reads a JSON or YAML file. `.yaml`/`.yml` files are YAML; anything else is
/// tried as JSON first, then as YAML.
fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        return serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {}", path.display()));
    }
    match serde_json::from_str(&content) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse {} as JSON ({json_err}) or YAML",
                path.display()
            )
        }),
    }
}
