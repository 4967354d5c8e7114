//! citemap command line
//!
//! Reads one document, resolves the selected bibliography entries against
//! OpenAlex and writes the internal citation network:
//! `{prefix}.graphml`, `{prefix}_nodes.csv`, `{prefix}_edges.csv`.
//!
//! Logs go to stderr; the run summary goes to stdout.

use anyhow::Context;
use citemap_citation::{write_all, OutputPaths, Pipeline, RunSummary};
use citemap_common::{config::AppConfig, metrics, OpenAlexClient};
use citemap_ingestion::{locate_bibliography, looks_like_rtf, rtf_to_text, Selection};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "citemap")]
#[command(version, about = "Map which references of one bibliography cite each other", long_about = None)]
struct Cli {
    /// Document holding the bibliography (RTF or plain text)
    #[arg(short, long)]
    input: PathBuf,

    /// Entries to map: all, 7, 1-13, 1,3,5-9,12
    #[arg(short, long, default_value = "all")]
    select: String,

    /// Output path prefix
    #[arg(short, long, default_value = "network")]
    out_prefix: String,

    /// Configuration file (defaults to config/ and CITEMAP__ variables)
    #[arg(short, long)]
    config: Option<String>,

    /// Contact address for the OpenAlex polite pool
    #[arg(long)]
    mailto: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    if cli.mailto.is_some() {
        config.openalex.mailto = cli.mailto.clone();
    }

    init_tracing(&config);
    metrics::register_metrics();

    info!("Starting citemap v{}", citemap_common::VERSION);

    let text = read_document(&cli.input)?;
    let bibliography = locate_bibliography(&text);
    let selection = Selection::parse(&cli.select)?;

    let db = Arc::new(OpenAlexClient::new(&config.openalex, &config.concurrency)?);
    let pipeline = Pipeline::new(db, &config);
    let output = pipeline.run(bibliography, &selection).await?;

    let paths = write_all(&output.graph, &cli.out_prefix)?;

    if cli.json {
        let report = serde_json::json!({
            "summary": output.summary,
            "outputs": paths,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&output.summary, &paths);
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Plain text of the document; RTF is detected by extension or header.
/// Invalid UTF-8 is replaced rather than rejected.
fn read_document(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let raw = decode_document(&bytes);

    let is_rtf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("rtf"))
        || looks_like_rtf(&raw);

    Ok(if is_rtf { rtf_to_text(&raw) } else { raw })
}

fn decode_document(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn print_summary(summary: &RunSummary, paths: &OutputPaths) {
    println!("References found:      {}", summary.references_found);
    println!("References selected:   {}", summary.references_selected);
    println!("Resolved:              {}", summary.resolved);
    println!("Unresolved:            {}", summary.unresolved);
    println!("Lookup failures:       {}", summary.resolution_failures);
    println!("Citation fetch errors: {}", summary.fetch_failures);
    println!("Nodes / edges:         {} / {}", summary.nodes, summary.edges);

    if !summary.unresolved_rtf_orders.is_empty() {
        let orders: Vec<String> = summary
            .unresolved_rtf_orders
            .iter()
            .map(u32::to_string)
            .collect();
        println!("Unresolved entries:    {}", orders.join(", "));
    }

    for v in &summary.time_order_violations {
        println!(
            "Time-order warning:    [{}] ({}) cites [{}] ({})",
            v.source, v.source_year, v.target, v.target_year
        );
    }

    println!("Wrote {}", paths.graphml.display());
    println!("Wrote {}", paths.nodes.display());
    println!("Wrote {}", paths.edges.display());
}
