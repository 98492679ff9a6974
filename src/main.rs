//! MarketPulse - market-sentiment research agent CLI
//!
//! One question in, one analyzed brief out: the model plans which
//! keywords to crawl, the pipeline aggregates post sentiment into the
//! fixed topic chart, and the model writes the final brief.

use clap::Parser;
use marketpulse::agent::orchestrator::ResearchOrchestrator;
use marketpulse::config::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "marketpulse")]
#[command(version = "0.1.0")]
#[command(about = "Market-sentiment research agent for autonomous driving", long_about = None)]
struct Args {
    /// The research question to answer
    question: String,

    /// Configuration file path (overrides defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model API URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Model name (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Maximum posts fetched per keyword (overrides config)
    #[arg(long)]
    limit: Option<usize>,

    /// Print the full result bundle as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Load configuration and apply CLI overrides
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = args.url {
        config.model.url = url;
    }
    if let Some(model) = args.model {
        config.model.model = model;
    }
    if let Some(limit) = args.limit {
        config.fetch.max_posts_per_keyword = limit;
    }
    config.validate()?;

    tracing::info!(
        "Using {} model '{}' at {}",
        config.model.provider,
        config.model.model,
        config.model.url
    );

    let orchestrator = ResearchOrchestrator::new(config)?;

    // A dead provider is not fatal: planning will fail and the run falls
    // back to the default result bundle.
    if let Err(e) = orchestrator.validate_connection().await {
        tracing::warn!("Model provider is not reachable: {}", e);
        tracing::warn!("For Ollama, make sure it is running: ollama serve");
    }

    let reply = orchestrator.handle(&args.question).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    println!("{}\n", reply.answer);

    println!("{:<12} {:>7}  {}", "Topic", "Score", "Sentiment");
    for row in &reply.topic_rows {
        println!(
            "{:<12} {:>7.2}  {}",
            row.topic.to_string(),
            row.score,
            row.sentiment
        );
    }

    if !reply.latent_topics.is_empty() {
        println!("\nLatent topics:");
        for topic in &reply.latent_topics {
            println!("  {}: {}", topic.topic_id, topic.keywords.join(", "));
        }
    }

    Ok(())
}

/// Initialize logging
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "marketpulse=debug,info"
    } else {
        "marketpulse=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
