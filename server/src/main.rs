//! FAQBot Server Entry Point
//!
//! Three modes:
//! - serve (default): line-delimited JSON-RPC over stdio
//! - `--ask <QUESTION>`: answer one question and exit
//! - `--retrain`: rebuild the index from the corpus and exit

use clap::Parser;
use faqbot_match::{MatchConfig, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_HASHING_DIMENSION};
use faqbot_server::{EmbedderKind, FaqServer, FaqService, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "faqbot-server")]
#[command(about = "Semantic FAQ matcher with JSON-RPC over stdio")]
#[command(version)]
struct Args {
    /// Directory holding the corpus file and index snapshot
    #[arg(long, env = "FAQBOT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Corpus JSON file (defaults to <data-dir>/faqs.json)
    #[arg(long, env = "FAQBOT_CORPUS")]
    corpus: Option<PathBuf>,

    /// Squared Euclidean distance above which a query gets the fallback reply
    #[arg(long, env = "FAQBOT_THRESHOLD", default_value_t = DEFAULT_DISTANCE_THRESHOLD)]
    threshold: f32,

    /// Embedding backend
    #[arg(long, value_enum, env = "FAQBOT_EMBEDDER", default_value_t = EmbedderKind::Hashing)]
    embedder: EmbedderKind,

    /// Vector width for the hashing embedder
    #[arg(long, default_value_t = DEFAULT_HASHING_DIMENSION)]
    dimension: usize,

    /// Per-query time limit in milliseconds
    #[arg(long, env = "FAQBOT_QUERY_TIMEOUT_MS", default_value_t = 5000)]
    query_timeout_ms: u64,

    /// Reply used when no FAQ is close enough
    #[arg(long)]
    fallback_message: Option<String>,

    /// Answer one question and exit
    #[arg(long, value_name = "QUESTION", conflicts_with = "retrain")]
    ask: Option<String>,

    /// Rebuild the index from the corpus and exit
    #[arg(long)]
    retrain: bool,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let mut matching = MatchConfig::default().with_threshold(self.threshold);
        if let Some(message) = &self.fallback_message {
            matching = matching.with_fallback_message(message.clone());
        }

        ServiceConfig {
            data_dir: self.data_dir.clone(),
            corpus_path: self.corpus.clone(),
            embedder: self.embedder,
            dimension: self.dimension,
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            matching,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // stdout carries protocol traffic; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faqbot_server=info,faqbot_match=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let service = match FaqService::from_config(&args.service_config()) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if args.retrain {
        match service.retrain().await {
            Ok(summary) => {
                println!(
                    "Indexed {} FAQs in {}ms (generation {})",
                    summary.record_count,
                    summary.build_duration.as_millis(),
                    summary.generation
                );
            }
            Err(e) => {
                tracing::error!("Retrain failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = service.bootstrap().await {
        tracing::error!("Failed to build the initial index: {}", e);
        std::process::exit(1);
    }

    if let Some(question) = &args.ask {
        println!("{}", service.ask(question).await.answer);
        return;
    }

    tracing::info!("Starting FAQBot server");
    if let Err(e) = FaqServer::new(service).run_stdio().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
