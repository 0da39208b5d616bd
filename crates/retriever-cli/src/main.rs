use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::{Document, RetrieverConfig};
use search_core::{
    Bm25Retriever, HybridRetriever, PrecomputedSimilarity, SqliteCandidateStore, tokenize,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hybrid-retriever")]
#[command(about = "BM25 and hybrid (RRF) document retrieval over a SQLite table")]
struct Cli {
    /// TOML retriever config; defaults apply when the file does not exist.
    #[arg(long, default_value = "hybrid-retriever.toml")]
    config: PathBuf,
    #[arg(long, default_value = "documents.db")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load JSON-lines documents (`{"content": ..., "metadata": {...}}`).
    Ingest { file: PathBuf },
    /// Keyword-only BM25 retrieval.
    Search {
        query: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Fuse BM25 results with a precomputed semantic ranking.
    Hybrid {
        query: String,
        /// JSON array of documents, best semantic match first.
        #[arg(long)]
        semantic: PathBuf,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        alpha: Option<f64>,
    },
    /// Print the keyword tokens extracted from TEXT.
    Tokenize { text: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RetrieverConfig::load(&cli.config)?;

    match cli.command {
        Commands::Ingest { file } => ingest(&cli.db, &config, &file),
        Commands::Search { query, k } => search(&cli.db, with_overrides(config, k, None)?, &query),
        Commands::Hybrid {
            query,
            semantic,
            k,
            alpha,
        } => hybrid(&cli.db, with_overrides(config, k, alpha)?, &query, &semantic),
        Commands::Tokenize { text } => {
            println!("{}", serde_json::to_string_pretty(&tokenize(&text))?);
            Ok(())
        }
    }
}

fn with_overrides(
    mut config: RetrieverConfig,
    k: Option<usize>,
    alpha: Option<f64>,
) -> anyhow::Result<RetrieverConfig> {
    if let Some(k) = k {
        config.k = k;
    }
    if let Some(alpha) = alpha {
        config.alpha = alpha;
    }
    config.validate().context("invalid command-line override")?;
    Ok(config)
}

fn ingest(db: &Path, config: &RetrieverConfig, file: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed reading documents: {}", file.display()))?;
    let documents = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Document>(line)
                .with_context(|| format!("invalid document on line {}", idx + 1))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let store = SqliteCandidateStore::open(db, config)?;
    store.ensure_table()?;
    let inserted = store.insert_documents(&documents)?;
    let total = store.count()?;
    info!(inserted, total, table = %config.table_name, "ingest complete");
    println!(
        "ingested {inserted} documents into {} (total={total})",
        config.table_name
    );
    Ok(())
}

fn search(db: &Path, config: RetrieverConfig, query: &str) -> anyhow::Result<()> {
    let store = SqliteCandidateStore::open(db, &config)?;
    let retriever = Bm25Retriever::new(store, &config)?;
    let results = retriever
        .retrieve_scored(query)?
        .into_iter()
        .map(|scored| scored.document)
        .collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn hybrid(
    db: &Path,
    config: RetrieverConfig,
    query: &str,
    semantic_path: &Path,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(semantic_path).with_context(|| {
        format!(
            "failed reading semantic ranking: {}",
            semantic_path.display()
        )
    })?;
    let ranked = serde_json::from_str::<Vec<Document>>(&raw).with_context(|| {
        format!(
            "failed parsing semantic ranking: {}",
            semantic_path.display()
        )
    })?;

    let store = SqliteCandidateStore::open(db, &config)?;
    let lexical = Bm25Retriever::new(store, &config)?;
    let retriever = HybridRetriever::new(lexical, PrecomputedSimilarity::new(ranked), &config)?;
    let fused = retriever.retrieve_fused(query)?;
    println!("{}", serde_json::to_string_pretty(&fused)?);
    Ok(())
}
