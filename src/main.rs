use anyhow::{Context, Result};
use clap::Parser;
use docquery::config::Config;
use docquery::embedder::mock::MockEmbedder;
use docquery::embedder::openai::OpenAiEmbedder;
use docquery::embedder::{BatchEmbedder, Embedder};
use docquery::index::{DistanceMetric, SourceInfo, VectorIndex};
use docquery::indexer::{Chunker, Indexer, Loader};
use docquery::llm::LanguageModel;
use docquery::llm::mock::MockLanguageModel;
use docquery::llm::openai::OpenAiChat;
use docquery::query::{QueryEngine, QueryOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_QUESTION: &str = "What did the author do in college?";

/// Ask questions about a folder of text files.
#[derive(Parser, Debug)]
#[command(name = "docquery", version, about)]
struct Cli {
    /// Question to answer
    #[arg(default_value = DEFAULT_QUESTION)]
    question: String,

    /// Path to config.json
    #[arg(short, long, default_value = "")]
    config: String,

    /// Directory of documents (overrides source_dir)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Number of chunks to retrieve (overrides top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Distance metric: cosine or euclidean (overrides distance)
    #[arg(long)]
    distance: Option<DistanceMetric>,

    /// Index snapshot to reuse, written after a fresh build
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Rebuild even if the snapshot exists
    #[arg(long)]
    rebuild: bool,

    /// Print the chunks the answer was based on
    #[arg(short, long)]
    sources: bool,

    /// Use the built-in mock providers; no network or API key needed
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = &cli.dir {
        config.source_dir = dir.clone();
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    if let Some(distance) = cli.distance {
        config.distance = distance;
    }
    config.validate().context("invalid configuration")?;

    // 2. Init providers
    let policy = config.retry_policy();
    let (embedder, llm): (Arc<dyn Embedder>, Arc<dyn LanguageModel>) = if cli.offline {
        (
            Arc::new(MockEmbedder::default()),
            Arc::new(MockLanguageModel::new("(offline) no language model configured")),
        )
    } else {
        let timeout = config.request_timeout();
        (
            Arc::new(
                OpenAiEmbedder::from_config(&config.embedding, timeout)
                    .context("failed to set up the embedding provider")?,
            ),
            Arc::new(
                OpenAiChat::from_config(&config.llm, timeout)
                    .context("failed to set up the language model")?,
            ),
        )
    };

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} chunks embedded {msg}")
            .context("invalid progress template")?
            .progress_chars("█▓░"),
    );
    let embedder = Arc::new(
        BatchEmbedder::new(embedder, policy)
            .with_batching(config.embedding.max_batch_size, config.embedding.concurrency)
            .with_progress(progress.clone()),
    );

    // 3. Load or build the index
    let loader = Loader::from_config(&config.loader).context("invalid loader.exclude pattern")?;
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
    let indexer = Indexer::new(&embedder, chunker, config.distance);

    let index = match cli.index.as_deref() {
        Some(path) if path.exists() && !cli.rebuild => {
            let expected = indexer
                .source_info(&loader, &config.source_dir)
                .with_context(|| format!("failed to resolve {}", config.source_dir.display()))?;
            load_snapshot(path, &config, &embedder, &expected)?
        }
        snapshot => {
            let index = build_index(&indexer, &loader, &config.source_dir).await?;
            progress.finish_and_clear();
            if let Some(path) = snapshot {
                index
                    .save(path)
                    .with_context(|| format!("failed to save index to {}", path.display()))?;
            }
            index
        }
    };

    // 4. Query
    let engine = QueryEngine::new(
        Arc::new(index),
        embedder,
        llm,
        QueryOptions::from(&config),
    )?;

    info!("Question: {}", cli.question);
    let result = tokio::select! {
        result = engine.query(&cli.question) => result.context("query failed")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            return Ok(());
        }
    };

    println!("{}", result.answer);
    if cli.sources {
        for (rank, source) in result.sources.iter().enumerate() {
            println!(
                "\n[{}] {} (score {:.3})\n{}",
                rank + 1,
                source.chunk.id,
                source.score,
                source.chunk.text.trim()
            );
        }
    }

    Ok(())
}

async fn build_index(indexer: &Indexer<'_>, loader: &Loader, dir: &Path) -> Result<VectorIndex> {
    let (index, report) = indexer
        .index_directory(loader, dir)
        .await
        .with_context(|| format!("failed to index {}", dir.display()))?;

    if report.skipped_files > 0 {
        warn!("{} files were skipped", report.skipped_files);
    }
    Ok(index)
}

fn load_snapshot(
    path: &Path,
    config: &Config,
    embedder: &BatchEmbedder,
    expected: &SourceInfo,
) -> Result<VectorIndex> {
    let index = VectorIndex::load(path)
        .with_context(|| format!("failed to load index from {}; pass --rebuild", path.display()))?;

    anyhow::ensure!(
        index.metric() == config.distance,
        "{} was built with {} distance but {} is configured; pass --rebuild",
        path.display(),
        index.metric(),
        config.distance
    );
    anyhow::ensure!(
        index.model() == embedder.model(),
        "{} was built with {} but the embedder is {}; pass --rebuild",
        path.display(),
        index.model(),
        embedder.model()
    );
    let source = index.source().with_context(|| {
        format!("{} does not record its source; pass --rebuild", path.display())
    })?;
    if let Some(difference) = source.difference(expected) {
        anyhow::bail!(
            "{} was built with a different {difference}; pass --rebuild",
            path.display()
        );
    }
    Ok(index)
}
