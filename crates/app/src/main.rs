use chrono::Utc;
use clap::{Parser, Subcommand};
use edurag_core::{
    expand_inputs, load_documents_best_effort, AnswerCoordinator, CharacterNgramEmbedder,
    ChunkingConfig, Embedder, GenerationBackend, IngestionOptions, OllamaBackend, OllamaEmbedder,
    PerplexityBackend, RetrievalStore, SourceExcerpt, DEFAULT_EMBEDDING_DIMENSIONS,
};
use edurag_core::backends::{DEFAULT_LOCAL_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_PERPLEXITY_URL};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const NOTHING_PROCESSED: &str =
    "No documents have been processed yet. Run `edurag ingest --path <file-or-folder>` first.";
const EXCERPT_CHARS: usize = 150;

#[derive(Parser)]
#[command(name = "edurag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the persisted index.
    #[arg(long, env = "EDURAG_STORE_DIR", default_value = "./vector_store")]
    store_dir: PathBuf,

    /// Ollama base URL, used for generation and the `ollama:` embedder.
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Local generation model.
    #[arg(long, env = "EDURAG_LOCAL_MODEL", default_value = DEFAULT_LOCAL_MODEL)]
    local_model: String,

    /// Perplexity API key; remote answers are disabled without it.
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    perplexity_api_key: Option<String>,

    /// Perplexity API base URL.
    #[arg(long, env = "PERPLEXITY_BASE_URL", default_value = DEFAULT_PERPLEXITY_URL)]
    perplexity_url: String,

    /// `char-ngram` or `ollama:<model>`.
    #[arg(long, env = "EDURAG_EMBEDDER", default_value = "char-ngram")]
    embedder: String,

    /// Vector dimension of the embedder.
    #[arg(long, env = "EDURAG_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Words per chunk.
    #[arg(long, default_value_t = 1_000)]
    chunk_size: usize,

    /// Words shared by adjacent chunks.
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Print machine-readable JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and index files or folders, then persist the index.
    Ingest {
        /// File or folder; repeatable.
        #[arg(long = "path", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rank indexed chunks against a query.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Answer a question from the indexed material.
    Ask {
        #[arg(long)]
        query: String,
        /// Prefer the remote backend, falling back to the local model.
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// Summarise everything indexed.
    Summarize {
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// Compare two concepts using the indexed material.
    Compare {
        #[arg(long)]
        first: String,
        #[arg(long)]
        second: String,
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// Report what is indexed and whether the local model is reachable.
    Status,
}

#[derive(Clone)]
struct StoreSettings {
    embedder: String,
    dimensions: usize,
    ollama_url: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl From<&Cli> for StoreSettings {
    fn from(cli: &Cli) -> Self {
        Self {
            embedder: cli.embedder.clone(),
            dimensions: cli.embedding_dimensions,
            ollama_url: cli.ollama_url.clone(),
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
        }
    }
}

/// Runs blocking store work off the async workers.
async fn blocking<T, F>(task: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?
}

fn build_store(settings: &StoreSettings) -> anyhow::Result<Arc<RetrievalStore>> {
    let embedder: Arc<dyn Embedder> = match settings.embedder.strip_prefix("ollama:") {
        Some(model) => Arc::new(OllamaEmbedder::new(
            &settings.ollama_url,
            model,
            settings.dimensions,
        )?),
        None if settings.embedder == "char-ngram" => {
            Arc::new(CharacterNgramEmbedder::new(settings.dimensions))
        }
        None => anyhow::bail!(
            "unknown embedder '{}', expected `char-ngram` or `ollama:<model>`",
            settings.embedder
        ),
    };

    let chunking = ChunkingConfig::new(settings.chunk_size, settings.chunk_overlap)?;
    Ok(Arc::new(RetrievalStore::new(embedder, chunking)?))
}

/// Builds a store and loads the persisted index; `None` when nothing is there.
async fn open_store(
    settings: StoreSettings,
    store_dir: PathBuf,
) -> anyhow::Result<Option<Arc<RetrievalStore>>> {
    blocking(move || {
        let store = build_store(&settings)?;
        Ok(store.reload(&store_dir).then_some(store))
    })
    .await
}

fn remote_backend(cli: &Cli) -> Option<Arc<dyn GenerationBackend>> {
    let key = cli.perplexity_api_key.as_deref().unwrap_or_default();
    match PerplexityBackend::new(key).and_then(|backend| backend.with_endpoint(&cli.perplexity_url)) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(error) => {
            info!(%error, "remote backend disabled");
            None
        }
    }
}

async fn coordinator(cli: &Cli, store: Arc<RetrievalStore>) -> anyhow::Result<AnswerCoordinator> {
    let local = OllamaBackend::new(&cli.ollama_url, cli.local_model.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    if !local.is_available().await {
        warn!(url = %cli.ollama_url, "ollama is not reachable; local answers will be degraded");
    }

    let coordinator = AnswerCoordinator::new(store, Arc::new(local));
    Ok(match remote_backend(cli) {
        Some(remote) => coordinator.with_remote(remote),
        None => coordinator,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = StoreSettings::from(&cli);
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        store_dir = %cli.store_dir.display(),
        "edurag boot"
    );

    match &cli.command {
        Command::Ingest { paths } => {
            let options = IngestionOptions {
                chunk_size_words: cli.chunk_size,
                chunk_overlap_words: cli.chunk_overlap,
                ..IngestionOptions::default()
            };
            let paths = paths.clone();
            let store_dir = cli.store_dir.clone();

            let (report, outcome) = blocking(move || {
                let files = expand_inputs(&paths)?;
                let report = load_documents_best_effort(&files, &options);
                let outcome = match report.require_documents() {
                    Ok(()) => {
                        let store = build_store(&settings)?;
                        let summary = store.index_documents(&report.documents)?;
                        store.persist(&store_dir)?;
                        Ok(summary)
                    }
                    Err(error) => Err(error),
                };
                Ok((report, outcome))
            })
            .await?;

            for skipped in &report.skipped {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }

            let skipped: Vec<_> = report
                .skipped
                .iter()
                .map(|skipped| json!({ "path": skipped.path.display().to_string(), "reason": skipped.reason }))
                .collect();

            let summary = match outcome {
                Ok(summary) => summary,
                Err(error) => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&json!({
                                "success": false,
                                "error": error.to_string(),
                                "documents": 0,
                                "chunks": 0,
                                "skipped": skipped,
                            }))?
                        );
                    }
                    return Err(anyhow::anyhow!(error.to_string()));
                }
            };

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "success": true,
                        "documents": summary.documents,
                        "chunks": summary.chunks,
                        "skipped": skipped,
                        "store_dir": cli.store_dir.display().to_string(),
                    }))?
                );
            } else {
                println!(
                    "{} documents, {} chunks indexed at {}",
                    summary.documents,
                    summary.chunks,
                    Utc::now().to_rfc3339()
                );
                if !skipped.is_empty() {
                    println!("{} files skipped", skipped.len());
                }
            }
        }
        Command::Search { query, top_k } => {
            let Some(store) = open_store(settings, cli.store_dir.clone()).await? else {
                println!("{NOTHING_PROCESSED}");
                return Ok(());
            };

            let (query, top_k) = (query.clone(), *top_k);
            let results = blocking(move || Ok(store.search(&query, top_k)?)).await?;
            let sources: Vec<SourceExcerpt> = results
                .iter()
                .map(|result| SourceExcerpt {
                    filename: result.chunk.filename.clone(),
                    score: result.score,
                    excerpt: result.excerpt(EXCERPT_CHARS),
                })
                .collect();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else {
                for (rank, source) in sources.iter().enumerate() {
                    println!("[{}] {} score={:.4}", rank + 1, source.filename, source.score);
                    println!("  {}", source.excerpt);
                }
            }
        }
        Command::Ask { query, remote } => {
            let Some(store) = open_store(settings, cli.store_dir.clone()).await? else {
                println!("{NOTHING_PROCESSED}");
                return Ok(());
            };

            let coordinator = coordinator(&cli, store).await?;
            let answer = coordinator
                .answer(query, *remote)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.response);
                println!();
                println!("kind={} backend={}", answer.kind, answer.backend);
                for source in &answer.sources {
                    println!("  source={} score={:.3}", source.filename, source.score);
                }
            }
        }
        Command::Summarize { remote } => {
            let Some(store) = open_store(settings, cli.store_dir.clone()).await? else {
                println!("{NOTHING_PROCESSED}");
                return Ok(());
            };

            let coordinator = coordinator(&cli, store).await?;
            let summary = coordinator
                .summarize(*remote)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.summary);
                println!();
                println!(
                    "documents={} ({})",
                    summary.document_count,
                    summary.documents.join(", ")
                );
            }
        }
        Command::Compare {
            first,
            second,
            remote,
        } => {
            let Some(store) = open_store(settings, cli.store_dir.clone()).await? else {
                println!("{NOTHING_PROCESSED}");
                return Ok(());
            };

            let coordinator = coordinator(&cli, store).await?;
            let answer = coordinator
                .compare(first, second, *remote)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.response);
                for source in &answer.sources {
                    println!("  source={} score={:.3}", source.filename, source.score);
                }
            }
        }
        Command::Status => {
            let store_dir = cli.store_dir.clone();
            let status = blocking(move || {
                let store = build_store(&settings)?;
                store.reload(&store_dir);
                Ok(store.status())
            })
            .await?;

            let local = OllamaBackend::new(&cli.ollama_url, cli.local_model.clone())
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let models = local.list_models().await.ok();
            let remote_configured = remote_backend(&cli).is_some();

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "index": status,
                        "ollama": {
                            "reachable": models.is_some(),
                            "models": models,
                            "local_model": local.model(),
                        },
                        "remote_configured": remote_configured,
                    }))?
                );
            } else {
                println!(
                    "index loaded={} chunks={} embedder={}",
                    status.loaded, status.chunk_count, status.embedder
                );
                for document in &status.documents {
                    println!("  document={document}");
                }
                match models {
                    Some(models) => println!(
                        "ollama reachable, local_model={} available=[{}]",
                        local.model(),
                        models.join(", ")
                    ),
                    None => println!("ollama unreachable at {}", cli.ollama_url),
                }
                println!("remote configured={remote_configured}");
            }
        }
    }

    Ok(())
}
