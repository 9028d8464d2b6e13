use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use file_rag_core::{
    collect_documents, count_by_kind, CharacterNgramEmbedder, DocumentKind, Embedder,
    HttpEmbedder, HttpEmbedderConfig, RetrievalConfig, RetrievalService,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "file-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the persisted index
    #[arg(long, env = "FILE_RAG_STORE")]
    store: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, env = "FILE_RAG_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ngram)]
    embedder: EmbedderKind,

    /// Vector width for the ngram and http backends
    #[arg(long, env = "FILE_RAG_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, env = "FILE_RAG_EMBEDDING_URL", default_value = "https://api.openai.com/v1")]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "FILE_RAG_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Bearer key for the embeddings API
    #[arg(long, env = "FILE_RAG_EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Ngram,
    Http,
    Fastembed,
}

#[derive(Subcommand)]
enum Command {
    /// Index every supported file under a folder, replacing the stored index.
    Index {
        /// Project folder to walk recursively.
        #[arg(long, default_value = ".")]
        folder: PathBuf,
    },
    /// List the files closest to a query.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of files to return.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the closest files as prompt context blocks.
    Context {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of files to include.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

/// Flags and env vars override the library defaults field by field.
fn resolve_config(cli: &Cli) -> RetrievalConfig {
    let mut config = RetrievalConfig::default();
    if let Some(store) = &cli.store {
        config.store_dir = store.clone();
    }
    if let Some(model) = &cli.embedding_model {
        config.model = model.clone();
    }
    if let Some(dimensions) = cli.dimensions {
        config.dimensions = dimensions;
    }
    config
}

fn build_embedder(cli: &Cli, config: &RetrievalConfig) -> anyhow::Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match cli.embedder {
        EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: config.dimensions,
        }),
        EmbedderKind::Http => Box::new(HttpEmbedder::new(HttpEmbedderConfig {
            base_url: cli.embedding_url.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key: cli.embedding_api_key.clone(),
        })?),
        #[cfg(feature = "local-embed")]
        EmbedderKind::Fastembed => Box::new(file_rag_core::FastEmbedder::new(&config.model)?),
        #[cfg(not(feature = "local-embed"))]
        EmbedderKind::Fastembed => {
            anyhow::bail!("this build has no local models; rebuild with --features local-embed")
        }
    };
    Ok(embedder)
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        store = %config.store_dir.display(),
        model = %config.model,
        "file-rag boot"
    );

    let embedder = build_embedder(&cli, &config)?;

    match cli.command {
        Command::Index { folder } => {
            let mut service = RetrievalService::new(embedder).with_persistence(&config.store_dir);
            let documents = collect_documents(&folder, &config);
            info!(
                folder = %folder.display(),
                documents = documents.len(),
                pdfs = count_by_kind(&documents, DocumentKind::Pdf),
                texts = count_by_kind(&documents, DocumentKind::Text),
                "indexing folder"
            );

            let report = service.build_index(documents)?;
            for skipped in &report.skipped {
                warn!(document = %skipped.name, reason = ?skipped.reason, "skipped document");
            }
            if !report.persisted {
                warn!(store = %config.store_dir.display(), "index was not persisted");
            }

            println!(
                "{} documents indexed, {} skipped at {}",
                report.indexed,
                report.skipped.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k } => {
            let service = RetrievalService::open(embedder, &config.store_dir)?;
            let hits = service.search(&query, top_k.unwrap_or(config.top_k))?;
            println!("query: {query}");
            for hit in hits {
                println!("{} distance={:.4}", hit.file_name, hit.distance);
            }
        }
        Command::Context { query, top_k } => {
            let service = RetrievalService::open(embedder, &config.store_dir)?;
            println!(
                "{}",
                service.context_for(&query, top_k.unwrap_or(config.top_k))?
            );
        }
    }

    Ok(())
}
