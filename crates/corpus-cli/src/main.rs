//! corpus CLI - build and query a local retrieval index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use corpus_chunk::SlidingWindowChunker;
use corpus_core::{CorpusConfig, IndexStore, SourceMetadata, StoreBackendKind};
use corpus_embed::EmbeddingClient;
use corpus_index::IndexBuilder;
use corpus_query::{format_citations, format_context, HybridSearcher, QueryConfig};
use corpus_store::store_from_config;

/// corpus - Hybrid semantic and keyword search over local documents
#[derive(Parser)]
#[command(name = "corpus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/corpus/config.toml or ./corpus.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Index location; a .db/.sqlite extension selects the SQLite store
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh index from files, replacing any stored index
    Build {
        /// Files or directories to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Recursively process directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Search the stored index
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum score
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Diversify results with MMR reranking
        #[arg(long)]
        rerank: bool,
    },

    /// Show statistics about the stored index
    Stats,

    /// Delete the stored index
    Clear,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(cli: &Cli) -> Result<CorpusConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CorpusConfig::load(path)?,
        None => CorpusConfig::load_default()?,
    };

    if let Some(path) = &cli.store {
        config.store.backend = backend_for_path(path);
        config.store.path = path.clone();
    }

    Ok(config)
}

fn backend_for_path(path: &Path) -> StoreBackendKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db" | "sqlite" | "sqlite3") => StoreBackendKind::Sqlite,
        _ => StoreBackendKind::Json,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(&cli)?;
    let store = store_from_config(&config.store)?;

    match cli.command {
        Commands::Build { paths, recursive } => {
            build(&config, store.as_ref(), &paths, recursive).await?;
        }
        Commands::Search {
            query,
            top_k,
            threshold,
            rerank,
        } => {
            search(&config, store.as_ref(), &query, top_k, threshold, rerank).await?;
        }
        Commands::Stats => {
            stats(store.as_ref()).await?;
        }
        Commands::Clear => {
            store.clear().await?;
            println!("Cleared index at: {}", config.store.path.display());
        }
    }

    Ok(())
}

async fn build(
    config: &CorpusConfig,
    store: &dyn IndexStore,
    paths: &[PathBuf],
    recursive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        files.extend(collect_files(path, recursive)?);
    }

    if files.is_empty() {
        println!("No supported files found");
        return Ok(());
    }

    let mut texts = Vec::with_capacity(files.len());
    let mut metadatas = Vec::with_capacity(files.len());
    for file_path in &files {
        match fs::read_to_string(file_path) {
            Ok(content) => {
                let meta = SourceMetadata::new(file_path.display().to_string())
                    .with_field("path", file_path.canonicalize()?.display().to_string());
                texts.push(content);
                metadatas.push(meta);
            }
            Err(e) => eprintln!("  Error reading {}: {}", file_path.display(), e),
        }
    }

    println!("Indexing {} file(s)...", texts.len());

    let embedder = Arc::new(EmbeddingClient::from_config(&config.embedding)?);
    let builder = IndexBuilder::new(SlidingWindowChunker::new(), embedder)
        .with_chunk_config(config.chunking.to_chunk_config()?)
        .with_batch_size(config.embedding.batch_size);

    let index = builder
        .build(&texts, &metadatas, |message| println!("  {}", message))
        .await?;

    store.save(&index).await?;

    let stats = index.stats();
    println!(
        "\nSaved {} chunks ({} embedded) from {} documents to: {}",
        stats.chunks,
        stats.embedded_chunks,
        stats.documents,
        config.store.path.display()
    );

    Ok(())
}

async fn search(
    config: &CorpusConfig,
    store: &dyn IndexStore,
    query: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
    rerank: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(index) = store.load().await? else {
        eprintln!("No index found. Run 'corpus build <paths>' first.");
        std::process::exit(1);
    };

    let query_config = QueryConfig::from_search_config(&config.search)?;
    let top_k = top_k.unwrap_or(query_config.top_k);
    let threshold = threshold.unwrap_or(query_config.threshold);
    let use_reranker = rerank || query_config.use_reranker;

    let embedder = Arc::new(EmbeddingClient::from_config(&config.embedding)?);
    let searcher = HybridSearcher::with_config(embedder, query_config);

    let results = searcher
        .search(query, &index, top_k, threshold, use_reranker)
        .await;

    if results.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Found {} results:\n", results.len());
    print!("{}", format_context(&results));
    println!("{}", format_citations(&results));

    Ok(())
}

async fn stats(store: &dyn IndexStore) -> Result<(), Box<dyn std::error::Error>> {
    let Some(index) = store.load().await? else {
        println!("No index stored");
        return Ok(());
    };

    let stats = index.stats();
    println!("Documents:       {}", stats.documents);
    println!("Chunks:          {}", stats.chunks);
    println!("Embedded chunks: {}", stats.embedded_chunks);
    match stats.dimension {
        Some(dim) => println!("Dimension:       {}", dim),
        None => println!("Dimension:       -"),
    }

    Ok(())
}

fn collect_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_supported_file(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();

        for entry_path in entries {
            if entry_path.is_file() && is_supported_file(&entry_path) {
                files.push(entry_path);
            } else if entry_path.is_dir() && recursive {
                files.extend(collect_files(&entry_path, recursive)?);
            }
        }
    }

    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(
        ext,
        "md" | "txt"
            | "rst"
            | "org"
            | "html"
            | "csv"
            | "json"
            | "yaml"
            | "yml"
            | "toml"
            | "rs"
            | "py"
            | "js"
            | "ts"
            | "go"
            | "c"
            | "h"
            | "java"
            | "sh"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_for_path() {
        assert_eq!(backend_for_path(Path::new("idx.db")), StoreBackendKind::Sqlite);
        assert_eq!(backend_for_path(Path::new("idx.sqlite")), StoreBackendKind::Sqlite);
        assert_eq!(backend_for_path(Path::new("idx.json")), StoreBackendKind::Json);
        assert_eq!(backend_for_path(Path::new("idx")), StoreBackendKind::Json);
    }

    #[test]
    fn test_collect_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# a").unwrap();
        fs::write(dir.path().join("b.bin"), [0u8, 1]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.txt"), "c").unwrap();

        let flat = collect_files(dir.path(), false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.md")]);

        let deep = collect_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep.contains(&dir.path().join("sub").join("c.txt")));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["corpus", "search", "hello", "-k", "5", "--rerank"]).unwrap();
        match cli.command {
            Commands::Search { query, top_k, rerank, .. } => {
                assert_eq!(query, "hello");
                assert_eq!(top_k, Some(5));
                assert!(rerank);
            }
            _ => panic!("expected search"),
        }
        assert!(Cli::try_parse_from(["corpus", "build"]).is_err());
    }
}
