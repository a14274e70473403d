use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use kbsearch_core::config::{expand_path, Config};
use kbsearch_core::kv::FileKvStore;
use kbsearch_core::traits::{DocumentSource, KvStore};
use kbsearch_core::types::{Document, SearchMode, SearchOptions};
use kbsearch_core::traits::EmbeddingProvider;
use kbsearch_embed::{provider_from_name, TfIdfEmbedder};
use kbsearch_hybrid::{EngineOptions, RetrievalEngine};

/// Walks a directory of .txt/.md files and exposes them as documents:
/// file stem as id, first line as title.
struct DirSource {
    root: PathBuf,
}

impl DocumentSource for DirSource {
    fn list_documents(&self) -> anyhow::Result<Vec<Document>> {
        let mut docs = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_text = path
                .extension()
                .is_some_and(|ext| ext == "txt" || ext == "md");
            if !is_text {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            let id = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            let title = content.lines().next().unwrap_or("").trim().to_string();
            docs.push(Document::new(id, title, content));
        }
        Ok(docs)
    }
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|query|context> [args...]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn build_engine(config: &Config) -> anyhow::Result<(RetrievalEngine, Option<Arc<TfIdfEmbedder>>)> {
    let provider_name: String =
        config.get("embedding.provider").unwrap_or_else(|_| "hashing".to_string());
    let dimension: usize = config.get("embedding.dimension").unwrap_or_else(|_| 256);
    let cache_dir: String =
        config.get("cache.dir").unwrap_or_else(|_| "./kbsearch-cache".to_string());

    let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(expand_path(&cache_dir))?);
    // Keep the concrete tfidf handle around: its vocabulary is refit from
    // each ingested corpus, which the provider trait has no verb for.
    let (provider, tfidf): (Arc<dyn EmbeddingProvider>, Option<Arc<TfIdfEmbedder>>) =
        if provider_name == "tfidf" {
            let t = Arc::new(TfIdfEmbedder::new(dimension, Some(kv.clone())));
            (t.clone(), Some(t))
        } else {
            (provider_from_name(&provider_name, dimension, Some(kv.clone()))?, None)
        };
    let engine = RetrievalEngine::new(EngineOptions::default(), provider, Some(kv), None)?;
    Ok((engine, tfidf))
}

fn ingest(
    engine: &RetrievalEngine,
    tfidf: Option<&TfIdfEmbedder>,
    data_dir: &Path,
) -> anyhow::Result<usize> {
    let source = DirSource { root: data_dir.to_path_buf() };
    let docs = source.list_documents()?;
    if docs.is_empty() {
        println!("No .txt/.md files found under {}.", data_dir.display());
        return Ok(0);
    }
    if let Some(tfidf) = tfidf {
        let texts: Vec<String> = docs.iter().map(|d| format!("{}\n{}", d.title, d.content)).collect();
        tfidf.fit(&texts);
    }
    let bar = ProgressBar::new_spinner();
    bar.set_message(format!("indexing {} documents", docs.len()));
    engine.index_documents(&docs)?;
    bar.finish_and_clear();
    Ok(docs.len())
}

fn parse_mode(s: &str) -> SearchMode {
    match s {
        "bm25" => SearchMode::Bm25,
        "vector" => SearchMode::Vector,
        "keyword" => SearchMode::Keyword,
        _ => SearchMode::Hybrid,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();
    let (engine, tfidf) = build_engine(&config)?;

    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String =
                    config.get("data.dir").unwrap_or_else(|_| "./data".to_string());
                expand_path(dir)
            });
            println!("Ingesting from {}", data_dir.display());
            let count = ingest(&engine, tfidf.as_deref(), &data_dir)?;
            println!("Ingest complete ({count} documents)");
        }
        "query" => {
            let Some(query_text) = args.first().cloned() else {
                eprintln!("Usage: kbsearch query \"<query>\" [bm25|vector|keyword|hybrid]");
                std::process::exit(1);
            };
            let data_dir: String = config.get("data.dir").unwrap_or_else(|_| "./data".to_string());
            ingest(&engine, tfidf.as_deref(), &expand_path(data_dir))?;
            let mode = args.get(1).map(|s| parse_mode(s)).unwrap_or_default();
            let opts = SearchOptions { mode, ..SearchOptions::default() };
            let results = engine.search(&query_text, &opts).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, r) in results.iter().enumerate() {
                println!(
                    "{:2}. {}  score={:.4}  terms={}",
                    i + 1,
                    r.document_id,
                    r.score,
                    r.matched_terms.join(",")
                );
            }
        }
        "context" => {
            let Some(query_text) = args.first().cloned() else {
                eprintln!("Usage: kbsearch context \"<query>\" [top_k]");
                std::process::exit(1);
            };
            let data_dir: String = config.get("data.dir").unwrap_or_else(|_| "./data".to_string());
            ingest(&engine, tfidf.as_deref(), &expand_path(data_dir))?;
            let top_k = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(3);
            let context = engine.build_context(&query_text, top_k).await?;
            println!("{context}");
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}
