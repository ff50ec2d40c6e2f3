use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use askpdf_core::config::{Config, Settings};
use askpdf_core::traits::TextExtractor;
use askpdf_core::{Error, ErrorKind};
use askpdf_rag::{open_index, RagPipeline};
use askpdf_text::PlainTextExtractor;
use askpdf_vector::VectorIndex;

#[derive(Parser)]
#[command(name = "askpdf")]
#[command(about = "Ask questions about ingested documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store one extracted text file
    Ingest {
        file: PathBuf,
        /// Defaults to a random UUID
        #[arg(long)]
        source_id: Option<String>,
    },
    /// Ingest every `*.txt` file under a directory, using file stems as ids
    IngestDir {
        dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        jobs: usize,
    },
    /// Answer a question from one document
    Query {
        source_id: String,
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Stored chunk counts
    Status {
        #[arg(long)]
        source_id: Option<String>,
    },
    /// Delete every chunk of a document
    Remove { source_id: String },
    /// Build the IVF-PQ index over stored vectors
    BuildIndex,
}

fn init_tracing() {
    // stdout is reserved for JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(output) => println!("{output}"),
        Err(err) => {
            let (report, code) = error_report(&err);
            error!(error = %format!("{err:#}"), "command failed");
            println!("{report}");
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let settings = Config::load()?.settings()?;
    let base_dir = std::env::current_dir().context("resolving working directory")?;
    let index = open_index(&settings, &base_dir).await?;

    match cli.command {
        Commands::Ingest { file, source_id } => {
            let pipeline = pipeline(&settings, &index)?;
            let source_id = source_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let text = PlainTextExtractor.extract_text(&file)?;
            let chunks = pipeline.ingest(&source_id, &text).await?;
            Ok(json!({ "source_id": source_id, "chunks": chunks }))
        }
        Commands::IngestDir { dir, jobs } => {
            let pipeline = pipeline(&settings, &index)?;
            ingest_dir(&pipeline, &dir, jobs.max(1)).await
        }
        Commands::Query { source_id, question, top_k } => {
            let pipeline = pipeline(&settings, &index)?;
            let answer = pipeline.query(&source_id, &question, top_k).await?;
            Ok(serde_json::to_value(answer)?)
        }
        Commands::Status { source_id } => status(&index, source_id.as_deref()).await,
        Commands::Remove { source_id } => {
            let pipeline = pipeline(&settings, &index)?;
            let removed = pipeline.remove(&source_id).await?;
            Ok(json!({ "source_id": source_id, "removed": removed }))
        }
        Commands::BuildIndex => {
            let report = index.build_ann_index().await?;
            Ok(json!({
                "index": report.name,
                "rows": report.rows,
                "partitions": report.partitions,
                "sub_vectors": report.sub_vectors,
            }))
        }
    }
}

fn pipeline(settings: &Settings, index: &Arc<VectorIndex>) -> Result<RagPipeline> {
    Ok(RagPipeline::from_settings(settings, index.clone())?)
}

fn text_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .collect();
    files.sort();
    files
}

async fn ingest_dir(pipeline: &RagPipeline, dir: &Path, jobs: usize) -> Result<Value> {
    let files = text_files(dir);
    info!(dir = %dir.display(), files = files.len(), "ingesting directory");

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );

    let results: Vec<Value> = stream::iter(files)
        .map(|path| {
            let pb = pb.clone();
            async move {
                let source_id = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                let outcome = match PlainTextExtractor.extract_text(&path) {
                    Ok(text) => pipeline.ingest(&source_id, &text).await,
                    Err(e) => Err(e),
                };
                pb.inc(1);
                pb.set_message(source_id.clone());
                match outcome {
                    Ok(chunks) => json!({ "source_id": source_id, "path": path, "chunks": chunks }),
                    Err(e) => json!({ "source_id": source_id, "path": path, "error": e.kind().as_str(), "message": e.to_string() }),
                }
            }
        })
        .buffer_unordered(jobs)
        .collect()
        .await;
    pb.finish_with_message("done");

    let failed = results.iter().filter(|r| r.get("error").is_some()).count();
    Ok(json!({ "ingested": results.len() - failed, "failed": failed, "documents": results }))
}

async fn status(index: &VectorIndex, source_id: Option<&str>) -> Result<Value> {
    let initialized = index.is_initialized().await?;
    let chunks = if initialized { index.count(source_id).await? } else { 0 };
    Ok(json!({
        "table": index.table_name(),
        "dim": index.dim(),
        "initialized": initialized,
        "source_id": source_id,
        "chunks": chunks,
    }))
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidInput => 2,
        ErrorKind::NoContent => 3,
        ErrorKind::EmptyDocument => 4,
        ErrorKind::Provider => 5,
        ErrorKind::IndexNotFound => 6,
        ErrorKind::DimensionMismatch => 7,
        ErrorKind::Tokenizer | ErrorKind::InvalidConfig => 8,
        ErrorKind::Storage | ErrorKind::Io => 9,
    }
}

fn error_report(err: &anyhow::Error) -> (Value, i32) {
    match err.downcast_ref::<Error>() {
        Some(e) => (
            json!({ "error": e.kind().as_str(), "status": e.status_code(), "message": e.to_string() }),
            exit_code(e.kind()),
        ),
        None => (json!({ "error": "internal", "status": 500, "message": format!("{err:#}") }), 1),
    }
}
