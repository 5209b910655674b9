use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use rootcause::config::load_config;
use rootcause::coordinator::{self, CancellationToken, Coordinator, IndexOptions, RetrieveOptions};
use rootcause::embedder::HttpEmbedder;

#[derive(Debug, Parser)]
#[command(name = "rootcause")]
#[command(version)]
#[command(about = "Hybrid BM25 + vector code-retrieval engine for root-cause discovery")]
struct Cli {
    /// Project root to operate on.
    #[arg(long, short = 'p', default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build or refresh the BM25 + vector indices for the project.
    Index {
        /// Additional directory names to exclude, beyond the built-in list.
        #[arg(long = "exclude", value_name = "DIR")]
        exclude_dirs: Vec<String>,

        /// Discard any existing indices and rebuild from scratch.
        #[arg(long)]
        force: bool,
    },
    /// Retrieve ranked source regions for an error log or query.
    Retrieve {
        /// Raw error log or natural-language query.
        query: String,

        /// Number of fused results to return.
        #[arg(long)]
        k: Option<usize>,
    },
    /// Print index statistics as JSON.
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.project);
    let embedder = HttpEmbedder::new(config.embedder_url.clone(), config.embed_dim);

    match cli.command {
        Command::Index { exclude_dirs, force } => run_index(&cli.project, &embedder, exclude_dirs, force),
        Command::Retrieve { query, k } => run_retrieve(&cli.project, &embedder, &query, k),
        Command::Stats => run_stats(&cli.project),
    }
}

fn run_index(project: &PathBuf, embedder: &HttpEmbedder, exclude_dirs: Vec<String>, force: bool) -> Result<()> {
    if !embedder.health() {
        eprintln!("warning: embedder at configured URL did not respond to /health; indexing may fail");
    }

    let mut coordinator = Coordinator::init_rag(project.clone()).context("failed to open rag index")?;
    let opts = IndexOptions { exclude_dirs, force_reindex: force, ..Default::default() };

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} indexing batch {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let result = coordinator.index_codebase(embedder, opts, &CancellationToken::new(), |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    })?;
    bar.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_retrieve(project: &PathBuf, embedder: &HttpEmbedder, query: &str, k: Option<usize>) -> Result<()> {
    let result =
        coordinator::retrieve_relevant_files(query, project.clone(), embedder, RetrieveOptions { k });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_stats(project: &PathBuf) -> Result<()> {
    let coordinator = Coordinator::init_rag(project.clone()).context("failed to open rag index")?;
    println!("{}", serde_json::to_string_pretty(&coordinator.rag_stats())?);
    Ok(())
}
