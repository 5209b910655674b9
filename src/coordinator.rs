//! Coordinator (§4.I): owns both indices for a project root and exposes the
//! public index/retrieve API.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bm25::Bm25Index;
use crate::chunker::chunk_file;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::{RagError, RagResult};
use crate::fuser::{group_by_file, hybrid_search, identify_root_cause};
use crate::query_expander::expand_query;
use crate::types::{FileGroup, SearchResult};
use crate::vector_index::VectorIndex;
use crate::walker::walk_project;

const RAG_DATA_DIR: &str = ".terminal_helper/rag-data";
const BM25_FILE: &str = "code_bm25.json";
const VECTOR_NAME: &str = "code_vectors";

/// Cooperative cancellation handle shared across an `index_codebase` run.
/// The current batch always finishes; the indices are simply not saved.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub exclude_dirs: Vec<String>,
    pub max_files: Option<usize>,
    pub batch_size: Option<usize>,
    pub force_reindex: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingResult {
    pub file_count: usize,
    pub chunk_count: usize,
    pub vector_stats: crate::vector_index::VectorStats,
    pub bm25_doc_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrieveResult {
    pub results: Vec<SearchResult>,
    pub grouped_results: Vec<FileGroup>,
    pub root_cause_file: Option<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagStats {
    pub vector_stats: crate::vector_index::VectorStats,
    pub bm25_doc_count: usize,
    pub hybrid_config: crate::fuser::HybridParams,
}

/// Owns one project's on-disk indices for the lifetime of a session. Mutation
/// (`index_codebase`) and read (`retrieve_relevant_files`) both go through
/// `&mut self`, so the borrow checker enforces the single-writer contract
/// that §5 describes at runtime for other languages.
pub struct Coordinator {
    project_root: PathBuf,
    config: Config,
    bm25: Bm25Index,
    vectors: VectorIndex,
}

impl Coordinator {
    fn data_dir(project_root: &Path) -> PathBuf {
        project_root.join(RAG_DATA_DIR)
    }

    /// `init_rag`: create the data directory if missing, load both indices if
    /// present, else construct empty ones matching the project's config. A
    /// snapshot that exists but fails to parse is `Corrupt` and propagates;
    /// only an absent snapshot builds an empty index.
    pub fn init_rag(project_root: impl Into<PathBuf>) -> RagResult<Self> {
        let project_root = project_root.into();
        let config = crate::config::load_config(&project_root);
        let dir = Self::data_dir(&project_root);
        std::fs::create_dir_all(&dir).map_err(|e| RagError::io(&dir, e))?;

        let bm25_path = dir.join(BM25_FILE);
        let bm25 = Bm25Index::open_or_create(&bm25_path, config.bm25)?;
        let vectors = VectorIndex::open_or_create(&dir, VECTOR_NAME, config.embed_dim)?;

        Ok(Self { project_root, config, bm25, vectors })
    }

    pub fn rag_stats(&self) -> RagStats {
        RagStats {
            vector_stats: self.vectors.stats(),
            bm25_doc_count: self.bm25.len(),
            hybrid_config: self.config.hybrid,
        }
    }

    /// `index_codebase`: walk the project, chunk files, embed chunks in
    /// batches, insert into both indices, save. File-level and embedder
    /// failures are logged and skipped per §7; cancellation drops the
    /// partially built indices without saving.
    pub fn index_codebase(
        &mut self,
        embedder: &dyn Embedder,
        opts: IndexOptions,
        cancel: &CancellationToken,
        mut on_batch: impl FnMut(usize, usize),
    ) -> RagResult<IndexingResult> {
        let max_files = opts.max_files.unwrap_or(self.config.index.max_files);
        let batch_size = opts.batch_size.unwrap_or(self.config.index.batch_size).max(1);

        let mut exclude_dirs = self.config.exclude_dir_names.clone();
        exclude_dirs.extend(opts.exclude_dirs);

        let mut entries = walk_project(&self.project_root, &exclude_dirs)?;
        entries.truncate(max_files);
        let file_count = entries.len();

        if opts.force_reindex {
            self.bm25 = Bm25Index::new(self.config.bm25);
            self.vectors = VectorIndex::new(self.config.embed_dim);
        }

        let mut chunk_count = 0usize;
        let total_batches = entries.chunks(batch_size).count().max(1);

        for (batch_idx, batch) in entries.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(RagError::Cancelled);
            }

            let mut batch_chunks = Vec::new();
            for entry in batch {
                let content = match std::fs::read_to_string(&entry.abs_path) {
                    Ok(c) => c,
                    Err(e) => {
                        crate::debug_log!("[rootcause] skipping {}: {e}", entry.rel_path);
                        continue;
                    }
                };
                let chunks = chunk_file(&entry.rel_path, &content, self.config.chunk);
                batch_chunks.extend(chunks);
            }

            if batch_chunks.is_empty() {
                on_batch(batch_idx + 1, total_batches);
                continue;
            }

            // Embedding may run concurrently within a batch; insertion into
            // the two indices afterwards is single-threaded (serialized
            // writer), matching §5's per-batch write ordering.
            let embedded: Vec<(String, Vec<f32>, &crate::types::Chunk)> = batch_chunks
                .par_iter()
                .filter_map(|chunk| match embedder.embed(&chunk.content) {
                    Ok(vector) => Some((chunk.id(), vector, chunk)),
                    Err(e) => {
                        crate::debug_log!("[rootcause] embedder failed for {}: {e}", chunk.id());
                        None
                    }
                })
                .collect();

            if embedded.is_empty() {
                return Err(RagError::Embedder(format!(
                    "embedder failed for every chunk in batch {}",
                    batch_idx + 1
                )));
            }

            for chunk in &batch_chunks {
                self.bm25.add(&chunk.id(), &chunk.content, chunk.meta());
            }
            chunk_count += batch_chunks.len();

            let vector_entries: Vec<(String, Vec<f32>, crate::types::ChunkMeta)> = embedded
                .into_iter()
                .map(|(id, vector, chunk)| (id, vector, chunk.meta()))
                .collect();
            self.vectors.add(vector_entries);

            on_batch(batch_idx + 1, total_batches);
        }

        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let dir = Self::data_dir(&self.project_root);
        self.bm25.save(&dir, BM25_FILE)?;
        self.vectors.save(&dir, VECTOR_NAME)?;

        Ok(IndexingResult {
            file_count,
            chunk_count,
            vector_stats: self.vectors.stats(),
            bm25_doc_count: self.bm25.len(),
        })
    }

    /// `retrieve_relevant_files`: always responsive — never propagates an
    /// error. Auto-indexes a cold project with a smaller budget, then runs
    /// the §4.H pipeline.
    pub fn retrieve_relevant_files(
        &mut self,
        error_log: &str,
        embedder: &dyn Embedder,
        opts: RetrieveOptions,
    ) -> RetrieveResult {
        if self.bm25.is_empty() && self.vectors.size() == 0 {
            let auto_opts = IndexOptions {
                max_files: Some(100),
                batch_size: Some(10),
                ..Default::default()
            };
            if let Err(e) = self.index_codebase(embedder, auto_opts, &CancellationToken::new(), |_, _| {}) {
                crate::debug_log!("[rootcause] auto-index during retrieval failed, returning empty: {e}");
                return RetrieveResult::default();
            }
        }

        let expanded = expand_query(error_log);
        let query_vector = match embedder.embed(&expanded) {
            Ok(v) => v,
            Err(e) => {
                crate::debug_log!("[rootcause] embedder unavailable during retrieval: {e}");
                return RetrieveResult::default();
            }
        };

        let mut hybrid = self.config.hybrid;
        if let Some(k) = opts.k {
            hybrid.k = k;
        }

        let results = hybrid_search(&expanded, &query_vector, &self.bm25, &self.vectors, hybrid);
        let grouped_results = group_by_file(&results);
        let root_cause_file = identify_root_cause(&results, error_log);

        RetrieveResult { results, grouped_results, root_cause_file }
    }
}

/// Free-function form of the public retrieval contract: never propagates an
/// error, even when `init_rag` fails outright (e.g. a `Corrupt` on-disk
/// snapshot). `Corrupt` and every other `init_rag` failure is logged and
/// translated into an empty result here, per §7's "always-responsive"
/// guarantee — callers that only want to query, not manage index lifecycle,
/// should use this instead of `Coordinator::init_rag` directly.
pub fn retrieve_relevant_files(
    error_log: &str,
    project_root: impl Into<PathBuf>,
    embedder: &dyn Embedder,
    opts: RetrieveOptions,
) -> RetrieveResult {
    match Coordinator::init_rag(project_root) {
        Ok(mut coordinator) => coordinator.retrieve_relevant_files(error_log, embedder, opts),
        Err(e) => {
            crate::debug_log!("[rootcause] retrieve_relevant_files: init_rag failed, returning empty: {e}");
            RetrieveResult::default()
        }
    }
}
