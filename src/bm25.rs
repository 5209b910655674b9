//! BM25 Index (§4.D): inverted index over chunks with Okapi BM25 scoring.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{RagError, RagResult};
use crate::tokenizer::{tokenize_code, TokenizerOpts};
use crate::types::ChunkMeta;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, epsilon: 0.25 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    doc_index: usize,
    term_freq: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDoc {
    chunk_id: String,
    content: String,
    meta: ChunkMeta,
    len: usize,
}

/// Okapi BM25 index. Documents are appended in insertion order; `doc_index`
/// in the postings lists is that insertion order, used to break score ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    params: Bm25Params,
    documents: Vec<StoredDoc>,
    avg_dl: f64,
    postings: HashMap<String, Vec<Posting>>,
    vocab: HashSet<String>,
    #[serde(skip, default)]
    id_to_index: HashMap<String, usize>,
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            documents: Vec::new(),
            avg_dl: 0.0,
            postings: HashMap::new(),
            vocab: HashSet::new(),
            id_to_index: HashMap::new(),
        }
    }

    fn opts() -> TokenizerOpts {
        TokenizerOpts::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.id_to_index.contains_key(chunk_id)
    }

    /// `add(doc)`: a no-op when `chunk_id` is already present.
    pub fn add(&mut self, chunk_id: &str, content: &str, meta: ChunkMeta) {
        if self.id_to_index.contains_key(chunk_id) {
            return;
        }

        let tokens = tokenize_code(content, Self::opts());
        let doc_index = self.documents.len();
        let len = tokens.len();

        let n_before = self.documents.len() as f64;
        self.avg_dl = if n_before == 0.0 {
            len as f64
        } else {
            (self.avg_dl * n_before + len as f64) / (n_before + 1.0)
        };

        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for tok in &tokens {
            *term_freqs.entry(tok.clone()).or_insert(0) += 1;
        }
        for (term, tf) in term_freqs {
            self.vocab.insert(term.clone());
            self.postings.entry(term).or_default().push(Posting { doc_index, term_freq: tf });
        }

        self.documents.push(StoredDoc { chunk_id: chunk_id.to_string(), content: content.to_string(), meta, len });
        self.id_to_index.insert(chunk_id.to_string(), doc_index);
    }

    fn idf(&self, n_t: usize) -> f64 {
        let n = self.documents.len() as f64;
        let n_t = n_t as f64;
        (1.0 + (n - n_t + 0.5) / (n_t + 0.5) + self.params.epsilon as f64).ln()
    }

    /// `search(query, k)` per §4.D: at most `min(k, N)` results, never negative.
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32, ChunkMeta)> {
        if self.documents.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_tokens: HashSet<String> = tokenize_code(query, Self::opts()).into_iter().collect();

        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &query_tokens {
            let Some(postings) = self.postings.get(term) else { continue };
            let idf = self.idf(postings.len());
            for posting in postings {
                let doc = &self.documents[posting.doc_index];
                let dl = doc.len as f64;
                let f = posting.term_freq as f64;
                let k1 = self.params.k1 as f64;
                let b = self.params.b as f64;
                let denom = f + k1 * (1.0 - b + b * dl / self.avg_dl.max(1.0));
                let score = idf * (f * (k1 + 1.0)) / denom.max(f64::EPSILON);
                *scores.entry(posting.doc_index).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .take(k.min(self.documents.len()))
            .map(|(idx, score)| {
                let doc = &self.documents[idx];
                (doc.chunk_id.clone(), score.max(0.0) as f32, doc.meta.clone())
            })
            .collect()
    }

    pub fn save(&self, dir: &Path, name: &str) -> RagResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;
        let final_path = dir.join(name);
        let tmp_path = dir.join(format!("{name}.tmp"));
        let text = serde_json::to_string(self)
            .map_err(|e| RagError::corrupt(&final_path, format!("serialize failed: {e}")))?;
        std::fs::write(&tmp_path, text).map_err(|e| RagError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| RagError::io(&final_path, e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> RagResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let mut idx: Bm25Index = serde_json::from_str(&text)
            .map_err(|e| RagError::corrupt(path, format!("invalid snapshot: {e}")))?;
        idx.id_to_index =
            idx.documents.iter().enumerate().map(|(i, d)| (d.chunk_id.clone(), i)).collect();
        Ok(idx)
    }

    /// `open_or_create`: an absent snapshot is a fresh index; a snapshot
    /// present but unparseable is `Corrupt` and propagates to the caller
    /// rather than silently rebuilding empty.
    pub fn open_or_create(path: &Path, params: Bm25Params) -> RagResult<Self> {
        if !path.exists() {
            return Ok(Self::new(params));
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> ChunkMeta {
        ChunkMeta {
            file_path: path.to_string(),
            file_name: path.to_string(),
            start_line: 1,
            end_line: 1,
            file_ext: ".rs".to_string(),
            has_imports: false,
        }
    }

    #[test]
    fn bm25_singleton_scenario() {
        let mut idx = Bm25Index::new(Bm25Params::default());
        idx.add("d1", "def foo(x): return x+1", meta("d1.py"));
        idx.add("d2", "class Bar: pass", meta("d2.py"));

        let results = idx.search("foo", 2);
        assert_eq!(results[0].0, "d1");
        assert!(!results.iter().any(|(id, _, _)| id == "d2"));
    }

    #[test]
    fn bm25_formula_matches_reference_to_high_precision() {
        let mut idx = Bm25Index::new(Bm25Params::default());
        // One document: "foo" twice + 8 unique filler tokens => length 10.
        idx.add("only", "foo foo alpha beta gamma delta epsilon zeta eta theta", meta("f.rs"));

        let results = idx.search("foo", 1);
        let idf = (1.0_f64 + (1.0 - 1.0 + 0.5) / (1.0 + 0.5) + 0.25).ln();
        let tf_num = 2.0 * (1.2 + 1.0);
        let tf_den = 2.0 + 1.2 * (1.0 - 0.75 + 0.75 * 10.0 / 10.0);
        let expected = idf * tf_num / tf_den;

        assert!((results[0].1 as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn add_is_idempotent_for_existing_chunk_id() {
        let mut idx = Bm25Index::new(Bm25Params::default());
        idx.add("d1", "alpha beta gamma", meta("a.rs"));
        let before = serde_json::to_string(&idx).unwrap();
        idx.add("d1", "totally different content", meta("a.rs"));
        let after = serde_json::to_string(&idx).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn round_trip_save_load_preserves_search_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = Bm25Index::new(Bm25Params::default());
        idx.add("d1", "parse the error stack trace", meta("a.rs"));
        idx.add("d2", "render the output widget", meta("b.rs"));
        idx.save(dir.path(), "bm25.json").unwrap();

        let loaded = Bm25Index::load(&dir.path().join("bm25.json")).unwrap();
        assert_eq!(idx.search("error", 5), loaded.search("error", 5));
    }

    #[test]
    fn search_with_k_ge_n_returns_all_overlapping_docs() {
        let mut idx = Bm25Index::new(Bm25Params::default());
        idx.add("d1", "network socket timeout", meta("a.rs"));
        idx.add("d2", "unrelated file contents", meta("b.rs"));
        idx.add("d3", "another network retry loop", meta("c.rs"));

        let results = idx.search("network", 10);
        let ids: HashSet<String> = results.iter().map(|(id, _, _)| id.clone()).collect();
        assert_eq!(ids, HashSet::from(["d1".to_string(), "d3".to_string()]));
    }

    #[test]
    fn open_or_create_yields_empty_index_when_snapshot_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let idx = Bm25Index::open_or_create(&dir.path().join("missing.json"), Bm25Params::default()).unwrap();
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn open_or_create_surfaces_corrupt_when_snapshot_is_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Bm25Index::open_or_create(&path, Bm25Params::default()).unwrap_err();
        assert!(matches!(err, RagError::Corrupt { .. }));
    }
}
