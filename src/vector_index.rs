//! Vector Index (§4.F): append-only exact L2 store over a fixed dimension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embedder::normalize;
use crate::error::{RagError, RagResult};
use crate::types::ChunkMeta;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub file_count: usize,
    pub memory_usage: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorRecord {
    id: String,
    vector: Vec<f32>,
    meta: ChunkMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataFile {
    dimension: usize,
    size: usize,
    metadata: Vec<(u32, ChunkMeta)>,
}

/// Exact L2 store. Vectors are kept as a flat `size * dimension` buffer; a
/// linear scan is the whole search algorithm (no approximate index, per the
/// original spec's non-goals).
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    ids: Vec<String>,
    flat: Vec<f32>,
    metas: Vec<ChunkMeta>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, ids: Vec::new(), flat: Vec::new(), metas: Vec::new() }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }

    /// `add`: validates dimension/finiteness per §4.E rules, appends, assigns
    /// `vector_id = size + i`. Entries already present (same chunk id) are
    /// skipped, matching the BM25 side's idempotent `add`.
    pub fn add(&mut self, entries: Vec<(String, Vec<f32>, ChunkMeta)>) {
        for (id, vector, meta) in entries {
            if self.ids.contains(&id) {
                continue;
            }
            let vector = normalize(vector, self.dimension);
            self.flat.extend_from_slice(&vector);
            self.ids.push(id);
            self.metas.push(meta);
        }
    }

    fn vector_at(&self, i: usize) -> &[f32] {
        &self.flat[i * self.dimension..(i + 1) * self.dimension]
    }

    /// Exact L2 distance, converted to a similarity via `max(0, 1 - d/100)`.
    /// Ties broken by smaller `vector_id` (insertion order).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32, ChunkMeta)> {
        if self.ids.is_empty() || k == 0 {
            return Vec::new();
        }
        let query = normalize(query.to_vec(), self.dimension);

        let mut scored: Vec<(usize, f64)> = (0..self.ids.len())
            .map(|i| {
                let d: f64 = self
                    .vector_at(i)
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| {
                        let diff = (*a - *b) as f64;
                        diff * diff
                    })
                    .sum();
                (i, d)
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(k.min(self.ids.len()))
            .map(|(i, d)| {
                let score = (1.0 - d / 100.0).max(0.0) as f32;
                (self.ids[i].clone(), score, self.metas[i].clone())
            })
            .collect()
    }

    pub fn stats(&self) -> VectorStats {
        let file_count = {
            let mut paths: Vec<&str> = self.metas.iter().map(|m| m.file_path.as_str()).collect();
            paths.sort_unstable();
            paths.dedup();
            paths.len()
        };
        VectorStats {
            vector_count: self.size(),
            dimension: self.dimension,
            file_count,
            memory_usage: self.size() * self.dimension * 4 + self.size() * 200,
        }
    }

    fn vectors_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.vectors.json"))
    }

    fn meta_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.metadata.json"))
    }

    /// Persist vectors plus a metadata JSON. If the vector file can't be
    /// written, warn and leave in-memory state intact — the next `load` then
    /// starts empty, matching §4.F.
    pub fn save(&self, dir: &Path, name: &str) -> RagResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;

        let records: Vec<VectorRecord> = (0..self.ids.len())
            .map(|i| VectorRecord { id: self.ids[i].clone(), vector: self.vector_at(i).to_vec(), meta: self.metas[i].clone() })
            .collect();

        let vec_path = Self::vectors_path(dir, name);
        let vec_tmp = dir.join(format!("{name}.vectors.json.tmp"));
        match serde_json::to_string(&records) {
            Ok(text) => match std::fs::write(&vec_tmp, text).and_then(|_| std::fs::rename(&vec_tmp, &vec_path)) {
                Ok(()) => {}
                Err(e) => {
                    crate::debug_log!("[rootcause] failed to write vector payload: {e}");
                    return Ok(());
                }
            },
            Err(e) => {
                crate::debug_log!("[rootcause] failed to serialize vector payload: {e}");
                return Ok(());
            }
        }

        let meta_file = MetadataFile {
            dimension: self.dimension,
            size: self.size(),
            metadata: self.metas.iter().enumerate().map(|(i, m)| (i as u32, m.clone())).collect(),
        };
        let meta_path = Self::meta_path(dir, name);
        let meta_tmp = dir.join(format!("{name}.metadata.json.tmp"));
        let text = serde_json::to_string(&meta_file)
            .map_err(|e| RagError::corrupt(&meta_path, format!("serialize failed: {e}")))?;
        std::fs::write(&meta_tmp, text).map_err(|e| RagError::io(&meta_tmp, e))?;
        std::fs::rename(&meta_tmp, &meta_path).map_err(|e| RagError::io(&meta_path, e))?;
        Ok(())
    }

    /// Reconstruct `(D, size, vectors, id_to_meta)`. If the vector file is
    /// missing but metadata is present, returns an empty index of the
    /// recorded dimension.
    pub fn load(dir: &Path, name: &str) -> RagResult<Self> {
        let meta_path = Self::meta_path(dir, name);
        let meta_text = std::fs::read_to_string(&meta_path).map_err(|e| RagError::io(&meta_path, e))?;
        let meta_file: MetadataFile = serde_json::from_str(&meta_text)
            .map_err(|e| RagError::corrupt(&meta_path, format!("invalid metadata: {e}")))?;

        let vec_path = Self::vectors_path(dir, name);
        let records: Vec<VectorRecord> = match std::fs::read_to_string(&vec_path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| RagError::corrupt(&vec_path, format!("invalid vector payload: {e}")))?,
            Err(_) => Vec::new(),
        };

        let mut idx = VectorIndex::new(meta_file.dimension);
        for r in records {
            idx.flat.extend_from_slice(&r.vector);
            idx.ids.push(r.id);
            idx.metas.push(r.meta);
        }
        Ok(idx)
    }

    /// `open_or_create`: an absent snapshot is a fresh index of `dimension`.
    /// A snapshot present but unparseable is `Corrupt` and propagates. A
    /// snapshot present, parseable, but recorded at a different dimension
    /// is the intentional config hot-swap case — discarded and rebuilt
    /// empty, not treated as corruption.
    pub fn open_or_create(dir: &Path, name: &str, dimension: usize) -> RagResult<Self> {
        if !Self::meta_path(dir, name).exists() {
            return Ok(VectorIndex::new(dimension));
        }
        match Self::load(dir, name) {
            Ok(idx) if idx.dimension == dimension => Ok(idx),
            Ok(stale) => {
                crate::debug_log!(
                    "[rootcause] vector index dimension changed ({} -> {dimension}); rebuilding",
                    stale.dimension
                );
                Ok(VectorIndex::new(dimension))
            }
            Err(e) => Err(e),
        }
    }
}
