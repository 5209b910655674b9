//! Config (§J): project-level settings loaded from `.rootcause.{json,yaml}`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bm25::Bm25Params;
use crate::chunker::ChunkParams;
use crate::fuser::HybridParams;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    pub max_files: usize,
    pub batch_size: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self { max_files: 1000, batch_size: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedder_url: String,
    pub embed_dim: usize,
    pub bm25: Bm25Params,
    pub hybrid: HybridParams,
    pub chunk: ChunkParams,
    pub index: IndexParams,
    /// Directory names to skip anywhere in the tree, unioned with the
    /// file walker's built-in default set.
    pub exclude_dir_names: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedder_url: "http://127.0.0.1:8420".to_string(),
            embed_dim: 768,
            bm25: Bm25Params::default(),
            hybrid: HybridParams::default(),
            chunk: ChunkParams::default(),
            index: IndexParams::default(),
            exclude_dir_names: Vec::new(),
        }
    }
}

/// Load `.rootcause.json`, falling back to `.rootcause.yaml`/`.rootcause.yml`,
/// falling back to defaults. Never fails: a missing or unparseable file is
/// silently treated as "no overrides", matching the teacher's `load_config`.
pub fn load_config(project_root: &Path) -> Config {
    if let Ok(text) = std::fs::read_to_string(project_root.join(".rootcause.json")) {
        if let Ok(cfg) = serde_json::from_str::<Config>(&text) {
            return cfg;
        }
        crate::debug_log!("[rootcause] .rootcause.json present but unparseable, using defaults");
    }

    for name in [".rootcause.yaml", ".rootcause.yml"] {
        if let Ok(text) = std::fs::read_to_string(project_root.join(name)) {
            return match serde_yaml::from_str::<Config>(&text) {
                Ok(cfg) => cfg,
                Err(_) => {
                    crate::debug_log!("[rootcause] {name} present but unparseable, using defaults");
                    Config::default()
                }
            };
        }
    }

    Config::default()
}
