use serde::{Deserialize, Serialize};

/// An immutable, line-anchored region of one source file.
///
/// Identity is `"{file_path}:{start_line}-{end_line}"` — globally unique
/// within one project index. Never mutated after creation; a full reindex
/// is the only way to remove one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub has_imports: bool,
    pub file_ext: String,
}

impl Chunk {
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            file_path: self.file_path.clone(),
            file_name: file_name_of(&self.file_path),
            start_line: self.start_line,
            end_line: self.end_line,
            file_ext: self.file_ext.clone(),
            has_imports: self.has_imports,
        }
    }
}

fn file_name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// The wire/persisted shape of a chunk's metadata (§6 `ChunkMeta` schema).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
    #[serde(rename = "fileExt")]
    pub file_ext: String,
    #[serde(rename = "hasImports")]
    pub has_imports: bool,
}

/// One fused search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
    pub metadata: ChunkMeta,
}

/// `group_by_file` output: chunks bucketed by file, ordered by `max_score` desc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileGroup {
    pub file_path: String,
    pub max_score: f32,
    pub total_score: f32,
    pub results: Vec<SearchResult>,
}
