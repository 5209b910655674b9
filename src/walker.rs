//! File Walker (§4.A): enumerates indexable source files under a project root.

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::error::{RagError, RagResult};

/// Extensions recognized as indexable source code (§4.A).
const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "java", "c", "cc", "cpp", "cxx", "h", "hpp", "go", "rb",
    "php", "cs", "scala", "swift", "rs", "kt", "kts", "sh", "bash", "sql",
];

/// Directory names excluded by default, unioned with any caller-supplied list.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    ".env",
    "build",
    "dist",
    "out",
    "target",
    ".next",
    ".nuxt",
    ".svelte-kit",
    "coverage",
    ".nyc_output",
    ".pytest_cache",
    ".tox",
    ".eggs",
    "egg-info",
    ".cache",
    "tmp",
    "temp",
    ".vscode",
    ".idea",
    ".Trash",
    ".npm",
];

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub bytes: u64,
}

fn has_indexable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a deny-list of excluded directories as `ignore::Override` globs.
///
/// `.terminal_helper` itself is never excluded by the hidden-directory rule,
/// even though it starts with `.` — callers that walk a project root that
/// already has an index present must still be able to see regular source
/// files alongside it (the index directory is never itself a `.rs`/`.py`/…
/// file so it is never yielded, but it must not short-circuit the walk).
fn build_overrides(project_root: &Path, extra_excludes: &[String]) -> RagResult<Override> {
    let mut ob = OverrideBuilder::new(project_root);
    for name in DEFAULT_EXCLUDED_DIRS {
        add_dir_exclude(&mut ob, name)?;
    }
    for name in extra_excludes {
        let name = name.trim().trim_matches('/');
        if !name.is_empty() {
            add_dir_exclude(&mut ob, name)?;
        }
    }
    ob.build()
        .map_err(|e| RagError::Config(format!("invalid exclude pattern: {e}")))
}

fn add_dir_exclude(ob: &mut OverrideBuilder, name: &str) -> RagResult<()> {
    ob.add(&format!("!**/{name}"))
        .and_then(|b| b.add(&format!("!**/{name}/**")))
        .map(|_| ())
        .map_err(|e| RagError::Config(format!("invalid exclude pattern {name}: {e}")))
}

/// True for a hidden (dot-prefixed) directory other than the engine's own
/// index directory, which must stay visible to the walker so the rest of
/// the project tree remains reachable underneath it.
fn is_excluded_hidden_dir(name: &str) -> bool {
    name.starts_with('.') && name != ".terminal_helper"
}

/// Traverse `project_root`, yielding regular files with an indexable extension.
///
/// `standard_filters`'s own `hidden` option would also skip hidden *files*,
/// but §4.A excludes hidden *directories* only; a dotfile with a recognized
/// extension must still be indexed. So `hidden` is disabled and dot-directory
/// exclusion (except the engine's own `.terminal_helper/`) is done explicitly
/// via `filter_entry`, which also stops the walker descending into such a
/// directory at all. Symlinks are not followed, so the walk cannot escape
/// `project_root`. Per-directory permission errors are swallowed.
pub fn walk_project(project_root: &Path, extra_excludes: &[String]) -> RagResult<Vec<FileEntry>> {
    let overrides = build_overrides(project_root, extra_excludes)?;

    let mut entries = Vec::new();
    let walker = WalkBuilder::new(project_root)
        .standard_filters(true)
        .hidden(false)
        .follow_links(false)
        .overrides(overrides)
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if !is_dir {
                return true;
            }
            match entry.file_name().to_str() {
                Some(name) => !is_excluded_hidden_dir(name),
                None => true,
            }
        })
        .build();

    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = dent.into_path();
        if !has_indexable_extension(&abs_path) {
            continue;
        }

        let bytes = match std::fs::metadata(&abs_path) {
            Ok(m) => m.len(),
            Err(_) => continue,
        };

        let rel_path = match abs_path.strip_prefix(project_root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        entries.push(FileEntry { abs_path, rel_path, bytes });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}
