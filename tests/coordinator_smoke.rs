//! Black-box smoke test for the public index/retrieve surface.

use rootcause::coordinator::{CancellationToken, Coordinator, IndexOptions, RetrieveOptions};
use rootcause::embedder::Embedder;
use rootcause::error::RagResult;

/// Deterministic test embedder, independent of the library's own `FakeEmbedder`
/// (which lives behind `#[cfg(test)]` in the crate and isn't part of its
/// public surface) — exercises the coordinator purely through `Embedder`.
struct HashEmbedder {
    dim: usize,
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dim] += b as f32 / 255.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

fn write_sample_project(dir: &std::path::Path) {
    std::fs::write(
        dir.join("payment_service.py"),
        "import stripe\n\ndef charge(customer_id, amount):\n    if amount <= 0:\n        raise ValueError('invalid amount')\n    return stripe.Charge.create(customer=customer_id, amount=amount)\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("util.py"),
        "def clamp(x, lo, hi):\n    return max(lo, min(hi, x))\n",
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("node_modules")).unwrap();
    std::fs::write(dir.join("node_modules/noise.js"), "console.log('should never be indexed')").unwrap();
}

#[test]
fn index_then_retrieve_surfaces_the_matching_file() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_project(dir.path());
    let embedder = HashEmbedder { dim: 32 };

    let mut coordinator = Coordinator::init_rag(dir.path()).unwrap();
    let indexed = coordinator
        .index_codebase(&embedder, IndexOptions::default(), &CancellationToken::new(), |_, _| {})
        .unwrap();
    assert_eq!(indexed.file_count, 2, "node_modules must not be walked");

    let result = coordinator.retrieve_relevant_files(
        "ValueError: invalid amount raised in payment_service.py charge()",
        &embedder,
        RetrieveOptions::default(),
    );

    assert!(!result.results.is_empty());
    let root_cause = result.root_cause_file.expect("a root cause should be identified");
    assert_eq!(root_cause.metadata.file_name, "payment_service.py");
}

#[test]
fn retrieval_on_a_project_with_no_indexable_files_returns_empty_without_erroring() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "# nothing indexable here").unwrap();
    let embedder = HashEmbedder { dim: 16 };

    let mut coordinator = Coordinator::init_rag(dir.path()).unwrap();
    let result = coordinator.retrieve_relevant_files("anything at all", &embedder, RetrieveOptions::default());

    assert!(result.results.is_empty());
    assert!(result.root_cause_file.is_none());
}

#[test]
fn indices_persist_across_coordinator_instances() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_project(dir.path());
    let embedder = HashEmbedder { dim: 32 };

    {
        let mut coordinator = Coordinator::init_rag(dir.path()).unwrap();
        coordinator
            .index_codebase(&embedder, IndexOptions::default(), &CancellationToken::new(), |_, _| {})
            .unwrap();
    }

    let reopened = Coordinator::init_rag(dir.path()).unwrap();
    let stats = reopened.rag_stats();
    assert!(stats.bm25_doc_count > 0);
    assert!(stats.vector_stats.vector_count > 0);
}
