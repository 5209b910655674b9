//! Embedding Client (§4.E): calls an out-of-process embedder over HTTP.
//!
//! Wire protocol: `GET /health` → 200 when ready; `POST /embed {"text":s}`
//! → `{"embedding":[f32; D]}`. Implemented with `ureq`, a synchronous client —
//! safe to call from a worker thread without pulling the tokio runtime into
//! the hot path.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RagError, RagResult};

const TIMEOUT: Duration = Duration::from_secs(30);
const PAD_VALUE: f32 = 0.1;

/// A pure function `embed(text) -> [f32; D]`. The HTTP client is the default
/// production implementation; tests substitute a fake for determinism.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> RagResult<Vec<f32>>;
    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    base_url: String,
    dimension: usize,
    agent: ureq::Agent,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, dimension: usize) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self { base_url: base_url.into(), dimension, agent }
    }

    pub fn health(&self) -> bool {
        self.agent
            .get(&format!("{}/health", self.base_url))
            .call()
            .map(|r| r.status() == 200)
            .unwrap_or(false)
    }

    fn call_once(&self, text: &str) -> RagResult<Vec<f32>> {
        let resp = self
            .agent
            .post(&format!("{}/embed", self.base_url))
            .send_json(EmbedRequest { text })
            .map_err(|e| RagError::Embedder(format!("request failed: {e}")))?;

        if resp.status() != 200 {
            return Err(RagError::Embedder(format!("embedder returned status {}", resp.status())));
        }

        let body: EmbedResponse = resp
            .into_json()
            .map_err(|e| RagError::Embedder(format!("invalid embedder response: {e}")))?;
        Ok(body.embedding)
    }
}

impl Embedder for HttpEmbedder {
    /// §4.E post-processing: pad/truncate to `D`, then replace non-finite
    /// values with `0.1`. One retry after the first failure before the
    /// error propagates.
    fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let raw = match self.call_once(text) {
            Ok(v) => v,
            Err(_first_err) => self.call_once(text)?,
        };
        Ok(normalize(raw, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Pad/truncate to `dim`, then replace any non-finite value with `0.1`.
pub fn normalize(mut v: Vec<f32>, dim: usize) -> Vec<f32> {
    if v.len() < dim {
        v.resize(dim, PAD_VALUE);
    } else if v.len() > dim {
        v.truncate(dim);
    }
    for x in v.iter_mut() {
        if !x.is_finite() {
            *x = PAD_VALUE;
        }
    }
    v
}
