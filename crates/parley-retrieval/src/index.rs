//! BM25 inverted index over document chunks.
//!
//! Built once, read-only afterwards. Tokenization is case-insensitive
//! whitespace splitting with no stemming or stop words, so queries rank by
//! literal term overlap. Chunks that share no terms with the query score
//! zero and are never returned: retrieval prefers "no context" over filler.

use crate::chunk::DocumentChunk;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Okapi BM25 parameters. k1 controls term-frequency saturation, b controls
/// document-length normalization.
const K1: f64 = 1.5;
const B: f64 = 0.75;

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The corpus produced no indexable content. Fatal at startup: an agent
    /// with no knowledge base cannot satisfy its retrieval contract.
    #[error("retrieval corpus is empty: no chunks or no tokens to index")]
    EmptyCorpus,

    #[error("corpus io error: {0}")]
    Io(#[from] std::io::Error),
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Immutable lexical index: per-chunk term frequencies plus corpus-wide
/// document frequencies, in chunk insertion order.
pub struct RetrievalIndex {
    chunks: Vec<DocumentChunk>,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl RetrievalIndex {
    /// Build the index from prepared chunks. Fails with `EmptyCorpus` when
    /// there are no chunks or every chunk tokenizes to nothing.
    pub fn build(chunks: Vec<DocumentChunk>) -> Result<Self, RetrievalError> {
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lens = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for chunk in &chunks {
            let tokens = tokenize(&chunk.text);
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len());
            term_freqs.push(tf);
        }

        let total_tokens: usize = doc_lens.iter().sum();
        if total_tokens == 0 {
            return Err(RetrievalError::EmptyCorpus);
        }
        let avg_doc_len = total_tokens as f64 / chunks.len() as f64;

        debug!(
            chunks = chunks.len(),
            terms = doc_freqs.len(),
            "retrieval index built"
        );

        Ok(Self {
            chunks,
            term_freqs,
            doc_lens,
            doc_freqs,
            avg_doc_len,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // Lucene-style IDF: ln(1 + (N - df + 0.5) / (df + 0.5)). Always positive,
    // so any chunk containing a query term scores above zero.
    fn idf(&self, term: &str) -> f64 {
        let n = self.chunks.len() as f64;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn score(&self, doc: usize, query_tokens: &[String]) -> f64 {
        let dl = self.doc_lens[doc] as f64;
        let norm = K1 * (1.0 - B + B * dl / self.avg_doc_len);
        let tf = &self.term_freqs[doc];
        query_tokens
            .iter()
            .map(|term| {
                let f = tf.get(term).copied().unwrap_or(0) as f64;
                if f == 0.0 {
                    0.0
                } else {
                    self.idf(term) * f * (K1 + 1.0) / (f + norm)
                }
            })
            .sum()
    }

    /// Rank chunks for the query. Returns at most `top_k` chunk texts, most
    /// relevant first; non-positive scores are excluded and ties keep the
    /// original insertion order. Empty or whitespace-only queries return
    /// nothing without scoring.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<&str> {
        let query_tokens = tokenize(text);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = (0..self.chunks.len())
            .map(|i| (i, self.score(i, &query_tokens)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .iter()
            .map(|(i, _)| self.chunks[*i].text.as_str())
            .collect()
    }

    /// Format the top-k results for prompt injection: each snippet gets a
    /// 1-based position label, snippets separated by blank lines. Empty
    /// result set formats as an empty string ("no context" signal).
    pub fn context(&self, text: &str, top_k: usize) -> String {
        self.query(text, top_k)
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[Snippet {}]\n{}", i + 1, chunk))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
