//! **Parley Retrieval** — keyword-ranked context for the conversation engine.
//!
//! Turns a directory of mixed text sources into word-bounded chunks and ranks
//! them with BM25 at query time. Ranking is purely lexical: term frequency and
//! inverse document frequency over whitespace tokens, no embeddings. The index
//! is built once at startup and read-only afterwards.
//!
//! ```text
//! data/ ──▶ ingest (table rows + stripped text) ──▶ chunk ──▶ RetrievalIndex
//!                                                                  │
//!                                              query ──▶ ranked snippets
//! ```

pub mod chunk;
pub mod convert;
pub mod index;
pub mod ingest;

pub use chunk::{chunk_block, DocumentChunk};
pub use index::{RetrievalIndex, RetrievalError};
pub use ingest::{extract_table_rows, load_corpus, strip_markup};
