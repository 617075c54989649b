//! Word-count chunking of source text blocks.
//!
//! A chunk is the unit of retrieval: immutable, tagged with its source, and
//! bounded in word count. Table-structured rows are handed in as one block
//! each so a record's fields never split across chunk boundaries.

/// One retrievable unit of text. Created at index-build time, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Source document identifier (usually a file name).
    pub source: String,
    /// The chunk text, at most `chunk_size` whitespace-separated words.
    pub text: String,
}

impl DocumentChunk {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Split one text block into sequential, non-overlapping chunks of at most
/// `chunk_size` words. Blocks shorter than the limit become a single chunk;
/// whitespace-only blocks produce nothing.
pub fn chunk_block(source: &str, text: &str, chunk_size: usize) -> Vec<DocumentChunk> {
    let chunk_size = chunk_size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(chunk_size)
        .map(|w| DocumentChunk::new(source, w.join(" ")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_block_is_one_chunk() {
        let chunks = chunk_block("a.md", "one two three", 250);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one two three");
        assert_eq!(chunks[0].source, "a.md");
    }

    #[test]
    fn long_block_splits_sequentially_without_overlap() {
        let text = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_block("b.md", &text, 4);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["1 2 3 4", "5 6 7 8", "9 10"]);
    }

    #[test]
    fn whitespace_block_yields_nothing() {
        assert!(chunk_block("c.md", "   \n\t  ", 250).is_empty());
    }

    #[test]
    fn chunking_normalizes_internal_whitespace() {
        let chunks = chunk_block("d.md", "alpha\n\n   beta\tgamma", 250);
        assert_eq!(chunks[0].text, "alpha beta gamma");
    }
}
