//! Document chunking strategies.

/// Strategy for splitting extracted text into chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Fixed character count with overlap.
    FixedSize {
        /// Chunk size in characters.
        size: usize,
        /// Overlap between consecutive chunks.
        overlap: usize,
    },
    /// Sentence-based chunking.
    Sentence {
        /// Minimum chunk size.
        min_size: usize,
        /// Maximum chunk size.
        max_size: usize,
    },
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::FixedSize {
            size: 1000,
            overlap: 200,
        }
    }
}

/// Document chunker.
///
/// Output depends only on the input text and the strategy.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    strategy: ChunkingStrategy,
}

impl Chunker {
    /// Creates a new chunker with the given strategy.
    #[must_use]
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self { strategy }
    }

    /// Splits `text` into trimmed pieces, skipping whitespace-only ones.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces = match &self.strategy {
            ChunkingStrategy::FixedSize { size, overlap } => chunk_fixed(text, *size, *overlap),
            ChunkingStrategy::Sentence { min_size, max_size } => {
                chunk_sentence(text, *min_size, *max_size)
            }
        };

        pieces
            .iter()
            .map(|piece| piece.trim())
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn chunk_fixed(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    // An overlap as large as the window would never advance.
    let overlap = overlap.min(size - 1);
    let mut spans = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        spans.push(chars[start..end].iter().collect());

        if end >= chars.len() {
            break;
        }

        start = end - overlap;
    }

    spans
}

fn chunk_sentence(text: &str, min_size: usize, max_size: usize) -> Vec<String> {
    let sentences: Vec<&str> = text
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let len = current.chars().count();
        if len + sentence.chars().count() > max_size && len >= min_size {
            pieces.push(current.trim_end().to_string());
            current.clear();
        }

        current.push_str(sentence);
        current.push(' ');
    }

    if !current.is_empty() {
        pieces.push(current.trim_end().to_string());
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::default();
        let spans = chunker.split("hello world");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0], "hello world");
    }

    #[test]
    fn test_fixed_overlap() {
        let chunker = Chunker::new(ChunkingStrategy::FixedSize {
            size: 4,
            overlap: 2,
        });
        let spans = chunker.split("abcdefgh");
        assert_eq!(spans, vec!["abcd", "cdef", "efgh"]);
    }

    #[test]
    fn test_fixed_overlap_clamped() {
        let chunker = Chunker::new(ChunkingStrategy::FixedSize {
            size: 3,
            overlap: 10,
        });
        let spans = chunker.split("abcdef");
        assert_eq!(spans.len(), 4);
        assert_eq!(spans.last().unwrap(), "def");
    }

    #[test]
    fn test_whitespace_only_is_dropped() {
        let chunker = Chunker::default();
        assert!(chunker.split("   \n\t  ").is_empty());
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_sentence_grouping() {
        let chunker = Chunker::new(ChunkingStrategy::Sentence {
            min_size: 10,
            max_size: 40,
        });
        let spans = chunker.split("The cat sat. The dog ran far away. Birds sing!");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], "The cat sat. The dog ran far away.");
        assert_eq!(spans[1], "Birds sing!");
    }

    #[test]
    fn test_pieces_are_trimmed() {
        let chunker = Chunker::default();
        assert_eq!(chunker.split("\n\n  hello world \n"), vec!["hello world"]);
    }

    #[test]
    fn test_deterministic() {
        let chunker = Chunker::new(ChunkingStrategy::FixedSize {
            size: 7,
            overlap: 3,
        });
        let text = "Determinism matters for reproducible ingestion.";
        assert_eq!(chunker.split(text), chunker.split(text));
    }
}
