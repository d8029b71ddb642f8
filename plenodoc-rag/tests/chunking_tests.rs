//! Property tests for the recursive chunker.

use plenodoc_rag::chunking::{Chunker, RecursiveChunker};
use plenodoc_rag::document::Document;
use proptest::prelude::*;

/// Text with paragraph, sentence and word boundaries plus multi-byte chars.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé .!?\n]{0,400}"
}

/// A valid (chunk_size, chunk_overlap) pair.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

fn reconstruct(chunks: &[plenodoc_rag::Chunk]) -> String {
    let mut text = String::new();
    let mut covered = 0;
    for chunk in chunks {
        let skip = covered - chunk.start_offset;
        text.extend(chunk.text.chars().skip(skip));
        covered = chunk.end_offset;
    }
    text
}

/// *For any* document and valid sizes, every chunk is at most `chunk_size`
/// characters, is the exact character range it claims to cover, and shares
/// at least `chunk_overlap` characters with its predecessor.
mod prop_chunk_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_exact_and_overlapping(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let document = Document::new("doc.txt", text.clone());
            let chunks = chunker.chunk(&document);
            let chars: Vec<char> = text.chars().collect();

            for chunk in &chunks {
                prop_assert!(chunk.text.chars().count() <= size);
                prop_assert!(chunk.start_offset < chunk.end_offset);
                let expected: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
                prop_assert_eq!(&chunk.text, &expected);
                prop_assert_eq!(&chunk.source, "doc.txt");
            }

            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start_offset > pair[0].start_offset);
                prop_assert!(pair[1].end_offset > pair[0].end_offset);
                prop_assert!(pair[0].end_offset - pair[1].start_offset >= overlap);
            }
        }
    }
}

/// *For any* non-blank document, dropping each chunk's overlap with its
/// predecessor and concatenating rebuilds the text with no gaps.
mod prop_chunk_reconstruction {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn non_overlapping_portions_rebuild_the_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            prop_assume!(!text.trim().is_empty());
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc.txt", text.clone()));

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start_offset, 0);
            prop_assert_eq!(chunks.last().map(|c| c.end_offset), Some(text.chars().count()));
            prop_assert_eq!(reconstruct(&chunks), text);
        }

        #[test]
        fn chunking_is_deterministic(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let document = Document::new("doc.txt", text);
            prop_assert_eq!(chunker.chunk(&document), chunker.chunk(&document));
        }
    }
}

#[test]
fn chunk_ids_are_unique_across_documents() {
    let documents = vec![
        Document::new("a.txt", "one two three four five six seven eight nine ten"),
        Document::new("b.txt", "one two three four five six seven eight nine ten"),
    ];
    let chunks = plenodoc_rag::split(&documents, 12, 3).unwrap();
    let mut ids: Vec<_> = chunks.iter().map(|c| c.id.clone()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert!(chunks.iter().any(|c| c.source == "b.txt"));
}
