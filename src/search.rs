//! Chunk ranking and per-document reduction.
//!
//! # Ranking Algorithm
//!
//! 1. Score every chunk against the query ([`LexicalIndex::similarities`]).
//! 2. Discard chunks scoring at or below `min_similarity`.
//! 3. Sort by score, descending. The sort is stable, so equal scores keep
//!    chunk order and the earlier chunk wins.
//! 4. Walk the sorted list keeping the first chunk seen for each document
//!    (its best chunk) until `max_results` documents are collected.

use std::collections::HashSet;

use crate::lexical::LexicalIndex;

/// Position of a chunk within the flattened chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef {
    /// Index into the document list.
    pub document: usize,
    /// Index into that document's chunks.
    pub chunk: usize,
}

/// A document's best-matching chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedChunk {
    pub at: ChunkRef,
    pub score: f64,
}

/// Rank chunks for `query`, at most one per document.
///
/// `chunk_refs[i]` locates row `i` of `index`. Returns an empty list for an
/// empty index, a blank query, or `max_results == 0`.
pub fn rank(
    index: &LexicalIndex,
    chunk_refs: &[ChunkRef],
    query: &str,
    max_results: usize,
    min_similarity: f64,
) -> Vec<RankedChunk> {
    if index.is_empty() || query.trim().is_empty() || max_results == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f64)> = index
        .similarities(query)
        .into_iter()
        .enumerate()
        .filter(|(_, s)| *s > min_similarity)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<usize> = HashSet::new();
    let mut ranked = Vec::with_capacity(max_results);
    for (row, score) in scored {
        let Some(&at) = chunk_refs.get(row) else {
            continue;
        };
        if !seen.insert(at.document) {
            continue;
        }
        ranked.push(RankedChunk { at, score });
        if ranked.len() >= max_results {
            break;
        }
    }
    ranked
}
