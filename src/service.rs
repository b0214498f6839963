//! The service object owning the document store, the lexical index and the
//! answer cascade.
//!
//! # Concurrency
//!
//! The store and index live together in an immutable [`IndexState`] behind
//! `RwLock<Arc<_>>`. Queries clone the `Arc` and work on that snapshot
//! without holding the lock; a reindex builds a complete new state and
//! swaps the pointer, so a query sees either the old or the new state and
//! never a partial one.
//!
//! Index passes are serialized by a separate mutex held for the whole
//! scan, chunk, rebuild and persist sequence.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::cascade::AnswerCascade;
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{DocumentReader, FileReader};
use crate::lexical::{IndexParams, LexicalIndex};
use crate::models::{Document, IndexReport, SearchResult, Stats};
use crate::scan::scan_directory;
use crate::search::{rank, ChunkRef};
use crate::snapshot;

/// Documents plus the index fitted over their chunks.
#[derive(Debug, Default)]
pub struct IndexState {
    documents: Vec<Document>,
    lexical: LexicalIndex,
    chunk_refs: Vec<ChunkRef>,
    last_update: Option<NaiveDateTime>,
}

impl IndexState {
    fn build(documents: Vec<Document>, params: IndexParams, last_update: Option<NaiveDateTime>) -> Self {
        let mut chunk_refs = Vec::new();
        let lexical = {
            let mut chunks: Vec<&str> = Vec::new();
            for (d, doc) in documents.iter().enumerate() {
                for (c, chunk) in doc.chunks.iter().enumerate() {
                    chunks.push(chunk);
                    chunk_refs.push(ChunkRef { document: d, chunk: c });
                }
            }
            LexicalIndex::build(&chunks, params)
        };
        Self {
            documents,
            lexical,
            chunk_refs,
            last_update,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_refs.len()
    }
}

pub struct MinutesService {
    config: Config,
    params: IndexParams,
    reader: Box<dyn DocumentReader>,
    cascade: AnswerCascade,
    state: RwLock<Arc<IndexState>>,
    reindex_lock: Mutex<()>,
}

impl MinutesService {
    /// Load the snapshot, rebuild the index from it and detect generation
    /// backends.
    pub fn open(config: Config) -> Self {
        let cascade = AnswerCascade::from_config(&config);
        Self::with_parts(config, Box::new(FileReader), cascade)
    }

    pub fn with_parts(config: Config, reader: Box<dyn DocumentReader>, cascade: AnswerCascade) -> Self {
        let params = IndexParams::from(&config.index);
        let documents = snapshot::load(&config.snapshot.path);
        let last_update = documents.iter().map(|d| d.indexed_at).max();
        if !documents.is_empty() {
            info!(
                documents = documents.len(),
                path = %config.snapshot.path.display(),
                "loaded snapshot"
            );
        }
        let state = IndexState::build(documents, params.clone(), last_update);
        Self {
            config,
            params,
            reader,
            cascade,
            state: RwLock::new(Arc::new(state)),
            reindex_lock: Mutex::new(()),
        }
    }

    /// The state queries currently see.
    pub fn current(&self) -> Arc<IndexState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the store with the documents found in `dir`.
    ///
    /// Ids are assigned from 1 in listing order. Files yielding no text are
    /// reported in [`IndexReport::skipped`]. A missing directory fails the
    /// pass and leaves the current state untouched.
    pub fn index(&self, dir: &Path) -> Result<IndexReport> {
        let _guard = self
            .reindex_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        info!(dir = %dir.display(), "index pass started");
        let files = scan_directory(dir, &self.config.documents)?;
        let chunking = self.config.chunking;
        let indexed_at = Local::now().naive_local();

        let mut report = IndexReport::default();
        let mut documents: Vec<Document> = Vec::with_capacity(files.len());
        for file in files {
            let content = self.reader.read(&file.path, file.kind);
            if content.trim().is_empty() {
                warn!(file = %file.filename, "no text extracted, skipping");
                report.skipped.push(file.filename);
                continue;
            }
            let chunks = chunk_text(&content, chunking.chunk_size, chunking.overlap);
            report.chunks += chunks.len();
            documents.push(Document {
                id: documents.len() as u64 + 1,
                filename: file.filename,
                content,
                chunks,
                source_path: file.path.display().to_string(),
                indexed_at,
            });
        }
        report.documents = documents.len();

        let state = Arc::new(IndexState::build(documents, self.params.clone(), Some(indexed_at)));
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&state);

        if let Err(e) = snapshot::save(&self.config.snapshot.path, &state.documents) {
            warn!(
                path = %self.config.snapshot.path.display(),
                error = %e,
                "failed to write snapshot"
            );
        }

        info!(
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            "index pass finished"
        );
        Ok(report)
    }

    /// Rank documents for `query` and answer from each one's best chunk.
    ///
    /// Fails only on an empty query. An empty or unmatched index yields an
    /// empty list.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let state = self.current();
        let ranked = rank(
            &state.lexical,
            &state.chunk_refs,
            query,
            max_results,
            self.config.index.min_similarity,
        );

        let results = ranked
            .into_iter()
            .filter_map(|r| {
                let doc = state.documents.get(r.at.document)?;
                let chunk = doc.chunks.get(r.at.chunk)?;
                let answer = self.cascade.answer(query, chunk);
                Some(SearchResult {
                    document_id: doc.id,
                    filename: doc.filename.clone(),
                    full_content: doc.content.clone(),
                    best_chunk: chunk.clone(),
                    similarity_score: r.score,
                    ai_answer: answer.text,
                    confidence: answer.confidence,
                    source_strategy: answer.source_strategy,
                })
            })
            .collect();
        Ok(results)
    }

    pub fn stats(&self) -> Stats {
        let state = self.current();
        Stats {
            document_count: state.documents.len(),
            chunk_count: state.chunk_count(),
            last_update: state.last_update,
            active_strategy_name: self.cascade.active_strategy_name(),
        }
    }

    pub fn documents(&self) -> Vec<Document> {
        self.current().documents.clone()
    }
}
