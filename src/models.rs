//! Core data models used throughout the pipeline.
//!
//! [`Document`] is the only persisted type; everything else is produced
//! per query and discarded.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An indexed file. Ids are reassigned from 1 on every index pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub filename: String,
    pub content: String,
    pub chunks: Vec<String>,
    #[serde(rename = "file_path")]
    pub source_path: String,
    pub indexed_at: NaiveDateTime,
}

/// Which strategy produced an [`Answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Primary,
    Secondary,
    RuleBased,
}

impl StrategyKind {
    pub fn is_generative(self) -> bool {
        !matches!(self, StrategyKind::RuleBased)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Primary => write!(f, "primary"),
            StrategyKind::Secondary => write!(f, "secondary"),
            StrategyKind::RuleBased => write!(f, "rule-based"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Heuristic provenance score in `[0, 1]`, not a probability.
    pub confidence: f64,
    pub source_strategy: StrategyKind,
}

/// One entry of a search response: a document, its best chunk, and the
/// generated answer for that chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: u64,
    pub filename: String,
    pub full_content: String,
    pub best_chunk: String,
    pub similarity_score: f64,
    pub ai_answer: String,
    pub confidence: f64,
    pub source_strategy: StrategyKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub last_update: Option<NaiveDateTime>,
    pub active_strategy_name: String,
}

/// Summary of a completed index pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<String>,
}
