//! Error types for the indexing and query entry points.
//!
//! Failures inside the answer cascade never surface here: they are
//! absorbed as fallthrough signals (see [`crate::generation::GenerationError`]).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query was empty or whitespace only; the ranker was not consulted.
    #[error("empty query")]
    EmptyQuery,

    #[error("documents directory does not exist: {0}")]
    DirectoryMissing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid include glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
