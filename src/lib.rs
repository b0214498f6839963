//! # Minutes QA
//!
//! Question answering over a folder of meeting minutes.
//!
//! Documents (PDF, DOCX, plain text) are split into overlapping chunks and
//! indexed with TF-IDF. A query retrieves the best chunk of each matching
//! document, and an answer is produced from that chunk by the first
//! strategy that succeeds: a local Ollama model, an optional
//! OpenAI-compatible chat backend, or a deterministic rule-based extractor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌────────────┐
//! │ Scan +   │──▶│ Chunker │──▶│ TF-IDF      │
//! │ Extract  │   │         │   │ index       │
//! └──────────┘   └─────────┘   └─────┬──────┘
//!                                    │ rank + dedup
//!                                    ▼
//!        ┌────────┐   ┌──────────┐   ┌───────┐
//!        │ Ollama │──▶│ Chat API │──▶│ Rules │   answer cascade
//!        └────────┘   └──────────┘   └───────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mqa index ./atas
//! mqa search "Quando foi a reunião do conselho?"
//! mqa stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |
//! | [`scan`] | Directory listing and include filtering |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`chunk`] | Overlapping text windows |
//! | [`lexical`] | TF-IDF vector space |
//! | [`search`] | Ranking and per-document dedup |
//! | [`generation`] | Ollama and chat-completions clients |
//! | [`rules`] | Rule-based answer extraction |
//! | [`cascade`] | Ordered answer strategies |
//! | [`snapshot`] | JSON persistence of the document store |
//! | [`service`] | Index/search/stats entry points |

pub mod cascade;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod generation;
pub mod lexical;
pub mod models;
pub mod rules;
pub mod scan;
pub mod search;
pub mod service;
pub mod snapshot;

pub use error::{Error, Result};
pub use service::MinutesService;
