use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub documents: DocumentsConfig,
    pub snapshot: SnapshotConfig,
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub secondary: Option<SecondaryConfig>,
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            recursive: false,
            follow_symlinks: false,
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("documents")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "*.pdf".to_string(),
        "*.docx".to_string(),
        "*.txt".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("minutes_index.json")
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_max_ngram")]
    pub max_ngram: usize,
    /// Terms present in more than this fraction of chunks are dropped.
    #[serde(default = "default_max_df")]
    pub max_df: f64,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            max_ngram: default_max_ngram(),
            max_df: default_max_df(),
            min_similarity: default_min_similarity(),
            stopwords: default_stopwords(),
        }
    }
}

fn default_max_features() -> usize {
    5000
}
fn default_max_ngram() -> usize {
    3
}
fn default_max_df() -> f64 {
    1.0
}
fn default_min_similarity() -> f64 {
    0.01
}

/// Portuguese function words removed before n-gram construction.
pub fn default_stopwords() -> Vec<String> {
    [
        "a", "o", "as", "os", "de", "da", "do", "das", "dos", "em", "no", "na", "nos", "nas",
        "com", "por", "para", "e", "ou", "mas", "se", "que", "qual", "quando", "como", "onde",
        "quem", "um", "uma", "uns", "umas",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_preferred_model")]
    pub preferred_model: String,
    #[serde(default)]
    pub auto_pull: bool,
    #[serde(default = "default_detect_timeout_secs")]
    pub detect_timeout_secs: u64,
    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_generation_url(),
            preferred_model: default_preferred_model(),
            auto_pull: false,
            detect_timeout_secs: default_detect_timeout_secs(),
            generate_timeout_secs: default_generate_timeout_secs(),
            pull_timeout_secs: default_pull_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_generation_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_preferred_model() -> String {
    "mistral".to_string()
}
fn default_detect_timeout_secs() -> u64 {
    2
}
fn default_generate_timeout_secs() -> u64 {
    30
}
fn default_pull_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_temperature() -> f32 {
    0.2
}
fn default_num_predict() -> u32 {
    100
}

/// OpenAI-compatible chat backend used when the local service is absent.
#[derive(Debug, Deserialize, Clone)]
pub struct SecondaryConfig {
    #[serde(default = "default_secondary_url")]
    pub url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generate_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_num_predict")]
    pub max_tokens: u32,
}

fn default_secondary_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AnswerConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            context_chars: default_context_chars(),
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    600
}
fn default_context_chars() -> usize {
    2000
}
fn default_min_answer_chars() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if chunking.overlap == 0 || chunking.overlap >= chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap must satisfy 0 < overlap < chunk_size (got overlap={}, chunk_size={})",
            chunking.overlap,
            chunking.chunk_size
        );
    }

    if config.index.max_features == 0 {
        anyhow::bail!("index.max_features must be > 0");
    }
    if config.index.max_ngram == 0 {
        anyhow::bail!("index.max_ngram must be >= 1");
    }
    if !(config.index.max_df > 0.0 && config.index.max_df <= 1.0) {
        anyhow::bail!("index.max_df must be in (0.0, 1.0]");
    }
    if !(0.0..1.0).contains(&config.index.min_similarity) {
        anyhow::bail!("index.min_similarity must be in [0.0, 1.0)");
    }

    if config.retrieval.max_results == 0 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }

    if config.generation.max_attempts == 0 {
        anyhow::bail!("generation.max_attempts must be >= 1");
    }

    if config.answer.max_chars < 4 {
        anyhow::bail!("answer.max_chars must be >= 4");
    }

    if let Some(secondary) = &config.secondary {
        if secondary.model.trim().is_empty() {
            anyhow::bail!("secondary.model must not be empty");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.generation.max_attempts, 3);
        assert!(config.secondary.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[chunking]
chunk_size = 400
overlap = 50

[generation]
enabled = false
"#,
        )
        .unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert!(!config.generation.enabled);
        assert_eq!(config.generation.url, "http://localhost:11434");
        assert_eq!(config.index.max_features, 5000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(validate(&config).is_err());
        config.chunking.overlap = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_max_df_range() {
        let mut config = Config::default();
        config.index.max_df = 0.0;
        assert!(validate(&config).is_err());
        config.index.max_df = 0.8;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_secondary_section() {
        let config: Config = toml::from_str(
            r#"
[secondary]
model = "gpt-4o-mini"
"#,
        )
        .unwrap();
        let secondary = config.secondary.unwrap();
        assert_eq!(secondary.api_key_env, "OPENAI_API_KEY");
        assert_eq!(secondary.url, "https://api.openai.com/v1");
    }
}
