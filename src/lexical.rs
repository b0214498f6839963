//! TF-IDF vector space over chunk text.
//!
//! # Weighting
//!
//! 1. Tokenize: lowercase, keep runs of two or more word characters.
//! 2. Drop stopwords, then emit every 1..=`max_ngram` word sequence.
//! 3. Drop terms whose document frequency exceeds `max_df × n_chunks`.
//! 4. Keep the `max_features` terms with the highest corpus frequency
//!    (ties broken alphabetically).
//! 5. `idf(t) = ln((1 + n) / (1 + df(t))) + 1`; row weight = `tf × idf`,
//!    L2-normalized.
//!
//! Query vectors use the fitted vocabulary and idf; unknown terms are
//! ignored. Similarity is the dot product of two normalized vectors,
//! i.e. cosine similarity, and lies in `[0, 1]`.
//!
//! The index is immutable once built. A reindex builds a new one.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::IndexConfig;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Sparse, L2-normalized vector: `(term index, weight)` sorted by index.
type SparseVec = Vec<(usize, f64)>;

/// Fitting parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct IndexParams {
    pub max_features: usize,
    pub max_ngram: usize,
    pub max_df: f64,
    pub stopwords: HashSet<String>,
}

impl From<&IndexConfig> for IndexParams {
    fn from(config: &IndexConfig) -> Self {
        Self {
            max_features: config.max_features,
            max_ngram: config.max_ngram,
            max_df: config.max_df,
            stopwords: config.stopwords.iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

impl Default for IndexParams {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    params: IndexParams,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<SparseVec>,
}

impl LexicalIndex {
    /// An index over nothing; every query scores empty.
    pub fn empty(params: IndexParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Fit the vocabulary and weights over `chunks`, one row per chunk in order.
    pub fn build<S: AsRef<str>>(chunks: &[S], params: IndexParams) -> Self {
        let n = chunks.len();
        if n == 0 {
            return Self::empty(params);
        }

        let counts: Vec<HashMap<String, u32>> = chunks
            .iter()
            .map(|c| term_counts(c.as_ref(), &params))
            .collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut corpus_tf: HashMap<&str, u64> = HashMap::new();
        for row in &counts {
            for (term, &tf) in row {
                *df.entry(term.as_str()).or_default() += 1;
                *corpus_tf.entry(term.as_str()).or_default() += u64::from(tf);
            }
        }

        let max_doc_count = params.max_df * n as f64;
        let mut kept: Vec<(&str, u64)> = corpus_tf
            .iter()
            .filter(|(term, _)| df[*term] as f64 <= max_doc_count)
            .map(|(term, tf)| (*term, *tf))
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        kept.truncate(params.max_features);

        let mut terms: Vec<&str> = kept.into_iter().map(|(t, _)| t).collect();
        terms.sort_unstable();

        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();
        let idf: Vec<f64> = terms
            .iter()
            .map(|t| ((1.0 + n as f64) / (1.0 + df[t] as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .iter()
            .map(|row| weigh(row, &vocabulary, &idf))
            .collect();

        Self {
            params,
            vocabulary,
            idf,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn similarities(&self, query: &str) -> Vec<f64> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let q = weigh(&term_counts(query, &self.params), &self.vocabulary, &self.idf);
        if q.is_empty() {
            return vec![0.0; self.rows.len()];
        }
        self.rows.iter().map(|row| sparse_dot(&q, row)).collect()
    }
}

/// Lowercased tokens with stopwords removed.
pub fn tokenize(text: &str, stopwords: &HashSet<String>) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !stopwords.contains(*t))
        .map(str::to_string)
        .collect()
}

fn term_counts(text: &str, params: &IndexParams) -> HashMap<String, u32> {
    let tokens = tokenize(text, &params.stopwords);
    let mut counts = HashMap::new();
    for n in 1..=params.max_ngram.max(1) {
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

fn weigh(counts: &HashMap<String, u32>, vocabulary: &HashMap<String, usize>, idf: &[f64]) -> SparseVec {
    let mut vec: SparseVec = counts
        .iter()
        .filter_map(|(term, &tf)| {
            vocabulary
                .get(term)
                .map(|&j| (j, f64::from(tf) * idf[j]))
        })
        .collect();
    vec.sort_unstable_by_key(|(j, _)| *j);

    let norm = vec.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm < f64::EPSILON {
        return Vec::new();
    }
    for (_, w) in &mut vec {
        *w /= norm;
    }
    vec
}

fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IndexParams {
        IndexParams::default()
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_single_chars() {
        let tokens = tokenize("A Reunião do Conselho e o orçamento, x 2024", &params().stopwords);
        assert_eq!(tokens, vec!["reunião", "conselho", "orçamento", "2024"]);
    }

    #[test]
    fn test_ngrams_span_removed_stopwords() {
        let counts = term_counts("plano de obras", &params());
        assert!(counts.contains_key("plano"));
        assert!(counts.contains_key("plano obras"));
        assert!(!counts.contains_key("plano de"));
    }

    #[test]
    fn test_empty_index() {
        let idx = LexicalIndex::build::<String>(&[], params());
        assert!(idx.is_empty());
        assert!(idx.similarities("qualquer").is_empty());
    }

    #[test]
    fn test_identical_text_scores_one() {
        let idx = LexicalIndex::build(&["orçamento aprovado para obras"], params());
        let sims = idx.similarities("orçamento aprovado para obras");
        assert!((sims[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unique_term_selects_chunk() {
        let chunks = [
            "discussão sobre calendário escolar",
            "aprovado orçamento da biblioteca",
            "calendário de férias discutido",
        ];
        let idx = LexicalIndex::build(&chunks, params());
        assert_eq!(idx.len(), 3);
        let sims = idx.similarities("biblioteca");
        assert!(sims[1] > 0.0);
        assert_eq!(sims[0], 0.0);
        assert_eq!(sims[2], 0.0);
    }

    #[test]
    fn test_out_of_vocabulary_query_scores_zero() {
        let idx = LexicalIndex::build(&["alpha beta", "gamma delta"], params());
        assert!(idx.similarities("zeta").iter().all(|s| *s == 0.0));
        assert!(idx.similarities("").iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_max_df_drops_universal_terms() {
        let chunks = ["ata reunião alpha", "ata reunião beta", "ata reunião gamma"];
        let p = IndexParams {
            max_df: 0.5,
            ..params()
        };
        let idx = LexicalIndex::build(&chunks, p);
        assert!(!idx.contains_term("ata"));
        assert!(!idx.contains_term("ata reunião"));
        assert!(idx.contains_term("alpha"));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let chunks = ["alpha alpha alpha beta", "alpha gamma gamma"];
        let p = IndexParams {
            max_features: 2,
            max_ngram: 1,
            ..params()
        };
        let idx = LexicalIndex::build(&chunks, p);
        assert_eq!(idx.vocabulary_size(), 2);
        assert!(idx.contains_term("alpha"));
        assert!(idx.contains_term("gamma"));
        assert!(!idx.contains_term("beta"));
    }

    #[test]
    fn test_scores_in_unit_range() {
        let chunks = [
            "orçamento orçamento obras",
            "obras na escola",
            "merenda escolar",
        ];
        let idx = LexicalIndex::build(&chunks, params());
        for s in idx.similarities("orçamento das obras na escola") {
            assert!((0.0..=1.0).contains(&s), "score out of range: {s}");
        }
    }
}
