//! Deterministic rule-based answer extraction.
//!
//! The terminal step of the answer cascade: it always produces an
//! [`Answer`], falling back to a low-confidence "not found" message.
//!
//! The query is classified by trigger words, checked in priority order:
//!
//! | Intent | Extracts | Confidence |
//! |--------|----------|------------|
//! | date | `DD/MM/YYYY`, `12 de março de 2024`, `março de 2024` | 0.85 (0.8 month/year) |
//! | person | capitalized two/three-word names | 0.85 |
//! | amount | currency values | 0.85 |
//! | status | up to 3 sentences with query keywords | 0.75 |
//! | topic | keyword sentences plus neighbours | 0.75 |
//! | generic | top 4 sentences by keyword count | 0.7 |
//!
//! An intent that matches but finds nothing hands over to the next one.
//! Matching is case- and accent-insensitive.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Answer, StrategyKind};

pub const NOT_FOUND: &str = "Não encontrei essa informação nas atas.";

const CONF_EXACT: f64 = 0.85;
const CONF_MONTH_YEAR: f64 = 0.8;
const CONF_PASSAGE: f64 = 0.75;
const CONF_GENERIC: f64 = 0.7;
const CONF_NOT_FOUND: f64 = 0.3;
const CONF_EMPTY_CONTEXT: f64 = 0.1;

const STATUS_SENTENCES: usize = 3;
const GENERIC_SENTENCES: usize = 4;
const PERSON_SENTENCES: usize = 2;

const DATE_TRIGGERS: &[&str] = &[
    "quando", "data", "datas", "dia", "dias", "periodo", "prazo", "horario", "when", "date",
    "day",
];
const PERSON_TRIGGERS: &[&str] = &[
    "quem", "pessoa", "pessoas", "responsavel", "responsaveis", "presidente", "secretario",
    "secretaria", "coordenador", "coordenadora", "diretor", "diretora", "gerente",
    "participante", "participantes", "presentes", "relator", "relatora", "who", "person",
];
const AMOUNT_TRIGGERS: &[&str] = &[
    "orcamento", "valor", "valores", "custo", "custos", "preco", "quanto", "quantia", "verba",
    "gasto", "gastos", "pagamento", "reais", "dinheiro", "investimento", "budget", "cost",
    "price", "amount",
];
const STATUS_TRIGGERS: &[&str] = &[
    "como", "situacao", "status", "andamento", "progresso",
];
const TOPIC_TRIGGERS: &[&str] = &[
    "projeto", "projetos", "tema", "temas", "assunto", "assuntos", "pauta", "pautas", "topico",
    "topicos", "discutido", "discutida", "discussao", "decidido", "decisao", "decisoes",
    "sobre", "project", "topic",
];

const INTERROGATIVES: &[&str] = &[
    "qual", "quais", "quando", "onde", "quem", "como", "porque", "quanto", "quantos", "quanta",
    "quantas", "what", "when", "where", "which", "why", "who", "how",
];
const FILLERS: &[&str] = &[
    "esta", "estao", "este", "esse", "essa", "isso", "isto", "sera", "foram", "teve", "tinha",
    "pela", "pelo", "pelas", "pelos", "entre", "apos", "ainda", "sobre", "does", "with",
];

/// Capitalized words that start or end a name-shaped match without being
/// part of a name.
const NON_NAME_WORDS: &[&str] = &[
    "ata", "reuniao", "assembleia", "sessao", "pauta", "projeto", "participou", "participaram",
    "estiveram", "compareceu", "compareceram", "presidiu", "presentes", "aprovado",
    "aprovada", "ficou", "foi", "relatou", "informou", "apresentou", "segundo", "conforme",
    "prefeitura", "janeiro", "fevereiro", "marco", "abril", "maio", "junho", "julho", "agosto",
    "setembro", "outubro", "novembro", "dezembro", "segunda", "terca", "quarta", "quinta",
    "sexta", "sabado", "domingo", "sr", "sra", "dr", "dra", "conselho", "escolar", "comissao",
    "camara", "secretaria", "diretoria", "colegiado", "municipal", "escola", "ontem", "hoje",
    "amanha", "entao", "depois", "antes", "durante", "apos", "logo", "ainda", "tambem", "assim",
    "inicialmente", "posteriormente", "finalmente", "em", "no", "na", "nos", "nas",
];
const NAME_CONNECTORS: &[&str] = &["da", "de", "do", "das", "dos"];

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2})\b").expect("valid regex"));
static TEXT_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d{1,2}\s+de\s+(?:janeiro|fevereiro|março|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)(?:\s+de\s+\d{4})?\b",
    )
    .expect("valid regex")
});
static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:janeiro|fevereiro|março|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)\s+(?:de\s+)?\d{4}\b",
    )
    .expect("valid regex")
});
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}\p{Ll}+(?:[ \t]+(?:d[aeo]s?[ \t]+)?\p{Lu}\p{Ll}+){1,2}\b").expect("valid regex")
});
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:R\$|US\$|€|\$)\s*\d+(?:[.,]\d+)*(?:\s*(?:mil|milh[õo]es|milh[ãa]o|bilh[õo]es|bilh[ãa]o)\b)?|\b\d+(?:[.,]\d+)*\s*(?:mil\s+|milh[õo]es\s+de\s+|milh[ãa]o\s+de\s+)?(?:reais|d[óo]lares|euros)\b",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Date,
    Person,
    Amount,
    Status,
    Topic,
}

/// Every intent whose triggers appear in `query`, in priority order.
pub fn classify(query: &str) -> Vec<Intent> {
    let words = words(&fold(query));
    let hit = |triggers: &[&str]| words.iter().any(|w| triggers.contains(&w.as_str()));
    [
        (Intent::Date, DATE_TRIGGERS),
        (Intent::Person, PERSON_TRIGGERS),
        (Intent::Amount, AMOUNT_TRIGGERS),
        (Intent::Status, STATUS_TRIGGERS),
        (Intent::Topic, TOPIC_TRIGGERS),
    ]
    .into_iter()
    .filter(|(_, triggers)| hit(*triggers))
    .map(|(intent, _)| intent)
    .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct RuleExtractor {
    max_chars: usize,
}

impl RuleExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn answer(&self, query: &str, context: &str) -> Answer {
        if context.trim().is_empty() {
            return self.make(NOT_FOUND.to_string(), CONF_EMPTY_CONTEXT);
        }

        let sentences = split_sentences(context);
        for intent in classify(query) {
            let found = match intent {
                Intent::Date => extract_date(context, &sentences),
                Intent::Person => extract_person(context, &sentences),
                Intent::Amount => extract_amount(context, &sentences),
                Intent::Status => extract_status(query, &sentences),
                Intent::Topic => extract_topic(query, &sentences, self.max_chars),
            };
            if let Some((text, confidence)) = found {
                return self.make(text, confidence);
            }
        }

        match extract_generic(query, &sentences) {
            Some(text) => self.make(text, CONF_GENERIC),
            None => self.make(NOT_FOUND.to_string(), CONF_NOT_FOUND),
        }
    }

    fn make(&self, text: String, confidence: f64) -> Answer {
        Answer {
            text: truncate_chars(&text, self.max_chars),
            confidence,
            source_strategy: StrategyKind::RuleBased,
        }
    }
}

fn extract_date(context: &str, sentences: &[&str]) -> Option<(String, f64)> {
    let (m, confidence) = NUMERIC_DATE_RE
        .find(context)
        .or_else(|| TEXT_DATE_RE.find(context))
        .map(|m| (m.as_str(), CONF_EXACT))
        .or_else(|| MONTH_YEAR_RE.find(context).map(|m| (m.as_str(), CONF_MONTH_YEAR)))?;
    Some((with_context(m, sentences), confidence))
}

fn extract_person(context: &str, sentences: &[&str]) -> Option<(String, f64)> {
    let name = NAME_RE.find_iter(context).find_map(|m| clean_name(m.as_str()))?;
    let mentions: Vec<&str> = sentences
        .iter()
        .filter(|s| s.contains(name))
        .take(PERSON_SENTENCES)
        .copied()
        .collect();
    let text = if mentions.is_empty() {
        name.to_string()
    } else {
        format!("{name}. Contexto: {}", mentions.join(" "))
    };
    Some((text, CONF_EXACT))
}

/// Strip non-name words from both ends of a name-shaped match; `None` if
/// fewer than two name words remain. The result is a slice of `candidate`,
/// so inner spacing is kept as written.
fn clean_name(candidate: &str) -> Option<&str> {
    let words = word_spans(candidate);
    let skip = |&(start, end): &(usize, usize)| {
        let f = fold(&candidate[start..end]);
        NON_NAME_WORDS.contains(&f.as_str()) || NAME_CONNECTORS.contains(&f.as_str())
    };
    let first = words.iter().position(|w| !skip(w))?;
    let last = words.iter().rposition(|w| !skip(w))?;
    let capitalized = words[first..=last]
        .iter()
        .filter(|&&(start, _)| candidate[start..].chars().next().is_some_and(char::is_uppercase))
        .count();
    (capitalized >= 2).then(|| &candidate[words[first].0..words[last].1])
}

/// Byte ranges of the whitespace-separated words in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

fn extract_amount(context: &str, sentences: &[&str]) -> Option<(String, f64)> {
    let m = AMOUNT_RE.find(context)?;
    Some((with_context(m.as_str().trim(), sentences), CONF_EXACT))
}

fn extract_status(query: &str, sentences: &[&str]) -> Option<(String, f64)> {
    let keywords = keywords(query);
    if keywords.is_empty() {
        return None;
    }
    let picked: Vec<&str> = sentences
        .iter()
        .filter(|s| count_matches(s, &keywords) > 0)
        .take(STATUS_SENTENCES)
        .copied()
        .collect();
    (!picked.is_empty()).then(|| (picked.join(" "), CONF_PASSAGE))
}

fn extract_topic(query: &str, sentences: &[&str], max_chars: usize) -> Option<(String, f64)> {
    let all = keywords(query);
    let cleaned: Vec<String> = all
        .iter()
        .filter(|k| !TOPIC_TRIGGERS.contains(&k.as_str()))
        .cloned()
        .collect();
    let keywords = if cleaned.is_empty() { all } else { cleaned };
    if keywords.is_empty() {
        return None;
    }

    let mut picked: Vec<usize> = Vec::new();
    for (i, s) in sentences.iter().enumerate() {
        if count_matches(s, &keywords) == 0 {
            continue;
        }
        for j in i.saturating_sub(1)..=(i + 1).min(sentences.len() - 1) {
            if !picked.contains(&j) {
                picked.push(j);
            }
        }
    }
    if picked.is_empty() {
        return None;
    }
    picked.sort_unstable();

    let mut text = String::new();
    for j in picked {
        if text.chars().count() >= max_chars {
            break;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(sentences[j]);
    }
    Some((text, CONF_PASSAGE))
}

fn extract_generic(query: &str, sentences: &[&str]) -> Option<String> {
    let keywords = keywords(query);
    if keywords.is_empty() {
        return None;
    }
    let mut scored: Vec<(usize, &str)> = sentences
        .iter()
        .map(|s| (count_matches(s, &keywords), *s))
        .filter(|(score, _)| *score > 0)
        .collect();
    if scored.is_empty() {
        return None;
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let best: Vec<&str> = scored
        .into_iter()
        .take(GENERIC_SENTENCES)
        .map(|(_, s)| s)
        .collect();
    Some(best.join(" "))
}

/// `value`, followed by the first sentence containing it when that adds anything.
fn with_context(value: &str, sentences: &[&str]) -> String {
    match sentences.iter().find(|s| s.contains(value)) {
        Some(sentence) if sentence.trim() != value => format!("{value}. Contexto: {sentence}"),
        _ => value.to_string(),
    }
}

/// Folded query words longer than 3 chars, minus interrogatives and
/// fillers, deduplicated in query order.
pub fn keywords(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for w in words(&fold(query)) {
        if w.chars().count() <= 3
            || INTERROGATIVES.contains(&w.as_str())
            || FILLERS.contains(&w.as_str())
            || out.contains(&w)
        {
            continue;
        }
        out.push(w);
    }
    out
}

fn count_matches(sentence: &str, keywords: &[String]) -> usize {
    let folded = fold(sentence);
    keywords.iter().filter(|k| folded.contains(k.as_str())).count()
}

fn words(folded: &str) -> Vec<String> {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercase and strip Portuguese diacritics.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Split on line breaks and on `.`, `!`, `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                None => Some(i + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = end {
            push_trimmed(&mut out, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

/// Cap `text` at `max_chars` characters, ending in `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
