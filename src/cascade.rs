//! Ordered answer strategies, first success wins.
//!
//! A cascade holds zero or more generative strategies (primary, then
//! secondary) followed by the rule-based extractor, which always answers.
//! [`AnswerCascade::answer`] therefore never fails.
//!
//! A generative strategy hands over with [`Attempt::Fallthrough`]. When the
//! failure is structural (the backend is not there) the next generative
//! strategy is tried. Any other failure (timeout, bad status, short text)
//! skips the remaining generative strategies and goes straight to the
//! rules.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::{AnswerConfig, Config};
use crate::generation::{
    detect_model, ChatClient, GenerateOptions, GenerationError, OllamaClient, OllamaGenerator,
    TextGenerator,
};
use crate::models::{Answer, StrategyKind};
use crate::rules::{truncate_chars, RuleExtractor, NOT_FOUND};

const PRIMARY_CONFIDENCE: f64 = 0.95;
const SECONDARY_CONFIDENCE: f64 = 0.9;

/// Outcome of one strategy.
#[derive(Debug)]
pub enum Attempt {
    Answered(Answer),
    Fallthrough(GenerationError),
}

pub trait AnswerStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn name(&self) -> String;
    fn attempt(&self, query: &str, context: &str) -> Attempt;
}

/// Build the grounded prompt sent to generative backends.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Você é um assistente que responde perguntas sobre atas de reunião. \
         Use somente o contexto abaixo e responda em português, de forma curta e direta. \
         Se a informação não estiver no contexto, responda: '{NOT_FOUND}'\n\
         CONTEXTO: {context}\n\
         PERGUNTA: {query}\n\
         RESPOSTA:"
    )
}

/// A [`TextGenerator`] wrapped with retries and answer validation.
pub struct LlmStrategy {
    kind: StrategyKind,
    generator: Box<dyn TextGenerator>,
    confidence: f64,
    max_attempts: u32,
    backoff: Duration,
    min_answer_chars: usize,
    max_chars: usize,
}

impl LlmStrategy {
    pub fn primary(generator: Box<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            kind: StrategyKind::Primary,
            generator,
            confidence: PRIMARY_CONFIDENCE,
            max_attempts: config.generation.max_attempts.max(1),
            backoff: Duration::from_millis(config.generation.retry_backoff_ms),
            min_answer_chars: config.answer.min_answer_chars,
            max_chars: config.answer.max_chars,
        }
    }

    /// Single attempt, no retries.
    pub fn secondary(generator: Box<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            kind: StrategyKind::Secondary,
            generator,
            confidence: SECONDARY_CONFIDENCE,
            max_attempts: 1,
            backoff: Duration::ZERO,
            min_answer_chars: config.answer.min_answer_chars,
            max_chars: config.answer.max_chars,
        }
    }

    fn generate_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let text = self.generator.generate(prompt)?;
        let text = text.trim();
        let len = text.chars().count();
        if len < self.min_answer_chars.max(1) {
            return Err(GenerationError::TooShort { len });
        }
        Ok(truncate_chars(text, self.max_chars))
    }
}

impl AnswerStrategy for LlmStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn name(&self) -> String {
        self.generator.name()
    }

    fn attempt(&self, query: &str, context: &str) -> Attempt {
        let prompt = build_prompt(query, context);
        let mut structural: Option<GenerationError> = None;
        let mut other: Option<GenerationError> = None;

        for attempt in 1..=self.max_attempts {
            match self.generate_once(&prompt) {
                Ok(text) => {
                    return Attempt::Answered(Answer {
                        text,
                        confidence: self.confidence,
                        source_strategy: self.kind,
                    })
                }
                Err(e) => {
                    debug!(
                        strategy = %self.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "generation attempt failed"
                    );
                    let give_up = matches!(e, GenerationError::NotInitialized(_));
                    if e.is_structural() {
                        structural = Some(e);
                    } else {
                        other = Some(e);
                    }
                    if give_up {
                        break;
                    }
                }
            }

            if attempt < self.max_attempts && !self.backoff.is_zero() {
                std::thread::sleep(self.backoff * 2u32.saturating_pow(attempt - 1));
            }
        }

        let error = other
            .or(structural)
            .unwrap_or_else(|| GenerationError::NotInitialized("no attempts made".to_string()));
        Attempt::Fallthrough(error)
    }
}

/// Terminal strategy: always answers.
#[derive(Debug, Clone, Copy)]
pub struct RuleBasedStrategy {
    extractor: RuleExtractor,
}

impl RuleBasedStrategy {
    pub fn new(max_chars: usize) -> Self {
        Self {
            extractor: RuleExtractor::new(max_chars),
        }
    }

    pub fn answer(&self, query: &str, context: &str) -> Answer {
        self.extractor.answer(query, context)
    }
}

impl AnswerStrategy for RuleBasedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RuleBased
    }

    fn name(&self) -> String {
        "rule-based".to_string()
    }

    fn attempt(&self, query: &str, context: &str) -> Attempt {
        Attempt::Answered(self.answer(query, context))
    }
}

pub struct AnswerCascade {
    generative: Vec<Box<dyn AnswerStrategy>>,
    rules: RuleBasedStrategy,
    context_chars: usize,
}

impl AnswerCascade {
    /// `generative` in priority order; the rule-based strategy is appended.
    pub fn new(generative: Vec<Box<dyn AnswerStrategy>>, answer: AnswerConfig) -> Self {
        Self {
            generative,
            rules: RuleBasedStrategy::new(answer.max_chars),
            context_chars: answer.context_chars,
        }
    }

    /// Rules only.
    pub fn rule_based(answer: AnswerConfig) -> Self {
        Self::new(Vec::new(), answer)
    }

    /// Detect the configured backends and build the cascade from those that
    /// respond. Blocks for at most the detection timeout.
    pub fn from_config(config: &Config) -> Self {
        let mut generative: Vec<Box<dyn AnswerStrategy>> = Vec::new();

        if config.generation.enabled {
            match detect_primary(config) {
                Ok(generator) => {
                    info!(backend = %generator.name(), "primary generation backend ready");
                    generative.push(Box::new(LlmStrategy::primary(Box::new(generator), config)));
                }
                Err(e) => info!(error = %e, "primary generation backend unavailable"),
            }
        } else {
            debug!("primary generation disabled by configuration");
        }

        if let Some(secondary) = &config.secondary {
            match ChatClient::new(secondary, config.generation.temperature) {
                Ok(client) => {
                    info!(backend = %client.name(), "secondary generation backend ready");
                    generative.push(Box::new(LlmStrategy::secondary(Box::new(client), config)));
                }
                Err(e) => info!(error = %e, "secondary generation backend unavailable"),
            }
        }

        let cascade = Self::new(generative, config.answer);
        info!(strategy = %cascade.active_strategy_name(), "answer strategy selected");
        cascade
    }

    /// Name of the first strategy that will be tried.
    pub fn active_strategy_name(&self) -> String {
        self.generative
            .first()
            .map(|s| s.name())
            .unwrap_or_else(|| self.rules.name())
    }

    /// Answer `query` from `chunk`, truncated to the configured context size.
    pub fn answer(&self, query: &str, chunk: &str) -> Answer {
        let context: String = chunk.chars().take(self.context_chars).collect();
        let mut generative_failed = false;

        for strategy in &self.generative {
            if generative_failed && strategy.kind().is_generative() {
                debug!(strategy = %strategy.name(), "skipped after non-structural failure");
                continue;
            }
            match strategy.attempt(query, &context) {
                Attempt::Answered(answer) => return answer,
                Attempt::Fallthrough(e) => {
                    debug!(strategy = %strategy.name(), error = %e, "strategy fell through");
                    if !e.is_structural() {
                        generative_failed = true;
                    }
                }
            }
        }

        self.rules.answer(query, &context)
    }
}

fn detect_primary(config: &Config) -> Result<OllamaGenerator, GenerationError> {
    let client = OllamaClient::new(&config.generation)?;
    let model = detect_model(&client, &config.generation)?;
    let options = GenerateOptions {
        temperature: config.generation.temperature,
        num_predict: config.generation.num_predict,
    };
    Ok(OllamaGenerator::new(client, model, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays scripted results, then repeats the last one.
    struct ScriptedGenerator {
        name: &'static str,
        script: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    fn unreachable() -> GenerationError {
        GenerationError::Unreachable {
            url: "http://127.0.0.1:1".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    fn clone_result(r: &Result<String, GenerationError>) -> Result<String, GenerationError> {
        match r {
            Ok(s) => Ok(s.clone()),
            Err(GenerationError::Unreachable { .. }) => Err(unreachable()),
            Err(GenerationError::TooShort { len }) => Err(GenerationError::TooShort { len: *len }),
            Err(_) => Err(GenerationError::Timeout),
        }
    }

    impl ScriptedGenerator {
        fn new(name: &'static str, script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                name,
                script: Mutex::new(script.into()),
                calls: Arc::new(AtomicUsize::new(0)),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                clone_result(script.front().unwrap())
            }
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.generation.retry_backoff_ms = 0;
        config
    }

    const CONTEXT: &str = "A reuniao ocorreu em 12/01/2024. Participou Joao Silva.";

    #[test]
    fn test_rules_only_cascade() {
        let cascade = AnswerCascade::rule_based(AnswerConfig::default());
        assert_eq!(cascade.active_strategy_name(), "rule-based");
        let answer = cascade.answer("Quando foi a reuniao?", CONTEXT);
        assert_eq!(answer.source_strategy, StrategyKind::RuleBased);
        assert!(answer.text.contains("12/01/2024"));
    }

    #[test]
    fn test_primary_success_short_circuits() {
        let config = config();
        let primary = ScriptedGenerator::new("ollama:test", vec![Ok("Em 12/01/2024.".to_string())]);
        let prompts = primary.prompts.clone();
        let cascade = AnswerCascade::new(
            vec![Box::new(LlmStrategy::primary(Box::new(primary), &config))],
            config.answer,
        );

        assert_eq!(cascade.active_strategy_name(), "ollama:test");
        let answer = cascade.answer("Quando foi a reuniao?", CONTEXT);
        assert_eq!(answer.text, "Em 12/01/2024.");
        assert_eq!(answer.source_strategy, StrategyKind::Primary);
        assert!((answer.confidence - PRIMARY_CONFIDENCE).abs() < 1e-9);

        let prompt = &prompts.lock().unwrap()[0];
        assert!(prompt.contains("CONTEXTO: A reuniao ocorreu"));
        assert!(prompt.contains("PERGUNTA: Quando foi a reuniao?"));
        assert!(prompt.trim_end().ends_with("RESPOSTA:"));
    }

    #[test]
    fn test_primary_retries_then_succeeds() {
        let config = config();
        let primary = ScriptedGenerator::new(
            "ollama:test",
            vec![Err(GenerationError::Timeout), Ok("Joao Silva".to_string())],
        );
        let calls = primary.calls.clone();
        let cascade = AnswerCascade::new(
            vec![Box::new(LlmStrategy::primary(Box::new(primary), &config))],
            config.answer,
        );
        let answer = cascade.answer("Quem participou?", CONTEXT);
        assert_eq!(answer.text, "Joao Silva");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unreachable_primary_without_secondary_uses_rules() {
        let config = config();
        let primary = ScriptedGenerator::new("ollama:test", vec![Err(unreachable())]);
        let calls = primary.calls.clone();
        let cascade = AnswerCascade::new(
            vec![Box::new(LlmStrategy::primary(Box::new(primary), &config))],
            config.answer,
        );
        for query in ["Quando foi a reuniao?", "Quem participou?", "merenda"] {
            let answer = cascade.answer(query, CONTEXT);
            assert_eq!(answer.source_strategy, StrategyKind::RuleBased);
            assert!(answer.confidence <= 0.85);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3 * config.generation.max_attempts as usize);
    }

    #[test]
    fn test_unreachable_primary_falls_to_secondary() {
        let config = config();
        let primary = ScriptedGenerator::new("ollama:test", vec![Err(unreachable())]);
        let secondary = ScriptedGenerator::new("chat:test", vec![Ok("Joao Silva".to_string())]);
        let cascade = AnswerCascade::new(
            vec![
                Box::new(LlmStrategy::primary(Box::new(primary), &config)),
                Box::new(LlmStrategy::secondary(Box::new(secondary), &config)),
            ],
            config.answer,
        );
        let answer = cascade.answer("Quem participou?", CONTEXT);
        assert_eq!(answer.source_strategy, StrategyKind::Secondary);
        assert!((answer.confidence - SECONDARY_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_slow_primary_skips_secondary() {
        let config = config();
        let primary = ScriptedGenerator::new("ollama:test", vec![Err(GenerationError::Timeout)]);
        let secondary = ScriptedGenerator::new("chat:test", vec![Ok("Joao Silva".to_string())]);
        let secondary_calls = secondary.calls.clone();
        let cascade = AnswerCascade::new(
            vec![
                Box::new(LlmStrategy::primary(Box::new(primary), &config)),
                Box::new(LlmStrategy::secondary(Box::new(secondary), &config)),
            ],
            config.answer,
        );
        let answer = cascade.answer("Quem participou?", CONTEXT);
        assert_eq!(answer.source_strategy, StrategyKind::RuleBased);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_too_short_response_falls_through() {
        let config = config();
        let primary = ScriptedGenerator::new("ollama:test", vec![Ok("  ".to_string())]);
        let cascade = AnswerCascade::new(
            vec![Box::new(LlmStrategy::primary(Box::new(primary), &config))],
            config.answer,
        );
        let strategy_answer = cascade.answer("Quando foi a reuniao?", CONTEXT);
        assert_eq!(strategy_answer.source_strategy, StrategyKind::RuleBased);
    }

    #[test]
    fn test_context_is_truncated() {
        let mut config = config();
        config.answer.context_chars = 10;
        let primary = ScriptedGenerator::new("ollama:test", vec![Ok("ok, resposta".to_string())]);
        let prompts = primary.prompts.clone();
        let cascade = AnswerCascade::new(
            vec![Box::new(LlmStrategy::primary(Box::new(primary), &config))],
            config.answer,
        );
        cascade.answer("Quando?", CONTEXT);
        let prompt = &prompts.lock().unwrap()[0];
        assert!(prompt.contains("CONTEXTO: A reuniao \n"));
    }

    #[test]
    fn test_from_config_with_generation_disabled() {
        let mut config = config();
        config.generation.enabled = false;
        let cascade = AnswerCascade::from_config(&config);
        assert_eq!(cascade.active_strategy_name(), "rule-based");
    }

    #[test]
    fn test_from_config_with_unreachable_service() {
        let mut config = config();
        config.generation.url = "http://127.0.0.1:1".to_string();
        config.generation.detect_timeout_secs = 1;
        let cascade = AnswerCascade::from_config(&config);
        assert_eq!(cascade.active_strategy_name(), "rule-based");
    }
}
