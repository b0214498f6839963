//! # Minutes QA CLI (`mqa`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mqa index [DIR]` | Rebuild the index from a directory of minutes |
//! | `mqa search "<query>"` | Retrieve and answer a question |
//! | `mqa stats` | Show what is indexed and which answer strategy is active |
//! | `mqa models` | Check the local generation service and list its models |
//!
//! ## Examples
//!
//! ```bash
//! mqa --config ./config/mqa.toml index ./atas
//! mqa search "Qual o orçamento aprovado?" --limit 3
//! mqa stats --json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use minutes_qa::config::{load_config, validate, Config};
use minutes_qa::generation::{select_model, OllamaClient};
use minutes_qa::models::SearchResult;
use minutes_qa::MinutesService;

/// Question answering over meeting minutes.
///
/// Without `--config`, built-in defaults are used. See
/// `config/mqa.example.toml` for every setting.
#[derive(Parser)]
#[command(name = "mqa", version, about = "Question answering over meeting minutes")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace). `MQA_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every supported file in a directory, replacing the current index.
    Index {
        /// Directory to scan. Defaults to `documents.root`.
        dir: Option<PathBuf>,
    },

    /// Search the index and answer the question.
    Search {
        query: String,

        /// Maximum number of documents to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show document and chunk counts, last update and active strategy.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Check the local generation service and list installed models.
    Models,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("MQA_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = Config::default();
            validate(&config)?;
            config
        }
    };

    match cli.command {
        Commands::Index { dir } => {
            let dir = dir.unwrap_or_else(|| config.documents.root.clone());
            let service = MinutesService::open(config);
            let report = service
                .index(&dir)
                .with_context(|| format!("Failed to index {}", dir.display()))?;
            println!(
                "Indexed {} documents ({} chunks) from {}",
                report.documents,
                report.chunks,
                dir.display()
            );
            for name in &report.skipped {
                println!("  skipped (no text): {}", name);
            }
        }
        Commands::Search { query, limit, json } => {
            let limit = limit.unwrap_or(config.retrieval.max_results);
            let service = MinutesService::open(config);
            let results = service.search(&query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Commands::Stats { json } => {
            let snapshot_path = config.snapshot.path.clone();
            let service = MinutesService::open(config);
            let stats = service.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Minutes QA: index stats");
                println!("=======================");
                println!();
                println!("  Snapshot:    {}", snapshot_path.display());
                println!("  Documents:   {}", stats.document_count);
                println!("  Chunks:      {}", stats.chunk_count);
                println!(
                    "  Last update: {}",
                    stats
                        .last_update
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
                println!("  Strategy:    {}", stats.active_strategy_name);
            }
        }
        Commands::Models => run_models(&config)?,
    }

    Ok(())
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (#{})",
            i + 1,
            result.similarity_score,
            result.filename,
            result.document_id
        );
        println!("    answer: {}", result.ai_answer);
        println!(
            "    confidence: {:.2} ({})",
            result.confidence, result.source_strategy
        );
        println!("    excerpt: {}", excerpt(&result.best_chunk, 160));
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn run_models(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.generation)?;
    match client.list_models() {
        Ok(models) => {
            println!("Generation service reachable at {}", client.url());
            if models.is_empty() {
                println!("  no models installed");
                println!();
                println!("  Install one with: ollama pull {}", config.generation.preferred_model);
                return Ok(());
            }
            let selected = select_model(&models, &config.generation.preferred_model);
            for model in &models {
                let marker = if selected.as_deref() == Some(model.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("  {} {}", marker, model);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Generation service not available at {}", client.url());
            eprintln!();
            eprintln!("  1. Install Ollama: https://ollama.com/download");
            eprintln!("  2. Start it:       ollama serve");
            eprintln!(
                "  3. Pull a model:   ollama pull {}",
                config.generation.preferred_model
            );
            eprintln!();
            eprintln!("Until then answers come from the rule-based extractor.");
            bail!("{}", e)
        }
    }
}
