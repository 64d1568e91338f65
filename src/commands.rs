use std::path::PathBuf;

use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::Result;
use crate::chat::AnswerResult;
use crate::config::interactive::default_model_for;
use crate::config::{Config, Provider, get_config_dir};
use crate::index::{COLLECTION_NAME, ManifestDb};
use crate::pipeline::RagPipeline;
use crate::providers::OllamaEmbedder;

/// Questions played back by `chat --demo` before the prompt is handed over
const DEMO_QUESTIONS: [&str; 3] = [
    "What is this document about?",
    "Summarize the key points in a few sentences.",
    "What details stand out the most?",
];

/// Per-run configuration overrides collected from the command line. Values
/// replace the file-backed configuration for this run only; the file itself
/// is never modified.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub top_k: Option<usize>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub temperature: Option<f32>,
    pub persist_dir: Option<PathBuf>,
    pub rebuild: bool,
}

impl Overrides {
    /// Fold the overrides into `config`. Switching the provider without
    /// naming a model also switches to that provider's default model, so
    /// `--provider openai` alone never sends an Ollama model name to OpenAI.
    pub fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
            if self.model.is_none() {
                config.llm.model = default_model_for(provider).to_string();
            }
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunking.chunk_size = chunk_size;
        }
        if let Some(overlap) = self.overlap {
            config.chunking.overlap = overlap;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(persist_dir) = &self.persist_dir {
            config.storage.persist_dir = persist_dir.clone();
        }
    }
}

/// Run the interactive REPL over the given PDFs
#[inline]
pub async fn run_chat(pdfs: Vec<PathBuf>, demo: bool, overrides: Overrides) -> Result<()> {
    let mut pipeline = build_pipeline(&pdfs, &overrides).await?;
    print_banner(&pipeline);

    if demo {
        println!();
        println!(
            "{}",
            style("Demo mode: running three sample questions first.").dim()
        );
        for question in DEMO_QUESTIONS {
            println!();
            println!("{} {question}", style("You:").bold().green());
            ask_and_print(&mut pipeline, question).await;
        }
    }

    println!();
    println!(
        "Ask questions about your documents. Type {} for commands.",
        style("help").cyan()
    );

    loop {
        println!();
        let line: String = Input::new()
            .with_prompt(style("You").bold().green().to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| crate::PdfChatError::Other(e.into()))?;

        match line.trim() {
            "" => {}
            "exit" | "quit" | "q" => break,
            "clear" => {
                pipeline.clear_memory();
                println!("{}", style("Conversation memory cleared.").yellow());
            }
            "history" => print_history(&pipeline),
            "help" => print_help(),
            question => ask_and_print(&mut pipeline, question).await,
        }
    }

    println!("{}", style("Goodbye!").cyan());
    Ok(())
}

/// Answer a single question and exit
#[inline]
pub async fn ask_once(question: &str, pdfs: Vec<PathBuf>, overrides: Overrides) -> Result<()> {
    let mut pipeline = build_pipeline(&pdfs, &overrides).await?;
    let result = pipeline.ask(question).await?;
    print_answer(&result);
    Ok(())
}

/// Report on the persisted collection, Ollama reachability, and the config
/// file location
#[inline]
pub async fn show_status(persist_dir: Option<PathBuf>) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(dir) = persist_dir {
        config.storage.persist_dir = dir;
    }

    println!("{}", style("📊 pdf-chat Status Report").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}", style("🗂️  Configuration:").bold().yellow());
    match get_config_dir() {
        Ok(dir) => println!("   File: {}", dir.join("config.toml").display()),
        Err(e) => println!("   ❌ Config directory unavailable: {e}"),
    }
    println!("   Persist dir: {}", config.storage.persist_dir.display());
    println!();

    println!("{}", style("📦 Persisted Collection:").bold().yellow());
    let manifest_path = config.storage.manifest_path();
    if manifest_path.exists() {
        match ManifestDb::open(&manifest_path).await {
            Ok(manifest_db) => match manifest_db.get(COLLECTION_NAME).await {
                Ok(Some(manifest)) => {
                    println!("   ✅ Collection: {}", manifest.name);
                    println!("   Entries: {}", manifest.entry_count);
                    println!("   Embedding model: {}", manifest.embed_model_id);
                    println!("   Dimension: {}", manifest.dimension);
                    println!(
                        "   Built: {} (build {})",
                        manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        manifest.build_id
                    );
                }
                Ok(None) => println!("   📭 No collection recorded yet"),
                Err(e) => println!("   ❌ Failed to read manifest: {e}"),
            },
            Err(e) => println!("   ❌ Failed to open manifest db: {e}"),
        }
    } else {
        println!("   📭 No persisted collection at this location");
    }
    println!();

    println!("{}", style("🤖 Ollama:").bold().yellow());
    match OllamaEmbedder::new(&config.ollama) {
        Ok(embedder) => match embedder.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   Embedding model: {}", config.ollama.embedding_model);
                if config.llm.provider == Provider::Ollama {
                    println!("   Chat model: {}", config.llm.model);
                }
            }
            Err(e) => println!("   ⚠️  Reachable but unhealthy: {e:#}"),
        },
        Err(e) => println!("   ❌ Failed to create client: {e:#}"),
    }
    println!();

    println!("{}", style("💡 Next Steps:").bold().yellow());
    println!("   • Use 'pdf-chat chat --pdf <path>' to start a conversation");
    println!("   • Use 'pdf-chat ask <question> --pdf <path>' for a one-shot answer");
    println!("   • Use 'pdf-chat config' to adjust settings");

    Ok(())
}

async fn build_pipeline(pdfs: &[PathBuf], overrides: &Overrides) -> Result<RagPipeline> {
    let mut config = Config::load()?;
    overrides.apply(&mut config);

    let spinner = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    spinner.set_message("Loading and indexing documents...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = RagPipeline::initialize(&config, pdfs, overrides.rebuild).await;
    spinner.finish_and_clear();

    match result {
        Ok(pipeline) => {
            info!("Pipeline initialized");
            Ok(pipeline)
        }
        Err(e) => {
            error!("Initialization failed: {e:#}");
            Err(e)
        }
    }
}

fn print_banner(pipeline: &RagPipeline) {
    let summary = pipeline.summary();
    println!("{}", style("📚 pdf-chat").bold().cyan());
    println!(
        "   {} file(s), {} page(s), {} chunk(s) → {} indexed entries ({})",
        summary.files,
        summary.pages,
        summary.chunks,
        summary.index_entries,
        if summary.loaded_from_disk {
            "loaded from disk"
        } else {
            "freshly indexed"
        }
    );
    println!(
        "   Embeddings: {} · Chat: {}",
        style(&summary.embed_model).cyan(),
        style(&summary.chat_model).cyan()
    );
}

/// Ask one question; per-turn failures are printed and the loop goes on
async fn ask_and_print(pipeline: &mut RagPipeline, question: &str) {
    match pipeline.ask(question).await {
        Ok(result) => print_answer(&result),
        Err(e) => {
            error!("Question failed: {e:#}");
            eprintln!("{} {e}", style("Error:").bold().red());
        }
    }
}

fn print_answer(result: &AnswerResult) {
    println!("{} {}", style("Assistant:").bold().blue(), result.answer);
    if !result.sources.is_empty() {
        println!("{}", style("Sources:").bold());
        for source in &result.sources {
            println!(
                "   [{}, page {}] {}",
                style(&source.file).cyan(),
                source.page,
                style(&source.preview).dim()
            );
        }
    }
}

fn print_history(pipeline: &RagPipeline) {
    let turns = pipeline.history();
    if turns.is_empty() {
        println!("{}", style("No conversation yet.").dim());
        return;
    }
    for turn in turns {
        let speaker = match turn.role {
            crate::providers::Role::User => style("You:").bold().green(),
            crate::providers::Role::Assistant => style("Assistant:").bold().blue(),
            crate::providers::Role::System => style("System:").bold(),
        };
        println!("{speaker} {}", turn.content);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  {}   leave the session", style("exit | quit | q").cyan());
    println!("  {}            reset conversation memory", style("clear").cyan());
    println!("  {}          print the conversation so far", style("history").cyan());
    println!("  {}             show this message", style("help").cyan());
    println!("Anything else is asked about your documents.");
}
