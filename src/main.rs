use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pdf_chat::Result;
use pdf_chat::commands::{Overrides, ask_once, run_chat, show_status};
use pdf_chat::config::{Provider, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "pdf-chat")]
#[command(about = "Chat with your PDF documents using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session over one or more PDFs
    Chat {
        /// PDF files or directories to load (directories are searched recursively)
        #[arg(long = "pdf", required = true, num_args = 1..)]
        pdfs: Vec<PathBuf>,
        /// Run three sample questions before handing over the prompt
        #[arg(long)]
        demo: bool,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Ask a single question and print the answer with sources
    Ask {
        /// The question to ask
        question: String,
        /// PDF files or directories to load (directories are searched recursively)
        #[arg(long = "pdf", required = true, num_args = 1..)]
        pdfs: Vec<PathBuf>,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Show the persisted collection, Ollama connectivity, and config location
    Status {
        /// Inspect a collection stored somewhere other than the configured directory
        #[arg(long)]
        persist_dir: Option<PathBuf>,
    },
    /// Configure chat provider, models, and chunking settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Per-run configuration overrides shared by `chat` and `ask`
#[derive(Args)]
struct OverrideArgs {
    /// Chat backend: 'ollama' or 'openai'
    #[arg(long)]
    provider: Option<Provider>,
    /// Chat model name (defaults to the provider's default model)
    #[arg(long)]
    model: Option<String>,
    /// Number of chunks retrieved per question (1-20)
    #[arg(long)]
    top_k: Option<usize>,
    /// Maximum chunk size in estimated tokens
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Overlap between consecutive chunks in estimated tokens
    #[arg(long)]
    overlap: Option<usize>,
    /// Sampling temperature for the chat model (0.0-1.0)
    #[arg(long)]
    temperature: Option<f32>,
    /// Directory for the persisted vector collection
    #[arg(long)]
    persist_dir: Option<PathBuf>,
    /// Re-embed the corpus even if a compatible collection is persisted
    #[arg(long)]
    rebuild: bool,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            provider: args.provider,
            model: args.model,
            top_k: args.top_k,
            chunk_size: args.chunk_size,
            overlap: args.overlap,
            temperature: args.temperature,
            persist_dir: args.persist_dir,
            rebuild: args.rebuild,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            pdfs,
            demo,
            overrides,
        } => {
            run_chat(pdfs, demo, overrides.into()).await?;
        }
        Commands::Ask {
            question,
            pdfs,
            overrides,
        } => {
            ask_once(&question, pdfs, overrides.into()).await?;
        }
        Commands::Status { persist_dir } => {
            show_status(persist_dir).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
    }

    Ok(())
}
