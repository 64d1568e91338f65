#[cfg(test)]
mod tests;

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{
    Config, ConfigError, DEFAULT_OLLAMA_CHAT_MODEL, DEFAULT_OPENAI_CHAT_MODEL, LlmConfig,
    MAX_TOP_K, OllamaConfig, Provider,
};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 pdf-chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config();

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Chat Model Configuration").bold().yellow());
    eprintln!();

    configure_llm(&mut config.llm)?;

    eprintln!();
    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question (top_k)")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), String> {
            if (1..=MAX_TOP_K).contains(input) {
                Ok(())
            } else {
                Err(format!("top_k must be between 1 and {MAX_TOP_K}"))
            }
        })
        .interact_text()?;
    config.retrieval.top_k = top_k;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());

        let config_path = Config::config_file_path().context("Failed to get config file path")?;
        eprintln!(
            "Configuration saved to: {}",
            style(config_path.display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} tokens",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!("  Overlap: {} tokens", style(config.chunking.overlap).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Chat Model:").bold().yellow());
    eprintln!("  Provider: {}", style(config.llm.provider).cyan());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    eprintln!("  Temperature: {}", style(config.llm.temperature).cyan());
    eprintln!("  Timeout: {}s", style(config.llm.timeout_secs).cyan());
    if let Some(api_base) = &config.llm.api_base {
        eprintln!("  API Base: {}", style(api_base).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama.url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Memory:").bold().yellow());
    eprintln!("  Token Limit: {}", style(config.memory.token_limit).cyan());

    eprintln!();
    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!(
        "  Persist Dir: {}",
        style(config.storage.persist_dir.display()).cyan()
    );

    let config_path = Config::config_file_path().context("Failed to get config file path")?;
    eprintln!();
    eprintln!("Config file: {}", style(config_path.display()).dim());

    Ok(())
}

fn load_existing_config() -> Config {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::default()
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    ollama.protocol = protocols[protocol_index].to_string();

    ollama.host = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Host cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.port = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.embedding_model = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.batch_size = Input::new()
        .with_prompt("Embedding batch size")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            if *input == 0 || *input > 1000 {
                Err(ConfigError::InvalidBatchSize(*input))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let providers = &["ollama (local inference)", "openai (cloud API)"];
    let default_index = match llm.provider {
        Provider::Ollama => 0,
        Provider::OpenAi => 1,
    };

    let provider_index = Select::new()
        .with_prompt("Chat provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    let selected = if provider_index == 0 {
        Provider::Ollama
    } else {
        Provider::OpenAi
    };

    // Switching providers also switches the model default; an unchanged
    // provider keeps whatever model was configured before.
    if selected != llm.provider {
        llm.model = default_model_for(selected).to_string();
    }
    llm.provider = selected;

    if llm.provider == Provider::OpenAi && std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!(
            "{}",
            style("⚠ OPENAI_API_KEY is not set; set it before asking questions.").yellow()
        );
    }

    llm.model = Input::new()
        .with_prompt("Chat model")
        .default(llm.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    llm.temperature = Input::new()
        .with_prompt("Temperature (0.0-1.0)")
        .default(llm.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 1.0")
            }
        })
        .interact_text()?;

    Ok(())
}

pub(crate) fn default_model_for(provider: Provider) -> &'static str {
    match provider {
        Provider::Ollama => DEFAULT_OLLAMA_CHAT_MODEL,
        Provider::OpenAi => DEFAULT_OPENAI_CHAT_MODEL,
    }
}

/// Quick reachability probe against the Ollama tags endpoint
fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let Ok(base_url) = ollama.url() else {
        return false;
    };
    let Ok(url) = base_url.join("/api/tags") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    agent.get(url.as_str()).call().is_ok()
}
