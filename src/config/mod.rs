// Configuration management module
// Handles TOML settings plus the interactive setup flow

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChunkingConfig, Config, ConfigError, DEFAULT_OLLAMA_CHAT_MODEL, DEFAULT_OPENAI_CHAT_MODEL,
    LlmConfig, MAX_TOP_K, MemoryConfig, OllamaConfig, Provider, RetrievalConfig, StorageConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
