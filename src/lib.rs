use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PdfChatError>;

#[derive(Error, Debug)]
pub enum PdfChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input path not found: {0}")]
    NotFound(PathBuf),

    #[error("Corpus produced no chunks to index")]
    EmptyCorpus,

    #[error("Persisted collection was built with embedding model '{stored}', requested '{requested}'")]
    IncompatibleIndex { stored: String, requested: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod providers;
pub mod retriever;
