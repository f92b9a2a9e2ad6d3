use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LegalError>;

#[derive(Error, Debug)]
pub enum LegalError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Source table not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Index is not loaded; build the corpus first")]
    NotReady,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding space mismatch: {0}")]
    EmbeddingMismatch(String),

    #[error("Generation error: {0}")]
    Generation(#[from] generation::GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod retrieval;
