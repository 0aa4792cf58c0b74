use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecallError>;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embeddings::ollama::EmbeddingError),

    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod bot;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod ingest;
pub mod monitor;
pub mod search;
