// Embedding generation against an external Ollama-compatible provider

pub mod ollama;
