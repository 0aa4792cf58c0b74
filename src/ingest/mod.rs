
use anyhow::{Context, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::database::{Database, Message, NewMessage};
use crate::embeddings::ollama::OllamaClient;
use crate::monitor::PerformanceMonitor;

/// Cleaned messages shorter than this are noise: never stored, never
/// embedded.
const MIN_MESSAGE_CHARS: usize = 3;

/// An inbound chat message as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub text: String,
    /// Unix timestamp (seconds) of when the message was authored.
    pub timestamp: i64,
}

/// Collapse runs of whitespace to single spaces and trim the ends. Cleaning
/// happens once, before any other processing.
#[inline]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean and validate an inbound message. Returns `None` for messages too
/// short to be worth storing.
#[inline]
pub fn prepare(inbound: InboundMessage) -> Option<NewMessage> {
    let text = clean_text(&inbound.text);
    if text.chars().count() < MIN_MESSAGE_CHARS {
        return None;
    }

    let timestamp = DateTime::from_timestamp(inbound.timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .naive_utc();

    Some(NewMessage {
        chat_id: inbound.chat_id,
        user_id: inbound.user_id,
        username: inbound.username,
        text,
        timestamp,
        embedding: None,
    })
}

/// Fire-and-forget enrichment of inbound messages with embeddings.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    database: Database,
    embeddings: OllamaClient,
    monitor: PerformanceMonitor,
}

impl IngestPipeline {
    #[inline]
    pub fn new(
        database: Database,
        embeddings: OllamaClient,
        monitor: PerformanceMonitor,
    ) -> Self {
        Self {
            database,
            embeddings,
            monitor,
        }
    }

    /// Schedule ingestion of one message. Returns immediately; the embedding
    /// fetch and the durable write happen on a detached task, observed only
    /// through the store and the performance counters.
    ///
    /// Returns whether a task was scheduled (noise messages are dropped
    /// before any write).
    #[inline]
    pub fn ingest(&self, inbound: InboundMessage) -> bool {
        let Some(message) = prepare(inbound) else {
            debug!("Dropping message below minimum length");
            return false;
        };

        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.process(message).await {
                error!("Failed to save ingested message: {}", e);
            }
        });

        true
    }

    /// Ingest one message and wait for the durable write; used by one-shot
    /// callers. Returns `None` when the message is dropped as noise.
    #[inline]
    pub async fn ingest_and_wait(&self, inbound: InboundMessage) -> Result<Option<Message>> {
        match prepare(inbound) {
            Some(message) => Ok(Some(self.process(message).await?)),
            None => Ok(None),
        }
    }

    /// Embed, record the latency, and issue the single durable write.
    async fn process(&self, mut message: NewMessage) -> Result<Message> {
        let started = Instant::now();

        let text = message.text.clone();
        let embeddings = self.embeddings.clone();
        let embed_result = tokio::task::spawn_blocking(move || embeddings.embed(&text)).await;

        // Latency is recorded win or lose.
        let elapsed = started.elapsed();
        self.monitor.record_embedding_time(elapsed);

        match embed_result {
            Ok(Ok(vector)) => {
                let dimensions = vector.len();
                message.embedding = Some(vector);
                debug!(
                    "Embedded message in chat {} ({} dims, {:?})",
                    message.chat_id, dimensions, elapsed
                );
            }
            Ok(Err(e)) => {
                // Not retried; the message is still persisted and simply
                // stays invisible to search.
                warn!("Failed to generate embedding for message: {}", e);
            }
            Err(e) => {
                warn!("Embedding task did not complete: {}", e);
            }
        }

        self.database
            .save_message(message)
            .await
            .context("Failed to persist ingested message")
    }
}
