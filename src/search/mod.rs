
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

use crate::database::{Database, Message};
use crate::embeddings::ollama::{EmbeddingError, OllamaClient};

/// Candidates scoring at or below this floor are dropped from general search.
const SIMILARITY_FLOOR: f32 = 0.1;
/// Stricter floor for "messages similar to message X".
const SIMILAR_TO_FLOOR: f32 = 0.3;
/// Fixed result cap for "similar to", independent of the configured search cap.
const SIMILAR_TO_LIMIT: usize = 3;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("failed to generate query embedding: {0}")]
    QueryEmbedding(#[from] EmbeddingError),
    #[error("source message {0} not found")]
    MessageNotFound(i64),
    #[error("source message {0} has no embedding")]
    MissingEmbedding(i64),
    #[error("failed to retrieve messages: {0}")]
    Store(#[from] anyhow::Error),
}

/// A ranked hit. Rank is 1-based, assigned after final sorting and
/// truncation, and carries no identity across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub message: Message,
    pub similarity: f32,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub total_messages: i64,
    pub embedded_messages: i64,
}

#[derive(Debug, Clone)]
pub struct SearchEngine {
    database: Database,
    embeddings: OllamaClient,
    max_results: usize,
}

impl SearchEngine {
    #[inline]
    pub fn new(database: Database, embeddings: OllamaClient, max_results: usize) -> Self {
        Self {
            database,
            embeddings,
            max_results,
        }
    }

    /// Rank the chat's embedded messages against a free-text query.
    ///
    /// Messages whose async ingestion has not completed (or permanently
    /// failed) carry no embedding and are invisible here; an empty result
    /// list is a legitimate outcome, not an error.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        chat_id: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let query_embedding = self.embeddings.embed(query)?;

        let messages = self.database.messages_with_embeddings(chat_id).await?;
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let results = rank_messages(
            &query_embedding,
            messages,
            SIMILARITY_FLOOR,
            self.max_results,
            None,
        );

        debug!(
            "Search in chat {} matched {} of corpus",
            chat_id,
            results.len()
        );
        Ok(results)
    }

    /// Corpus size counters for UX messaging, read from the store at call
    /// time.
    #[inline]
    pub async fn search_stats(&self, chat_id: i64) -> Result<SearchStats, SearchError> {
        let total_messages = self.database.message_count(chat_id).await?;
        let embedded_messages = self.database.embedded_message_count(chat_id).await?;

        Ok(SearchStats {
            total_messages,
            embedded_messages,
        })
    }

    /// Rank messages similar to an existing message, excluding the message
    /// itself. Uses the stricter floor and a fixed cap of
    /// [`SIMILAR_TO_LIMIT`].
    #[inline]
    pub async fn similar_to(
        &self,
        message_id: i64,
        chat_id: i64,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let source = self
            .database
            .messages_by_ids(&[message_id])
            .await?
            .into_iter()
            .next()
            .ok_or(SearchError::MessageNotFound(message_id))?;

        let source_embedding = source
            .embedding
            .filter(|e| !e.is_empty())
            .ok_or(SearchError::MissingEmbedding(message_id))?;

        let messages = self.database.messages_with_embeddings(chat_id).await?;

        Ok(rank_messages(
            &source_embedding,
            messages,
            SIMILAR_TO_FLOOR,
            SIMILAR_TO_LIMIT,
            Some(message_id),
        ))
    }
}

/// Score, filter, sort, truncate, and rank a candidate corpus against a query
/// vector. Candidates scoring at or below `floor` are dropped; ties order by
/// ascending message id (implementation-defined, kept deterministic for
/// repeatability).
fn rank_messages(
    query: &[f32],
    candidates: Vec<Message>,
    floor: f32,
    cap: usize,
    exclude: Option<i64>,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|message| exclude != Some(message.id))
        .filter_map(|message| {
            let similarity = message
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(query, embedding))?;
            (similarity > floor).then(|| SearchResult {
                message,
                similarity,
                rank: 0,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.message.id.cmp(&b.message.id))
    });
    results.truncate(cap);

    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index + 1;
    }

    results
}

/// Cosine similarity between two vectors.
///
/// Defined as exactly 0.0 when the vectors differ in length or either norm is
/// zero; these are degenerate outputs, not errors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a.sqrt() * norm_b.sqrt())
}
