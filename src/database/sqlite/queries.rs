use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::database::sqlite::models::{Message, MessageRow, NewMessage};

pub struct MessageQueries;

impl MessageQueries {
    /// Persist a message, with or without an embedding. This is the single
    /// durable write of the ingestion path.
    #[inline]
    pub async fn create(pool: &SqlitePool, new_message: NewMessage) -> Result<Message> {
        let embedding_json = new_message
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode embedding")?;

        let id = sqlx::query(
            "INSERT INTO messages (chat_id, user_id, username, text, timestamp, embedding) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_message.chat_id)
        .bind(new_message.user_id)
        .bind(&new_message.username)
        .bind(&new_message.text)
        .bind(new_message.timestamp)
        .bind(embedding_json)
        .execute(pool)
        .await
        .context("Failed to save message")?
        .last_insert_rowid();

        debug!(
            "Saved message {} in chat {} ({} embedding)",
            id,
            new_message.chat_id,
            if new_message.embedding.is_some() {
                "with"
            } else {
                "without"
            }
        );

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve saved message"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, user_id, username, text, timestamp, embedding \
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get message by id")?;

        Ok(row.map(MessageRow::into_message))
    }

    #[inline]
    pub async fn get_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, chat_id, user_id, username, text, timestamp, embedding \
             FROM messages WHERE id IN ({placeholders}) ORDER BY timestamp DESC"
        );

        let mut query = sqlx::query_as::<_, MessageRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(pool)
            .await
            .context("Failed to get messages by ids")?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    #[inline]
    pub async fn count_for_chat(pool: &SqlitePool, chat_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(pool)
            .await
            .context("Failed to count messages")?;

        Ok(count)
    }

    #[inline]
    pub async fn count_embedded_for_chat(pool: &SqlitePool, chat_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE chat_id = ? AND embedding IS NOT NULL AND embedding != ''",
        )
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .context("Failed to count embedded messages")?;

        Ok(count)
    }

    /// Load every message in the chat that carries a decodable embedding.
    /// Rows whose embedding column fails to decode are skipped, not fatal.
    #[inline]
    pub async fn list_embedded_for_chat(pool: &SqlitePool, chat_id: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, user_id, username, text, timestamp, embedding \
             FROM messages \
             WHERE chat_id = ? AND embedding IS NOT NULL AND embedding != '' \
             ORDER BY timestamp DESC",
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .context("Failed to query messages with embeddings")?;

        Ok(rows
            .into_iter()
            .filter_map(MessageRow::into_embedded_message)
            .collect())
    }
}
