use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

/// A stored chat message, the unit of retrieval.
///
/// `embedding` is `None` until async ingestion attaches a vector; messages
/// without one are invisible to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: NaiveDateTime,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: NaiveDateTime,
    pub embedding: Option<Vec<f32>>,
}

impl Message {
    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Raw row shape: the embedding column holds a JSON array of floats.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: NaiveDateTime,
    pub embedding: Option<String>,
}

impl MessageRow {
    /// Decode into a `Message`, degrading a malformed embedding column to
    /// `None` with a warning.
    pub(crate) fn into_message(self) -> Message {
        let embedding = match self.embedding.as_deref() {
            None | Some("") => None,
            Some(json) => match serde_json::from_str(json) {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!("Failed to decode embedding for message {}: {}", self.id, e);
                    None
                }
            },
        };

        Message {
            id: self.id,
            chat_id: self.chat_id,
            user_id: self.user_id,
            username: self.username,
            text: self.text,
            timestamp: self.timestamp,
            embedding,
        }
    }

    /// Decode a row from the embedded-corpus query. A malformed embedding
    /// disqualifies the row entirely rather than aborting the bulk read.
    pub(crate) fn into_embedded_message(self) -> Option<Message> {
        let message = self.into_message();
        if message.has_embedding() {
            Some(message)
        } else {
            None
        }
    }
}
