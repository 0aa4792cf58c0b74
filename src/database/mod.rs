// Durable message storage
// SQLite owns the canonical copy of every message; search and ingestion only
// hold transient in-memory copies.

pub mod sqlite;

pub use sqlite::{Database, Message, MessageQueries, NewMessage};
