
pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

pub use models::{Message, NewMessage};
pub use queries::MessageQueries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("messages.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(db_path).await
    }

    // Message operations

    pub async fn save_message(&self, message: NewMessage) -> Result<Message> {
        MessageQueries::create(&self.pool, message).await
    }

    pub async fn message_count(&self, chat_id: i64) -> Result<i64> {
        MessageQueries::count_for_chat(&self.pool, chat_id).await
    }

    pub async fn embedded_message_count(&self, chat_id: i64) -> Result<i64> {
        MessageQueries::count_embedded_for_chat(&self.pool, chat_id).await
    }

    pub async fn messages_with_embeddings(&self, chat_id: i64) -> Result<Vec<Message>> {
        MessageQueries::list_embedded_for_chat(&self.pool, chat_id).await
    }

    pub async fn messages_by_ids(&self, ids: &[i64]) -> Result<Vec<Message>> {
        MessageQueries::get_by_ids(&self.pool, ids).await
    }
}
