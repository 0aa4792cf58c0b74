use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bot::{Bot, display_name, format_duration};
use crate::config::Config;
use crate::database::Database;
use crate::embeddings::ollama::OllamaClient;
use crate::ingest::{InboundMessage, IngestPipeline};
use crate::monitor::{PerformanceMonitor, REPORT_INTERVAL};
use crate::search::SearchEngine;

async fn open_database(config: &Config) -> Result<Database> {
    Database::initialize_from_config_dir(&config.base_dir)
        .await
        .context("Failed to initialize database")
}

fn embedding_client(config: &Config) -> Result<OllamaClient> {
    OllamaClient::new(&config.ollama).context("Failed to create embedding client")
}

/// Show the active configuration, or write the defaults to disk.
#[inline]
pub fn configure(show: bool) -> Result<()> {
    let config = Config::load_default()?;

    if show {
        println!("Config file: {}", config.config_file_path().display());
        println!("Database: {}", config.database_path().display());
        println!();
        let rendered =
            toml::to_string_pretty(&config).context("Failed to render configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    config.save()?;
    println!("Wrote configuration to {}", config.config_file_path().display());
    println!("Edit the file to change the embedding service or search settings.");
    Ok(())
}

/// One-shot connectivity check against the embedding provider.
#[inline]
pub fn test_connection() -> Result<()> {
    let config = Config::load_default()?;
    let client = embedding_client(&config)?;

    println!(
        "Testing embedding service at {} (model {})...",
        client.base_url(),
        client.model()
    );

    match client.test_connection() {
        Ok(()) => {
            println!("✅ Embedding service connected successfully");
            Ok(())
        }
        Err(e) => {
            println!("❌ Connection test failed: {e}");
            println!("Make sure Ollama is running: ollama serve");
            println!("And the model is available: ollama pull {}", config.ollama.model);
            Err(e.into())
        }
    }
}

/// Store one message, waiting for the embedding attempt to resolve.
#[inline]
pub async fn ingest_message(
    chat_id: i64,
    user_id: i64,
    username: Option<String>,
    text: String,
) -> Result<()> {
    let config = Config::load_default()?;
    let database = open_database(&config).await?;
    let client = embedding_client(&config)?;
    let pipeline = IngestPipeline::new(database, client, PerformanceMonitor::new());

    let inbound = InboundMessage {
        chat_id,
        user_id,
        username,
        text,
        timestamp: chrono::Utc::now().timestamp(),
    };

    match pipeline.ingest_and_wait(inbound).await? {
        Some(message) => {
            println!(
                "Stored message {} in chat {} ({})",
                message.id,
                message.chat_id,
                if message.has_embedding() {
                    "embedded"
                } else {
                    "no embedding; it will stay invisible to search"
                }
            );
        }
        None => {
            println!("Message dropped: fewer than 3 characters after cleaning.");
        }
    }
    Ok(())
}

/// Search a chat's history and print the ranked results.
#[inline]
pub async fn search(query: String, chat_id: i64) -> Result<()> {
    let config = Config::load_default()?;
    let database = open_database(&config).await?;
    let client = embedding_client(&config)?;
    let engine = SearchEngine::new(database, client, config.search.max_results);

    let started = std::time::Instant::now();
    let results = engine.search(&query, chat_id).await?;
    let elapsed = started.elapsed();

    if results.is_empty() {
        let stats = engine.search_stats(chat_id).await?;
        println!("No matching conversations found for \"{query}\".");
        println!(
            "Chat {} has {} message(s), {} searchable.",
            chat_id, stats.total_messages, stats.embedded_messages
        );
        return Ok(());
    }

    println!(
        "Found {} result(s) in {}:",
        results.len(),
        format_duration(elapsed)
    );
    for result in &results {
        print_result(result);
    }
    Ok(())
}

/// Print messages similar to an already-stored message.
#[inline]
pub async fn similar(message_id: i64, chat_id: i64) -> Result<()> {
    let config = Config::load_default()?;
    let database = open_database(&config).await?;
    let client = embedding_client(&config)?;
    let engine = SearchEngine::new(database, client, config.search.max_results);

    let results = engine.similar_to(message_id, chat_id).await?;

    if results.is_empty() {
        println!("No sufficiently similar messages found.");
        return Ok(());
    }

    println!("Messages similar to #{message_id}:");
    for result in &results {
        print_result(result);
    }
    Ok(())
}

fn print_result(result: &crate::search::SearchResult) {
    println!(
        "{}. [{:.0}% match] {} on {}",
        result.rank,
        result.similarity * 100.0,
        display_name(result.message.username.as_deref()),
        result.message.timestamp.format("%Y-%m-%d %H:%M"),
    );
    println!("   {}", result.message.text);
}

/// Print corpus statistics for one chat.
#[inline]
pub async fn stats(chat_id: i64) -> Result<()> {
    let config = Config::load_default()?;
    let database = open_database(&config).await?;
    let client = embedding_client(&config)?;
    let engine = SearchEngine::new(database, client, config.search.max_results);

    let stats = engine.search_stats(chat_id).await?;
    let readiness =
        stats.embedded_messages as f64 / stats.total_messages.max(1) as f64 * 100.0;

    println!("Chat {chat_id}");
    println!("  Messages collected: {}", stats.total_messages);
    println!("  Messages searchable: {}", stats.embedded_messages);
    println!("  Search readiness: {readiness:.1}%");
    Ok(())
}

/// Run the bot loop: newline-delimited JSON updates on stdin, one handler
/// task per update, replies on stdout.
#[inline]
pub async fn serve() -> Result<()> {
    let config = Config::load_default()?;
    let database = open_database(&config).await?;
    let client = embedding_client(&config)?;
    let monitor = PerformanceMonitor::new();
    let bot = Arc::new(Bot::new(
        database,
        client.clone(),
        config.search.max_results,
        monitor.clone(),
    ));

    info!("Starting chat-recall");
    info!("Embedding model: {}", config.ollama.model);
    info!("Embedding API: {}", client.base_url());
    info!("Max search results: {}", config.search.max_results);

    // Startup connectivity self-test; informative, never fatal.
    {
        let probe = client.clone();
        tokio::task::spawn_blocking(move || match probe.test_connection() {
            Ok(()) => info!("✅ Embedding service connected successfully"),
            Err(e) => {
                warn!("⚠️  Embedding service connection failed: {}", e);
                warn!("💡 Make sure Ollama is running: ollama serve");
                warn!("💡 And the model is available: ollama pull {}", probe.model());
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = monitor.spawn_reporter(REPORT_INTERVAL, shutdown_rx);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read update from stdin")? else {
                    info!("Input stream closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<InboundMessage>(&line) {
                    Ok(update) => {
                        // One detached task per inbound update; in-flight
                        // ingestion is abandoned at process shutdown.
                        let bot = Arc::clone(&bot);
                        tokio::spawn(async move {
                            if let Some(reply) = bot.handle_update(update).await {
                                println!("{reply}");
                            }
                        });
                    }
                    Err(e) => warn!("Ignoring malformed update: {}", e),
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = reporter.await;

    info!("Stopped");
    Ok(())
}
