use super::*;
use crate::config::OllamaConfig;
use crate::database::NewMessage;
use chrono::NaiveDate;
use tempfile::TempDir;

fn offline_client() -> OllamaClient {
    let config = OllamaConfig {
        host: "192.0.2.1".to_string(),
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("can create client")
        .with_timeout(Duration::from_secs(1))
}

async fn create_test_bot() -> (TempDir, Bot, Database) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("can create database");
    let bot = Bot::new(
        database.clone(),
        offline_client(),
        3,
        PerformanceMonitor::new(),
    );
    (temp_dir, bot, database)
}

fn update(text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: 42,
        user_id: 1001,
        username: Some("alice".to_string()),
        text: text.to_string(),
        timestamp: 1_717_243_200,
    }
}

#[test]
fn command_parsing() {
    assert_eq!(parse_command("/start"), Some(Command::Start));
    assert_eq!(parse_command("/help"), Some(Command::Help));
    assert_eq!(parse_command("  /stats  "), Some(Command::Stats));
    assert_eq!(
        parse_command("/search meeting next week"),
        Some(Command::Search("meeting next week".to_string()))
    );
    assert_eq!(parse_command("/search"), Some(Command::Search(String::new())));
    assert_eq!(parse_command("/similar 17"), Some(Command::Similar(Some(17))));
    assert_eq!(parse_command("/similar seventeen"), Some(Command::Similar(None)));
    assert_eq!(parse_command("/similar"), Some(Command::Similar(None)));
    assert_eq!(
        parse_command("/frobnicate"),
        Some(Command::Unknown("frobnicate".to_string()))
    );

    assert_eq!(parse_command("plain chatter"), None);
    assert_eq!(parse_command(""), None);
}

#[test]
fn display_name_falls_back_to_anonymous() {
    assert_eq!(display_name(Some("alice")), "alice");
    assert_eq!(display_name(Some("")), "Anonymous");
    assert_eq!(display_name(None), "Anonymous");
}

#[test]
fn truncation_respects_char_boundaries_and_sentences() {
    let short = "short message";
    assert_eq!(truncate_text(short, 180), short);

    let long = "a".repeat(300);
    let truncated = truncate_text(&long, 180);
    assert_eq!(truncated.chars().count(), 183); // 180 + "..."
    assert!(truncated.ends_with("..."));

    // A sentence end inside the tail window becomes the cutoff.
    let sentence = format!("{} End.{}", "b".repeat(160), "c".repeat(100));
    let truncated = truncate_text(&sentence, 180);
    assert!(truncated.ends_with("End...."));

    // Multi-byte chars must not split.
    let emoji = "é".repeat(200);
    let truncated = truncate_text(&emoji, 180);
    assert!(truncated.ends_with("..."));
}

#[test]
fn duration_formatting() {
    assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
}

#[tokio::test]
async fn plain_text_is_ingested_with_no_reply() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot.handle_update(update("remember to buy milk")).await;
    assert_eq!(reply, None);
}

#[tokio::test]
async fn empty_text_is_dropped() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot.handle_update(update("")).await;
    assert_eq!(reply, None);
}

#[tokio::test]
async fn stats_command_reports_corpus_counts() {
    let (_temp_dir, bot, database) = create_test_bot().await;

    database
        .save_message(NewMessage {
            chat_id: 42,
            user_id: 1001,
            username: Some("alice".to_string()),
            text: "an embedded message".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .expect("valid date")
                .and_hms_opt(12, 0, 0)
                .expect("valid time"),
            embedding: Some(vec![1.0, 0.0]),
        })
        .await
        .expect("can save message");

    let reply = bot
        .handle_update(update("/stats"))
        .await
        .expect("stats produces a reply");

    assert!(reply.contains("Messages collected: 1"));
    assert!(reply.contains("Messages searchable: 1"));
    assert!(reply.contains("100.0%"));
}

#[tokio::test]
async fn unknown_command_is_named_in_the_reply() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot
        .handle_update(update("/frobnicate"))
        .await
        .expect("unknown command produces a reply");
    assert_eq!(reply, "Unknown command: /frobnicate");
}

#[tokio::test]
async fn search_without_query_returns_usage() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot
        .handle_update(update("/search"))
        .await
        .expect("usage reply");
    assert!(reply.starts_with("Usage: /search"));
}

#[tokio::test]
async fn similar_with_bad_argument_returns_usage() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot
        .handle_update(update("/similar not-a-number"))
        .await
        .expect("usage reply");
    assert!(reply.starts_with("Usage: /similar"));
}

#[tokio::test]
async fn similar_with_unknown_id_reports_the_failure() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot
        .handle_update(update("/similar 9999"))
        .await
        .expect("error reply");
    assert!(reply.contains("not found"));
}

#[tokio::test]
async fn perf_command_works_with_empty_windows() {
    let (_temp_dir, bot, _database) = create_test_bot().await;

    let reply = bot
        .handle_update(update("/perf"))
        .await
        .expect("perf produces a reply");
    assert!(reply.contains("no data yet"));
}
