#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::database::Database;
use crate::embeddings::ollama::OllamaClient;
use crate::ingest::{InboundMessage, IngestPipeline};
use crate::monitor::{PerformanceMonitor, format_bytes};
use crate::search::{SearchEngine, SearchError, SearchResult};

const TEST_PHRASE: &str = "Testing semantic understanding of chat history";
const RESULT_TEXT_LIMIT: usize = 180;

/// A pre-parsed slash command from the inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats,
    Test,
    Perf,
    Search(String),
    /// `None` when the argument is missing or not a message id.
    Similar(Option<i64>),
    Unknown(String),
}

/// Parse a leading-slash command. Returns `None` for ordinary messages,
/// which belong to ingestion.
#[inline]
pub fn parse_command(text: &str) -> Option<Command> {
    let rest = text.trim().strip_prefix('/')?;
    let (name, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let args = args.trim();

    let command = match name {
        "start" => Command::Start,
        "help" => Command::Help,
        "stats" => Command::Stats,
        "test" => Command::Test,
        "perf" => Command::Perf,
        "search" => Command::Search(args.to_string()),
        "similar" => Command::Similar(args.parse().ok()),
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

/// Transport-agnostic dispatcher: routes inbound updates to ingestion or a
/// command handler and returns reply text for the caller to deliver.
#[derive(Debug, Clone)]
pub struct Bot {
    embeddings: OllamaClient,
    search: SearchEngine,
    ingest: IngestPipeline,
    monitor: PerformanceMonitor,
}

impl Bot {
    #[inline]
    pub fn new(
        database: Database,
        embeddings: OllamaClient,
        max_results: usize,
        monitor: PerformanceMonitor,
    ) -> Self {
        let search = SearchEngine::new(database.clone(), embeddings.clone(), max_results);
        let ingest = IngestPipeline::new(database, embeddings.clone(), monitor.clone());

        Self {
            embeddings,
            search,
            ingest,
            monitor,
        }
    }

    /// Handle one inbound update. Commands produce a reply; ordinary text is
    /// handed to ingestion and produces none.
    #[inline]
    pub async fn handle_update(&self, inbound: InboundMessage) -> Option<String> {
        if inbound.text.is_empty() {
            return None;
        }

        if let Some(command) = parse_command(&inbound.text) {
            info!(
                "Command {:?} from user {} in chat {}",
                command, inbound.user_id, inbound.chat_id
            );
            return Some(self.handle_command(command, &inbound).await);
        }

        self.ingest.ingest(inbound);
        None
    }

    async fn handle_command(&self, command: Command, inbound: &InboundMessage) -> String {
        match command {
            Command::Start => start_text(),
            Command::Help => help_text(),
            Command::Stats => self.handle_stats(inbound.chat_id).await,
            Command::Test => self.handle_test(),
            Command::Perf => self.handle_perf(),
            Command::Search(query) => self.handle_search(&query, inbound.chat_id).await,
            Command::Similar(Some(id)) => self.handle_similar(id, inbound.chat_id).await,
            Command::Similar(None) => {
                "Usage: /similar <message id>\n\
                 Finds stored messages close in meaning to an existing one."
                    .to_string()
            }
            Command::Unknown(name) => format!("Unknown command: /{name}"),
        }
    }

    async fn handle_stats(&self, chat_id: i64) -> String {
        let stats = match self.search.search_stats(chat_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Error getting stats: {}", e);
                return "Couldn't retrieve statistics right now. Please try again.".to_string();
            }
        };

        let readiness =
            stats.embedded_messages as f64 / stats.total_messages.max(1) as f64 * 100.0;

        format!(
            "Learning progress for this chat\n\
             \n\
             Messages collected: {}\n\
             Messages searchable: {}\n\
             Search readiness: {:.1}%\n\
             \n\
             Status: {}\n\
             {}\n\
             \n\
             Model: {}",
            stats.total_messages,
            stats.embedded_messages,
            readiness,
            readiness_status(readiness),
            quality_tip(stats.embedded_messages),
            self.embeddings.model(),
        )
    }

    fn handle_test(&self) -> String {
        let started = Instant::now();
        let result = self.embeddings.embed(TEST_PHRASE);
        let elapsed = started.elapsed();

        match result {
            Ok(embedding) => format!(
                "Connection test passed\n\
                 \n\
                 Response time: {}\n\
                 Embedding dimensions: {}\n\
                 Model: {}\n\
                 Service: {}",
                format_duration(elapsed),
                embedding.len(),
                self.embeddings.model(),
                self.embeddings.base_url(),
            ),
            Err(e) => format!(
                "Connection test failed: {e}\n\
                 \n\
                 Make sure the embedding service is running (ollama serve) and \
                 the model is installed (ollama pull {}).",
                self.embeddings.model(),
            ),
        }
    }

    fn handle_perf(&self) -> String {
        let snapshot = self.monitor.snapshot();

        let render = |avg: Option<Duration>| {
            avg.map_or_else(|| "no data yet".to_string(), format_duration)
        };

        format!(
            "Performance\n\
             \n\
             Search average: {}\n\
             Embedding average: {} (runs in the background)\n\
             Memory usage: {}",
            render(snapshot.search_avg),
            render(snapshot.embedding_avg),
            snapshot
                .memory_bytes
                .map_or_else(|| "unknown".to_string(), format_bytes),
        )
    }

    async fn handle_search(&self, query: &str, chat_id: i64) -> String {
        if query.trim().is_empty() {
            return search_usage_text();
        }

        let started = Instant::now();
        let result = self.search.search(query, chat_id).await;
        let elapsed = started.elapsed();
        self.monitor.record_search_time(elapsed);

        let results = match result {
            Ok(results) => results,
            Err(e) => {
                warn!("Search error: {}", e);
                return format!(
                    "Search failed: {e}\n\
                     Try /test to verify the embedding service, or /stats to \
                     check how much of this chat is searchable."
                );
            }
        };

        if results.is_empty() {
            return self.no_results_text(query, chat_id).await;
        }

        info!(
            "Search completed: query='{}', results={}, duration={:?}, chat={}",
            query,
            results.len(),
            elapsed,
            chat_id
        );
        format_search_results(query, &results, elapsed)
    }

    async fn handle_similar(&self, message_id: i64, chat_id: i64) -> String {
        let results = match self.search.similar_to(message_id, chat_id).await {
            Ok(results) => results,
            Err(e @ (SearchError::MessageNotFound(_) | SearchError::MissingEmbedding(_))) => {
                return format!("Can't look that message up: {e}");
            }
            Err(e) => {
                warn!("Similar-to error: {}", e);
                return format!("Lookup failed: {e}");
            }
        };

        if results.is_empty() {
            return "No sufficiently similar messages found.".to_string();
        }

        let mut reply = format!(
            "Found {} message{} similar to #{message_id}\n\n",
            results.len(),
            plural(results.len()),
        );
        for result in &results {
            reply.push_str(&format_result_entry(result));
        }
        reply
    }

    async fn no_results_text(&self, query: &str, chat_id: i64) -> String {
        let embedded = self
            .search
            .search_stats(chat_id)
            .await
            .map(|stats| stats.embedded_messages)
            .unwrap_or(0);

        let suggestion = if embedded < 10 {
            "I need more conversations to learn from. Keep chatting and try again soon."
        } else if embedded < 50 {
            "Try broader terms or different keywords; this chat's corpus is still small."
        } else {
            "Try rephrasing the search. Sometimes a slight change in wording helps."
        };

        format!(
            "No matching conversations found for \"{query}\".\n\
             \n\
             Messages searchable in this chat: {embedded}\n\
             {suggestion}"
        )
    }
}

fn start_text() -> String {
    "Hi! I index this chat's messages by meaning, not just keywords.\n\
     \n\
     Just chat normally; messages become searchable automatically. When you \
     need to find something, use /search <your question>.\n\
     \n\
     See /help for the full command list."
        .to_string()
}

fn help_text() -> String {
    "Commands\n\
     \n\
     /search <query>  find past conversations by meaning\n\
     /similar <id>    find messages similar to a stored one\n\
     /stats           how much of this chat is searchable\n\
     /test            check the embedding service connection\n\
     /perf            latency and memory figures\n\
     \n\
     Natural-language queries work best: \"when is the team meeting\" will \
     match scheduling talk even when the words differ."
        .to_string()
}

fn search_usage_text() -> String {
    "Usage: /search <your question or keywords>\n\
     \n\
     Examples:\n\
     /search meeting next week\n\
     /search bug in the API\n\
     /search restaurant recommendation\n\
     \n\
     Queries are matched by meaning, so natural language works well."
        .to_string()
}

fn format_search_results(query: &str, results: &[SearchResult], elapsed: Duration) -> String {
    let mut reply = format!(
        "Found {} relevant conversation{}\n\
         Search: \"{}\" ({})\n\n",
        results.len(),
        plural(results.len()),
        query,
        format_duration(elapsed),
    );

    for result in results {
        reply.push_str(&format_result_entry(result));
    }

    reply.push_str("Results are ranked by relevance. Different keywords may surface more.");
    reply
}

fn format_result_entry(result: &SearchResult) -> String {
    let time = result.message.timestamp.format("%b %-d at %H:%M");
    format!(
        "{}. {:.0}% match — {} on {}\n   {}\n\n",
        result.rank,
        result.similarity * 100.0,
        display_name(result.message.username.as_deref()),
        time,
        truncate_text(&result.message.text, RESULT_TEXT_LIMIT),
    )
}

/// Presentation fallback for authors with no username.
#[inline]
pub fn display_name(username: Option<&str>) -> &str {
    match username {
        Some(name) if !name.is_empty() => name,
        _ => "Anonymous",
    }
}

/// Truncate on a char boundary, preferring a sentence end in the last fifth
/// of the window.
fn truncate_text(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_string();
    }

    let window_start = limit.saturating_sub(limit / 5);
    let cutoff = (window_start..limit)
        .find(|&i| matches!(chars[i], '.' | '!' | '?'))
        .map_or(limit, |i| i + 1);

    let mut truncated: String = chars.into_iter().take(cutoff).collect();
    truncated.push_str("...");
    truncated
}

#[inline]
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn readiness_status(percent: f64) -> &'static str {
    if percent >= 80.0 {
        "excellent — ready for good search results"
    } else if percent >= 50.0 {
        "good — search quality improving as messages are processed"
    } else if percent >= 10.0 {
        "getting started — keep chatting for better results"
    } else {
        "just beginning — more messages needed"
    }
}

fn quality_tip(embedded: i64) -> &'static str {
    if embedded >= 100 {
        "Excellent search quality expected."
    } else if embedded >= 50 {
        "Good search quality; results should be relevant."
    } else if embedded >= 20 {
        "Fair search quality, improving with more messages."
    } else if embedded >= 5 {
        "Basic search available; quality will improve."
    } else {
        "More messages are needed for meaningful results."
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
