use clap::{Parser, Subcommand};
use chat_recall::Result;
use chat_recall::commands::{configure, ingest_message, search, serve, similar, stats, test_connection};

#[derive(Parser)]
#[command(name = "chat-recall")]
#[command(about = "Semantic search over group chat history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Store a single message (waits for the embedding attempt)
    Ingest {
        /// Chat the message belongs to
        #[arg(long)]
        chat: i64,
        /// Numeric id of the author
        #[arg(long)]
        user: i64,
        /// Display name of the author
        #[arg(long)]
        username: Option<String>,
        /// Message text
        text: String,
    },
    /// Search a chat's history by meaning
    Search {
        /// Free-text query
        query: String,
        /// Chat to search in
        #[arg(long)]
        chat: i64,
    },
    /// Find messages similar to a stored message
    Similar {
        /// Id of the source message
        message_id: i64,
        /// Chat to search in
        #[arg(long)]
        chat: i64,
    },
    /// Show corpus statistics for a chat
    Stats {
        /// Chat to report on
        #[arg(long)]
        chat: i64,
    },
    /// Check connectivity to the embedding service
    Test,
    /// Run the bot loop on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            configure(show)?;
        }
        Commands::Ingest {
            chat,
            user,
            username,
            text,
        } => {
            ingest_message(chat, user, username, text).await?;
        }
        Commands::Search { query, chat } => {
            search(query, chat).await?;
        }
        Commands::Similar { message_id, chat } => {
            similar(message_id, chat).await?;
        }
        Commands::Stats { chat } => {
            stats(chat).await?;
        }
        Commands::Test => {
            test_connection()?;
        }
        Commands::Serve => {
            serve().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["chat-recall", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Serve);
        }
    }

    #[test]
    fn search_command_with_chat() {
        let cli = Cli::try_parse_from(["chat-recall", "search", "lunch plans", "--chat", "42"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, chat } = parsed.command {
                assert_eq!(query, "lunch plans");
                assert_eq!(chat, 42);
            }
        }
    }

    #[test]
    fn search_requires_chat() {
        let cli = Cli::try_parse_from(["chat-recall", "search", "lunch plans"]);
        assert!(cli.is_err());
    }

    #[test]
    fn ingest_command_with_username() {
        let cli = Cli::try_parse_from([
            "chat-recall",
            "ingest",
            "--chat",
            "42",
            "--user",
            "1001",
            "--username",
            "alice",
            "see you at noon",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                chat,
                user,
                username,
                text,
            } = parsed.command
            {
                assert_eq!(chat, 42);
                assert_eq!(user, 1001);
                assert_eq!(username, Some("alice".to_string()));
                assert_eq!(text, "see you at noon");
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["chat-recall", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["chat-recall", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
