//! # Arcana CLI (`arcana`)
//!
//! Database setup, the HTTP server, and operator tooling.
//!
//! ## Usage
//!
//! ```bash
//! arcana --config ./config/arcana.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `arcana init` | Create the SQLite database and run schema migrations |
//! | `arcana serve` | Start the HTTP API |
//! | `arcana kb ingest <file>` | Chunk, embed and store a document |
//! | `arcana kb list` | List knowledge sources |
//! | `arcana kb chunks <id>` | Show a source's chunks |
//! | `arcana kb delete <id>` | Delete a source and its chunks |
//! | `arcana kb query "<text>"` | Run the retriever |
//! | `arcana interpret` | Generate an interpretation for a spread |
//! | `arcana stats` | Database statistics |
//! | `arcana credits grant/balance` | Adjust or inspect a user's credits |
//! | `arcana admin add/remove` | Manage admin membership |
//! | `arcana token <user>` | Sign a bearer token for local testing |
//! | `arcana completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use arcana::{admin, config, ingest, interpret, kb, migrate, server, stats};

/// Arcana: knowledge-grounded tarot interpretations, readings, and credits.
///
/// All commands except `completions` read a TOML configuration file. See
/// `config/arcana.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "arcana", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/arcana.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Manage the knowledge base.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Generate an interpretation and print it as JSON.
    ///
    /// Cards are given in layout order; append `:reversed` to reverse one,
    /// e.g. `--card "The Tower:reversed"`.
    Interpret {
        /// The question being asked.
        question: String,

        /// Spread: `single`, `three_card`, or `celtic_cross`.
        #[arg(long, default_value = "single")]
        spread: String,

        /// Drawn card, repeated once per position.
        #[arg(long = "card", required = true)]
        cards: Vec<String>,

        /// Tone: `soft`, `pragmatic`, `spiritual`, or `direct`.
        #[arg(long, default_value = "soft")]
        tone: String,

        /// Language: `EN` or `IT`.
        #[arg(long, default_value = "EN")]
        language: String,
    },

    /// Show database statistics and users.
    Stats,

    /// Inspect or adjust a user's credits.
    Credits {
        #[command(subcommand)]
        action: CreditsAction,
    },

    /// Manage admin membership.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Sign a bearer token with the configured secret.
    Token {
        /// User id (`sub` claim).
        user_id: String,

        /// Validity in hours.
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Ingest a text file as one knowledge source.
    Ingest {
        /// Path to a UTF-8 text or markdown file.
        path: PathBuf,

        /// Source name (defaults to the file stem).
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "manual")]
        source_type: String,
    },
    /// List knowledge sources with chunk counts.
    List,
    /// Show the chunks of a source (`*` marks embedded chunks).
    Chunks { source_id: String },
    /// Delete a source and its chunks.
    Delete { source_id: String },
    /// Retrieve chunks for a query.
    Query {
        query: String,

        /// Card names appended to the query as context terms.
        #[arg(long = "card")]
        cards: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum CreditsAction {
    /// Add (or, with a negative amount, remove) credits.
    Grant {
        user_id: String,

        #[arg(allow_hyphen_values = true)]
        amount: i64,

        #[arg(long)]
        description: Option<String>,
    },
    /// Show a user's balance and recent entries.
    Balance {
        user_id: String,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin rights.
    Add { user_id: String },
    /// Revoke admin rights.
    Remove { user_id: String },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "arcana", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Kb { action } => match action {
            KbAction::Ingest {
                path,
                name,
                description,
                source_type,
            } => {
                ingest::run_ingest(&cfg, &path, name, description, source_type).await?;
            }
            KbAction::List => kb::run_list(&cfg).await?,
            KbAction::Chunks { source_id } => kb::run_chunks(&cfg, &source_id).await?,
            KbAction::Delete { source_id } => kb::run_delete(&cfg, &source_id).await?,
            KbAction::Query {
                query,
                cards,
                limit,
            } => kb::run_query(&cfg, &query, cards, limit).await?,
        },
        Commands::Interpret {
            question,
            spread,
            cards,
            tone,
            language,
        } => {
            interpret::run_interpret(&cfg, question, spread, cards, tone, language).await?;
        }
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Credits { action } => match action {
            CreditsAction::Grant {
                user_id,
                amount,
                description,
            } => {
                admin::run_credits_grant(&cfg, &user_id, amount, description.as_deref()).await?;
            }
            CreditsAction::Balance { user_id, limit } => {
                admin::run_credits_balance(&cfg, &user_id, limit).await?;
            }
        },
        Commands::Admin { action } => match action {
            AdminAction::Add { user_id } => admin::run_admin_add(&cfg, &user_id).await?,
            AdminAction::Remove { user_id } => admin::run_admin_remove(&cfg, &user_id).await?,
        },
        Commands::Token { user_id, ttl_hours } => admin::run_token(&cfg, &user_id, ttl_hours)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
