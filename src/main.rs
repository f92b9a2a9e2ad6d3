use std::path::PathBuf;

use clap::{Parser, Subcommand};
use legal_mind::Result;
use legal_mind::commands::{ask_question, build_corpus, run_chat, search_articles, show_status};
use legal_mind::config::{Config, resolve_base_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "legal-mind")]
#[command(about = "Answers questions about the Egyptian Constitution and Labor Law from the articles themselves")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the source tables and the index
    #[arg(long, global = true, env = "LEGAL_MIND_HOME")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding server, the answer model and corpus paths
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the merged corpus table and its vector index
    Build {
        /// Rebuild even if an index already exists
        #[arg(long)]
        force: bool,
    },
    /// Show source tables, index and service status
    Status,
    /// List the articles nearest to a query
    Search {
        query: String,
        /// Number of articles to return (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer a single question
    Ask { question: String },
    /// Start an interactive chat session
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&base_dir)?;
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Build { force } => {
            build_corpus(&config, force).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Search { query, k } => {
            search_articles(&config, &query, k).await?;
        }
        Commands::Ask { question } => {
            ask_question(&config, &question).await?;
        }
        Commands::Chat => {
            run_chat(&config).await?;
        }
    }

    Ok(())
}
