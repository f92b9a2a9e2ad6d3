use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{info, warn};

use crate::LegalError;
use crate::chat::{ChatSession, Reply, render_markdown};
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::generation::{AnswerGenerator, HostedModelClient};
use crate::index::{ArticleIndex, IndexState, LoadedIndex, SourceTables, StorePaths};
use crate::retrieval::{ArticleSearch, Retriever};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "خروج"];

/// Build (or rebuild with `force`) the corpus table and vector index
#[inline]
pub async fn build_corpus(config: &Config, force: bool) -> Result<()> {
    let mut index = ArticleIndex::open(StorePaths::from_config(config))?;

    if let IndexState::Built(manifest) = index.state() {
        if !force {
            println!(
                "Index already built at {} with {} articles.",
                manifest.built_at.format("%Y-%m-%d %H:%M:%S"),
                manifest.row_count
            );
            println!("Use 'legal-mind build --force' to rebuild it.");
            return Ok(());
        }
        info!("Rebuilding existing index");
    }

    let embedder = OllamaClient::new(&config.ollama)?;
    if let Err(e) = embedder.health_check() {
        warn!("Ollama health check failed: {:#}", e);
        println!("Warning: Ollama may not be ready; embedding may fail.");
    }

    build_index(&mut index, config, &embedder).await
}

async fn build_index(index: &mut ArticleIndex, config: &Config, embedder: &OllamaClient) -> Result<()> {
    let sources = SourceTables::from_config(config);
    let manifest = match index.build(&sources, embedder).await {
        Ok(manifest) => manifest,
        Err(LegalError::MissingSource(path)) => {
            println!("❌ Source table not found: {}", path.display());
            println!("Set the table paths with 'legal-mind config' or place the files there.");
            return Err(LegalError::MissingSource(path).into());
        }
        Err(e) => return Err(e).context("Failed to build the vector index"),
    };

    println!("✅ Index built");
    println!("   Constitution articles: {}", manifest.constitution_rows);
    println!("   Labor law articles: {}", manifest.labor_law_rows);
    println!("   Embedding model: {}", manifest.embedding_model);
    println!("   Dimensions: {}", manifest.embedding_dimension);
    Ok(())
}

/// Show configuration, source tables, index state and service reachability
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Legal Mind Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📄 Source Tables:");
    for (label, path) in [
        ("Constitution", config.constitution_csv_path()),
        ("Labor law", config.labor_law_csv_path()),
    ] {
        if path.exists() {
            println!("   ✅ {}: {}", label, path.display());
        } else {
            println!("   ❌ {}: missing ({})", label, path.display());
        }
    }

    println!();
    println!("🔍 Vector Index:");
    let paths = StorePaths::from_config(config);
    match ArticleIndex::open(paths.clone()) {
        Ok(index) => match index.manifest() {
            Some(manifest) => {
                println!("   ✅ Built: {}", paths.root().display());
                println!(
                    "   📊 Articles: {} ({} constitution, {} labor law)",
                    manifest.row_count, manifest.constitution_rows, manifest.labor_law_rows
                );
                println!(
                    "   🧮 Embedding model: {} ({} dimensions)",
                    manifest.embedding_model, manifest.embedding_dimension
                );
                println!(
                    "   🕒 Built at: {}",
                    manifest.built_at.format("%Y-%m-%d %H:%M:%S")
                );
                if manifest.embedding_model != config.ollama.model {
                    println!(
                        "   ⚠️  Configured model is {}; rebuild before searching",
                        config.ollama.model
                    );
                }
            }
            None => println!("   💤 Not built ({})", paths.root().display()),
        },
        Err(e) => println!("   ❌ Unreadable: {}", e),
    }

    println!();
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.with_retry_attempts(1).health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
            }
            Err(e) => println!("   ⚠️  Ollama: Unavailable - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }

    println!();
    println!("💬 Answer Model:");
    println!(
        "   📋 {} via {}",
        config.generation.model,
        config.generation.provider.as_str()
    );
    if config.generation.api_key().is_some() {
        println!("   ✅ {} is set", config.generation.api_key_env);
    } else {
        println!("   ❌ {} is not set or empty", config.generation.api_key_env);
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'legal-mind build' to index the source tables");
    println!("   • Use 'legal-mind ask <question>' for a single answer");
    println!("   • Use 'legal-mind chat' for an interactive session");

    Ok(())
}

/// Print the articles nearest to `query`
#[inline]
pub async fn search_articles(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = match k {
        Some(value) => NonZeroUsize::new(value).context("k must be at least 1")?,
        None => config.retrieval.top_k()?,
    };
    let retriever = open_retriever(config, false).await?;

    let results = match retriever.search(query, k).await {
        Ok(results) => results,
        Err(LegalError::NotReady) => {
            println!("The index has not been built yet. Run 'legal-mind build' first.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Search failed"),
    };

    if results.is_empty() {
        let indexed = retriever.index().map_or(0, LoadedIndex::len);
        println!("No articles found ({} articles indexed).", indexed);
        return Ok(());
    }

    for (rank, found) in results.iter().enumerate() {
        println!(
            "{}. {} {} {}",
            rank + 1,
            style(found.article.source.label_ar()).bold(),
            style(&found.article.arabic_number).cyan(),
            style(format!("(distance {:.4})", found.distance)).dim()
        );
        println!("   {}", found.article.text);
        println!();
    }

    Ok(())
}

/// Answer a single question, building the index first if needed
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<()> {
    let k = config.retrieval.top_k()?;
    let retriever = open_retriever(config, true).await?;
    let generator = answer_generator(config)?;
    let mut session = ChatSession::new();

    let bar = spinner("⚖️ Searching the law and drafting an answer...");
    let reply = session.ask(question, &retriever, &generator, k).await;
    bar.finish_and_clear();

    print_reply(&reply);
    Ok(())
}

/// Interactive terminal chat; one fresh session per invocation
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    let k = config.retrieval.top_k()?;
    let retriever = open_retriever(config, true).await?;
    let generator = answer_generator(config)?;
    let mut session = ChatSession::new();

    println!("{}", style("⚖️ المحامي الذكي").bold().cyan());
    println!(
        "{}",
        style("Ask about the Egyptian Constitution or Labor Law. Type 'exit' to quit.").dim()
    );
    println!();

    loop {
        let question: String = Input::new()
            .with_prompt("سؤالك")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();

        if question.is_empty() || EXIT_WORDS.contains(&question) {
            break;
        }

        let bar = spinner("⚖️ Searching the law and drafting an answer...");
        let reply = session.ask(question, &retriever, &generator, k).await;
        bar.finish_and_clear();

        print_reply(&reply);
        println!();
    }

    info!(
        "Chat session {} ended after {} messages",
        session.id(),
        session.messages().len()
    );
    Ok(())
}

/// Load the index, building it first when `auto_build` is set and nothing is on disk.
///
/// Build-time embedding keeps the configured retries; query embedding makes one attempt.
async fn open_retriever(config: &Config, auto_build: bool) -> Result<Retriever> {
    let embedder = OllamaClient::new(&config.ollama)?;
    let mut index = ArticleIndex::open(StorePaths::from_config(config))?;

    if matches!(index.state(), IndexState::Unbuilt) {
        if !auto_build {
            let query_embedder = embedder.with_retry_attempts(1);
            return Ok(Retriever::new(Box::new(query_embedder), None));
        }
        println!("No index found; building it from the source tables.");
        build_index(&mut index, config, &embedder).await?;
    }

    let query_embedder = embedder.with_retry_attempts(1);
    index
        .load(&query_embedder)
        .await
        .context("Failed to load the vector index")?;
    let loaded = index.into_loaded()?;

    Ok(Retriever::new(Box::new(query_embedder), Some(loaded)))
}

fn answer_generator(config: &Config) -> Result<AnswerGenerator> {
    let client = HostedModelClient::new(&config.generation).with_context(|| {
        format!(
            "Answer model unavailable; export {} with your API token",
            config.generation.api_key_env
        )
    })?;
    Ok(AnswerGenerator::new(Box::new(client)))
}

fn print_reply(reply: &Reply) {
    println!("{}", render_markdown(&reply.content));

    if !reply.articles.is_empty() {
        println!();
        let sources: Vec<String> = reply
            .articles
            .iter()
            .map(|found| {
                format!(
                    "{} {}",
                    found.article.source.label_ar(),
                    found.article.arabic_number
                )
            })
            .collect();
        println!("{}", style(format!("📚 {}", sources.join("، "))).dim());
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}
