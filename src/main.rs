//! # RagBot
//!
//! Telegram bot that answers questions from a pre-embedded knowledge base.
//!
//! Usage:
//!   ragbot serve                          # Long-poll Telegram (default)
//!   ragbot ask "Who hosted?"              # One-shot answer
//!   ragbot ask "Who hosted?" --print-prompt
//!   ragbot check                          # Validate config, corpus and tokenizer
//!   ragbot init                           # Write ~/.ragbot/config.toml

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use ragbot_agent::{BotDispatcher, RagEngine};
use ragbot_channels::{TelegramChannel, TelegramConfig};
use ragbot_core::RagBotConfig;
use ragbot_core::traits::{Channel, ChatProvider, EmbeddingProvider};
use ragbot_knowledge::{Corpus, TokenAccountant};

#[derive(Parser)]
#[command(
    name = "ragbot",
    version,
    about = "🎬 RagBot — answers questions about a knowledge base over Telegram"
)]
struct Cli {
    /// Config file (default: ~/.ragbot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Serve,
    /// Answer one question and exit
    Ask {
        question: String,
        /// Print the assembled prompt before the answer
        #[arg(long)]
        print_prompt: bool,
    },
    /// Validate configuration, load the corpus and resolve the tokenizer
    Check,
    /// Write a default config file
    Init,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let filter = if cli.verbose {
        "ragbot=debug,ragbot_agent=debug,ragbot_knowledge=debug,ragbot_providers=debug,ragbot_channels=debug"
    } else {
        "ragbot=info,ragbot_agent=info,ragbot_knowledge=info,ragbot_providers=info,ragbot_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let command = cli.command.unwrap_or(Commands::Serve);
    if let Commands::Init = command {
        return init(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;

    match command {
        Commands::Serve => serve(config).await,
        Commands::Ask {
            question,
            print_prompt,
        } => ask(config, &question, print_prompt).await,
        Commands::Check => check(config),
        Commands::Init => Ok(()),
    }
}

fn init(path: Option<&str>) -> Result<()> {
    let path = path.map(expand_path).unwrap_or_else(RagBotConfig::default_path);
    if path.exists() {
        println!("⚠️  Config already exists: {}", path.display());
        return Ok(());
    }
    RagBotConfig::default().save_to(&path)?;
    println!("✅ Config written: {}", path.display());
    println!("   Set OPENAI_API_KEY and BOT_TOKEN (or edit the file), then run `ragbot check`.");
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<RagBotConfig> {
    let mut config = match path {
        Some(p) => RagBotConfig::load_from(&expand_path(p))?,
        None => RagBotConfig::load()?,
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn load_corpus(config: &RagBotConfig) -> Result<Arc<Corpus>> {
    let path = expand_path(&config.knowledge.corpus_path);
    let corpus = Corpus::load(Path::new(&path))
        .with_context(|| format!("cannot start without corpus {}", path.display()))?;
    Ok(Arc::new(corpus))
}

fn build_engine(config: &RagBotConfig) -> Result<RagEngine> {
    let corpus = load_corpus(config)?;
    let provider = Arc::new(ragbot_providers::create_provider(&config.llm)?);
    tracing::info!("🔌 Provider: {} ({})", config.llm.provider, provider.base_url());

    let embedder: Arc<dyn EmbeddingProvider> = provider.clone();
    let chat: Arc<dyn ChatProvider> = provider;
    Ok(RagEngine::from_config(config, corpus, embedder, chat)?)
}

async fn ask(config: RagBotConfig, question: &str, print_prompt: bool) -> Result<()> {
    let engine = build_engine(&config)?;
    let deadline = std::time::Duration::from_secs(config.bot.query_timeout_secs);

    let budget = engine.token_budget();
    let answer = if print_prompt {
        engine
            .ask_with_deadline_inspect(question, deadline, |prompt| {
                println!("{}\n", prompt.text);
                println!(
                    "── {} passages, {} tokens (budget {}) ──\n",
                    prompt.passages, prompt.tokens, budget
                );
            })
            .await?
    } else {
        engine.ask_with_deadline(question, deadline).await?
    };

    println!("{answer}");
    Ok(())
}

fn check(config: RagBotConfig) -> Result<()> {
    println!("🎬 RagBot — configuration check\n");
    println!("   Provider:   {}", config.llm.provider);
    println!("   Chat model: {}", config.llm.chat_model);
    println!("   Embeddings: {}", config.llm.embedding_model);

    let provider = ragbot_providers::create_provider(&config.llm)?;
    println!("   Endpoint:   {}", provider.base_url());

    let tokens = TokenAccountant::for_model(&config.llm.chat_model)?;
    println!("   Tokenizer:  {}", tokens.encoding_name());

    let corpus = load_corpus(&config)?;
    println!(
        "   Corpus:     {} passages × {} dimensions",
        corpus.len(),
        corpus.dimensions()
    );
    println!(
        "   Retrieval:  top {} passages, {} token budget",
        config.knowledge.top_n, config.knowledge.token_budget
    );

    match config.channel.telegram.as_ref() {
        Some(tg) if tg.enabled => println!("   Telegram:   enabled"),
        _ => println!("   Telegram:   not configured"),
    }
    println!("\n✅ Ready");
    Ok(())
}

async fn serve(config: RagBotConfig) -> Result<()> {
    let telegram = config
        .channel
        .telegram
        .as_ref()
        .filter(|tg| tg.enabled)
        .context("Telegram is not configured: set BOT_TOKEN or [channel.telegram]")?;
    let telegram = TelegramConfig::from(telegram);

    let engine = Arc::new(build_engine(&config)?);
    let dispatcher = Arc::new(BotDispatcher::new(engine, config.bot.clone()));

    let mut poller = TelegramChannel::new(telegram.clone());
    poller.connect().await?;
    let sender = Arc::new(TelegramChannel::new(telegram));
    let mut updates = poller.start_polling();

    let limit = Arc::new(Semaphore::new(config.bot.max_concurrent_queries));
    tracing::info!(
        "🚀 RagBot serving (up to {} concurrent queries)",
        config.bot.max_concurrent_queries
    );

    loop {
        let msg = tokio::select! {
            msg = updates.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Shutting down");
                break;
            }
        };

        let permit = limit.clone().acquire_owned().await?;
        let dispatcher = dispatcher.clone();
        let sender = sender.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = sender.send_typing(&msg.thread_id).await {
                tracing::debug!("typing indicator failed: {e}");
            }
            if let Some(reply) = dispatcher.handle(&msg).await
                && let Err(e) = sender.send(reply).await
            {
                tracing::error!("❌ Failed to reply in {}: {e}", msg.thread_id);
            }
        });
    }

    Ok(())
}
