mod answer;
mod assistant;
mod commands;
mod config;
mod crawl;
mod dynamic;
mod error;
mod gate;
mod jobs;
mod knowledge;
mod llm;
mod retrieval;
mod state;
mod text;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use assistant::LegalAssistant;
use config::Settings;
use crawl::tracker::CrawlTracker;
use crawl::IncrementalCrawler;
use dynamic::source::{LegalSource, PravoBySource};
use dynamic::DynamicSearchEngine;
use gate::arbiter::RelevanceArbiter;
use gate::lexical::LexicalScorer;
use gate::statistical::StatisticalClassifier;
use jobs::JobTable;
use knowledge::embed::{Embedder, HashedNgramEmbedder, RemoteEmbedder};
use knowledge::KnowledgeStore;
use llm::LlmClient;
use retrieval::SufficiencyJudge;
use state::AppState;

/// Legal assistant for questions on the law of the Republic of Belarus
#[derive(Parser)]
#[command(name = "yurpomoshnik")]
#[command(about = "Discord legal assistant backed by a local knowledge base and pravo.by")]
struct Cli {
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the Discord bot (default)
    Bot,
    /// Load extracted `.txt` documents into the knowledge base
    Ingest {
        /// Directory of documents; defaults to DOCS_DIR
        dir: Option<PathBuf>,
    },
    /// Re-crawl static legal pages and re-ingest what changed
    Crawl {
        /// Pages to crawl; defaults to CRAWL_SEEDS
        urls: Vec<String>,
        /// Delete chunks of pages that disappeared
        #[arg(long)]
        purge_deleted: bool,
    },
    /// Print knowledge base statistics as JSON
    Stats,
    /// Retrain the relevance classifier from the seed corpus
    Train,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env();
    match cli.command.unwrap_or(Cmd::Bot) {
        Cmd::Bot => run_bot(settings).await,
        Cmd::Ingest { dir } => {
            let store = open_store(&settings).await?;
            let dir = dir.unwrap_or_else(|| settings.docs_dir.clone());
            let stats = knowledge::ingest::ingest_directory(&store, &dir, Default::default()).await?;
            info!(
                files = stats.processed_files,
                of = stats.total_files,
                blocks = stats.total_blocks,
                added = stats.added_blocks,
                failed = stats.failed_files.len(),
                "ingest finished"
            );
            println!("{}", serde_json::to_string_pretty(&store.stats().await)?);
            Ok(())
        }
        Cmd::Crawl { urls, purge_deleted } => {
            let seeds = if urls.is_empty() { settings.crawl_seeds.clone() } else { urls };
            if seeds.is_empty() {
                bail!("No URLs given and CRAWL_SEEDS is empty");
            }
            let store = open_store(&settings).await?;
            let mut options = settings.crawl.clone();
            options.purge_deleted |= purge_deleted;
            let crawler = IncrementalCrawler::new(
                store,
                legal_source(&settings)?,
                CrawlTracker::open(&settings.crawl_state_path),
                options,
            );
            let report = crawler.run(&seeds).await?;
            if !report.failed.is_empty() {
                error!(failed = ?report.failed, "some pages could not be fetched");
            }
            Ok(())
        }
        Cmd::Stats => {
            let store = open_store(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&store.stats().await)?);
            Ok(())
        }
        Cmd::Train => {
            let classifier = StatisticalClassifier::retrain(&settings.classifier_model_path)?;
            info!(
                path = %settings.classifier_model_path.display(),
                vocabulary = classifier.model().vocabulary_size(),
                "classifier retrained"
            );
            Ok(())
        }
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<KnowledgeStore>> {
    let embedder: Arc<dyn Embedder> = match &settings.embedding_base_url {
        Some(url) => Arc::new(RemoteEmbedder::new(
            url,
            &settings.embedding_model,
            settings.embedding_api_key.clone(),
        )?),
        None => Arc::new(HashedNgramEmbedder::default()),
    };
    let store = KnowledgeStore::open(&settings.kb_path, embedder, settings.relevance_threshold).await?;
    Ok(Arc::new(store))
}

fn legal_source(settings: &Settings) -> anyhow::Result<Arc<dyn LegalSource>> {
    Ok(Arc::new(PravoBySource::new(&settings.search_url, &settings.search_param)?))
}

async fn run_bot(settings: Settings) -> anyhow::Result<()> {
    let token = settings
        .discord_token
        .clone()
        .context("DISCORD_TOKEN required")?;
    let guild_id = settings.guild_id.map(serenity::GuildId::new);

    let store = open_store(&settings).await?;

    let classifier = StatisticalClassifier::load_or_train(&settings.classifier_model_path);
    let arbiter = Arc::new(RelevanceArbiter::from_parts(
        LexicalScorer::new().with_accept_threshold(settings.lexical_accept),
        classifier,
    ));
    info!("Relevance gate ready");

    let tunables = Arc::new(RwLock::new(settings.tunables));
    let judge = SufficiencyJudge::new(store.clone(), settings.tunables.judge());
    let dynamic = Arc::new(DynamicSearchEngine::new(
        store.clone(),
        legal_source(&settings)?,
        settings.dynamic.clone(),
    ));
    let llm_client = Arc::new(LlmClient::from_env()?);
    info!(model = llm_client.model(), "LLM client initialized");

    let assistant = Arc::new(LegalAssistant::new(
        arbiter,
        judge,
        dynamic,
        llm_client,
        tunables.clone(),
        settings.dynamic_timeout,
    )
    .with_budget(settings.answer_budget));

    let jobs = Arc::new(JobTable::new(
        jobs::default_jobs(store.clone(), legal_source(&settings)?, &settings),
        settings.job_timeout,
    ));

    if !settings.admin_ids.is_empty() {
        info!(count = settings.admin_ids.len(), "Admin users configured");
    }

    let app_state = AppState {
        assistant,
        store,
        jobs,
        admin_ids: settings.admin_ids.clone(),
        tunables,
    };

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::yurist()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                for cmd in commands {
                    info!("  /{} ({} subcommands)", cmd.name, cmd.subcommands.len());
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, gid)
                        .await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting ЮрПомощник Discord bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}
