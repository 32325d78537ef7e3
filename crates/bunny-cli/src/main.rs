use anyhow::{Context, Result};
use bunny_channels::{MessageBus, SlackChannel, SlackChannelConfig};
use bunny_core::config::{StoreBackend, default_config_path};
use bunny_core::{
    ApiAiClient, Bot, BunnyConfig, ConfirmationStore, IftttMaker, InMemorySessionStore,
    IntentInterpreter, ProjectCatalog, TicketDispatcher,
};
use bunny_scheduler::{ExpirySweeper, SweeperConfig};
use bunny_store::{FirebaseStore, KeyValueStore, MemoryStore, SqliteStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bunny")]
#[command(about = "Slack bot that turns conversations into project tickets", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.bunny/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging, unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Slack gateway and the bot
    Start,
    /// Print the resolved configuration with secrets redacted
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let path = cli.config.unwrap_or_else(default_config_path);
    let config = BunnyConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;

    match cli.command {
        Commands::Start => cmd_start(config).await,
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_check_config(config: &BunnyConfig) -> Result<()> {
    println!("{}", config.redacted());
    config.validate()?;
    println!("Configuration OK");
    Ok(())
}

fn build_store(config: &BunnyConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Firebase => {
            let url = config
                .store
                .database_url
                .clone()
                .context("FIREBASE_DATABASE_URL is not set")?;
            Arc::new(FirebaseStore::new(
                url,
                config.store.secret.clone(),
                config.http_timeout(),
            )?)
        }
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(config.sqlite_path())?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Using {} store", store.backend());
    Ok(store)
}

fn build_bot(config: &BunnyConfig) -> Result<Bot> {
    let catalog = Arc::new(ProjectCatalog::new(config.projects.allowed.iter().cloned()));
    let nlu = Arc::new(ApiAiClient::new(
        config.nlu.base_url.clone(),
        config.nlu.access_token.clone(),
        config.http_timeout(),
    )?);
    let interpreter = IntentInterpreter::new(
        nlu,
        Arc::new(InMemorySessionStore::new()),
        build_store(config)?,
        catalog.clone(),
    )
    .with_bot_user_id(config.slack.bot_user_id.clone())
    .with_lang(config.nlu.lang.clone());

    let trigger = Arc::new(IftttMaker::new(
        config.ifttt.base_url.clone(),
        config.ifttt.maker_key.clone(),
        config.http_timeout(),
    )?);
    let confirmations = Arc::new(ConfirmationStore::new(config.confirmation_window()));

    Ok(Bot::new(
        catalog,
        interpreter,
        confirmations,
        TicketDispatcher::new(trigger),
    )
    .with_bot_user_id(config.slack.bot_user_id.clone()))
}

async fn cmd_start(config: BunnyConfig) -> Result<()> {
    config.validate()?;
    let cancel = CancellationToken::new();
    let bot = Arc::new(build_bot(&config)?);

    let mut sweeper = ExpirySweeper::new(SweeperConfig {
        interval: config.sweep_interval(),
    });
    sweeper.register(bot.confirmations().clone());
    let sweeper_handle = sweeper.spawn(cancel.clone());

    let mut bus = MessageBus::new(256);
    bus.register(Box::new(SlackChannel::new(
        SlackChannelConfig::from_config(&config),
        cancel.clone(),
    )?));
    bus.start_all().await?;

    let (mut rx, sender) = bus.split();
    let sender = Arc::new(sender);
    info!("bunny is up");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    info!("Event bus closed");
                    break;
                };
                let bot = bot.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let kind = event.kind();
                    for reply in bot.handle(event).await {
                        if let Err(e) = sender.send(reply).await {
                            error!("Failed to deliver {} reply: {:#}", kind, e);
                        }
                    }
                    debug!("Finished handling {} event", kind);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    cancel.cancel();
    if let Err(e) = sweeper_handle.await {
        error!("Sweeper task failed: {}", e);
    }
    Ok(())
}
