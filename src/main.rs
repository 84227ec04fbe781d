//! rankbot - command-driven chat bot with XP ranks.
//!
//! Wires configuration, SQLite persistence, the built-in commands and the
//! console transport around the `rankbot-core` dispatcher.

mod commands;
mod config;
mod console;
mod content;
mod db;
mod http;
mod metrics;
mod notify;
mod rankcard;
mod telemetry;

use crate::commands::{Deps, builtin_plugins};
use crate::config::Config;
use crate::console::{BOT_USER_ID, ConsoleChat, ConsoleMessenger, ConsoleSession};
use crate::content::HttpContentApi;
use crate::db::Database;
use crate::http::BotStatus;
use crate::notify::RankUpNotifier;
use crate::telemetry::PrometheusObserver;
use anyhow::Context;
use rankbot_core::{
    Dispatcher, Gate, Messenger, ProgressionEngine, RankTable, Registry, RegistryHandle, Store,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::resolve(config_path.as_deref()).map_err(|e| {
        error!(path = ?config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("refusing to start with {} configuration error(s)", errors.len());
    }

    let owner_id = config.bot.owner_user_id.context("OWNER_USER_ID is required")?;
    let owner_name = config
        .bot
        .owner_user_name
        .clone()
        .context("OWNER_USER_NAME is required")?;

    info!(
        name = %config.bot.name,
        prefix = %config.bot.prefix,
        owner = owner_id,
        operators = config.operators().len(),
        "Starting rankbot"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the status endpoint (used by tests).
    let metrics_port = config.bot.metrics_port;
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");
    }

    // Initialize database
    let db = Database::new(&config.database.path).await.map_err(|e| {
        error!(path = %config.database.path, code = e.error_code(), error = %e, "Failed to open database");
        e
    })?;
    let store: Arc<dyn Store> = Arc::new(db);

    let chat = Arc::new(ConsoleChat::new(owner_id));
    let messenger: Arc<dyn Messenger> = Arc::new(ConsoleMessenger::new());
    let rank_card = rankcard::from_config(&config.rank_card)?;
    let content = Arc::new(HttpContentApi::new(&config.content)?);
    let progression = Arc::new(ProgressionEngine::new(store.clone(), RankTable::standard()));

    let registry = RegistryHandle::default();
    let deps = Deps {
        prefix: config.bot.prefix.clone(),
        bot_name: config.bot.name.clone(),
        owner_name: owner_name.clone(),
        bot_id: BOT_USER_ID,
        store: store.clone(),
        progression: progression.clone(),
        messenger: messenger.clone(),
        roles: chat.clone(),
        chat_admin: chat.clone(),
        rank_card: rank_card.clone(),
        content,
        registry: registry.clone(),
    };

    let mut loaded = Registry::new();
    let report = loaded.load(builtin_plugins(&deps));
    if report.failed() > 0 {
        warn!(failed = report.failed(), "Some commands failed to load");
    }
    if loaded.is_empty() {
        anyhow::bail!("no commands loaded");
    }
    registry.replace(loaded);

    let gate = Gate::new(store, chat, config.operators());
    let dispatcher = Arc::new(
        Dispatcher::new(
            config.bot.prefix.clone(),
            registry,
            gate,
            progression,
            messenger.clone(),
        )
        .with_notifier(Arc::new(RankUpNotifier::new(messenger, rank_card)))
        .with_observer(Arc::new(PrometheusObserver)),
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Ctrl-C received");
            shutdown.cancel();
        });
    }

    if metrics_port != 0 {
        match http::bind(metrics_port).await {
            Ok(listener) => {
                let status = Arc::new(BotStatus::new(
                    config.bot.name.clone(),
                    dispatcher.registry_handle(),
                ));
                tokio::spawn(http::serve(listener, status, shutdown.clone()));
            }
            Err(e) => error!(port = metrics_port, error = %e, "Failed to bind status endpoint"),
        }
    }

    let session = ConsoleSession::new(owner_id, owner_name, config.bot.name.clone());
    console::run(
        Arc::clone(&dispatcher),
        session,
        console::stdin_lines(),
        shutdown.clone(),
    )
    .await;
    shutdown.cancel();

    let stats = dispatcher.registry();
    for (command, uses) in stats.command_stats() {
        info!(command, uses, "Command usage");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Logs go to stderr so stdout carries only bot replies.
fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr);

    let json = std::env::var("RANKBOT_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
