use anyhow::{Context, Result};
use axum::routing::get;
use std::sync::Arc;
use teloxide::dispatching::{dialogue, UpdateHandler};
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inventory_bot::bot;
use inventory_bot::config::BotConfig;
use inventory_bot::db::Database;
use inventory_bot::dialogue::InventoryState;
use inventory_bot::keepalive::{self, HEALTH_PATH};
use inventory_bot::localization::init_localization;
use inventory_bot::session_store::ExpiringStorage;

type SessionStorage = ExpiringStorage<InventoryState>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn schema() -> UpdateHandler<anyhow::Error> {
    dialogue::enter::<Update, SessionStorage, InventoryState, _>()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Inventory Telegram Bot");

    let config = Arc::new(BotConfig::from_env().context("Invalid configuration")?);
    info!(
        storages = config.storages.len(),
        language = %config.language,
        webhook = config.webhook_url.is_some(),
        "Configuration loaded"
    );

    init_localization()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);

    let storage = SessionStorage::new(config.session.state_ttl());
    let _cleanup = storage.clone().spawn_cleanup(config.session.cleanup_interval());

    let bot = Bot::new(config.bot_token.clone());

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![storage, db.clone(), config.clone()])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build();

    match config.webhook_url.clone() {
        Some(url) => {
            let addr = config.listen_addr();
            info!(url = %url, addr = %addr, "Bot initialized, starting webhook server");

            let (listener, stop_flag, router) =
                webhooks::axum_to_router(bot, webhooks::Options::new(addr, url.clone()))
                    .await
                    .context("Failed to set up webhook")?;
            let router = router.route(HEALTH_PATH, get(keepalive::health));

            let tcp_listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp_listener, router)
                    .with_graceful_shutdown(stop_flag)
                    .await
                {
                    warn!(error = %e, "Webhook server stopped with an error");
                }
            });

            let _ping = keepalive::spawn_self_ping(
                keepalive::health_url(&url)?,
                config.self_ping_interval(),
            );

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Bot initialized, starting long polling");
            dispatcher.dispatch().await;
        }
    }

    info!("Shutting down");
    db.close().await;

    Ok(())
}
