#![warn(missing_docs)]
//! A Telegram gardening diary.
//!
//! Users keep a seed stock, plant from it and record the growth stages of
//! their plants. The bot derives the care operations due each day from a
//! plant catalog and reminds users of them every morning.

/// The main handler for the bot's logic.
pub mod bot_handler;
/// The plant catalog file format.
pub mod catalog;
/// The source of the current time.
pub mod clock;
/// The configuration for the application.
pub mod config;
/// The dispatcher for routing updates to the correct handlers.
pub mod dispatcher;
/// The use cases of the diary.
pub mod garden;
/// Clients of LLM chat completion providers.
pub mod llm;
/// The service for sending messages to the user.
pub mod messaging;
/// The daily task reminder.
pub mod reminder;
/// Growth stages, care operations and their scheduling.
pub mod schedule;
/// The storage layer for persisting data.
pub mod storage;

use std::sync::Arc;

use teloxide::{
    dispatching::dialogue::{SqliteStorage, serializer},
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::{Polling, webhooks},
};

use crate::{
    bot_handler::BotHandler,
    catalog::Catalog,
    clock::{Clock, SystemClock},
    config::{BotMode, Config},
    garden::DefaultGardenService,
    messaging::TelegramMessagingService,
    reminder::TaskReminder,
    storage::{GardenStorage, sqlite::SqliteStorage as ApplicationStorage},
};

/// Runs the bot.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let storage = Arc::new(ApplicationStorage::new(&config.database_url).await?);

    if let Some(path) = &config.catalog_path {
        let catalog = Catalog::load(path)?;
        tracing::debug!("Loaded catalog from {path}");
        storage.import_catalog(&catalog).await?;
    }

    let bot = Bot::new(config.telegram_bot_token.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let messaging_service = Arc::new(TelegramMessagingService::new(bot.clone()));
    let garden_service =
        Arc::new(DefaultGardenService::new(storage.clone(), config.default_timezone));

    // Spawn the daily reminder.
    let reminder = TaskReminder::new(
        storage.clone(),
        garden_service.clone(),
        messaging_service.clone(),
        clock.clone(),
        config.default_timezone,
        config.reminder_hour,
        config.reminder_poll_interval,
        config.max_concurrency,
    );

    tokio::spawn(async move {
        if let Err(e) = reminder.run().await {
            tracing::error!("Error in reminder: {e}");
        }
    });

    let dialogue_storage = SqliteStorage::open(&config.database_url, serializer::Json).await?;
    let handler = Arc::new(BotHandler::new(messaging_service, garden_service, clock));
    let mut dispatcher =
        dispatcher::BotDispatcher::new(handler, dialogue_storage).build(bot.clone());
    tracing::debug!("Dispatcher built successfully.");

    let error_handler = LoggingErrorHandler::with_custom_text("An error from the update listener");

    match config.bot_mode {
        BotMode::Polling => {
            let mut polling = Polling::builder(bot).delete_webhook().await;
            if config.drop_pending_updates {
                polling = polling.drop_pending_updates();
            }
            tracing::info!("Polling for updates");
            dispatcher.dispatch_with_listener(polling.build(), error_handler).await;
        }
        BotMode::Webhook { url, addr, secret_token } => {
            let mut options = webhooks::Options::new(addr, url);
            if let Some(token) = secret_token {
                options = options.secret_token(token);
            }
            if config.drop_pending_updates {
                options = options.drop_pending_updates();
            }
            let listener = webhooks::axum(bot, options).await?;
            tracing::info!("Listening for webhook updates on {addr}");
            dispatcher.dispatch_with_listener(listener, error_handler).await;
        }
    }

    Ok(())
}
